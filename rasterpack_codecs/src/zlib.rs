use std::io::Write;

use flate2::write::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;

use crate::{BlockCodec, CodecError, CODEC_ZLIB};

/// Zlib (DEFLATE) block backend via `flate2`.
///
/// The public 1..=9 compression levels map directly onto zlib's own levels.
/// Slower than LZ4 and zstd but occasionally the right choice when matching
/// an existing zlib-based pipeline.
pub struct ZlibCodec {
    level: u32,
}

impl ZlibCodec {
    pub fn new(level: u8) -> Self {
        Self {
            level: level.clamp(1, 9) as u32,
        }
    }
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

fn backend_err(op: &'static str) -> impl FnOnce(std::io::Error) -> CodecError {
    move |e| CodecError::Backend {
        codec: "zlib",
        op,
        msg: e.to_string(),
    }
}

impl BlockCodec for ZlibCodec {
    fn id(&self) -> u16 {
        CODEC_ZLIB
    }

    fn name(&self) -> &'static str {
        "zlib"
    }

    fn compress_block(&self, raw: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = ZlibEncoder::new(
            Vec::with_capacity(raw.len() / 2),
            Compression::new(self.level),
        );
        encoder.write_all(raw).map_err(backend_err("compress"))?;
        encoder.finish().map_err(backend_err("compress"))
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>, CodecError> {
        let mut decoder = ZlibDecoder::new(Vec::with_capacity(raw_len));
        decoder
            .write_all(compressed)
            .map_err(backend_err("decompress"))?;
        let raw = decoder.finish().map_err(backend_err("decompress"))?;
        if raw.len() != raw_len {
            return Err(CodecError::LengthMismatch {
                expected: raw_len,
                got: raw.len(),
            });
        }
        Ok(raw)
    }
}
