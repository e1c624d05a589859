use crate::{BlockCodec, CodecError, CODEC_ZSTD};

/// Zstandard block backend.
///
/// Best general-purpose ratio/speed trade-off. The public 1..=9 quality range
/// is spread over zstd's native 1..=19 levels, the same way blosc spreads its
/// clevel over codec-native levels.
pub struct ZstdCodec {
    level: i32,
}

const QUALITY_TO_LEVEL: [i32; 9] = [1, 2, 3, 5, 7, 9, 12, 16, 19];

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    /// Map a public 1..=9 quality setting onto a native zstd level.
    pub fn from_quality(quality: u8) -> Self {
        let quality = quality.clamp(1, 9);
        Self {
            level: QUALITY_TO_LEVEL[quality as usize - 1],
        }
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl BlockCodec for ZstdCodec {
    fn id(&self) -> u16 {
        CODEC_ZSTD
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress_block(&self, raw: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::bulk::compress(raw, self.level).map_err(|e| CodecError::Backend {
            codec: "zstd",
            op: "compress",
            msg: e.to_string(),
        })
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>, CodecError> {
        let raw = zstd::bulk::decompress(compressed, raw_len).map_err(|e| CodecError::Backend {
            codec: "zstd",
            op: "decompress",
            msg: e.to_string(),
        })?;
        if raw.len() != raw_len {
            return Err(CodecError::LengthMismatch {
                expected: raw_len,
                got: raw.len(),
            });
        }
        Ok(raw)
    }
}
