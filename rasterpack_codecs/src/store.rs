use crate::{BlockCodec, CodecError, CODEC_STORE};

/// No-op backend: stores blocks verbatim, with no compression.
///
/// Selected for compression level 0, and useful for verifying the chunk
/// envelope round-trip independently of any real codec.
pub struct StoreCodec;

impl BlockCodec for StoreCodec {
    fn id(&self) -> u16 {
        CODEC_STORE
    }

    fn name(&self) -> &'static str {
        "store"
    }

    fn compress_block(&self, raw: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(raw.to_vec())
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>, CodecError> {
        if compressed.len() != raw_len {
            return Err(CodecError::LengthMismatch {
                expected: raw_len,
                got: compressed.len(),
            });
        }
        Ok(compressed.to_vec())
    }
}
