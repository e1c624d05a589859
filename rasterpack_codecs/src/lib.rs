//! Block-codec backends for the rasterpack compressed image engine.
//!
//! A chunk stored by `rasterpack_core` is split into fixed-size blocks, each
//! compressed independently by one of the [`BlockCodec`] implementations in
//! this crate. Block independence is the invariant that makes random chunk
//! access and intra-chunk parallelism possible: no codec may carry state
//! across blocks.

mod lz4;
mod store;
mod zlib;
mod zstd_codec;

pub use lz4::Lz4Codec;
pub use store::StoreCodec;
pub use zlib::ZlibCodec;
pub use zstd_codec::ZstdCodec;

use std::sync::Arc;

// ── Backend ids ─────────────────────────────────────────────────────────────
//
// Stored in every chunk header so that chunks are self-describing. Stable,
// never reused.

pub const CODEC_STORE: u16 = 0;
pub const CODEC_LZ4: u16 = 1;
pub const CODEC_ZLIB: u16 = 2;
pub const CODEC_ZSTD: u16 = 3;

/// The compression codecs selectable on a channel.
///
/// `Blosclz` and `Lz4hc` have no backend in this workspace's stack; both
/// resolve to the LZ4 backend. Level 0 disables compression entirely (blocks
/// are stored verbatim) regardless of the selected codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Codec {
    Blosclz,
    #[default]
    Lz4,
    Lz4hc,
    Zlib,
    Zstd,
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Codec::Blosclz => "blosclz",
            Codec::Lz4 => "lz4",
            Codec::Lz4hc => "lz4hc",
            Codec::Zlib => "zlib",
            Codec::Zstd => "zstd",
        }
    }
}

/// Failures raised by the codec layer: a backend rejected its input, or the
/// bytes handed to it do not describe a valid chunk.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("{codec}: {op} failed: {msg}")]
    Backend {
        codec: &'static str,
        op: &'static str,
        msg: String,
    },
    #[error("corrupt chunk: {0}")]
    CorruptChunk(String),
    #[error("block {index} checksum mismatch: expected {expected:016x}, got {got:016x}")]
    ChecksumMismatch {
        index: usize,
        expected: u64,
        got: u64,
    },
    #[error("decompressed {got} bytes where {expected} were expected")]
    LengthMismatch { expected: usize, got: usize },
    #[error("unknown codec id {0}")]
    UnknownCodecId(u16),
}

/// One independently compressible unit.
///
/// Each implementation:
/// - Is identified by a stable numeric `id()` stored in the chunk header.
/// - Must compress/decompress individual blocks independently; no cross-block
///   state is permitted.
/// - Receives the uncompressed block length out-of-band on decompress (the
///   chunk's block index stores it), so backends need no size prefix of
///   their own.
pub trait BlockCodec: Send + Sync {
    /// Stable backend id stored in the chunk header.
    fn id(&self) -> u16;

    /// Human-readable backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Compress a single independent block.
    fn compress_block(&self, raw: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decompress a single independent block of known uncompressed length.
    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>, CodecError>;
}

/// Resolve the backend for a user-facing codec selection.
///
/// Level 0 means "no compression" and selects the store backend for every
/// codec. Levels above 9 are the caller's problem; the core clamps before
/// calling in.
pub fn backend_for(codec: Codec, level: u8) -> Arc<dyn BlockCodec> {
    if level == 0 {
        return Arc::new(StoreCodec);
    }
    match codec {
        Codec::Blosclz | Codec::Lz4 | Codec::Lz4hc => Arc::new(Lz4Codec),
        Codec::Zlib => Arc::new(ZlibCodec::new(level)),
        Codec::Zstd => Arc::new(ZstdCodec::from_quality(level)),
    }
}

/// Resolve a backend from the `codec_id` found in a chunk header, so that
/// self-describing chunks can be decompressed without side metadata.
pub fn backend_by_id(id: u16) -> Result<Arc<dyn BlockCodec>, CodecError> {
    match id {
        CODEC_STORE => Ok(Arc::new(StoreCodec)),
        CODEC_LZ4 => Ok(Arc::new(Lz4Codec)),
        CODEC_ZLIB => Ok(Arc::new(ZlibCodec::default())),
        CODEC_ZSTD => Ok(Arc::new(ZstdCodec::default())),
        other => Err(CodecError::UnknownCodecId(other)),
    }
}
