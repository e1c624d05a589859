//! The self-describing chunk envelope.
//!
//! Every compressed chunk carries a fixed header, a block index and the
//! concatenated block payloads:
//!
//! ```text
//! [HEADER: 24 bytes]
//! [BLOCK INDEX: 16 bytes x nblocks]
//! [PAYLOAD: compressed blocks back to back]
//! ```
//!
//! The header records the backend id and the uncompressed length, so a chunk
//! handed back to `append_precompressed`/`update_precompressed` needs no side
//! metadata, and a channel can host chunks produced by differently configured
//! contexts.

use rasterpack_codecs::CodecError;

/// Magic bytes opening every chunk.
pub(crate) const MAGIC: &[u8; 4] = b"RPK1";

/// Fixed size of the chunk header in bytes.
///   magic[4] + codec_id:u16 + type_size:u16 + block_size:u32
///   + raw_len:u32 + nblocks:u32 + flags:u32
///   = 4 + 2 + 2 + 4 + 4 + 4 + 4 = 24
pub(crate) const HEADER_SIZE: usize = 24;

/// Size of each entry in the block index, in bytes.
///   compressed_len:u32 + raw_len:u32 + checksum:u64 = 16
pub(crate) const BLOCK_ENTRY_SIZE: usize = 16;

/// Each block carries an xxhash3-64 checksum of its compressed bytes.
pub(crate) const FLAG_HAS_CHECKSUM: u32 = 1 << 0;

/// Conservative per-block growth margin used when sizing compression
/// scratch. Covers the worst-case expansion of every bundled backend on
/// incompressible input.
pub(crate) const BLOCK_MARGIN: usize = 128;

/// Chunks must stay addressable with signed 32-bit byte counts.
pub const MAX_CHUNK_BYTES: usize = i32::MAX as usize;

/// Upper bound on the envelope size for a chunk of `chunk_size` raw bytes
/// split into `block_size` blocks. Scratch buffers preallocated to this size
/// never reallocate during compression.
pub(crate) fn max_envelope_size(chunk_size: usize, block_size: usize) -> usize {
    let nblocks = chunk_size.div_ceil(block_size).max(1);
    HEADER_SIZE + nblocks * (BLOCK_ENTRY_SIZE + BLOCK_MARGIN) + chunk_size
}

// ── Header ──────────────────────────────────────────────────────────────────

/// Decoded representation of the 24-byte chunk header.
#[derive(Debug, Clone)]
pub(crate) struct ChunkHeader {
    /// Backend that produced the block payloads.
    pub codec_id: u16,
    /// Element size at compression time.
    pub type_size: u16,
    /// Nominal raw bytes per block (the last block may be smaller).
    pub block_size: u32,
    /// Total uncompressed bytes of the chunk.
    pub raw_len: u32,
    pub nblocks: u32,
    pub flags: u32,
}

impl ChunkHeader {
    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(MAGIC);
        buf[4..6].copy_from_slice(&self.codec_id.to_le_bytes());
        buf[6..8].copy_from_slice(&self.type_size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.block_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.raw_len.to_le_bytes());
        buf[16..20].copy_from_slice(&self.nblocks.to_le_bytes());
        buf[20..24].copy_from_slice(&self.flags.to_le_bytes());
        buf
    }

    /// Deserialize from the front of `bytes`, checking the magic.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CodecError::CorruptChunk(format!(
                "chunk of {} bytes is shorter than the {} byte header",
                bytes.len(),
                HEADER_SIZE
            )));
        }
        if &bytes[..4] != MAGIC {
            return Err(CodecError::CorruptChunk(
                "invalid magic bytes, not a rasterpack chunk".into(),
            ));
        }
        let header = Self {
            codec_id: u16::from_le_bytes(bytes[4..6].try_into().unwrap()),
            type_size: u16::from_le_bytes(bytes[6..8].try_into().unwrap()),
            block_size: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            raw_len: u32::from_le_bytes(bytes[12..16].try_into().unwrap()),
            nblocks: u32::from_le_bytes(bytes[16..20].try_into().unwrap()),
            flags: u32::from_le_bytes(bytes[20..24].try_into().unwrap()),
        };
        if header.type_size == 0 {
            return Err(CodecError::CorruptChunk("zero element size".into()));
        }
        if header.raw_len as usize % header.type_size as usize != 0 {
            return Err(CodecError::CorruptChunk(format!(
                "uncompressed length {} is not a multiple of the element size {}",
                header.raw_len, header.type_size
            )));
        }
        Ok(header)
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

// ── Block index entry ───────────────────────────────────────────────────────

/// One entry in the block index, describing a single compressed block.
#[derive(Debug, Clone, Default)]
pub(crate) struct BlockEntry {
    /// Length of the compressed block payload in bytes.
    pub compressed_len: u32,
    /// Length of the original uncompressed block in bytes.
    pub raw_len: u32,
    /// xxhash3-64 of the compressed bytes.
    pub checksum: u64,
}

impl BlockEntry {
    /// Serialize to exactly `BLOCK_ENTRY_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; BLOCK_ENTRY_SIZE] {
        let mut buf = [0u8; BLOCK_ENTRY_SIZE];
        buf[0..4].copy_from_slice(&self.compressed_len.to_le_bytes());
        buf[4..8].copy_from_slice(&self.raw_len.to_le_bytes());
        buf[8..16].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Deserialize from `BLOCK_ENTRY_SIZE` bytes.
    pub fn from_bytes(buf: &[u8; BLOCK_ENTRY_SIZE]) -> Self {
        Self {
            compressed_len: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            raw_len: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            checksum: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
        }
    }
}

// ── Parsing ─────────────────────────────────────────────────────────────────

/// Split a chunk into its header, block index and payload, validating that
/// the index is internally consistent.
pub(crate) fn parse_chunk(
    chunk: &[u8],
) -> Result<(ChunkHeader, Vec<BlockEntry>, &[u8]), CodecError> {
    let header = ChunkHeader::from_bytes(chunk)?;
    let nblocks = header.nblocks as usize;
    let index_end = HEADER_SIZE + nblocks * BLOCK_ENTRY_SIZE;
    if chunk.len() < index_end {
        return Err(CodecError::CorruptChunk(format!(
            "block index of {} entries overruns the {} byte chunk",
            nblocks,
            chunk.len()
        )));
    }

    let mut entries = Vec::with_capacity(nblocks);
    for i in 0..nblocks {
        let start = HEADER_SIZE + i * BLOCK_ENTRY_SIZE;
        let buf: &[u8; BLOCK_ENTRY_SIZE] = chunk[start..start + BLOCK_ENTRY_SIZE]
            .try_into()
            .unwrap();
        entries.push(BlockEntry::from_bytes(buf));
    }

    let payload = &chunk[index_end..];
    let compressed_total: usize = entries.iter().map(|e| e.compressed_len as usize).sum();
    if compressed_total != payload.len() {
        return Err(CodecError::CorruptChunk(format!(
            "block index describes {} payload bytes but the chunk holds {}",
            compressed_total,
            payload.len()
        )));
    }
    let raw_total: usize = entries.iter().map(|e| e.raw_len as usize).sum();
    if raw_total != header.raw_len as usize {
        return Err(CodecError::CorruptChunk(format!(
            "block index describes {} raw bytes but the header says {}",
            raw_total, header.raw_len
        )));
    }

    Ok((header, entries, payload))
}

/// Peek the uncompressed byte length a chunk describes.
pub(crate) fn chunk_raw_len(chunk: &[u8]) -> Result<usize, CodecError> {
    Ok(ChunkHeader::from_bytes(chunk)?.raw_len as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = ChunkHeader {
            codec_id: 1,
            type_size: 2,
            block_size: 1024,
            raw_len: 4096,
            nblocks: 4,
            flags: FLAG_HAS_CHECKSUM,
        };
        let parsed = ChunkHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed.codec_id, 1);
        assert_eq!(parsed.type_size, 2);
        assert_eq!(parsed.block_size, 1024);
        assert_eq!(parsed.raw_len, 4096);
        assert_eq!(parsed.nblocks, 4);
        assert!(parsed.has_flag(FLAG_HAS_CHECKSUM));
    }

    #[test]
    fn entry_roundtrip() {
        let entry = BlockEntry {
            compressed_len: 77,
            raw_len: 1024,
            checksum: 0xDEAD_BEEF_CAFE_F00D,
        };
        let parsed = BlockEntry::from_bytes(&entry.to_bytes());
        assert_eq!(parsed.compressed_len, 77);
        assert_eq!(parsed.raw_len, 1024);
        assert_eq!(parsed.checksum, 0xDEAD_BEEF_CAFE_F00D);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = ChunkHeader {
            codec_id: 0,
            type_size: 1,
            block_size: 16,
            raw_len: 16,
            nblocks: 1,
            flags: 0,
        }
        .to_bytes();
        bytes[0] = b'X';
        assert!(ChunkHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn truncated_chunk_is_rejected() {
        assert!(ChunkHeader::from_bytes(&[0u8; 8]).is_err());
    }
}
