//! Reusable compression and decompression contexts.
//!
//! A context pairs a block-codec backend with its parameters (level, block
//! size, element size) and an optional worker pool. The pool parallelises
//! work *inside one chunk*: the chunk is split into blocks and the blocks are
//! compressed or decompressed concurrently. Contexts are owned by a
//! [`Channel`](crate::Channel) and borrowed by its iterators.

use std::sync::Arc;

use rasterpack_codecs::{backend_by_id, backend_for, BlockCodec, Codec, CodecError};
use rayon::prelude::*;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{Error, Result};
use crate::format::{self, BlockEntry, ChunkHeader, FLAG_HAS_CHECKSUM, MAX_CHUNK_BYTES};
use crate::util;

fn build_pool(threads: usize) -> Option<rayon::ThreadPool> {
    if threads <= 1 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => Some(pool),
        Err(err) => {
            tracing::warn!(%err, threads, "failed to build codec worker pool, running single-threaded");
            None
        }
    }
}

/// Compression context: backend, parameters and worker pool.
pub struct CompressCtx {
    backend: Arc<dyn BlockCodec>,
    codec: Codec,
    level: u8,
    block_size: usize,
    type_size: usize,
    threads: usize,
    pool: Option<rayon::ThreadPool>,
}

impl CompressCtx {
    /// Create a context for `codec` at `level` (clamped to 0..=9 with a
    /// warning) with a worker pool of `threads`.
    pub fn new(
        codec: Codec,
        level: u8,
        threads: usize,
        block_size: usize,
        type_size: usize,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidArgument("block size must be positive".into()));
        }
        if type_size == 0 {
            return Err(Error::InvalidArgument("element size must be positive".into()));
        }
        let level = util::clamp_compression_level(level);
        Ok(Self {
            backend: backend_for(codec, level),
            codec,
            level,
            block_size,
            type_size,
            threads,
            pool: build_pool(threads),
        })
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// The scratch size that guarantees compressing a chunk of up to
    /// `chunk_size` raw bytes never reallocates.
    pub fn min_compressed_size(&self, chunk_size: usize) -> usize {
        format::max_envelope_size(chunk_size, self.block_size)
    }

    /// Compress `raw` into a self-describing chunk, replacing the contents of
    /// `out`.
    ///
    /// `raw` must be non-empty, a multiple of the context's element size and
    /// within the chunk byte limit.
    pub fn compress_chunk(&self, raw: &[u8], out: &mut Vec<u8>) -> Result<()> {
        if raw.is_empty() || raw.len() % self.type_size != 0 {
            return Err(Error::InvalidArgument(format!(
                "cannot compress {} bytes: expected a positive multiple of the element size {}",
                raw.len(),
                self.type_size
            )));
        }
        if raw.len() > MAX_CHUNK_BYTES {
            return Err(Error::InvalidArgument(format!(
                "cannot compress {} bytes: chunks are limited to {} bytes",
                raw.len(),
                MAX_CHUNK_BYTES
            )));
        }

        let blocks: Vec<&[u8]> = raw.chunks(self.block_size).collect();
        let backend = &self.backend;
        let compressed: Vec<Vec<u8>> = match &self.pool {
            Some(pool) if blocks.len() > 1 => pool.install(|| {
                blocks
                    .par_iter()
                    .map(|block| backend.compress_block(block))
                    .collect::<Result<_, CodecError>>()
            })?,
            _ => blocks
                .iter()
                .map(|block| backend.compress_block(block))
                .collect::<Result<_, CodecError>>()?,
        };

        out.clear();
        out.reserve(self.min_compressed_size(raw.len()));
        let header = ChunkHeader {
            codec_id: self.backend.id(),
            type_size: self.type_size as u16,
            block_size: self.block_size as u32,
            raw_len: raw.len() as u32,
            nblocks: blocks.len() as u32,
            flags: FLAG_HAS_CHECKSUM,
        };
        out.extend_from_slice(&header.to_bytes());
        for (block, payload) in blocks.iter().zip(&compressed) {
            let entry = BlockEntry {
                compressed_len: payload.len() as u32,
                raw_len: block.len() as u32,
                checksum: xxh3_64(payload),
            };
            out.extend_from_slice(&entry.to_bytes());
        }
        for payload in &compressed {
            out.extend_from_slice(payload);
        }
        Ok(())
    }
}

/// Decompression context: worker pool only; the backend is resolved from
/// each chunk's header.
pub struct DecompressCtx {
    threads: usize,
    pool: Option<rayon::ThreadPool>,
}

impl DecompressCtx {
    pub fn new(threads: usize) -> Self {
        Self {
            threads,
            pool: build_pool(threads),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// The scratch size that guarantees decompressing a chunk of up to
    /// `chunk_size` raw bytes fits.
    pub fn min_decompressed_size(&self, chunk_size: usize) -> usize {
        chunk_size
    }

    /// Decompress a self-describing chunk into the front of `out`, returning
    /// the number of raw bytes written.
    pub fn decompress_chunk(&self, chunk: &[u8], out: &mut [u8]) -> Result<usize> {
        let (header, entries, payload) = format::parse_chunk(chunk)?;
        let raw_len = header.raw_len as usize;
        if out.len() < raw_len {
            return Err(Error::SizeMismatch {
                what: "decompression buffer",
                expected: raw_len,
                got: out.len(),
            });
        }
        if raw_len == 0 {
            return Err(Error::Codec(CodecError::CorruptChunk(
                "chunk describes zero uncompressed bytes".into(),
            )));
        }
        let backend = backend_by_id(header.codec_id)?;
        let verify_checksums = header.has_flag(FLAG_HAS_CHECKSUM);

        // Pair every block's compressed bytes with its destination region.
        let mut jobs: Vec<(usize, &BlockEntry, &[u8], &mut [u8])> = Vec::with_capacity(entries.len());
        let mut payload_rest = payload;
        let mut out_rest = &mut out[..raw_len];
        for (index, entry) in entries.iter().enumerate() {
            let (compressed, payload_tail) = payload_rest.split_at(entry.compressed_len as usize);
            let raw = entry.raw_len as usize;
            if raw > out_rest.len() {
                return Err(Error::Codec(CodecError::CorruptChunk(format!(
                    "block {index} overruns the uncompressed length"
                ))));
            }
            let (dst, out_tail) = std::mem::take(&mut out_rest).split_at_mut(raw);
            payload_rest = payload_tail;
            out_rest = out_tail;
            jobs.push((index, entry, compressed, dst));
        }

        let backend = backend.as_ref();
        let run = |(index, entry, compressed, dst): &mut (usize, &BlockEntry, &[u8], &mut [u8])|
         -> Result<(), CodecError> {
            if verify_checksums {
                let got = xxh3_64(compressed);
                if got != entry.checksum {
                    return Err(CodecError::ChecksumMismatch {
                        index: *index,
                        expected: entry.checksum,
                        got,
                    });
                }
            }
            let raw = backend.decompress_block(compressed, entry.raw_len as usize)?;
            if raw.len() != entry.raw_len as usize {
                return Err(CodecError::LengthMismatch {
                    expected: entry.raw_len as usize,
                    got: raw.len(),
                });
            }
            dst.copy_from_slice(&raw);
            Ok(())
        };

        match &self.pool {
            Some(pool) if jobs.len() > 1 => {
                pool.install(|| jobs.par_iter_mut().try_for_each(run))?
            }
            _ => jobs.iter_mut().try_for_each(run)?,
        }
        Ok(raw_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::HEADER_SIZE;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 253) as u8).collect()
    }

    #[test]
    fn chunk_roundtrip_single_thread() {
        let ctx = CompressCtx::new(Codec::Lz4, 9, 1, 1024, 1).unwrap();
        let dctx = DecompressCtx::new(1);
        let raw = pattern(4096 + 100);

        let mut chunk = Vec::new();
        ctx.compress_chunk(&raw, &mut chunk).unwrap();
        assert!(chunk.len() >= HEADER_SIZE);

        let mut out = vec![0u8; raw.len()];
        let n = dctx.decompress_chunk(&chunk, &mut out).unwrap();
        assert_eq!(n, raw.len());
        assert_eq!(out, raw);
    }

    #[test]
    fn chunk_roundtrip_parallel_blocks() {
        let ctx = CompressCtx::new(Codec::Zstd, 5, 4, 512, 2).unwrap();
        let dctx = DecompressCtx::new(4);
        let raw = pattern(16 * 512);

        let mut chunk = Vec::new();
        ctx.compress_chunk(&raw, &mut chunk).unwrap();

        let mut out = vec![0u8; raw.len()];
        dctx.decompress_chunk(&chunk, &mut out).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let ctx = CompressCtx::new(Codec::Lz4, 9, 1, 256, 1).unwrap();
        let dctx = DecompressCtx::new(1);
        let raw = pattern(1024);

        let mut chunk = Vec::new();
        ctx.compress_chunk(&raw, &mut chunk).unwrap();
        let last = chunk.len() - 1;
        chunk[last] ^= 0xFF;

        let mut out = vec![0u8; raw.len()];
        assert!(matches!(
            dctx.decompress_chunk(&chunk, &mut out),
            Err(Error::Codec(CodecError::ChecksumMismatch { .. }))
        ));
    }

    #[test]
    fn misaligned_input_is_rejected() {
        let ctx = CompressCtx::new(Codec::Lz4, 9, 1, 256, 4).unwrap();
        let mut chunk = Vec::new();
        assert!(matches!(
            ctx.compress_chunk(&[0u8; 6], &mut chunk),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn level_is_clamped() {
        let ctx = CompressCtx::new(Codec::Zstd, 42, 1, 256, 1).unwrap();
        assert_eq!(ctx.level(), 9);
    }
}
