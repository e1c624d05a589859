//! The eager super-chunk: an ordered sequence of independently compressed
//! chunks making up one channel.

use std::marker::PhantomData;
use std::mem::size_of;

use bytemuck::Zeroable;
use rasterpack_codecs::CodecError;

use crate::context::{CompressCtx, DecompressCtx};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::format;
use crate::util;

/// One compressed chunk plus its uncompressed element count.
#[derive(Debug, Clone)]
pub(crate) struct CompressedChunk {
    pub bytes: Vec<u8>,
    pub elems: usize,
}

/// Ordered sequence of compressed chunks.
///
/// Every chunk except possibly the last holds exactly
/// `chunk_size / size_of::<T>()` elements; the last holds at least one. The
/// container does no compression of its own, callers pass the context to use
/// so that contexts can be reused across many operations.
pub struct SChunk<T: Element> {
    chunks: Vec<CompressedChunk>,
    /// Maximum chunk size in bytes; dictates the size of every chunk but the
    /// last.
    chunk_size: usize,
    block_size: usize,
    _elem: PhantomData<T>,
}

impl<T: Element> SChunk<T> {
    /// Create an empty super-chunk with the given geometry.
    pub fn new(block_size: usize, chunk_size: usize) -> Result<Self> {
        util::validate_chunk_geometry::<T>(block_size, chunk_size)?;
        Ok(Self {
            chunks: Vec::new(),
            chunk_size,
            block_size,
            _elem: PhantomData,
        })
    }

    /// Compress `data` into a fresh super-chunk, splitting it into
    /// `chunk_size`-byte chunks.
    pub fn from_slice(
        data: &[T],
        block_size: usize,
        chunk_size: usize,
        ctx: &CompressCtx,
    ) -> Result<Self> {
        let mut schunk = Self::new(block_size, chunk_size)?;
        for chunk in data.chunks(schunk.elems_per_chunk()) {
            schunk.append(chunk, ctx)?;
        }
        Ok(schunk)
    }

    /// Elements held by every chunk except possibly the last.
    pub fn elems_per_chunk(&self) -> usize {
        self.chunk_size / size_of::<T>()
    }

    /// Maximum chunk size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Nominal block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of chunks.
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Total uncompressed size in elements.
    pub fn size(&self) -> usize {
        self.chunks.iter().map(|c| c.elems).sum()
    }

    /// Total compressed size in bytes.
    pub fn csize(&self) -> usize {
        self.chunks.iter().map(|c| c.bytes.len()).sum()
    }

    /// Uncompressed element count of chunk `index`.
    pub fn chunk_elems(&self, index: usize) -> Result<usize> {
        self.validate_index(index)?;
        Ok(self.chunks[index].elems)
    }

    /// The compressed bytes of chunk `index`.
    pub fn compressed_chunk(&self, index: usize) -> Result<&[u8]> {
        self.validate_index(index)?;
        Ok(&self.chunks[index].bytes)
    }

    /// Compress `data` and append it as a new chunk.
    ///
    /// `data` must hold between one element and a full chunk; the caller only
    /// ever appends a short chunk as the final one.
    pub fn append(&mut self, data: &[T], ctx: &CompressCtx) -> Result<()> {
        self.validate_append_len(data.len())?;
        let mut bytes = Vec::new();
        ctx.compress_chunk(bytemuck::cast_slice(data), &mut bytes)?;
        self.chunks.push(CompressedChunk {
            bytes,
            elems: data.len(),
        });
        Ok(())
    }

    /// Append an already compressed chunk, recovering its element count from
    /// the chunk header.
    pub fn append_precompressed(&mut self, bytes: Vec<u8>) -> Result<()> {
        let elems = self.precompressed_elems(&bytes)?;
        self.validate_append_len(elems)?;
        self.chunks.push(CompressedChunk { bytes, elems });
        Ok(())
    }

    /// Compress `data` and replace chunk `index` with it.
    ///
    /// The replacement must describe exactly as many elements as the chunk it
    /// replaces.
    pub fn update(&mut self, index: usize, data: &[T], ctx: &CompressCtx) -> Result<()> {
        self.validate_index(index)?;
        if data.len() != self.chunks[index].elems {
            return Err(Error::SizeMismatch {
                what: "chunk elements",
                expected: self.chunks[index].elems,
                got: data.len(),
            });
        }
        let mut bytes = Vec::new();
        ctx.compress_chunk(bytemuck::cast_slice(data), &mut bytes)?;
        self.chunks[index].bytes = bytes;
        Ok(())
    }

    /// Replace chunk `index` with already compressed bytes (copied).
    pub fn update_precompressed(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        self.validate_index(index)?;
        let elems = self.precompressed_elems(bytes)?;
        if elems != self.chunks[index].elems {
            return Err(Error::SizeMismatch {
                what: "chunk elements",
                expected: self.chunks[index].elems,
                got: elems,
            });
        }
        self.chunks[index].bytes = bytes.to_vec();
        Ok(())
    }

    /// Decompress chunk `index` into `out`, which must hold exactly the
    /// chunk's element count.
    pub fn read_into(&self, index: usize, out: &mut [T], ctx: &DecompressCtx) -> Result<()> {
        self.validate_index(index)?;
        let chunk = &self.chunks[index];
        if out.len() != chunk.elems {
            return Err(Error::SizeMismatch {
                what: "chunk read buffer",
                expected: chunk.elems,
                got: out.len(),
            });
        }
        let written = ctx.decompress_chunk(&chunk.bytes, bytemuck::cast_slice_mut(out))?;
        if written != chunk.elems * size_of::<T>() {
            return Err(Error::Codec(CodecError::LengthMismatch {
                expected: chunk.elems * size_of::<T>(),
                got: written,
            }));
        }
        Ok(())
    }

    /// Decompress chunk `index` into a fresh vector.
    pub fn chunk(&self, index: usize, ctx: &DecompressCtx) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); self.chunk_elems(index)?];
        self.read_into(index, &mut out, ctx)?;
        Ok(out)
    }

    /// Decompress every chunk, in order, into one contiguous vector.
    pub fn to_uncompressed(&self, ctx: &DecompressCtx) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); self.size()];
        let mut offset = 0;
        for index in 0..self.chunks.len() {
            let elems = self.chunks[index].elems;
            self.read_into(index, &mut out[offset..offset + elems], ctx)?;
            offset += elems;
        }
        Ok(out)
    }

    fn validate_index(&self, index: usize) -> Result<()> {
        if index >= self.chunks.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.chunks.len(),
                what: "chunks",
            });
        }
        Ok(())
    }

    fn validate_append_len(&self, elems: usize) -> Result<()> {
        if elems == 0 || elems > self.elems_per_chunk() {
            return Err(Error::InvalidArgument(format!(
                "appended chunk of {} elements must hold between 1 and {} elements",
                elems,
                self.elems_per_chunk()
            )));
        }
        Ok(())
    }

    /// Recover and validate the element count a precompressed chunk
    /// describes.
    fn precompressed_elems(&self, bytes: &[u8]) -> Result<usize> {
        let raw_len = format::chunk_raw_len(bytes)?;
        if raw_len == 0 || raw_len % size_of::<T>() != 0 {
            return Err(Error::Codec(CodecError::CorruptChunk(format!(
                "chunk describes {} raw bytes, not a positive multiple of the element size {}",
                raw_len,
                size_of::<T>()
            ))));
        }
        if raw_len > self.chunk_size {
            return Err(Error::Codec(CodecError::CorruptChunk(format!(
                "chunk describes {} raw bytes but this super-chunk caps chunks at {}",
                raw_len, self.chunk_size
            ))));
        }
        Ok(raw_len / size_of::<T>())
    }
}
