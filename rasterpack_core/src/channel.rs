//! A single image channel: a super-chunk plus dimensions, codec
//! configuration and reusable codec contexts.

use std::mem::size_of;

use bytemuck::Zeroable;
use rasterpack_codecs::Codec;

use crate::context::{CompressCtx, DecompressCtx};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::iter::ChunkIter;
use crate::lazy::LazySChunk;
use crate::schunk::SChunk;
use crate::util;

/// Default block size: 32 KB, small enough to sit in L1 on most CPUs.
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

/// Default chunk size: 4 MB, enough to hold a 2048x2048 single-channel plane
/// of u8. Tune it towards the size of the images you expect to store.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Compression configuration shared by channels and images.
#[derive(Debug, Clone)]
pub struct CodecParams {
    pub codec: Codec,
    /// 0 disables compression, 9 compresses hardest. Clamped with a warning.
    pub level: u8,
    /// Intra-chunk parallel unit, in bytes. Must be smaller than the chunk
    /// size.
    pub block_size: usize,
    /// Working-set granularity, in bytes. Rounded up to a whole number of
    /// scanlines at construction.
    pub chunk_size: usize,
}

impl Default for CodecParams {
    fn default() -> Self {
        Self {
            codec: Codec::Lz4,
            level: 9,
            block_size: DEFAULT_BLOCK_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl CodecParams {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// The two super-chunk flavours a channel can own.
pub enum Storage<T: Element> {
    Eager(SChunk<T>),
    Lazy(LazySChunk<T>),
}

impl<T: Element> From<SChunk<T>> for Storage<T> {
    fn from(schunk: SChunk<T>) -> Self {
        Storage::Eager(schunk)
    }
}

impl<T: Element> From<LazySChunk<T>> for Storage<T> {
    fn from(schunk: LazySChunk<T>) -> Self {
        Storage::Lazy(schunk)
    }
}

impl<T: Element> Storage<T> {
    pub fn num_chunks(&self) -> usize {
        match self {
            Storage::Eager(s) => s.num_chunks(),
            Storage::Lazy(s) => s.num_chunks(),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Storage::Eager(s) => s.size(),
            Storage::Lazy(s) => s.size(),
        }
    }

    pub fn csize(&self) -> usize {
        match self {
            Storage::Eager(s) => s.csize(),
            Storage::Lazy(s) => s.csize(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        match self {
            Storage::Eager(s) => s.chunk_size(),
            Storage::Lazy(s) => s.chunk_size(),
        }
    }

    pub fn block_size(&self) -> usize {
        match self {
            Storage::Eager(s) => s.block_size(),
            Storage::Lazy(s) => s.block_size(),
        }
    }

    pub fn chunk_elems(&self, index: usize) -> Result<usize> {
        match self {
            Storage::Eager(s) => s.chunk_elems(index),
            Storage::Lazy(s) => s.chunk_elems(index),
        }
    }

    pub fn read_into(&self, index: usize, out: &mut [T], ctx: &DecompressCtx) -> Result<()> {
        match self {
            Storage::Eager(s) => s.read_into(index, out, ctx),
            Storage::Lazy(s) => s.read_into(index, out, ctx),
        }
    }

    pub fn update(&mut self, index: usize, data: &[T], ctx: &CompressCtx) -> Result<()> {
        match self {
            Storage::Eager(s) => s.update(index, data, ctx),
            Storage::Lazy(s) => s.update(index, data, ctx),
        }
    }

    pub fn update_precompressed(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        match self {
            Storage::Eager(s) => s.update_precompressed(index, bytes),
            Storage::Lazy(s) => s.update_precompressed(index, bytes),
        }
    }

    pub fn to_uncompressed(&self, ctx: &DecompressCtx) -> Result<Vec<T>> {
        match self {
            Storage::Eager(s) => s.to_uncompressed(ctx),
            Storage::Lazy(s) => s.to_uncompressed(ctx),
        }
    }
}

/// One compressed channel of an image.
///
/// Serial access through [`iter`](Self::iter) is cheap; random chunk access
/// is possible but pays a full chunk decompress per call. The channel owns
/// its codec contexts so that repeated operations reuse them.
///
/// ```no_run
/// # use rasterpack_core::{Channel, CodecParams};
/// # fn main() -> rasterpack_core::Result<()> {
/// let data: Vec<u16> = vec![0; 1920 * 1080];
/// let mut channel = Channel::from_data(&data, 1920, 1080, &CodecParams::default())?;
/// let mut iter = channel.iter();
/// while let Some(mut chunk) = iter.next_chunk()? {
///     for i in 0..chunk.len() {
///         let (x, y) = (chunk.x(i), chunk.y(i));
///         chunk[i] = ((x + y) % 65536) as u16;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Channel<T: Element> {
    storage: Storage<T>,
    width: usize,
    height: usize,
    codec: Codec,
    level: u8,
    cctx: CompressCtx,
    dctx: DecompressCtx,
}

impl<T: Element> Channel<T> {
    /// Compress `data` into a fresh channel.
    ///
    /// The chunk size is rounded up to a whole number of scanlines, so every
    /// chunk starts at the beginning of an image row.
    pub fn from_data(data: &[T], width: usize, height: usize, params: &CodecParams) -> Result<Self> {
        util::validate_dimensions(width, height)?;
        if data.len() != width * height {
            return Err(Error::SizeMismatch {
                what: "channel data",
                expected: width * height,
                got: data.len(),
            });
        }
        util::validate_chunk_geometry::<T>(params.block_size, params.chunk_size)?;
        let chunk_size = util::align_chunk_to_scanlines::<T>(width, params.chunk_size)?;
        let level = util::clamp_compression_level(params.level);

        let threads = util::default_threads();
        let cctx = CompressCtx::new(params.codec, level, threads, params.block_size, size_of::<T>())?;
        let dctx = DecompressCtx::new(threads);
        let schunk = SChunk::from_slice(data, params.block_size, chunk_size, &cctx)?;
        Ok(Self {
            storage: schunk.into(),
            width,
            height,
            codec: params.codec,
            level,
            cctx,
            dctx,
        })
    }

    /// Wrap an already built super-chunk.
    ///
    /// The super-chunk must hold exactly `width * height` elements.
    pub fn from_storage(
        storage: impl Into<Storage<T>>,
        width: usize,
        height: usize,
        codec: Codec,
        level: u8,
    ) -> Result<Self> {
        util::validate_dimensions(width, height)?;
        let storage = storage.into();
        if storage.size() != width * height {
            return Err(Error::SizeMismatch {
                what: "super-chunk elements",
                expected: width * height,
                got: storage.size(),
            });
        }
        let level = util::clamp_compression_level(level);
        let threads = util::default_threads();
        let cctx = CompressCtx::new(codec, level, threads, storage.block_size(), size_of::<T>())?;
        let dctx = DecompressCtx::new(threads);
        Ok(Self {
            storage,
            width,
            height,
            codec,
            level,
            cctx,
            dctx,
        })
    }

    /// Create a channel filled with `value`, backed by a lazy super-chunk.
    ///
    /// Costs O(num_chunks) with no compression work; memory stays tiny until
    /// chunks are actually written. The preferred way to build a mostly
    /// empty channel that only some regions will be written into.
    pub fn full(width: usize, height: usize, value: T, params: &CodecParams) -> Result<Self> {
        util::validate_dimensions(width, height)?;
        util::validate_chunk_geometry::<T>(params.block_size, params.chunk_size)?;
        let chunk_size = util::align_chunk_to_scanlines::<T>(width, params.chunk_size)?;
        let schunk = LazySChunk::new_filled(value, width * height, params.block_size, chunk_size)?;
        Self::from_storage(schunk, width, height, params.codec, params.level)
    }

    /// Create a zero-filled channel, backed by a lazy super-chunk.
    pub fn zeros(width: usize, height: usize, params: &CodecParams) -> Result<Self> {
        Self::full(width, height, T::zeroed(), params)
    }

    /// Create a channel filled with `value`, copying shape and compression
    /// settings from `other`.
    pub fn full_like(other: &Channel<T>, value: T) -> Result<Self> {
        Self::full(other.width, other.height, value, &other.params())
    }

    /// Create a zero-filled channel shaped and configured like `other`.
    pub fn zeros_like(other: &Channel<T>) -> Result<Self> {
        Self::full_like(other, T::zeroed())
    }

    /// The channel's compression configuration.
    pub fn params(&self) -> CodecParams {
        CodecParams {
            codec: self.codec,
            level: self.level,
            block_size: self.storage.block_size(),
            chunk_size: self.storage.chunk_size(),
        }
    }

    /// Single-pass cursor over the channel's chunks.
    pub fn iter(&mut self) -> ChunkIter<'_, T> {
        let Channel {
            storage,
            cctx,
            dctx,
            width,
            ..
        } = self;
        ChunkIter::new(storage, cctx, dctx, *width)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn compression(&self) -> Codec {
        self.codec
    }

    pub fn compression_level(&self) -> u8 {
        self.level
    }

    /// Block size in bytes.
    pub fn block_size(&self) -> usize {
        self.storage.block_size()
    }

    /// Chunk size in bytes, after scanline alignment.
    pub fn chunk_size(&self) -> usize {
        self.storage.chunk_size()
    }

    pub fn num_chunks(&self) -> usize {
        self.storage.num_chunks()
    }

    /// Uncompressed element count of chunk `index`.
    pub fn chunk_elems(&self, index: usize) -> Result<usize> {
        self.storage.chunk_elems(index)
    }

    /// Total compressed size in bytes.
    pub fn compressed_bytes(&self) -> usize {
        self.storage.csize()
    }

    /// Total uncompressed size in elements.
    pub fn uncompressed_size(&self) -> usize {
        self.storage.size()
    }

    /// Decompress the whole channel into one contiguous vector.
    pub fn get_decompressed(&self) -> Result<Vec<T>> {
        self.storage.to_uncompressed(&self.dctx)
    }

    /// Decompress chunk `index` into a fresh vector.
    pub fn get_chunk(&self, index: usize) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); self.storage.chunk_elems(index)?];
        self.storage.read_into(index, &mut out, &self.dctx)?;
        Ok(out)
    }

    /// Compress `data` and replace chunk `index` with it.
    pub fn set_chunk(&mut self, index: usize, data: &[T]) -> Result<()> {
        self.storage.update(index, data, &self.cctx)
    }

    /// Replace chunk `index` with already compressed bytes.
    pub fn set_chunk_compressed(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        self.storage.update_precompressed(index, bytes)
    }

    /// Recreate the codec contexts with a new worker count and block size.
    ///
    /// Must not be called while an iterator on this channel is live (the
    /// borrow checker enforces this).
    pub fn update_threads(&mut self, threads: usize, block_size: usize) -> Result<()> {
        if block_size >= self.storage.chunk_size() {
            return Err(Error::InvalidArgument(format!(
                "block size {} must be smaller than the chunk size {}",
                block_size,
                self.storage.chunk_size()
            )));
        }
        self.cctx = CompressCtx::new(self.codec, self.level, threads, block_size, size_of::<T>())?;
        self.dctx = DecompressCtx::new(threads);
        Ok(())
    }

    /// Apply `f` to every element of the channel, re-compressing the chunks
    /// it dirties.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut T)) -> Result<()> {
        let mut iter = self.iter();
        while let Some(mut chunk) = iter.next_chunk()? {
            for value in chunk.iter_mut() {
                f(value);
            }
        }
        Ok(())
    }
}
