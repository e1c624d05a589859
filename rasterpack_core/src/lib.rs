//! In-memory compressed image engine.
//!
//! Raster imagery is stored per channel as a sequence of independently
//! compressed chunks (a "super-chunk"), each chunk a whole number of
//! scanlines. The working set stays resident yet compressed; callers only
//! pay uncompressed memory for the chunks they are actively touching.
//!
//! The central access pattern is the single-pass [`ChunkIter`]: it
//! decompresses one chunk at a time into iterator-owned scratch, lends out a
//! mutable [`ChunkView`], and transparently re-compresses the chunk back
//! into place when the view was written to.
//!
//! ```no_run
//! use rasterpack_core::{Channel, CodecParams, Codec};
//!
//! # fn main() -> rasterpack_core::Result<()> {
//! let data: Vec<u8> = vec![0; 512 * 512];
//! let params = CodecParams::new(Codec::Zstd).with_level(5);
//! let mut channel = Channel::from_data(&data, 512, 512, &params)?;
//!
//! let mut iter = channel.iter();
//! while let Some(mut chunk) = iter.next_chunk()? {
//!     for value in chunk.iter_mut() {
//!         *value = value.wrapping_add(1);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Images group channels with optional names and opaque metadata, and can be
//! bulk-loaded from any [`ScanlineSource`] with on-the-fly compression, one
//! chunk-sized band of scanlines at a time.

pub mod algo;
mod channel;
mod context;
mod element;
mod error;
mod format;
mod image;
mod iter;
mod lazy;
mod schunk;
mod source;
mod util;
mod view;
mod zip;

pub use channel::{Channel, CodecParams, Storage, DEFAULT_BLOCK_SIZE, DEFAULT_CHUNK_SIZE};
pub use context::{CompressCtx, DecompressCtx};
pub use element::{Element, TypeDesc};
pub use error::{Error, Result};
pub use format::MAX_CHUNK_BYTES;
pub use image::{ChannelSelector, Image, ImageStats, Metadata};
pub use iter::ChunkIter;
pub use lazy::LazySChunk;
pub use schunk::SChunk;
pub use source::ScanlineSource;
pub use view::ChunkView;
pub use zip::{zip2, zip3, Zip2, Zip3};

pub use rasterpack_codecs::{BlockCodec, Codec, CodecError};
