//! The single-pass chunk cursor.
//!
//! Dereferencing the cursor decompresses the current chunk into iterator
//! owned scratch and lends out a [`ChunkView`]. If the previous view was
//! written to, stepping to the next chunk first re-compresses the scratch and
//! writes it back into the super-chunk. A dirty chunk that was never stepped
//! past is written back when the iterator is flushed, exhausted or dropped.
//!
//! ```text
//!              advance()                        advance()
//! Start ──► chunk i (clean) ─────────────────► chunk i+1 (clean)
//!               │  write through the view            ▲
//!               ▼                                    │
//!           chunk i (dirty) ── advance: compress i, write back ──┘
//! ```
//!
//! The usual way to drive the cursor is [`next_chunk`](ChunkIter::next_chunk)
//! in a `while let` loop; [`current`](ChunkIter::current) and
//! [`advance`](ChunkIter::advance) are the underlying steps.

use std::mem::size_of;

use bytemuck::Zeroable;

use crate::channel::Storage;
use crate::context::{CompressCtx, DecompressCtx};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::view::ChunkView;

/// Single-pass cursor over a channel's chunks.
///
/// Borrows the channel's storage and codec contexts for its lifetime; only
/// one iterator per channel can exist at a time. A compress or write-back
/// failure poisons the iterator: every later operation returns
/// [`Error::InvalidState`] and the super-chunk may hold stale bytes for the
/// last dirty chunk.
pub struct ChunkIter<'a, T: Element> {
    storage: &'a mut Storage<T>,
    cctx: &'a CompressCtx,
    dctx: &'a DecompressCtx,
    width: usize,
    elems_per_chunk: usize,

    index: usize,
    started: bool,
    dirty: bool,
    poisoned: bool,

    /// Scratch buffers, allocated on first dereference.
    comp_buf: Vec<u8>,
    decomp_buf: Vec<T>,
    /// Valid element count of `decomp_buf`; only the last chunk is shorter
    /// than a full chunk.
    fitted: usize,
    /// Which chunk `decomp_buf` currently holds.
    loaded: Option<usize>,
}

impl<'a, T: Element> ChunkIter<'a, T> {
    pub(crate) fn new(
        storage: &'a mut Storage<T>,
        cctx: &'a CompressCtx,
        dctx: &'a DecompressCtx,
        width: usize,
    ) -> Self {
        let elems_per_chunk = storage.chunk_size() / size_of::<T>();
        Self {
            storage,
            cctx,
            dctx,
            width,
            elems_per_chunk,
            index: 0,
            started: false,
            dirty: false,
            poisoned: false,
            comp_buf: Vec::new(),
            decomp_buf: Vec::new(),
            fitted: 0,
            loaded: None,
        }
    }

    /// The chunk index the cursor is currently at.
    pub fn chunk_index(&self) -> usize {
        self.index
    }

    pub fn num_chunks(&self) -> usize {
        self.storage.num_chunks()
    }

    /// Whether the cursor has moved past the last chunk.
    pub fn is_finished(&self) -> bool {
        self.started && self.index >= self.storage.num_chunks()
    }

    /// Step to the next chunk and lend out its view, or `None` once the
    /// channel is exhausted (at which point any pending dirty chunk has been
    /// written back).
    pub fn next_chunk(&mut self) -> Result<Option<ChunkView<'_, T>>> {
        self.ensure_usable()?;
        let num = self.storage.num_chunks();
        if self.started {
            if self.index >= num {
                return Ok(None);
            }
            self.index += 1;
        } else {
            self.started = true;
        }
        if self.index >= num {
            self.flush()?;
            return Ok(None);
        }
        self.load()?;
        Ok(Some(self.make_view()))
    }

    /// Lend out a view of the chunk at the current position, decompressing it
    /// (and writing back the previously dirtied chunk) if needed.
    pub fn current(&mut self) -> Result<ChunkView<'_, T>> {
        self.ensure_usable()?;
        if self.index >= self.storage.num_chunks() {
            return Err(Error::IndexOutOfRange {
                index: self.index,
                len: self.storage.num_chunks(),
                what: "chunks",
            });
        }
        self.started = true;
        self.load()?;
        Ok(self.make_view())
    }

    /// Move the cursor one chunk forward without touching any data. Refuses
    /// to move past the one-past-the-end position.
    pub fn advance(&mut self) -> Result<()> {
        self.ensure_usable()?;
        let num = self.storage.num_chunks();
        if self.index >= num {
            return Err(Error::IndexOutOfRange {
                index: self.index + 1,
                len: num,
                what: "chunks",
            });
        }
        self.index += 1;
        self.started = true;
        Ok(())
    }

    /// Write back the currently held chunk if it is dirty.
    ///
    /// Called implicitly on exhaustion and on drop; calling it explicitly
    /// lets the caller observe the failure instead of a drop-time log line.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_usable()?;
        if !self.dirty {
            return Ok(());
        }
        let index = match self.loaded {
            Some(index) => index,
            None => {
                self.dirty = false;
                return Ok(());
            }
        };
        match self.write_back(index) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                self.poisoned = true;
                Err(err)
            }
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.poisoned {
            return Err(Error::InvalidState(
                "iterator was poisoned by an earlier compress or write-back failure",
            ));
        }
        Ok(())
    }

    /// Bring the chunk at `self.index` into the decompression scratch,
    /// writing back the previous chunk first if it was dirtied.
    fn load(&mut self) -> Result<()> {
        if self.loaded == Some(self.index) {
            return Ok(());
        }
        match self.try_load() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.poisoned = true;
                Err(err)
            }
        }
    }

    fn try_load(&mut self) -> Result<()> {
        if self.comp_buf.capacity() == 0 {
            self.comp_buf
                .reserve(self.cctx.min_compressed_size(self.storage.chunk_size()));
        }
        if self.decomp_buf.len() < self.elems_per_chunk {
            self.decomp_buf.resize(self.elems_per_chunk, T::zeroed());
        }

        if self.dirty {
            if let Some(prev) = self.loaded {
                self.write_back(prev)?;
            }
            self.dirty = false;
        }

        let elems = self.storage.chunk_elems(self.index)?;
        self.storage
            .read_into(self.index, &mut self.decomp_buf[..elems], self.dctx)?;
        self.fitted = elems;
        self.loaded = Some(self.index);
        Ok(())
    }

    /// Compress the scratch buffer and replace chunk `chunk_index` with it.
    fn write_back(&mut self, chunk_index: usize) -> Result<()> {
        let mut buf = std::mem::take(&mut self.comp_buf);
        let compressed = self
            .cctx
            .compress_chunk(bytemuck::cast_slice(&self.decomp_buf[..self.fitted]), &mut buf);
        self.comp_buf = buf;
        compressed?;
        self.storage
            .update_precompressed(chunk_index, &self.comp_buf)
    }

    fn make_view(&mut self) -> ChunkView<'_, T> {
        let start = self.index * self.elems_per_chunk;
        let ChunkIter {
            decomp_buf,
            dirty,
            index,
            width,
            fitted,
            ..
        } = self;
        ChunkView::new(&mut decomp_buf[..*fitted], dirty, *index, start, *width)
    }
}

impl<T: Element> PartialEq for ChunkIter<'_, T> {
    /// Two iterators are equal when they refer to the same super-chunk and
    /// sit at the same chunk index.
    fn eq(&self, other: &Self) -> bool {
        let a: *const Storage<T> = &*self.storage;
        let b: *const Storage<T> = &*other.storage;
        std::ptr::eq(a, b) && self.index == other.index
    }
}

impl<T: Element> Drop for ChunkIter<'_, T> {
    fn drop(&mut self) {
        if self.poisoned || !self.dirty {
            return;
        }
        if let Err(err) = self.flush() {
            tracing::warn!(%err, chunk = ?self.loaded, "failed to write back dirty chunk on iterator drop");
        }
    }
}
