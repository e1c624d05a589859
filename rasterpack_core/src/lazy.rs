//! The lazy super-chunk: slots are either a compressed chunk or a single
//! repeated fill value materialised on demand.
//!
//! A channel created with `full`/`zeros` costs O(num_chunks) with no
//! compression work; a slot only turns into real compressed bytes when it is
//! written to.

use std::mem::size_of;

use bytemuck::Zeroable;
use rasterpack_codecs::CodecError;

use crate::context::{CompressCtx, DecompressCtx};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::format;
use crate::schunk::SChunk;
use crate::util;

/// One slot: real compressed bytes, or a fill value standing in for
/// `elems` copies of itself.
#[derive(Debug, Clone)]
enum LazySlot<T> {
    Compressed { bytes: Vec<u8>, elems: usize },
    Fill { value: T, elems: usize },
}

impl<T: Element> LazySlot<T> {
    fn elems(&self) -> usize {
        match self {
            LazySlot::Compressed { elems, .. } | LazySlot::Fill { elems, .. } => *elems,
        }
    }
}

/// Super-chunk variant whose slots may be unmaterialised fill values.
///
/// Shares the eager [`SChunk`] contract; writes convert the touched slot to a
/// compressed one unconditionally.
pub struct LazySChunk<T: Element> {
    slots: Vec<LazySlot<T>>,
    chunk_size: usize,
    block_size: usize,
}

impl<T: Element> LazySChunk<T> {
    /// Create a super-chunk of `total_elems` copies of `value`.
    pub fn new_filled(
        value: T,
        total_elems: usize,
        block_size: usize,
        chunk_size: usize,
    ) -> Result<Self> {
        util::validate_chunk_geometry::<T>(block_size, chunk_size)?;
        let elems_per_chunk = chunk_size / size_of::<T>();
        let num_full = total_elems / elems_per_chunk;
        let remainder = total_elems % elems_per_chunk;

        let mut slots = Vec::with_capacity(num_full + usize::from(remainder > 0));
        for _ in 0..num_full {
            slots.push(LazySlot::Fill {
                value,
                elems: elems_per_chunk,
            });
        }
        if remainder > 0 {
            slots.push(LazySlot::Fill {
                value,
                elems: remainder,
            });
        }
        Ok(Self {
            slots,
            chunk_size,
            block_size,
        })
    }

    pub fn elems_per_chunk(&self) -> usize {
        self.chunk_size / size_of::<T>()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn num_chunks(&self) -> usize {
        self.slots.len()
    }

    /// Total uncompressed size in elements.
    pub fn size(&self) -> usize {
        self.slots.iter().map(|s| s.elems()).sum()
    }

    /// Total compressed size in bytes. An unmaterialised slot counts as the
    /// size of a single element.
    pub fn csize(&self) -> usize {
        self.slots
            .iter()
            .map(|s| match s {
                LazySlot::Compressed { bytes, .. } => bytes.len(),
                LazySlot::Fill { .. } => size_of::<T>(),
            })
            .sum()
    }

    pub fn chunk_elems(&self, index: usize) -> Result<usize> {
        self.validate_index(index)?;
        Ok(self.slots[index].elems())
    }

    /// Whether any slot is still an unmaterialised fill value.
    pub fn has_fill_slots(&self) -> bool {
        self.slots
            .iter()
            .any(|s| matches!(s, LazySlot::Fill { .. }))
    }

    /// Decompress or materialise chunk `index` into `out`.
    pub fn read_into(&self, index: usize, out: &mut [T], ctx: &DecompressCtx) -> Result<()> {
        self.validate_index(index)?;
        let slot = &self.slots[index];
        if out.len() != slot.elems() {
            return Err(Error::SizeMismatch {
                what: "chunk read buffer",
                expected: slot.elems(),
                got: out.len(),
            });
        }
        match slot {
            LazySlot::Compressed { bytes, elems } => {
                let written = ctx.decompress_chunk(bytes, bytemuck::cast_slice_mut(out))?;
                if written != elems * size_of::<T>() {
                    return Err(Error::Codec(CodecError::LengthMismatch {
                        expected: elems * size_of::<T>(),
                        got: written,
                    }));
                }
            }
            LazySlot::Fill { value, .. } => out.fill(*value),
        }
        Ok(())
    }

    /// Decompress or materialise chunk `index` into a fresh vector.
    pub fn chunk(&self, index: usize, ctx: &DecompressCtx) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); self.chunk_elems(index)?];
        self.read_into(index, &mut out, ctx)?;
        Ok(out)
    }

    /// Produce the full uncompressed vector, bulk-filling once and
    /// decompressing only the materialised slots.
    pub fn to_uncompressed(&self, ctx: &DecompressCtx) -> Result<Vec<T>> {
        let init = self.fill_value().unwrap_or_else(T::zeroed);
        let mut out = vec![init; self.size()];
        let mut offset = 0;
        for slot in &self.slots {
            let elems = slot.elems();
            match slot {
                LazySlot::Compressed { bytes, .. } => {
                    let dst = &mut out[offset..offset + elems];
                    let written = ctx.decompress_chunk(bytes, bytemuck::cast_slice_mut(dst))?;
                    if written != elems * size_of::<T>() {
                        return Err(Error::Codec(CodecError::LengthMismatch {
                            expected: elems * size_of::<T>(),
                            got: written,
                        }));
                    }
                }
                LazySlot::Fill { value, .. } => {
                    if *value != init {
                        out[offset..offset + elems].fill(*value);
                    }
                }
            }
            offset += elems;
        }
        Ok(out)
    }

    /// Compress `data` and append it as a new, materialised slot.
    pub fn append(&mut self, data: &[T], ctx: &CompressCtx) -> Result<()> {
        if data.is_empty() || data.len() > self.elems_per_chunk() {
            return Err(Error::InvalidArgument(format!(
                "appended chunk of {} elements must hold between 1 and {} elements",
                data.len(),
                self.elems_per_chunk()
            )));
        }
        let mut bytes = Vec::new();
        ctx.compress_chunk(bytemuck::cast_slice(data), &mut bytes)?;
        self.slots.push(LazySlot::Compressed {
            bytes,
            elems: data.len(),
        });
        Ok(())
    }

    /// Append an already compressed chunk, recovering its element count from
    /// the chunk header.
    pub fn append_precompressed(&mut self, bytes: Vec<u8>) -> Result<()> {
        let raw_len = format::chunk_raw_len(&bytes)?;
        if raw_len == 0 || raw_len % size_of::<T>() != 0 || raw_len > self.chunk_size {
            return Err(Error::Codec(CodecError::CorruptChunk(format!(
                "chunk describes {} raw bytes, expected a positive multiple of {} of at most {}",
                raw_len,
                size_of::<T>(),
                self.chunk_size
            ))));
        }
        let elems = raw_len / size_of::<T>();
        self.slots.push(LazySlot::Compressed { bytes, elems });
        Ok(())
    }

    /// Compress `data` and replace slot `index` with it, materialising the
    /// slot.
    pub fn update(&mut self, index: usize, data: &[T], ctx: &CompressCtx) -> Result<()> {
        self.validate_index(index)?;
        if data.len() != self.slots[index].elems() {
            return Err(Error::SizeMismatch {
                what: "chunk elements",
                expected: self.slots[index].elems(),
                got: data.len(),
            });
        }
        let mut bytes = Vec::new();
        ctx.compress_chunk(bytemuck::cast_slice(data), &mut bytes)?;
        self.slots[index] = LazySlot::Compressed {
            bytes,
            elems: data.len(),
        };
        Ok(())
    }

    /// Replace slot `index` with already compressed bytes (copied),
    /// materialising the slot.
    pub fn update_precompressed(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        self.validate_index(index)?;
        let raw_len = format::chunk_raw_len(bytes)?;
        if raw_len % size_of::<T>() != 0 {
            return Err(Error::Codec(CodecError::CorruptChunk(format!(
                "chunk describes {} raw bytes, not a multiple of the element size {}",
                raw_len,
                size_of::<T>()
            ))));
        }
        let elems = raw_len / size_of::<T>();
        if elems != self.slots[index].elems() {
            return Err(Error::SizeMismatch {
                what: "chunk elements",
                expected: self.slots[index].elems(),
                got: elems,
            });
        }
        self.slots[index] = LazySlot::Compressed {
            bytes: bytes.to_vec(),
            elems,
        };
        Ok(())
    }

    /// Convert into an eager super-chunk.
    ///
    /// The fill buffer for full-size slots is compressed once and the
    /// resulting bytes reused for every such slot; only a short final fill
    /// slot is compressed separately.
    pub fn to_schunk(&self, ctx: &CompressCtx) -> Result<SChunk<T>> {
        let mut out = SChunk::new(self.block_size, self.chunk_size)?;
        let elems_per_chunk = self.elems_per_chunk();
        let mut shared_fill: Option<Vec<u8>> = None;
        for slot in &self.slots {
            match slot {
                LazySlot::Compressed { bytes, .. } => out.append_precompressed(bytes.clone())?,
                LazySlot::Fill { value, elems } if *elems == elems_per_chunk => {
                    let bytes = match shared_fill.as_ref() {
                        Some(bytes) => bytes.clone(),
                        None => {
                            let buf = vec![*value; elems_per_chunk];
                            let mut bytes = Vec::new();
                            ctx.compress_chunk(bytemuck::cast_slice(&buf), &mut bytes)?;
                            shared_fill = Some(bytes.clone());
                            bytes
                        }
                    };
                    out.append_precompressed(bytes)?;
                }
                LazySlot::Fill { value, elems } => {
                    let buf = vec![*value; *elems];
                    out.append(&buf, ctx)?;
                }
            }
        }
        Ok(out)
    }

    fn validate_index(&self, index: usize) -> Result<()> {
        if index >= self.slots.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.slots.len(),
                what: "chunks",
            });
        }
        Ok(())
    }

    /// The value of the first unmaterialised slot. Fill slots are only ever
    /// created with a single shared value.
    fn fill_value(&self) -> Option<T> {
        self.slots.iter().find_map(|s| match s {
            LazySlot::Fill { value, .. } => Some(*value),
            LazySlot::Compressed { .. } => None,
        })
    }
}
