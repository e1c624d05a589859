//! Lock-step traversal of chunk iterators from distinct channels.
//!
//! Each step advances every underlying iterator by one chunk and yields a
//! tuple of views; traversal stops at the shortest channel. The channels must
//! be distinct objects (the borrow checker enforces this), so their per-chunk
//! compress/decompress work is fully independent.
//!
//! Rust has no variadic generics, so the useful arities are spelled out:
//! [`zip2`] and [`zip3`].

use crate::element::Element;
use crate::error::Result;
use crate::iter::ChunkIter;
use crate::view::ChunkView;

/// Lock-step cursor over two channels.
pub struct Zip2<'a, 'b, A: Element, B: Element> {
    a: ChunkIter<'a, A>,
    b: ChunkIter<'b, B>,
}

/// Zip two chunk iterators.
///
/// ```no_run
/// # use rasterpack_core::{Channel, CodecParams, zip2};
/// # fn main() -> rasterpack_core::Result<()> {
/// # let mut r = Channel::<f32>::zeros(64, 16, &CodecParams::default())?;
/// # let mut g = Channel::<f32>::zeros(64, 16, &CodecParams::default())?;
/// let mut zip = zip2(r.iter(), g.iter());
/// while let Some((mut rc, mut gc)) = zip.next_chunks()? {
///     for (rv, gv) in rc.iter_mut().zip(gc.iter_mut()) {
///         *gv = *rv;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn zip2<'a, 'b, A: Element, B: Element>(
    a: ChunkIter<'a, A>,
    b: ChunkIter<'b, B>,
) -> Zip2<'a, 'b, A, B> {
    Zip2 { a, b }
}

impl<A: Element, B: Element> Zip2<'_, '_, A, B> {
    /// Step every iterator one chunk forward; `None` once the shortest is
    /// exhausted.
    pub fn next_chunks(&mut self) -> Result<Option<(ChunkView<'_, A>, ChunkView<'_, B>)>> {
        let Zip2 { a, b } = self;
        let va = a.next_chunk()?;
        let vb = b.next_chunk()?;
        match (va, vb) {
            (Some(va), Some(vb)) => Ok(Some((va, vb))),
            _ => Ok(None),
        }
    }

    /// Number of lock-step chunks: the minimum over the underlying channels.
    pub fn num_chunks(&self) -> usize {
        self.a.num_chunks().min(self.b.num_chunks())
    }
}

/// Lock-step cursor over three channels.
pub struct Zip3<'a, 'b, 'c, A: Element, B: Element, C: Element> {
    a: ChunkIter<'a, A>,
    b: ChunkIter<'b, B>,
    c: ChunkIter<'c, C>,
}

/// Zip three chunk iterators.
pub fn zip3<'a, 'b, 'c, A: Element, B: Element, C: Element>(
    a: ChunkIter<'a, A>,
    b: ChunkIter<'b, B>,
    c: ChunkIter<'c, C>,
) -> Zip3<'a, 'b, 'c, A, B, C> {
    Zip3 { a, b, c }
}

impl<A: Element, B: Element, C: Element> Zip3<'_, '_, '_, A, B, C> {
    /// Step every iterator one chunk forward; `None` once the shortest is
    /// exhausted.
    #[allow(clippy::type_complexity)]
    pub fn next_chunks(
        &mut self,
    ) -> Result<Option<(ChunkView<'_, A>, ChunkView<'_, B>, ChunkView<'_, C>)>> {
        let Zip3 { a, b, c } = self;
        let va = a.next_chunk()?;
        let vb = b.next_chunk()?;
        let vc = c.next_chunk()?;
        match (va, vb, vc) {
            (Some(va), Some(vb), Some(vc)) => Ok(Some((va, vb, vc))),
            _ => Ok(None),
        }
    }

    /// Number of lock-step chunks: the minimum over the underlying channels.
    pub fn num_chunks(&self) -> usize {
        self.a
            .num_chunks()
            .min(self.b.num_chunks())
            .min(self.c.num_chunks())
    }
}
