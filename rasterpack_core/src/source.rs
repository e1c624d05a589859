//! The external scanline source interface.
//!
//! File decoders are out of scope for the engine; anything that can report
//! its geometry and read ranges of scanlines for ranges of channels into an
//! interleaved buffer can feed [`Image::read_source`](crate::Image::read_source).
//! Implementations convert decoded pixels into the requested element type
//! `T` themselves (decoder wrappers typically dispatch on
//! [`T::TYPE_DESC`](crate::Element::TYPE_DESC)).

use crate::element::Element;
use crate::error::{Error, Result};

/// A decoded image exposing scanline-granular reads.
pub trait ScanlineSource<T: Element> {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Channel names in the source's native order.
    fn channel_names(&self) -> &[String];

    fn num_channels(&self) -> usize {
        self.channel_names().len()
    }

    /// Tiled sources cannot be consumed scanline-wise and are rejected by
    /// the bulk read.
    fn is_tiled(&self) -> bool {
        false
    }

    fn num_subimages(&self) -> usize {
        1
    }

    /// Switch subsequent reads to the given subimage. Callers select the
    /// subimage before handing the source to
    /// [`Image::read_source`](crate::Image::read_source).
    fn select_subimage(&mut self, index: usize) -> Result<()> {
        if index == 0 {
            Ok(())
        } else {
            Err(Error::UnsupportedFormat(format!(
                "source has no subimage {index}"
            )))
        }
    }

    /// Read scanlines `[y_begin, y_end)` of channels `[ch_begin, ch_end)`
    /// into `out`, interleaved pixel by pixel.
    ///
    /// `out` must hold exactly
    /// `(y_end - y_begin) * width * (ch_end - ch_begin)` elements.
    fn read_scanlines(
        &mut self,
        y_begin: usize,
        y_end: usize,
        ch_begin: usize,
        ch_end: usize,
        out: &mut [T],
    ) -> Result<()>;
}
