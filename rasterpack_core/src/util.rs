use std::mem::size_of;

use crate::element::Element;
use crate::error::{Error, Result};
use crate::format::MAX_CHUNK_BYTES;

/// Clamp a compression level into the supported 0..=9 range, warning when the
/// caller asked for more.
pub(crate) fn clamp_compression_level(level: u8) -> u8 {
    if level > 9 {
        tracing::warn!(level, "compression level out of range, clamping to 9");
        9
    } else {
        level
    }
}

/// Validate the requested chunk/block geometry for element type `T`.
pub(crate) fn validate_chunk_geometry<T: Element>(block_size: usize, chunk_size: usize) -> Result<()> {
    if chunk_size == 0 || chunk_size % size_of::<T>() != 0 {
        return Err(Error::InvalidArgument(format!(
            "chunk size {} must be a positive multiple of the element size {}",
            chunk_size,
            size_of::<T>()
        )));
    }
    if chunk_size > MAX_CHUNK_BYTES {
        return Err(Error::InvalidArgument(format!(
            "chunk size {chunk_size} exceeds the {MAX_CHUNK_BYTES} byte chunk limit"
        )));
    }
    if block_size == 0 || block_size >= chunk_size {
        return Err(Error::InvalidArgument(format!(
            "block size {block_size} must be positive and smaller than the chunk size {chunk_size}"
        )));
    }
    Ok(())
}

/// Round `chunk_size` up to the smallest multiple of one scanline
/// (`width * size_of::<T>()` bytes) that can hold it, capped at the chunk
/// byte limit.
///
/// Every chunk then starts at the beginning of a scanline, which is what
/// makes the iterator's (x, y) mapping a plain division.
pub(crate) fn align_chunk_to_scanlines<T: Element>(width: usize, chunk_size: usize) -> Result<usize> {
    let scanline = width * size_of::<T>();
    if scanline == 0 {
        return Err(Error::InvalidArgument(
            "cannot align chunks for a zero-width channel".into(),
        ));
    }
    if scanline > MAX_CHUNK_BYTES {
        return Err(Error::InvalidArgument(format!(
            "a single scanline of {scanline} bytes exceeds the {MAX_CHUNK_BYTES} byte chunk limit"
        )));
    }
    let aligned = chunk_size.max(1).div_ceil(scanline) * scanline;
    if aligned > MAX_CHUNK_BYTES {
        // Cannot round up within the limit; fall back to the largest whole
        // number of scanlines that fits.
        return Ok(MAX_CHUNK_BYTES / scanline * scanline);
    }
    Ok(aligned)
}

/// Validate image/channel dimensions.
pub(crate) fn validate_dimensions(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidArgument(format!(
            "expected at least one pixel in either dimension, got {width} x {height}"
        )));
    }
    Ok(())
}

/// Default worker count for codec contexts.
pub(crate) fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_rounds_up_to_whole_scanlines() {
        // width 10, u8: scanline is 10 bytes
        assert_eq!(align_chunk_to_scanlines::<u8>(10, 4096).unwrap(), 4100);
        // already aligned stays put
        assert_eq!(align_chunk_to_scanlines::<u8>(128, 4096).unwrap(), 4096);
        // u16 scanlines are twice as wide
        assert_eq!(align_chunk_to_scanlines::<u16>(10, 30).unwrap(), 40);
    }

    #[test]
    fn alignment_rejects_zero_width() {
        assert!(align_chunk_to_scanlines::<u8>(0, 4096).is_err());
    }

    #[test]
    fn geometry_validation() {
        assert!(validate_chunk_geometry::<u16>(128, 4096).is_ok());
        // chunk not a multiple of the element size
        assert!(validate_chunk_geometry::<u16>(128, 4097).is_err());
        // block not smaller than chunk
        assert!(validate_chunk_geometry::<u8>(4096, 4096).is_err());
        assert!(validate_chunk_geometry::<u8>(0, 4096).is_err());
    }
}
