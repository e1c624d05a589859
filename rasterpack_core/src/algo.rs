//! Interleave/deinterleave helpers used by the bulk read path and the
//! interleaved image constructor.

use crate::element::Element;
use crate::error::{Error, Result};

/// Split an interleaved pixel buffer (`RGBRGB...`) into planar per-channel
/// buffers.
///
/// `interleaved` must hold a whole number of pixels and every destination
/// must hold exactly `interleaved.len() / channels.len()` elements.
pub fn deinterleave<T: Element>(interleaved: &[T], channels: &mut [&mut [T]]) -> Result<()> {
    let n = channels.len();
    if n == 0 {
        return Err(Error::InvalidArgument(
            "cannot deinterleave into zero channels".into(),
        ));
    }
    if interleaved.len() % n != 0 {
        return Err(Error::SizeMismatch {
            what: "interleaved buffer",
            expected: interleaved.len() / n * n,
            got: interleaved.len(),
        });
    }
    let per_channel = interleaved.len() / n;
    for channel in channels.iter() {
        if channel.len() != per_channel {
            return Err(Error::SizeMismatch {
                what: "deinterleave destination",
                expected: per_channel,
                got: channel.len(),
            });
        }
    }

    for (offset, dst) in channels.iter_mut().enumerate() {
        for (d, s) in dst.iter_mut().zip(interleaved[offset..].iter().step_by(n)) {
            *d = *s;
        }
    }
    Ok(())
}

/// Merge planar per-channel buffers into one interleaved pixel buffer, the
/// inverse of [`deinterleave`].
pub fn interleave<T: Element>(channels: &[&[T]], interleaved: &mut [T]) -> Result<()> {
    let n = channels.len();
    if n == 0 {
        return Err(Error::InvalidArgument(
            "cannot interleave zero channels".into(),
        ));
    }
    let per_channel = channels[0].len();
    for channel in channels {
        if channel.len() != per_channel {
            return Err(Error::SizeMismatch {
                what: "interleave source",
                expected: per_channel,
                got: channel.len(),
            });
        }
    }
    if interleaved.len() != per_channel * n {
        return Err(Error::SizeMismatch {
            what: "interleaved buffer",
            expected: per_channel * n,
            got: interleaved.len(),
        });
    }

    for (offset, src) in channels.iter().enumerate() {
        for (d, s) in interleaved[offset..].iter_mut().step_by(n).zip(src.iter()) {
            *d = *s;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deinterleave_splits_pixels() {
        let interleaved: Vec<u8> = vec![1, 10, 2, 20, 3, 30];
        let mut a = vec![0u8; 3];
        let mut b = vec![0u8; 3];
        deinterleave(&interleaved, &mut [&mut a, &mut b]).unwrap();
        assert_eq!(a, [1, 2, 3]);
        assert_eq!(b, [10, 20, 30]);
    }

    #[test]
    fn interleave_is_the_inverse() {
        let a = [1u16, 2, 3];
        let b = [10u16, 20, 30];
        let c = [100u16, 200, 300];
        let mut interleaved = vec![0u16; 9];
        interleave(&[&a, &b, &c], &mut interleaved).unwrap();
        assert_eq!(interleaved, [1, 10, 100, 2, 20, 200, 3, 30, 300]);

        let mut a2 = vec![0u16; 3];
        let mut b2 = vec![0u16; 3];
        let mut c2 = vec![0u16; 3];
        deinterleave(&interleaved, &mut [&mut a2, &mut b2, &mut c2]).unwrap();
        assert_eq!(a2, a);
        assert_eq!(b2, b);
        assert_eq!(c2, c);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let interleaved = [1u8, 2, 3];
        let mut a = vec![0u8; 2];
        assert!(deinterleave(&interleaved, &mut [&mut a]).is_err());
    }
}
