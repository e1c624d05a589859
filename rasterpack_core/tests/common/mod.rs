//! Shared test helpers: deterministic data generators and an in-memory
//! scanline source standing in for a file decoder.
#![allow(dead_code)]

use rasterpack_core::{Element, Error, Result, ScanlineSource};

/// Generate `len` deterministic bytes using a simple LCG.
pub fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Planar, fully decoded image data behind the scanline source interface.
pub struct MemorySource<T> {
    width: usize,
    height: usize,
    names: Vec<String>,
    channels: Vec<Vec<T>>,
    tiled: bool,
}

impl<T: Element> MemorySource<T> {
    pub fn new(width: usize, height: usize, named_channels: Vec<(&str, Vec<T>)>) -> Self {
        let mut names = Vec::new();
        let mut channels = Vec::new();
        for (name, data) in named_channels {
            assert_eq!(data.len(), width * height, "bad test data for channel {name}");
            names.push(name.to_string());
            channels.push(data);
        }
        Self {
            width,
            height,
            names,
            channels,
            tiled: false,
        }
    }

    /// Pretend to be a tiled file.
    pub fn tiled(mut self) -> Self {
        self.tiled = true;
        self
    }

    pub fn channel_data(&self, name: &str) -> &[T] {
        let index = self.names.iter().position(|n| n == name).unwrap();
        &self.channels[index]
    }
}

impl<T: Element> ScanlineSource<T> for MemorySource<T> {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn channel_names(&self) -> &[String] {
        &self.names
    }

    fn is_tiled(&self) -> bool {
        self.tiled
    }

    fn read_scanlines(
        &mut self,
        y_begin: usize,
        y_end: usize,
        ch_begin: usize,
        ch_end: usize,
        out: &mut [T],
    ) -> Result<()> {
        if y_end > self.height || ch_end > self.channels.len() || y_begin >= y_end || ch_begin >= ch_end {
            return Err(Error::InvalidArgument(format!(
                "read_scanlines({y_begin}..{y_end}, {ch_begin}..{ch_end}) out of bounds"
            )));
        }
        let n = ch_end - ch_begin;
        let expected = (y_end - y_begin) * self.width * n;
        if out.len() != expected {
            return Err(Error::SizeMismatch {
                what: "scanline buffer",
                expected,
                got: out.len(),
            });
        }
        let mut cursor = 0;
        for y in y_begin..y_end {
            for x in 0..self.width {
                for channel in &self.channels[ch_begin..ch_end] {
                    out[cursor] = channel[y * self.width + x];
                    cursor += 1;
                }
            }
        }
        Ok(())
    }
}
