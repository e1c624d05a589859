//! The image: an ordered list of channels, optional channel names and opaque
//! metadata.

use std::fmt;
use std::mem::size_of;

use bytemuck::Zeroable;

use crate::algo;
use crate::channel::{Channel, CodecParams};
use crate::context::CompressCtx;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::schunk::SChunk;
use crate::source::ScanlineSource;
use crate::util;

/// Arbitrary user metadata carried on an image. Not authored or interpreted
/// by the engine; it is up to the caller what goes in and comes out.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Which channels to extract from a scanline source.
#[derive(Debug, Clone, Default)]
pub enum ChannelSelector {
    /// Every channel the source exposes.
    #[default]
    All,
    /// Channels by index in the source's native order. Order and duplicates
    /// do not matter; the output follows the source order.
    Indices(Vec<usize>),
    /// Channels by name. Order does not matter; the output follows the
    /// source order.
    Names(Vec<String>),
}

/// A compressed multi-channel raster image.
///
/// Functions much like a 3-dimensional array fixed to (width, height,
/// channels), laid out in scanline order with each channel compressed
/// independently. The resolution is fixed at construction; refitting an
/// image means building a new one.
pub struct Image<T: Element> {
    channels: Vec<Channel<T>>,
    /// Either one name per channel, or empty (names unset).
    names: Vec<String>,
    width: usize,
    height: usize,
    metadata: Metadata,
}

impl<T: Element> Image<T> {
    /// Compress one planar buffer per channel into a fresh image.
    ///
    /// If `names` is non-empty it must provide one name per channel;
    /// mismatched names are dropped with a warning (names are decorative),
    /// while mismatched data is a hard error.
    pub fn from_planar(
        channels: &[Vec<T>],
        width: usize,
        height: usize,
        names: Vec<String>,
        params: &CodecParams,
    ) -> Result<Self> {
        let compressed = channels
            .iter()
            .map(|data| Channel::from_data(data, width, height, params))
            .collect::<Result<Vec<_>>>()?;
        Self::from_channels(compressed, width, height, names)
    }

    /// Wrap already built channels.
    ///
    /// Every channel must match the image dimensions.
    pub fn from_channels(
        channels: Vec<Channel<T>>,
        width: usize,
        height: usize,
        names: Vec<String>,
    ) -> Result<Self> {
        util::validate_dimensions(width, height)?;
        for channel in &channels {
            if channel.width() != width || channel.height() != height {
                return Err(Error::SizeMismatch {
                    what: "channel dimensions",
                    expected: width * height,
                    got: channel.width() * channel.height(),
                });
            }
        }
        let names = Self::checked_names(names, channels.len());
        Ok(Self {
            channels,
            names,
            width,
            height,
            metadata: Metadata::new(),
        })
    }

    /// Deinterleave one `RGBRGB...` buffer into `num_channels` planar
    /// channels and compress them.
    pub fn from_interleaved(
        data: &[T],
        width: usize,
        height: usize,
        num_channels: usize,
        names: Vec<String>,
        params: &CodecParams,
    ) -> Result<Self> {
        util::validate_dimensions(width, height)?;
        if num_channels == 0 {
            return Err(Error::InvalidArgument(
                "expected at least one channel".into(),
            ));
        }
        if data.len() != width * height * num_channels {
            return Err(Error::SizeMismatch {
                what: "interleaved image data",
                expected: width * height * num_channels,
                got: data.len(),
            });
        }
        let mut planar = vec![vec![T::zeroed(); width * height]; num_channels];
        {
            let mut views: Vec<&mut [T]> = planar.iter_mut().map(|c| c.as_mut_slice()).collect();
            algo::deinterleave(data, &mut views)?;
        }
        Self::from_planar(&planar, width, height, names, params)
    }

    /// Read and compress the selected channels of a scanline source,
    /// chunk-sized band by band, so the uncompressed working set stays at
    /// one band of scanlines per contiguous channel run.
    ///
    /// The output channel order always follows the source's native order,
    /// whatever order the selector lists them in.
    pub fn read_source<S>(source: &mut S, selector: &ChannelSelector, params: &CodecParams) -> Result<Self>
    where
        S: ScanlineSource<T> + ?Sized,
    {
        Self::read_source_with(source, selector, params, |_, _| Ok(()))
    }

    /// [`read_source`](Self::read_source) with a per-chunk postprocess
    /// callback, applied to each channel's deinterleaved scanline band just
    /// before it is compressed. The callback receives the channel's index
    /// within its contiguous run and the mutable band.
    pub fn read_source_with<S, F>(
        source: &mut S,
        selector: &ChannelSelector,
        params: &CodecParams,
        mut postprocess: F,
    ) -> Result<Self>
    where
        S: ScanlineSource<T> + ?Sized,
        F: FnMut(usize, &mut [T]) -> Result<()>,
    {
        if source.is_tiled() {
            return Err(Error::UnsupportedFormat(
                "tiled sources are not supported, flatten to scanlines first".into(),
            ));
        }
        let width = source.width();
        let height = source.height();
        util::validate_dimensions(width, height)?;
        util::validate_chunk_geometry::<T>(params.block_size, params.chunk_size)?;
        let level = util::clamp_compression_level(params.level);
        let chunk_size = util::align_chunk_to_scanlines::<T>(width, params.chunk_size)?;
        let scanlines_per_chunk = chunk_size / (width * size_of::<T>());

        let source_names = source.channel_names().to_vec();
        let runs = contiguous_runs(&resolve_selection(&source_names, selector)?);
        let max_run = runs.iter().map(|(begin, end)| end - begin).max().unwrap_or(0);

        // One interleaved band buffer sized for the widest run, reused for
        // every band of every run.
        let mut interleaved = vec![T::zeroed(); scanlines_per_chunk * width * max_run];

        let mut channels = Vec::new();
        let mut names = Vec::new();
        for (ch_begin, ch_end) in runs {
            let run_len = ch_end - ch_begin;
            let threads = util::default_threads();
            let mut schunks = Vec::with_capacity(run_len);
            let mut contexts = Vec::with_capacity(run_len);
            for _ in 0..run_len {
                schunks.push(SChunk::<T>::new(params.block_size, chunk_size)?);
                contexts.push(CompressCtx::new(
                    params.codec,
                    level,
                    threads,
                    params.block_size,
                    size_of::<T>(),
                )?);
            }
            let mut deinterleaved = vec![vec![T::zeroed(); scanlines_per_chunk * width]; run_len];

            let mut y = 0;
            while y < height {
                let rows = scanlines_per_chunk.min(height - y);
                let band = &mut interleaved[..rows * width * run_len];
                source.read_scanlines(y, y + rows, ch_begin, ch_end, band)?;

                {
                    let mut views: Vec<&mut [T]> = deinterleaved
                        .iter_mut()
                        .map(|c| &mut c.as_mut_slice()[..rows * width])
                        .collect();
                    algo::deinterleave(band, &mut views)?;
                }

                for (run_idx, buffer) in deinterleaved.iter_mut().enumerate() {
                    let fitted = &mut buffer[..rows * width];
                    postprocess(run_idx, fitted)?;
                    schunks[run_idx].append(fitted, &contexts[run_idx])?;
                }
                y += rows;
            }

            for (run_idx, schunk) in schunks.into_iter().enumerate() {
                channels.push(Channel::from_storage(
                    schunk,
                    width,
                    height,
                    params.codec,
                    level,
                )?);
                names.push(source_names[ch_begin + run_idx].clone());
            }
        }

        Self::from_channels(channels, width, height, names)
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Channel by index.
    pub fn channel(&self, index: usize) -> Result<&Channel<T>> {
        self.channels.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.channels.len(),
            what: "channels",
        })
    }

    /// Mutable channel by index.
    pub fn channel_mut(&mut self, index: usize) -> Result<&mut Channel<T>> {
        let len = self.channels.len();
        self.channels.get_mut(index).ok_or(Error::IndexOutOfRange {
            index,
            len,
            what: "channels",
        })
    }

    /// Channel by name.
    pub fn channel_by_name(&self, name: &str) -> Result<&Channel<T>> {
        self.channel(self.channel_index(name)?)
    }

    /// Mutable channel by name.
    pub fn channel_by_name_mut(&mut self, name: &str) -> Result<&mut Channel<T>> {
        let index = self.channel_index(name)?;
        self.channel_mut(index)
    }

    /// All channels, in order.
    pub fn channels(&self) -> &[Channel<T>] {
        &self.channels
    }

    /// All channels, mutably. Slice patterns make lock-step access to a few
    /// channels convenient:
    ///
    /// ```no_run
    /// # use rasterpack_core::{Image, zip3};
    /// # fn f(image: &mut Image<f32>) -> rasterpack_core::Result<()> {
    /// if let [r, g, b] = image.channels_mut() {
    ///     let mut zip = zip3(r.iter(), g.iter(), b.iter());
    ///     while let Some((rc, gc, bc)) = zip.next_chunks()? {
    ///         // ...
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn channels_mut(&mut self) -> &mut [Channel<T>] {
        &mut self.channels
    }

    /// References to the channels at `indices`, in the requested order.
    pub fn channels_by_indices(&self, indices: &[usize]) -> Result<Vec<&Channel<T>>> {
        indices.iter().map(|&i| self.channel(i)).collect()
    }

    /// References to the named channels, in the requested order.
    pub fn channels_by_names(&self, names: &[&str]) -> Result<Vec<&Channel<T>>> {
        names.iter().map(|n| self.channel_by_name(n)).collect()
    }

    /// The logical index of the named channel.
    pub fn channel_index(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::UnknownChannel(name.to_string()))
    }

    /// Channel names, in logical index order. Empty when unset.
    pub fn channel_names(&self) -> &[String] {
        &self.names
    }

    /// Replace the channel names. The list must provide exactly one name per
    /// channel.
    pub fn set_channel_names(&mut self, names: Vec<String>) -> Result<()> {
        if names.len() != self.channels.len() {
            return Err(Error::SizeMismatch {
                what: "channel names",
                expected: self.channels.len(),
                got: names.len(),
            });
        }
        self.names = names;
        Ok(())
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    // ── Channel management ──────────────────────────────────────────────────

    /// Move `channel` into the image. The name is recorded only when the
    /// image carries names; an unnamed insert then gets an empty name.
    pub fn add_channel(&mut self, channel: Channel<T>, name: Option<String>) -> Result<()> {
        if channel.width() != self.width || channel.height() != self.height {
            return Err(Error::SizeMismatch {
                what: "channel dimensions",
                expected: self.width * self.height,
                got: channel.width() * channel.height(),
            });
        }
        self.channels.push(channel);
        if !self.names.is_empty() {
            self.names.push(name.unwrap_or_default());
        }
        Ok(())
    }

    /// Compress `data` with its own codec parameters and add it as a new
    /// channel.
    pub fn add_channel_data(
        &mut self,
        data: &[T],
        name: Option<String>,
        params: &CodecParams,
    ) -> Result<()> {
        let channel = Channel::from_data(data, self.width, self.height, params)?;
        self.add_channel(channel, name)
    }

    /// Remove the channel at `index` and hand it back; later channels shift
    /// down, and so does the name list.
    pub fn extract_channel(&mut self, index: usize) -> Result<Channel<T>> {
        if index >= self.channels.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.channels.len(),
                what: "channels",
            });
        }
        if !self.names.is_empty() {
            self.names.remove(index);
        }
        Ok(self.channels.remove(index))
    }

    /// Remove the named channel and hand it back.
    pub fn extract_channel_by_name(&mut self, name: &str) -> Result<Channel<T>> {
        let index = self.channel_index(name)?;
        self.extract_channel(index)
    }

    /// Drop the channel at `index`.
    pub fn remove_channel(&mut self, index: usize) -> Result<()> {
        self.extract_channel(index).map(drop)
    }

    /// Drop the named channel.
    pub fn remove_channel_by_name(&mut self, name: &str) -> Result<()> {
        self.extract_channel_by_name(name).map(drop)
    }

    // ── Whole-image operations ──────────────────────────────────────────────

    /// Decompress every channel, planar, in channel order.
    pub fn get_decompressed(&self) -> Result<Vec<Vec<T>>> {
        self.channels.iter().map(|c| c.get_decompressed()).collect()
    }

    /// Uncompressed bytes divided by compressed bytes, over all channels.
    pub fn compression_ratio(&self) -> f64 {
        let uncompressed: usize = self
            .channels
            .iter()
            .map(|c| c.uncompressed_size() * size_of::<T>())
            .sum();
        let compressed: usize = self.channels.iter().map(|c| c.compressed_bytes()).sum();
        if compressed == 0 {
            return 1.0;
        }
        uncompressed as f64 / compressed as f64
    }

    /// Recreate every channel's codec contexts with a new worker count.
    pub fn update_threads(&mut self, threads: usize) -> Result<()> {
        for channel in &mut self.channels {
            let block_size = channel.block_size();
            channel.update_threads(threads, block_size)?;
        }
        Ok(())
    }

    /// Apply `f` to every element of every channel.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut T)) -> Result<()> {
        for channel in &mut self.channels {
            channel.for_each_mut(&mut f)?;
        }
        Ok(())
    }

    /// Statistical summary of the image's storage.
    pub fn stats(&self) -> ImageStats {
        let compressed_bytes = self.channels.iter().map(|c| c.compressed_bytes()).sum();
        let uncompressed_bytes = self
            .channels
            .iter()
            .map(|c| c.uncompressed_size() * size_of::<T>())
            .sum();
        let num_chunks = self.channels.iter().map(|c| c.num_chunks()).sum();
        ImageStats {
            width: self.width,
            height: self.height,
            num_channels: self.channels.len(),
            channel_names: self.names.clone(),
            compressed_bytes,
            uncompressed_bytes,
            num_chunks,
            compression_ratio: self.compression_ratio(),
        }
    }

    /// Validate an optional name list against the channel count, dropping it
    /// with a warning on mismatch. Names are decorative; data is not.
    fn checked_names(names: Vec<String>, num_channels: usize) -> Vec<String> {
        if !names.is_empty() && names.len() != num_channels {
            tracing::warn!(
                expected = num_channels,
                got = names.len(),
                "channel name count does not match the channel count, ignoring channel names"
            );
            return Vec::new();
        }
        names
    }
}

/// Storage summary returned by [`Image::stats`].
#[derive(Debug, Clone)]
pub struct ImageStats {
    pub width: usize,
    pub height: usize,
    pub num_channels: usize,
    pub channel_names: Vec<String>,
    pub compressed_bytes: usize,
    pub uncompressed_bytes: usize,
    pub num_chunks: usize,
    pub compression_ratio: f64,
}

impl fmt::Display for ImageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Statistics for image buffer:")?;
        writeln!(f, " Width:             {}", self.width)?;
        writeln!(f, " Height:            {}", self.height)?;
        writeln!(f, " Channels:          {}", self.num_channels)?;
        writeln!(f, " Channel names:     [{}]", self.channel_names.join(", "))?;
        writeln!(f, " Compressed size:   {} bytes", self.compressed_bytes)?;
        writeln!(f, " Uncompressed size: {} bytes", self.uncompressed_bytes)?;
        writeln!(f, " Compression ratio: {:.2}x", self.compression_ratio)?;
        write!(f, " Num chunks:        {}", self.num_chunks)
    }
}

/// Map a channel selector onto source channel indices, sorted and deduped so
/// the output follows the source's native order.
fn resolve_selection(source_names: &[String], selector: &ChannelSelector) -> Result<Vec<usize>> {
    let mut indices = match selector {
        ChannelSelector::All => (0..source_names.len()).collect::<Vec<_>>(),
        ChannelSelector::Indices(indices) => {
            for &index in indices {
                if index >= source_names.len() {
                    return Err(Error::IndexOutOfRange {
                        index,
                        len: source_names.len(),
                        what: "source channels",
                    });
                }
            }
            indices.clone()
        }
        ChannelSelector::Names(names) => names
            .iter()
            .map(|name| {
                source_names
                    .iter()
                    .position(|n| n == name)
                    .ok_or_else(|| Error::UnknownChannel(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?,
    };
    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}

/// Group sorted channel indices into maximal contiguous `[begin, end)` runs,
/// so each run can be read from the source in one batched call.
fn contiguous_runs(sorted: &[usize]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut iter = sorted.iter().copied();
    let Some(first) = iter.next() else {
        return runs;
    };
    let mut start = first;
    let mut prev = first;
    for index in iter {
        if index != prev + 1 {
            runs.push((start, prev + 1));
            start = index;
        }
        prev = index;
    }
    runs.push((start, prev + 1));
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_group_consecutive_indices() {
        assert_eq!(contiguous_runs(&[0, 1, 2, 3]), vec![(0, 4)]);
        assert_eq!(contiguous_runs(&[0, 2, 3, 11]), vec![(0, 1), (2, 4), (11, 12)]);
        assert_eq!(contiguous_runs(&[]), vec![]);
        assert_eq!(contiguous_runs(&[5]), vec![(5, 6)]);
    }

    #[test]
    fn selection_follows_source_order() {
        let names: Vec<String> = ["R", "G", "B", "A"].map(String::from).to_vec();
        let selector = ChannelSelector::Names(vec!["A".into(), "R".into()]);
        assert_eq!(resolve_selection(&names, &selector).unwrap(), vec![0, 3]);
    }

    #[test]
    fn unknown_selection_fails() {
        let names: Vec<String> = ["R", "G"].map(String::from).to_vec();
        assert!(matches!(
            resolve_selection(&names, &ChannelSelector::Names(vec!["Z".into()])),
            Err(Error::UnknownChannel(_))
        ));
        assert!(matches!(
            resolve_selection(&names, &ChannelSelector::Indices(vec![7])),
            Err(Error::IndexOutOfRange { .. })
        ));
    }
}
