//! Image assembly, channel management and bulk-read tests.

mod common;

use common::MemorySource;
use rasterpack_core::{algo, Channel, ChannelSelector, CodecParams, Error, Image};

fn ramp_u16(len: usize, offset: u16) -> Vec<u16> {
    (0..len as u32).map(|i| (i as u16).wrapping_add(offset)).collect()
}

fn small_params() -> CodecParams {
    CodecParams::default().with_block_size(64).with_chunk_size(512)
}

#[test]
fn from_planar_roundtrip() {
    let r = ramp_u16(64 * 16, 0);
    let g = ramp_u16(64 * 16, 100);
    let b = ramp_u16(64 * 16, 200);
    let image = Image::from_planar(
        &[r.clone(), g.clone(), b.clone()],
        64,
        16,
        vec!["R".into(), "G".into(), "B".into()],
        &small_params(),
    )
    .unwrap();

    assert_eq!(image.width(), 64);
    assert_eq!(image.height(), 16);
    assert_eq!(image.num_channels(), 3);
    assert_eq!(image.channel_names(), ["R", "G", "B"]);
    assert_eq!(image.get_decompressed().unwrap(), vec![r, g, b]);
}

#[test]
fn mismatched_names_are_dropped_not_fatal() {
    let data = vec![vec![0u8; 8 * 8]; 3];
    let image = Image::from_planar(
        &data,
        8,
        8,
        vec!["R".into(), "G".into()],
        &CodecParams::default(),
    )
    .unwrap();

    assert_eq!(image.num_channels(), 3);
    assert!(image.channel_names().is_empty());
}

#[test]
fn mismatched_data_is_fatal() {
    let channels = vec![vec![0u8; 8 * 8], vec![0u8; 3]];
    assert!(matches!(
        Image::from_planar(&channels, 8, 8, vec![], &CodecParams::default()),
        Err(Error::SizeMismatch { .. })
    ));
}

#[test]
fn from_channels_validates_dimensions() {
    let a = Channel::from_data(&vec![0u8; 8 * 8], 8, 8, &CodecParams::default()).unwrap();
    let b = Channel::from_data(&vec![0u8; 4 * 4], 4, 4, &CodecParams::default()).unwrap();
    assert!(matches!(
        Image::from_channels(vec![a, b], 8, 8, vec![]),
        Err(Error::SizeMismatch { .. })
    ));
}

#[test]
fn channel_lookup_by_name_and_index() {
    let image = Image::from_planar(
        &[ramp_u16(16 * 4, 0), ramp_u16(16 * 4, 7)],
        16,
        4,
        vec!["Y".into(), "A".into()],
        &CodecParams::default(),
    )
    .unwrap();

    assert_eq!(image.channel_index("A").unwrap(), 1);
    assert_eq!(
        image.channel_by_name("A").unwrap().get_decompressed().unwrap(),
        ramp_u16(16 * 4, 7)
    );
    assert!(matches!(
        image.channel_by_name("Z"),
        Err(Error::UnknownChannel(_))
    ));
    assert!(matches!(
        image.channel(5),
        Err(Error::IndexOutOfRange { .. })
    ));

    let selected = image.channels_by_names(&["A", "Y"]).unwrap();
    assert_eq!(selected.len(), 2);
    assert_eq!(selected[0].get_decompressed().unwrap(), ramp_u16(16 * 4, 7));
}

#[test]
fn set_channel_names_must_match_the_channel_count() {
    let mut image = Image::from_planar(
        &[vec![0u8; 16], vec![1u8; 16]],
        4,
        4,
        vec![],
        &CodecParams::default(),
    )
    .unwrap();

    assert!(matches!(
        image.set_channel_names(vec!["R".into()]),
        Err(Error::SizeMismatch { .. })
    ));
    image.set_channel_names(vec!["R".into(), "G".into()]).unwrap();
    assert_eq!(image.channel_names(), ["R", "G"]);
}

#[test]
fn add_remove_extract_channels() {
    let mut image = Image::from_planar(
        &[vec![1u8; 64], vec![2u8; 64], vec![3u8; 64]],
        8,
        8,
        vec!["R".into(), "G".into(), "B".into()],
        &CodecParams::default(),
    )
    .unwrap();

    // removing the middle channel shifts everything down
    image.remove_channel(1).unwrap();
    assert_eq!(image.num_channels(), 2);
    assert_eq!(image.channel_names(), ["R", "B"]);
    assert_eq!(image.channel_index("B").unwrap(), 1);

    // extraction hands the channel back
    let extracted = image.extract_channel_by_name("R").unwrap();
    assert!(extracted.get_decompressed().unwrap().iter().all(|&v| v == 1));
    assert_eq!(image.num_channels(), 1);
    assert_eq!(image.channel_names(), ["B"]);

    // adding keeps the name list in sync
    let alpha = Channel::from_data(&vec![9u8; 64], 8, 8, &CodecParams::default()).unwrap();
    image.add_channel(alpha, Some("A".into())).unwrap();
    assert_eq!(image.channel_names(), ["B", "A"]);

    let wrong_size = Channel::from_data(&vec![0u8; 16], 4, 4, &CodecParams::default()).unwrap();
    assert!(matches!(
        image.add_channel(wrong_size, None),
        Err(Error::SizeMismatch { .. })
    ));
}

#[test]
fn extract_all_channels_empties_the_image() {
    let mut image = Image::from_planar(
        &[vec![1u8; 64], vec![2u8; 64]],
        8,
        8,
        vec!["R".into(), "G".into()],
        &CodecParams::default(),
    )
    .unwrap();

    let mut planes = Vec::new();
    while image.num_channels() > 0 {
        // indices shift back to zero as channels are pulled out
        planes.push(image.extract_channel(0).unwrap().get_decompressed().unwrap());
    }
    assert_eq!(planes, vec![vec![1u8; 64], vec![2u8; 64]]);
    assert_eq!(image.num_channels(), 0);
    assert!(image.channel_names().is_empty());
}

#[test]
fn metadata_is_carried_opaquely() {
    let mut image =
        Image::from_planar(&[vec![0u8; 16]], 4, 4, vec![], &CodecParams::default()).unwrap();
    assert!(image.metadata().is_empty());

    image
        .metadata_mut()
        .insert("author".into(), serde_json::json!("someone"));
    image
        .metadata_mut()
        .insert("frame".into(), serde_json::json!(42));
    assert_eq!(image.metadata().len(), 2);
    assert_eq!(image.metadata()["frame"], serde_json::json!(42));
}

#[test]
fn compression_ratio_exceeds_one_on_flat_data() {
    let image = Image::from_planar(
        &[vec![0u16; 256 * 256]],
        256,
        256,
        vec![],
        &CodecParams::default(),
    )
    .unwrap();
    assert!(image.compression_ratio() > 1.0);

    let stats = image.stats();
    assert_eq!(stats.width, 256);
    assert_eq!(stats.num_channels, 1);
    assert_eq!(stats.uncompressed_bytes, 256 * 256 * 2);
    assert!(stats.compressed_bytes < stats.uncompressed_bytes);
    let rendered = stats.to_string();
    assert!(rendered.contains("Compression ratio"));
}

#[test]
fn from_interleaved_deinterleaves() {
    let r = ramp_u16(8 * 4, 0);
    let g = ramp_u16(8 * 4, 50);
    let mut interleaved = vec![0u16; 8 * 4 * 2];
    algo::interleave(&[&r, &g], &mut interleaved).unwrap();

    let image = Image::from_interleaved(
        &interleaved,
        8,
        4,
        2,
        vec!["R".into(), "G".into()],
        &CodecParams::default(),
    )
    .unwrap();
    assert_eq!(image.get_decompressed().unwrap(), vec![r, g]);
}

// ── Bulk read from a scanline source ────────────────────────────────────────

fn multilayer_source() -> MemorySource<u16> {
    let (w, h) = (48, 32);
    MemorySource::new(
        w,
        h,
        vec![
            ("R", ramp_u16(w * h, 0)),
            ("G", ramp_u16(w * h, 1000)),
            ("B", ramp_u16(w * h, 2000)),
            ("A", ramp_u16(w * h, 3000)),
            ("Z", ramp_u16(w * h, 4000)),
            ("VRayCryptomatte00.R", ramp_u16(w * h, 5000)),
        ],
    )
}

#[test]
fn read_all_channels_matches_a_reference_deinterleave() {
    let mut source = multilayer_source();
    let params = small_params();
    let image = Image::read_source(&mut source, &ChannelSelector::All, &params).unwrap();

    assert_eq!(image.num_channels(), 6);
    assert_eq!(image.width(), 48);
    assert_eq!(image.height(), 32);

    // reference: one monolithic interleaved read, deinterleaved planar
    let mut reference = vec![vec![0u16; 48 * 32]; 6];
    let mut interleaved = vec![0u16; 48 * 32 * 6];
    {
        use rasterpack_core::ScanlineSource;
        source.read_scanlines(0, 32, 0, 6, &mut interleaved).unwrap();
        let mut views: Vec<&mut [u16]> = reference.iter_mut().map(|c| c.as_mut_slice()).collect();
        algo::deinterleave(&interleaved, &mut views).unwrap();
    }
    assert_eq!(image.get_decompressed().unwrap(), reference);
}

#[test]
fn read_spans_multiple_chunks() {
    let mut source = multilayer_source();
    // 48 u16 pixels per scanline is 96 bytes; a 512 byte chunk rounds up to
    // 576 and holds 6 scanlines, so the 32 rows span 6 chunks
    let params = small_params();
    let image = Image::read_source(&mut source, &ChannelSelector::All, &params).unwrap();

    let chunk_size = image.channel(0).unwrap().chunk_size();
    assert_eq!(chunk_size % 96, 0);
    assert!(image.channel(0).unwrap().num_chunks() > 1);
    assert_eq!(
        image.channel_by_name("Z").unwrap().get_decompressed().unwrap(),
        ramp_u16(48 * 32, 4000)
    );
}

#[test]
fn non_contiguous_selection_preserves_source_order() {
    let mut source = multilayer_source();
    let selector = ChannelSelector::Names(vec![
        "VRayCryptomatte00.R".into(),
        "R".into(),
        "B".into(),
        "A".into(),
    ]);
    let image = Image::read_source(&mut source, &selector, &small_params()).unwrap();

    // requested out of order, returned in source order
    assert_eq!(image.num_channels(), 4);
    assert_eq!(image.channel_names(), ["R", "B", "A", "VRayCryptomatte00.R"]);
    for name in ["R", "B", "A", "VRayCryptomatte00.R"] {
        assert_eq!(
            image.channel_by_name(name).unwrap().get_decompressed().unwrap(),
            source.channel_data(name),
            "channel {name}"
        );
    }
}

#[test]
fn selection_by_indices_matches_selection_by_names() {
    let mut source = multilayer_source();
    let by_indices = Image::read_source(
        &mut source,
        &ChannelSelector::Indices(vec![5, 0, 2, 3]),
        &small_params(),
    )
    .unwrap();
    assert_eq!(
        by_indices.channel_names(),
        ["R", "B", "A", "VRayCryptomatte00.R"]
    );
}

#[test]
fn unknown_channels_fail_the_read() {
    let mut source = multilayer_source();
    assert!(matches!(
        Image::read_source(
            &mut source,
            &ChannelSelector::Names(vec!["R".into(), "Q".into()]),
            &small_params(),
        ),
        Err(Error::UnknownChannel(_))
    ));
    assert!(matches!(
        Image::read_source(
            &mut source,
            &ChannelSelector::Indices(vec![0, 64]),
            &small_params(),
        ),
        Err(Error::IndexOutOfRange { .. })
    ));
}

#[test]
fn tiled_sources_are_rejected() {
    let mut source = multilayer_source().tiled();
    assert!(matches!(
        Image::read_source(&mut source, &ChannelSelector::All, &small_params()),
        Err(Error::UnsupportedFormat(_))
    ));
}

#[test]
fn postprocess_runs_before_compression() {
    let mut source = multilayer_source();
    let selector = ChannelSelector::Names(vec!["R".into(), "G".into(), "B".into(), "A".into()]);
    let image = Image::read_source_with(&mut source, &selector, &small_params(), |_, values| {
        for value in values.iter_mut() {
            *value = 25;
        }
        Ok(())
    })
    .unwrap();

    assert_eq!(image.channel_names(), ["R", "G", "B", "A"]);
    for plane in image.get_decompressed().unwrap() {
        assert!(plane.iter().all(|&v| v == 25));
    }
}

#[test]
fn postprocess_errors_propagate() {
    let mut source = multilayer_source();
    let result = Image::read_source_with(
        &mut source,
        &ChannelSelector::All,
        &small_params(),
        |_, _| Err(Error::InvalidArgument("postprocess rejected the band".into())),
    );
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test]
fn update_threads_fans_out() {
    let mut image = Image::from_planar(
        &[ramp_u16(64 * 16, 0), ramp_u16(64 * 16, 5)],
        64,
        16,
        vec![],
        &small_params(),
    )
    .unwrap();
    image.update_threads(2).unwrap();
    assert_eq!(
        image.get_decompressed().unwrap(),
        vec![ramp_u16(64 * 16, 0), ramp_u16(64 * 16, 5)]
    );
}

#[test]
fn for_each_mut_covers_every_channel() {
    let mut image = Image::from_planar(
        &[vec![1u8; 8 * 8], vec![2u8; 8 * 8]],
        8,
        8,
        vec![],
        &CodecParams::default(),
    )
    .unwrap();
    image.for_each_mut(|v| *v += 10).unwrap();
    assert_eq!(
        image.get_decompressed().unwrap(),
        vec![vec![11u8; 64], vec![12u8; 64]]
    );
}
