//! Lock-step iteration over multiple channels.

mod common;

use rasterpack_core::{zip2, zip3, Channel, CodecParams, Codec, Image};

fn rgb_image(len_value: (f32, f32, f32), params: &CodecParams) -> Image<f32> {
    let (r, g, b) = len_value;
    Image::from_planar(
        &[
            vec![r; 64 * 16],
            vec![g; 64 * 16],
            vec![b; 64 * 16],
        ],
        64,
        16,
        vec!["R".into(), "G".into(), "B".into()],
        params,
    )
    .unwrap()
}

#[test]
fn zip_reads_three_channels_in_lock_step() {
    let params = CodecParams::default().with_block_size(256).with_chunk_size(1024);
    let mut image = rgb_image((255.0, 0.0, 199.0), &params);

    let [r, g, b] = image.channels_mut() else {
        panic!("expected exactly three channels");
    };
    let mut zip = zip3(r.iter(), g.iter(), b.iter());
    while let Some((rc, gc, bc)) = zip.next_chunks().unwrap() {
        assert_eq!(rc.len(), gc.len());
        assert_eq!(gc.len(), bc.len());
        for i in 0..rc.len() {
            assert_eq!(rc[i], 255.0);
            assert_eq!(gc[i], 0.0);
            assert_eq!(bc[i], 199.0);
        }
    }
}

#[test]
fn zip_modify_three_channels() {
    // chunk size smaller than a channel, forcing several lock-step bands
    let params = CodecParams::new(Codec::Lz4).with_block_size(256).with_chunk_size(768);
    let mut image = rgb_image((255.0, 0.0, 199.0), &params);

    {
        let [r, g, b] = image.channels_mut() else {
            panic!("expected exactly three channels");
        };
        let mut zip = zip3(r.iter(), g.iter(), b.iter());
        while let Some((mut rc, mut gc, mut bc)) = zip.next_chunks().unwrap() {
            for i in 0..rc.len() {
                rc[i] = 12.0;
                gc[i] = 13.0;
                bc[i] = 14.0;
            }
        }
    }

    // every pixel of every channel took the write
    let planes = image.get_decompressed().unwrap();
    assert!(planes[0].iter().all(|&v| v == 12.0));
    assert!(planes[1].iter().all(|&v| v == 13.0));
    assert!(planes[2].iter().all(|&v| v == 14.0));
}

#[test]
fn zip_modify_with_chunk_sized_channels() {
    let params = CodecParams::default().with_block_size(256).with_chunk_size(64 * 16 * 4);
    let mut image = rgb_image((255.0, 0.0, 199.0), &params);
    assert_eq!(image.channel(0).unwrap().num_chunks(), 1);

    let [r, g, b] = image.channels_mut() else {
        panic!("expected exactly three channels");
    };
    let mut zip = zip3(r.iter(), g.iter(), b.iter());
    while let Some((mut rc, mut gc, mut bc)) = zip.next_chunks().unwrap() {
        for ((rv, gv), bv) in rc.iter_mut().zip(gc.iter_mut()).zip(bc.iter_mut()) {
            *rv = 1.0;
            *gv = 2.0;
            *bv = 3.0;
        }
    }
    drop(zip);

    let planes = image.get_decompressed().unwrap();
    assert!(planes[0].iter().all(|&v| v == 1.0));
    assert!(planes[1].iter().all(|&v| v == 2.0));
    assert!(planes[2].iter().all(|&v| v == 3.0));
}

#[test]
fn zip_stops_at_the_shortest_channel() {
    // same raster, different chunk sizes: 4 chunks vs 2 chunks
    let data = vec![1u8; 32 * 4];
    let mut a = Channel::from_data(
        &data,
        32,
        4,
        &CodecParams::default().with_block_size(16).with_chunk_size(32),
    )
    .unwrap();
    let mut b = Channel::from_data(
        &data,
        32,
        4,
        &CodecParams::default().with_block_size(16).with_chunk_size(64),
    )
    .unwrap();
    assert_eq!(a.num_chunks(), 4);
    assert_eq!(b.num_chunks(), 2);

    let mut zip = zip2(a.iter(), b.iter());
    assert_eq!(zip.num_chunks(), 2);
    let mut steps = 0;
    while let Some((ac, bc)) = zip.next_chunks().unwrap() {
        assert_eq!(ac.len(), 32);
        assert_eq!(bc.len(), 64);
        steps += 1;
    }
    assert_eq!(steps, 2);
}

#[test]
fn zip_works_across_element_types() {
    let mut mask = Channel::full(
        16,
        8,
        1u8,
        &CodecParams::default().with_block_size(16).with_chunk_size(64),
    )
    .unwrap();
    let mut depth = Channel::full(
        16,
        8,
        2.5f32,
        &CodecParams::default().with_block_size(64).with_chunk_size(256),
    )
    .unwrap();

    let mut zip = zip2(mask.iter(), depth.iter());
    while let Some((mc, mut dc)) = zip.next_chunks().unwrap() {
        for (m, d) in mc.iter().zip(dc.iter_mut()) {
            *d *= f32::from(*m) * 2.0;
        }
    }
    drop(zip);

    assert!(depth.get_decompressed().unwrap().iter().all(|&v| v == 5.0));
    assert!(mask.get_decompressed().unwrap().iter().all(|&v| v == 1));
}
