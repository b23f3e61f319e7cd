//! Compositor integration tests.
//!
//! Tests verify:
//! - Gray to RGB merge from one file and from separate files
//! - Merge preconditions (source count, bit depth, sizes)
//! - Palette colorization of 16-bit channels
//! - Noise suppression keeps signal tiles and zeroes the rest
//! - Streamed channel means agree with in-memory means

use std::io::Cursor;

use tiffo::compose::{
    directory_mean, Colorizer, GrayMerge, GraySource, NoiseSuppressor, Palette,
    SuppressionThresholds,
};
use tiffo::copy::TagCopier;
use tiffo::error::{PreconditionError, RasterError};
use tiffo::format::tiff::{photometric, DirectoryBuilder, TiffTag, TiffWriter, WriterOptions};
use tiffo::raster::{Mode, Raster, RasterReader, RasterWriter};

use super::test_utils::{build_simple, gray16, gray8, open_memory, Layout};

fn new_writer() -> TiffWriter<Cursor<Vec<u8>>> {
    TiffWriter::new(Cursor::new(Vec::new()), WriterOptions::default()).unwrap()
}

fn finish(writer: TiffWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
    writer.finish().unwrap().into_inner()
}

/// Gray16 raster whose 16x16 tiles are each filled with one value.
fn gray16_tiles(values: &[u16], tiles_across: u32) -> Raster {
    let width = tiles_across * 16;
    let height = (values.len() as u32 / tiles_across) * 16;
    let samples: Vec<u16> = (0..width * height)
        .map(|i| {
            let (x, y) = (i % width, i / width);
            values[((y / 16) * tiles_across + x / 16) as usize]
        })
        .collect();
    gray16(width, height, &samples)
}

// =============================================================================
// Gray to RGB
// =============================================================================

#[tokio::test]
async fn test_merge_three_directories() {
    let planes = [gray8(40, 24, 1), gray8(40, 24, 2), gray8(40, 24, 3)];
    let file = open_memory(build_simple(&planes, Layout::Tiled(16))).await;

    let merge = GrayMerge::from_file(&file).unwrap();
    let mut writer = new_writer();
    merge.write_to(&mut writer, &TagCopier::new()).await.unwrap();

    let out = open_memory(finish(writer)).await;
    let dir = out.directory(0).unwrap();
    assert!(dir.is_tiled());
    assert_eq!(dir.get_u32(TiffTag::TileWidth), Some(16));
    assert_eq!(
        dir.get_u16(TiffTag::PhotometricInterpretation),
        Some(photometric::RGB)
    );

    let rgb = RasterReader::new(&out).read(0).await.unwrap();
    assert_eq!(rgb.mode(), Mode::Rgb8);
    for (x, y) in [(0, 0), (17, 3), (39, 23)] {
        let expected: Vec<u8> = planes.iter().map(|p| p.pixel(x, y).unwrap()[0]).collect();
        assert_eq!(rgb.pixel(x, y).unwrap(), &expected[..]);
    }
}

#[tokio::test]
async fn test_merge_two_strip_files_leaves_blue_empty() {
    let red = gray8(30, 11, 4);
    let green = gray8(30, 11, 5);
    let red_file = open_memory(build_simple(std::slice::from_ref(&red), Layout::Strips(4))).await;
    let green_file = open_memory(build_simple(std::slice::from_ref(&green), Layout::Strips(4))).await;

    let merge = GrayMerge::new(vec![
        GraySource::new(&red_file, 0),
        GraySource::new(&green_file, 0),
    ])
    .unwrap();
    let mut writer = new_writer();
    merge.write_to(&mut writer, &TagCopier::new()).await.unwrap();

    let out = open_memory(finish(writer)).await;
    assert!(!out.directory(0).unwrap().is_tiled());
    let rgb = RasterReader::new(&out).read(0).await.unwrap();
    for y in 0..11 {
        for x in 0..30 {
            let pixel = rgb.pixel(x, y).unwrap();
            assert_eq!(pixel[0], red.pixel(x, y).unwrap()[0]);
            assert_eq!(pixel[1], green.pixel(x, y).unwrap()[0]);
            assert_eq!(pixel[2], 0);
        }
    }
}

#[tokio::test]
async fn test_merge_preconditions() {
    let one = open_memory(build_simple(&[gray8(16, 16, 0)], Layout::Tiled(16))).await;
    assert!(matches!(
        GrayMerge::from_file(&one),
        Err(PreconditionError::SourceCount(1))
    ));

    let mismatched = open_memory(build_simple(
        &[gray8(16, 16, 0), gray8(32, 16, 0)],
        Layout::Tiled(16),
    ))
    .await;
    let merge = GrayMerge::from_file(&mismatched).unwrap();
    assert!(matches!(
        merge.validate(),
        Err(RasterError::Precondition(PreconditionError::DimensionMismatch(_)))
    ));

    let wide = open_memory(build_simple(
        &[gray16(16, 16, &[0; 256]), gray16(16, 16, &[0; 256])],
        Layout::Tiled(16),
    ))
    .await;
    let merge = GrayMerge::from_file(&wide).unwrap();
    assert!(matches!(
        merge.validate(),
        Err(RasterError::Precondition(PreconditionError::NotGray8 { bits: 16, .. }))
    ));
}

fn tiled_file(raster: &Raster, tile_width: u32, tile_height: u32) -> Vec<u8> {
    let mut writer = new_writer();
    let mut dir = DirectoryBuilder::new(raster.width(), raster.height());
    dir.set_tiled(tile_width, tile_height);
    RasterWriter::new(&mut writer).write(raster, dir).unwrap();
    finish(writer)
}

#[tokio::test]
async fn test_merge_rejects_mixed_tile_shapes() {
    // same tile byte size, different shapes
    let red = open_memory(tiled_file(&gray8(32, 32, 1), 16, 32)).await;
    let green = open_memory(tiled_file(&gray8(32, 32, 2), 32, 16)).await;
    assert_eq!(
        red.directory(0).unwrap().tile_len(),
        green.directory(0).unwrap().tile_len()
    );

    let merge = GrayMerge::new(vec![GraySource::new(&red, 0), GraySource::new(&green, 0)]).unwrap();
    assert!(matches!(
        merge.validate(),
        Err(RasterError::Precondition(PreconditionError::ChunkSizeMismatch { directory: 0, .. }))
    ));

    let mut writer = new_writer();
    assert!(merge.write_to(&mut writer, &TagCopier::new()).await.is_err());
    assert_eq!(writer.directory_count(), 0);
}

#[tokio::test]
async fn test_merge_same_tile_shape_from_separate_files() {
    let planes = [gray8(32, 32, 1), gray8(32, 32, 2)];
    let red = open_memory(tiled_file(&planes[0], 16, 32)).await;
    let green = open_memory(tiled_file(&planes[1], 16, 32)).await;

    let merge = GrayMerge::new(vec![GraySource::new(&red, 0), GraySource::new(&green, 0)]).unwrap();
    let mut writer = new_writer();
    merge.write_to(&mut writer, &TagCopier::new()).await.unwrap();

    let out = open_memory(finish(writer)).await;
    let rgb = RasterReader::new(&out).read(0).await.unwrap();
    for y in 0..32 {
        for x in 0..32 {
            let pixel = rgb.pixel(x, y).unwrap();
            assert_eq!(pixel[0], planes[0].pixel(x, y).unwrap()[0]);
            assert_eq!(pixel[1], planes[1].pixel(x, y).unwrap()[0]);
        }
    }
}

// =============================================================================
// Colorize
// =============================================================================

const PALETTE: &str = "\
# index,name,red,green,blue,lower,upper
0,DAPI,255,0,0,0,2000
1,CD3,0,255,0,1000,5000
2,CD8,0,0,255,0,100
";

#[tokio::test]
async fn test_colorize_two_channels() {
    let dirs = [gray16_tiles(&[1000, 1000], 2), gray16_tiles(&[3000, 5000], 2)];
    let file = open_memory(build_simple(&dirs, Layout::Tiled(16))).await;
    let palette = Palette::parse(PALETTE).unwrap();

    let colorizer = Colorizer::new(&file, &palette, &[0, 1]).unwrap();
    let copier = TagCopier::new().with_compression(5);
    let mut writer = new_writer();
    colorizer.write_to(&mut writer, &copier).await.unwrap();

    let out = open_memory(finish(writer)).await;
    let dir = out.directory(0).unwrap();
    assert_eq!(dir.compression(), 5);
    let rgb = RasterReader::new(&out).read(0).await.unwrap();
    assert_eq!(rgb.mode(), Mode::Rgb8);
    // red: 1000 in [0, 2000] -> 127; green: 3000 in [1000, 5000] -> 127
    assert_eq!(rgb.pixel(0, 0).unwrap(), &[127, 127, 0]);
    // green saturates at the upper bound
    assert_eq!(rgb.pixel(31, 15).unwrap(), &[127, 255, 0]);
}

#[tokio::test]
async fn test_colorize_preconditions() {
    let dirs = [gray16_tiles(&[0], 1), gray16_tiles(&[0], 1)];
    let tiled = open_memory(build_simple(&dirs, Layout::Tiled(16))).await;
    let palette = Palette::parse(PALETTE).unwrap();

    assert!(matches!(
        Colorizer::new(&tiled, &palette, &[]),
        Err(PreconditionError::NoChannelsSelected)
    ));
    assert!(matches!(
        Colorizer::new(&tiled, &palette, &[0, 3]),
        Err(PreconditionError::ChannelNotInPalette { channel: 3, palette: 3 })
    ));
    assert!(matches!(
        Colorizer::new(&tiled, &palette, &[2]),
        Err(PreconditionError::ChannelNotInImage { channel: 2, directories: 2 })
    ));

    let strips = open_memory(build_simple(&dirs, Layout::Strips(4))).await;
    let colorizer = Colorizer::new(&strips, &palette, &[0, 1]).unwrap();
    let mut writer = new_writer();
    let result = colorizer.write_to(&mut writer, &TagCopier::new()).await;
    assert!(matches!(
        result,
        Err(RasterError::Precondition(PreconditionError::NotTiled(0)))
    ));
}

#[tokio::test]
async fn test_palette_file_loading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("palette.csv");
    std::fs::write(&path, PALETTE).unwrap();

    let palette = Palette::load(&path).await.unwrap();
    assert_eq!(palette.len(), 3);
    assert_eq!(palette.get(1).unwrap().name, "CD3");

    let missing = Palette::load(dir.path().join("missing.csv")).await;
    assert!(missing.is_err());
}

// =============================================================================
// Noise Suppression
// =============================================================================

#[tokio::test]
async fn test_suppression_drops_flat_dark_tiles() {
    // dark flat, bright flat, dark flat, dark with strong spread
    let mut raster = gray16_tiles(&[10, 1000, 20, 0], 2);
    for y in 16..32 {
        for x in 16..24 {
            raster.set_pixel(x, y, &2000u16.to_ne_bytes()).unwrap();
        }
    }
    let file = open_memory(build_simple(std::slice::from_ref(&raster), Layout::Tiled(16))).await;

    let suppressor = NoiseSuppressor::new(&file).with_thresholds(SuppressionThresholds::default());
    let mut writer = new_writer();
    let report = suppressor
        .write_to(&mut writer, &TagCopier::new().with_compression(5))
        .await
        .unwrap();
    assert_eq!(report.directories.len(), 1);
    assert_eq!(report.directories[0].tiles, 4);
    assert_eq!(report.directories[0].dropped, 2);
    assert_eq!(report.directories[0].drop_rate(), 0.5);

    let out = open_memory(finish(writer)).await;
    assert_eq!(out.directory(0).unwrap().compression(), 5);
    let back = RasterReader::new(&out).read(0).await.unwrap();
    assert_eq!(back.sample(0, 0, 0).unwrap(), 0);
    assert_eq!(back.sample(20, 0, 0).unwrap(), 1000);
    assert_eq!(back.sample(0, 20, 0).unwrap(), 0);
    assert_eq!(back.sample(20, 20, 0).unwrap(), 2000);
    assert_eq!(back.sample(30, 20, 0).unwrap(), 0);
}

#[tokio::test]
async fn test_suppression_requires_tiles() {
    let file = open_memory(build_simple(&[gray8(16, 16, 0)], Layout::Strips(8))).await;
    let mut writer = new_writer();
    let result = NoiseSuppressor::new(&file)
        .write_to(&mut writer, &TagCopier::new())
        .await;
    assert!(matches!(
        result,
        Err(RasterError::Precondition(PreconditionError::NotTiled(0)))
    ));
}

// =============================================================================
// Channel Means
// =============================================================================

#[tokio::test]
async fn test_streamed_mean_matches_raster_mean() {
    // 20x20 with 16x16 tiles: edge tiles are mostly padding
    let raster = gray8(20, 20, 7);
    let expected = raster.mean().unwrap();

    for layout in [Layout::Tiled(16), Layout::Strips(3)] {
        let file = open_memory(build_simple(std::slice::from_ref(&raster), layout)).await;
        let means = directory_mean(&file, 0).await.unwrap();
        assert_eq!(means.pixels, 400);
        assert_eq!(means, expected, "layout {:?}", layout);
    }
}

#[tokio::test]
async fn test_rgb_mean() {
    let mut raster = Raster::new(2, 1, Mode::Rgb8);
    raster.set_pixel(0, 0, &[10, 20, 30]).unwrap();
    raster.set_pixel(1, 0, &[30, 40, 50]).unwrap();
    let file = open_memory(build_simple(std::slice::from_ref(&raster), Layout::Strips(1))).await;

    let means = directory_mean(&file, 0).await.unwrap();
    assert_eq!((means.r, means.g, means.b), (20.0, 30.0, 40.0));
    assert_eq!(means.gray, 0.0);

    let json = serde_json::to_value(&means).unwrap();
    assert_eq!(json["mode"], "rgb8");
    assert_eq!(json["pixels"], 2);
}
