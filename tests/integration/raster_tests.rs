//! Whole-directory raster integration tests.
//!
//! Tests verify:
//! - Tiled and strip directories rasterize to the same pixels
//! - The image lifecycle (read, access, clear)
//! - Copying a directory through the tag copier on disk
//! - Scaled rasters write out with their new geometry

use tiffo::copy::TagCopier;
use tiffo::error::{PreconditionError, RasterError};
use tiffo::format::tiff::{ByteOrder, ReaderOptions, TiffFile, TiffTag, TiffWriter, WriterOptions};
use tiffo::raster::{Image, Mode, Raster, RasterReader, RasterWriter, ScaleMethod};

use super::test_utils::{build_simple, build_tiff, gray8, open_memory, Layout};

// =============================================================================
// Reading
// =============================================================================

#[tokio::test]
async fn test_tiled_and_strips_read_the_same() {
    let raster = gray8(37, 29, 5);
    let tiled = open_memory(build_simple(std::slice::from_ref(&raster), Layout::Tiled(16))).await;
    let strips = open_memory(build_simple(std::slice::from_ref(&raster), Layout::Strips(7))).await;

    let from_tiles = RasterReader::new(&tiled).read(0).await.unwrap();
    let from_strips = RasterReader::new(&strips).read(0).await.unwrap();
    assert_eq!(from_tiles, raster);
    assert_eq!(from_strips, raster);
}

#[tokio::test]
async fn test_rgb_round_trip() {
    let mut raster = Raster::new(20, 18, Mode::Rgb8);
    for y in 0..18 {
        for x in 0..20 {
            raster
                .set_pixel(x, y, &[x as u8 * 10, y as u8 * 10, (x + y) as u8])
                .unwrap();
        }
    }
    let file = open_memory(build_simple(std::slice::from_ref(&raster), Layout::Tiled(16))).await;

    let model = RasterReader::new(&file).model(0).unwrap();
    assert_eq!(model.raster_mode().unwrap(), Mode::Rgb8);
    assert_eq!(model.samples_per_pixel, 3);
    assert_eq!(RasterReader::new(&file).read(0).await.unwrap(), raster);
}

fn wide_rasters(width: u32, height: u32) -> [Raster; 2] {
    let count = width * height;
    let gray16: Vec<u8> = (0..count)
        .flat_map(|i| ((i * 1021 + 7) as u16).to_ne_bytes())
        .collect();
    let gray32: Vec<u8> = (0..count)
        .flat_map(|i| (i.wrapping_mul(2_654_435_761) ^ 0x00ff_00ff).to_ne_bytes())
        .collect();
    [
        Raster::from_vec(width, height, Mode::Gray16, gray16).unwrap(),
        Raster::from_vec(width, height, Mode::Gray32, gray32).unwrap(),
    ]
}

#[tokio::test]
async fn test_wide_samples_round_trip_with_edge_tiles() {
    for raster in wide_rasters(37, 29) {
        for byte_order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let options = WriterOptions {
                byte_order,
                bigtiff: false,
            };
            for (compression, predictor) in [(1u16, 1u16), (5, 2), (8, 2)] {
                let mut writer = TiffWriter::new(std::io::Cursor::new(Vec::new()), options).unwrap();
                let mut dir = tiffo::DirectoryBuilder::new(37, 29);
                dir.set_tiled(16, 16)
                    .set_short(TiffTag::Compression, compression)
                    .set_short(TiffTag::Predictor, predictor);
                RasterWriter::new(&mut writer).write(&raster, dir).unwrap();
                let file = open_memory(writer.finish().unwrap().into_inner()).await;

                let back = RasterReader::new(&file).read(0).await.unwrap();
                assert_eq!(back.mode(), raster.mode());
                assert_eq!(
                    back, raster,
                    "{} {:?} compression {} predictor {}",
                    raster.mode(), byte_order, compression, predictor
                );
            }
        }
    }
}

#[tokio::test]
async fn test_wide_samples_round_trip_through_strips() {
    for raster in wide_rasters(37, 29) {
        let data = build_tiff(
            std::slice::from_ref(&raster),
            Layout::Strips(6),
            5,
            WriterOptions {
                byte_order: ByteOrder::BigEndian,
                bigtiff: true,
            },
        );
        let file = open_memory(data).await;
        assert_eq!(RasterReader::new(&file).read(0).await.unwrap(), raster);
    }
}

// =============================================================================
// Image Lifecycle
// =============================================================================

#[tokio::test]
async fn test_image_lifecycle() {
    let raster = gray8(24, 24, 8);
    let file = open_memory(build_simple(std::slice::from_ref(&raster), Layout::Tiled(16))).await;

    let mut image = Image::open(&file, 0).unwrap();
    assert_eq!(image.model().width, 24);
    assert!(!image.is_rasterized());
    assert!(matches!(image.raster(), Err(PreconditionError::NotRasterized)));

    image.read(&file).await.unwrap();
    assert!(image.is_rasterized());
    assert_eq!(image.pixel(23, 23).unwrap(), raster.pixel(23, 23).unwrap());
    assert!(matches!(
        image.pixel(24, 0),
        Err(PreconditionError::OutOfBounds { .. })
    ));

    image.clear();
    assert!(!image.is_rasterized());
}

// =============================================================================
// Copy on Disk
// =============================================================================

#[tokio::test]
async fn test_copy_directory_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.tif");
    let output = dir.path().join("output.tif");

    let raster = gray8(50, 40, 2);
    std::fs::write(&input, build_simple(std::slice::from_ref(&raster), Layout::Strips(8))).unwrap();

    let file = TiffFile::open_path(&input, &ReaderOptions::default()).await.unwrap();
    let read = RasterReader::new(&file).read(0).await.unwrap();

    let copier = TagCopier::new().with_compression(5).with_tile_size(32, 32);
    let builder = copier.copy_all(file.directory(0).unwrap());
    let mut writer = TiffWriter::create(&output, WriterOptions::default()).unwrap();
    RasterWriter::new(&mut writer).write(&read, builder).unwrap();
    writer.finish().unwrap();

    let copied = TiffFile::open_path(&output, &ReaderOptions::default()).await.unwrap();
    let dir0 = copied.directory(0).unwrap();
    assert!(dir0.is_tiled());
    assert_eq!(dir0.get_u32(TiffTag::TileWidth), Some(32));
    assert_eq!(dir0.compression(), 5);
    assert_eq!(RasterReader::new(&copied).read(0).await.unwrap(), raster);
}

#[tokio::test]
async fn test_writer_rejects_unaligned_tiles() {
    let raster = gray8(20, 20, 0);
    let mut writer = TiffWriter::new(std::io::Cursor::new(Vec::new()), WriterOptions::default()).unwrap();
    let mut dir = tiffo::DirectoryBuilder::new(20, 20);
    dir.set_tiled(20, 20);

    let result = RasterWriter::new(&mut writer).write(&raster, dir);
    assert!(matches!(
        result,
        Err(RasterError::Precondition(PreconditionError::TileNotMultipleOf16 {
            width: 20,
            height: 20
        }))
    ));
}

// =============================================================================
// Scaling
// =============================================================================

#[tokio::test]
async fn test_scaled_raster_writes_new_geometry() {
    let raster = gray8(64, 48, 3);
    let file = open_memory(build_simple(std::slice::from_ref(&raster), Layout::Tiled(16))).await;
    let read = RasterReader::new(&file).read(0).await.unwrap();
    let scaled = read.scale(0.25, ScaleMethod::Mean, 2).unwrap();
    assert_eq!((scaled.width(), scaled.height()), (16, 12));

    let mut builder = TagCopier::new().copy_all(file.directory(0).unwrap());
    builder
        .set_long(TiffTag::ImageWidth, scaled.width())
        .set_long(TiffTag::ImageLength, scaled.height());
    let mut writer = TiffWriter::new(std::io::Cursor::new(Vec::new()), WriterOptions::default()).unwrap();
    RasterWriter::new(&mut writer).write(&scaled, builder).unwrap();
    let data = writer.finish().unwrap().into_inner();

    let out = open_memory(data).await;
    let dir = out.directory(0).unwrap();
    assert_eq!((dir.width(), dir.height()), (16, 12));
    assert_eq!(RasterReader::new(&out).read(0).await.unwrap(), scaled);
}
