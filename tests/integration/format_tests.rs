//! Codec-level integration tests.
//!
//! Tests verify:
//! - Hand-built little-endian and big-endian files parse and decode
//! - BigTIFF output from the writer reads back
//! - Every encodable compression scheme survives a write/read cycle
//! - Strip files serve scanlines, tiled files pad edge tiles
//! - Header probing and header errors

use std::io::Cursor;

use tiffo::error::TiffError;
use tiffo::format::tiff::{
    ByteOrder, DirectoryBuilder, HeaderProbe, TiffFile, TiffTag, TiffVariant, TiffWriter,
    WriterOptions,
};
use tiffo::io::MemoryRangeReader;
use tiffo::raster::{Mode, Raster, RasterReader, RasterWriter};

use super::test_utils::{
    build_simple, build_tiff, create_raw_gray_tiff, gray16, gray8, gray_pattern, is_bigtiff_magic,
    is_tiff_magic, open_memory, Layout,
};

// =============================================================================
// Byte Order Tests
// =============================================================================

#[tokio::test]
async fn test_little_endian_tiff() {
    let data = create_raw_gray_tiff(ByteOrder::LittleEndian);
    assert_eq!(&data[..2], b"II");
    assert!(is_tiff_magic(&data));

    let file = open_memory(data).await;
    assert_eq!(file.byte_order(), ByteOrder::LittleEndian);
    assert_eq!(file.directory_count(), 1);

    let dir = file.directory(0).unwrap();
    assert_eq!((dir.width(), dir.height()), (16, 16));
    assert!(dir.is_tiled());
    assert_eq!(file.read_tile(0, 0, 0).await.unwrap(), gray_pattern(16, 16, 3));
}

#[tokio::test]
async fn test_big_endian_tiff() {
    let data = create_raw_gray_tiff(ByteOrder::BigEndian);
    assert_eq!(&data[..2], b"MM");
    assert!(is_tiff_magic(&data));

    let file = open_memory(data).await;
    assert_eq!(file.byte_order(), ByteOrder::BigEndian);
    let dir = file.directory(0).unwrap();
    assert_eq!(dir.get_u16(TiffTag::BitsPerSample), Some(8));
    assert_eq!(file.read_tile(0, 5, 5).await.unwrap(), gray_pattern(16, 16, 3));
}

#[tokio::test]
async fn test_big_endian_16bit_samples_are_native_after_read() {
    let samples: Vec<u16> = (0..256).map(|i| i * 250).collect();
    let raster = gray16(16, 16, &samples);
    let options = WriterOptions {
        byte_order: ByteOrder::BigEndian,
        bigtiff: false,
    };
    let data = build_tiff(std::slice::from_ref(&raster), Layout::Tiled(16), 1, options);

    let file = open_memory(data).await;
    let back = RasterReader::new(&file).read(0).await.unwrap();
    assert_eq!(back.mode(), Mode::Gray16);
    assert_eq!(back, raster);
    assert_eq!(back.sample(3, 0, 0).unwrap(), 750);
}

// =============================================================================
// BigTIFF Tests
// =============================================================================

#[tokio::test]
async fn test_bigtiff_round_trip() {
    let rasters = [gray8(40, 24, 1), gray8(40, 24, 2)];
    let options = WriterOptions {
        byte_order: ByteOrder::BigEndian,
        bigtiff: true,
    };
    let data = build_tiff(&rasters, Layout::Tiled(16), 5, options);
    assert!(is_bigtiff_magic(&data));
    assert!(!is_tiff_magic(&data));

    let probe = HeaderProbe::from_bytes(&data).unwrap();
    assert_eq!(probe.variant, TiffVariant::Big);
    assert_eq!(probe.format_id, 43);
    assert_eq!((probe.offset_field_start, probe.offset_field_len), (8, 8));

    let file = open_memory(data).await;
    assert!(file.is_bigtiff());
    assert_eq!(file.directory_count(), 2);
    let reader = RasterReader::new(&file);
    assert_eq!(reader.read(0).await.unwrap(), rasters[0]);
    assert_eq!(reader.read(1).await.unwrap(), rasters[1]);
}

// =============================================================================
// Compression Tests
// =============================================================================

#[tokio::test]
async fn test_lossless_compressions_round_trip() {
    let raster = gray8(40, 24, 9);
    for compression in [1u16, 5, 8, 32946, 32773] {
        let data = build_tiff(
            std::slice::from_ref(&raster),
            Layout::Tiled(16),
            compression,
            WriterOptions::default(),
        );
        let file = open_memory(data).await;
        assert_eq!(file.directory(0).unwrap().compression(), compression);
        let back = RasterReader::new(&file).read(0).await.unwrap();
        assert_eq!(back, raster, "compression {} changed pixels", compression);
    }
}

#[tokio::test]
async fn test_lzw_with_horizontal_predictor() {
    let raster = gray8(32, 16, 4);
    let mut writer = TiffWriter::new(Cursor::new(Vec::new()), WriterOptions::default()).unwrap();
    let mut dir = DirectoryBuilder::new(32, 16);
    dir.set_short(TiffTag::Compression, 5)
        .set_short(TiffTag::Predictor, 2)
        .set_tiled(16, 16);
    RasterWriter::new(&mut writer).write(&raster, dir).unwrap();
    let data = writer.finish().unwrap().into_inner();

    let file = open_memory(data).await;
    assert_eq!(file.directory(0).unwrap().predictor(), 2);
    assert_eq!(RasterReader::new(&file).read(0).await.unwrap(), raster);
}

#[tokio::test]
async fn test_jpeg_tiles_are_close() {
    // smooth gradient, which JPEG reproduces closely
    let data: Vec<u8> = (0..32u32 * 32)
        .map(|i| ((i % 32) * 4 + (i / 32) * 2) as u8)
        .collect();
    let raster = Raster::from_vec(32, 32, Mode::Gray8, data).unwrap();
    let tiff = build_tiff(
        std::slice::from_ref(&raster),
        Layout::Tiled(16),
        7,
        WriterOptions::default(),
    );

    let file = open_memory(tiff).await;
    let back = RasterReader::new(&file).read(0).await.unwrap();
    let max_error = back
        .as_bytes()
        .iter()
        .zip(raster.as_bytes())
        .map(|(&a, &b)| (a as i32 - b as i32).abs())
        .max()
        .unwrap();
    assert!(max_error < 24, "JPEG error too large: {}", max_error);
}

// =============================================================================
// Layout Tests
// =============================================================================

#[tokio::test]
async fn test_strip_scanlines() {
    let raster = gray8(30, 23, 6);
    let data = build_simple(std::slice::from_ref(&raster), Layout::Strips(5));

    let file = open_memory(data).await;
    let dir = file.directory(0).unwrap();
    assert!(!dir.is_tiled());
    assert_eq!(dir.get_u32(TiffTag::RowsPerStrip), Some(5));
    assert_eq!(dir.chunk_count(), 5);
    assert_eq!(dir.scanline_len(), 30);
    assert_eq!(dir.tile_len(), 0);

    for row in [0, 4, 5, 22] {
        let line = file.read_scanline(0, row).await.unwrap();
        assert_eq!(&line[..], raster.row(row).unwrap());
    }
    assert!(file.read_scanline(0, 23).await.is_err());
}

#[tokio::test]
async fn test_edge_tiles_are_padded() {
    let raster = gray8(20, 20, 2);
    let data = build_simple(std::slice::from_ref(&raster), Layout::Tiled(16));

    let file = open_memory(data).await;
    let dir = file.directory(0).unwrap();
    assert_eq!(dir.chunk_count(), 4);
    assert_eq!(dir.tile_len(), 256);

    let tile = file.read_tile(0, 16, 16).await.unwrap();
    assert_eq!(tile.len(), 256);
    // 4x4 real pixels in the corner, zeros elsewhere
    assert_eq!(tile[0], raster.pixel(16, 16).unwrap()[0]);
    assert_eq!(tile[3], raster.pixel(19, 16).unwrap()[0]);
    assert_eq!(tile[4], 0);
    assert!(tile[4 * 16..].iter().all(|&v| v == 0));
}

#[tokio::test]
async fn test_multiple_directories() {
    let rasters: Vec<Raster> = (0..3).map(|seed| gray8(16, 16, seed)).collect();
    let data = build_simple(&rasters, Layout::Tiled(16));

    let file = open_memory(data).await;
    assert_eq!(file.directory_count(), 3);
    for (index, raster) in rasters.iter().enumerate() {
        assert_eq!(file.directory(index).unwrap().index(), index);
        assert_eq!(file.read_tile(index, 0, 0).await.unwrap(), raster.as_bytes());
    }
    assert!(matches!(
        file.directory(3),
        Err(TiffError::DirectoryNotFound { index: 3, count: 3 })
    ));
}

#[tokio::test]
async fn test_directory_summary() {
    let data = build_tiff(&[gray8(24, 16, 0)], Layout::Tiled(16), 5, WriterOptions::default());
    let file = open_memory(data).await;
    let summary = file.directory(0).unwrap().summary();

    assert_eq!((summary.width, summary.height), (24, 16));
    assert_eq!(summary.compression, "LZW");
    let width = summary.tags.iter().find(|t| t.id == 256).unwrap();
    assert_eq!(width.name, "ImageWidth");
    assert_eq!(width.count, 1);
    assert_eq!(width.value, "24");

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["layout"]["kind"], "tiled");
}

// =============================================================================
// Header Tests
// =============================================================================

#[test]
fn test_probe_classic_header() {
    let data = create_raw_gray_tiff(ByteOrder::BigEndian);
    let probe = HeaderProbe::from_bytes(&data).unwrap();
    assert_eq!(probe.byte_order, ByteOrder::BigEndian);
    assert_eq!(probe.variant, TiffVariant::Classic);
    assert_eq!(probe.variant.offset_bits(), 32);
    assert_eq!((probe.offset_field_start, probe.offset_field_len), (4, 4));
    assert_eq!(probe.first_directory_offset, 8);
}

#[tokio::test]
async fn test_invalid_magic_is_rejected() {
    let mut data = create_raw_gray_tiff(ByteOrder::LittleEndian);
    data[0] = b'X';
    data[1] = b'Y';
    assert!(matches!(
        HeaderProbe::from_bytes(&data),
        Err(TiffError::InvalidMagic(_))
    ));

    let result = TiffFile::open(MemoryRangeReader::new(data, "bad.tif")).await;
    assert!(matches!(result, Err(TiffError::InvalidMagic(_))));
}

#[tokio::test]
async fn test_invalid_version_and_truncation() {
    let mut data = create_raw_gray_tiff(ByteOrder::LittleEndian);
    data[2] = 41;
    assert!(matches!(
        HeaderProbe::from_bytes(&data),
        Err(TiffError::InvalidVersion(41))
    ));

    assert!(matches!(
        HeaderProbe::from_bytes(b"II"),
        Err(TiffError::FileTooSmall { .. })
    ));

    let mut data = create_raw_gray_tiff(ByteOrder::LittleEndian);
    // first IFD offset past the end of the file
    data[4..8].copy_from_slice(&10_000u32.to_le_bytes());
    let result = TiffFile::open(MemoryRangeReader::new(data, "bad.tif")).await;
    assert!(result.is_err());
}
