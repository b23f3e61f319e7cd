//! Tag copy integration tests.
//!
//! Tests verify descriptive tags survive a write, a re-read and a copy
//! into a new file, with orientation normalized on the way.

use std::io::Cursor;

use tiffo::copy::TagCopier;
use tiffo::format::tiff::{orientation, DirectoryBuilder, TagValue, TiffTag, TiffWriter, WriterOptions};
use tiffo::raster::{RasterReader, RasterWriter};

use super::test_utils::{gray8, open_memory};

#[tokio::test]
async fn test_tags_survive_copy() {
    let raster = gray8(32, 32, 1);
    let mut writer = TiffWriter::new(Cursor::new(Vec::new()), WriterOptions::default()).unwrap();
    let mut dir = DirectoryBuilder::new(32, 32);
    dir.set_tiled(16, 16)
        .set_tag(TiffTag::ImageDescription, TagValue::ascii("DAPI"))
        .set_tag(TiffTag::Software, TagValue::ascii("acquire 2.1"))
        .set_tag(TiffTag::XResolution, TagValue::Rational(vec![(300, 1)]))
        .set_short(TiffTag::ResolutionUnit, 2)
        .set_short(TiffTag::Orientation, orientation::BOT_RIGHT)
        .set_tag(TiffTag::PageNumber, TagValue::Short(vec![1, 4]));
    RasterWriter::new(&mut writer).write(&raster, dir).unwrap();
    let source = open_memory(writer.finish().unwrap().into_inner()).await;

    let src_dir = source.directory(0).unwrap();
    let copier = TagCopier::new().with_compression(8);
    let builder = copier.copy_all(src_dir);
    assert_eq!(builder.get_u16(TiffTag::Orientation), Some(orientation::BOT_LEFT));

    let mut writer = TiffWriter::new(Cursor::new(Vec::new()), WriterOptions::default()).unwrap();
    RasterWriter::new(&mut writer).write(&raster, builder).unwrap();
    let copied = open_memory(writer.finish().unwrap().into_inner()).await;

    let dir = copied.directory(0).unwrap();
    assert_eq!(dir.get_tag(TiffTag::ImageDescription), Some(&TagValue::ascii("DAPI")));
    assert_eq!(dir.get_tag(TiffTag::Software), Some(&TagValue::ascii("acquire 2.1")));
    assert_eq!(
        dir.get_tag(TiffTag::XResolution),
        Some(&TagValue::Rational(vec![(300, 1)]))
    );
    assert_eq!(dir.get_u16(TiffTag::ResolutionUnit), Some(2));
    assert_eq!(dir.get_tag(TiffTag::PageNumber), Some(&TagValue::Short(vec![1, 4])));
    assert_eq!(dir.compression(), 8);
    assert_eq!(RasterReader::new(&copied).read(0).await.unwrap(), raster);
}

#[tokio::test]
async fn test_copy_to_strips() {
    let raster = gray8(40, 30, 2);
    let mut writer = TiffWriter::new(Cursor::new(Vec::new()), WriterOptions::default()).unwrap();
    let mut dir = DirectoryBuilder::new(40, 30);
    dir.set_tiled(16, 16);
    RasterWriter::new(&mut writer).write(&raster, dir).unwrap();
    let source = open_memory(writer.finish().unwrap().into_inner()).await;

    let builder = TagCopier::new()
        .with_strips(0)
        .copy_all(source.directory(0).unwrap());
    assert!(!builder.is_tiled());
    assert_eq!(builder.get_u32(TiffTag::RowsPerStrip), Some(30));

    let mut writer = TiffWriter::new(Cursor::new(Vec::new()), WriterOptions::default()).unwrap();
    RasterWriter::new(&mut writer).write(&raster, builder).unwrap();
    let copied = open_memory(writer.finish().unwrap().into_inner()).await;
    assert!(!copied.directory(0).unwrap().is_tiled());
    assert_eq!(RasterReader::new(&copied).read(0).await.unwrap(), raster);
}
