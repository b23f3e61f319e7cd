//! Block cache effectiveness integration tests.
//!
//! Tests verify:
//! - Opening a file through the block cache issues fewer reads
//! - Repeated tile reads are served from cached blocks
//! - Concurrent tile reads agree with sequential ones

use std::sync::Arc;

use tiffo::format::tiff::TiffFile;
use tiffo::io::BlockCache;
use tiffo::raster::{Raster, RasterReader};

use super::test_utils::{build_simple, gray8, Layout, TrackingMockReader};

fn multi_directory_tiff() -> (Vec<Raster>, Vec<u8>) {
    let rasters: Vec<Raster> = (0..4).map(|seed| gray8(64, 64, seed)).collect();
    let data = build_simple(&rasters, Layout::Tiled(16));
    (rasters, data)
}

#[tokio::test]
async fn test_open_through_cache_reduces_requests() {
    let (_, data) = multi_directory_tiff();

    let direct = TrackingMockReader::new(data.clone(), "direct.tif");
    let direct_file = TiffFile::open(direct.clone()).await.unwrap();
    assert_eq!(direct_file.directory_count(), 4);
    let direct_requests = direct.request_count();

    let tracked = TrackingMockReader::new(data, "cached.tif");
    let cached = BlockCache::with_capacity(tracked.clone(), 4096, 16);
    let cached_file = TiffFile::open(cached).await.unwrap();
    assert_eq!(cached_file.directory_count(), 4);

    println!(
        "direct: {} requests, cached: {} requests",
        direct_requests,
        tracked.request_count()
    );
    assert!(tracked.request_count() < direct_requests);
}

#[tokio::test]
async fn test_repeated_tile_reads_hit_cache() {
    let (rasters, data) = multi_directory_tiff();
    let tracked = TrackingMockReader::new(data.clone(), "cached.tif");
    // one block holds the whole file
    let cache = BlockCache::with_capacity(tracked.clone(), data.len(), 1);
    let file = TiffFile::open(cache).await.unwrap();
    tracked.reset_tracking();

    for _ in 0..3 {
        let tile = file.read_tile(2, 16, 32).await.unwrap();
        let expected: Vec<u8> = (32..48)
            .flat_map(|y| rasters[2].row(y).unwrap()[16..32].to_vec())
            .collect();
        assert_eq!(tile, expected);
    }
    assert_eq!(tracked.request_count(), 0);
}

#[tokio::test]
async fn test_requests_are_block_aligned() {
    let (_, data) = multi_directory_tiff();
    let tracked = TrackingMockReader::new(data, "cached.tif");
    let cache = BlockCache::with_capacity(tracked.clone(), 1024, 64);
    let file = TiffFile::open(cache).await.unwrap();
    RasterReader::new(&file).read(1).await.unwrap();

    for (offset, _) in tracked.get_requests().await {
        assert_eq!(offset % 1024, 0, "unaligned block fetch at {}", offset);
    }
}

#[tokio::test]
async fn test_concurrent_tile_reads() {
    let (rasters, data) = multi_directory_tiff();
    let cache = BlockCache::with_capacity(TrackingMockReader::new(data, "cached.tif"), 2048, 8);
    let file = Arc::new(TiffFile::open(cache).await.unwrap());

    let mut handles = Vec::new();
    for directory in 0..4 {
        let file = Arc::clone(&file);
        handles.push(tokio::spawn(async move {
            RasterReader::new(&*file).read(directory).await.unwrap()
        }));
    }

    for (directory, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), rasters[directory]);
    }
}
