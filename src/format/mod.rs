//! File format support.
//!
//! Only TIFF-family files are handled: classic TIFF and BigTIFF, tiled or
//! striped, in either byte order.

pub mod tiff;
