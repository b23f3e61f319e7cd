use crate::error::{PreconditionError, RasterError};
use crate::format::tiff::TiffFile;
use crate::io::RangeReader;

use super::{DirectoryModel, Raster, RasterReader};

/// A directory and, once read, its pixels.
///
/// Pixels are only reachable after a successful [`Image::read`]; asking
/// before that is a precondition error.
#[derive(Debug, Clone)]
pub struct Image {
    model: DirectoryModel,
    raster: Option<Raster>,
}

impl Image {
    pub fn new(model: DirectoryModel) -> Self {
        Self {
            model,
            raster: None,
        }
    }

    /// Load the model of `directory` from `file`.
    pub fn open<R: RangeReader>(file: &TiffFile<R>, directory: usize) -> Result<Self, RasterError> {
        Ok(Self::new(DirectoryModel::from_directory(file.directory(directory)?)))
    }

    pub fn model(&self) -> &DirectoryModel {
        &self.model
    }

    /// Rasterize the directory. A failed read leaves the image unrasterized.
    pub async fn read<R: RangeReader>(&mut self, file: &TiffFile<R>) -> Result<(), RasterError> {
        self.raster = None;
        let raster = RasterReader::new(file).read_model(&self.model).await?;
        self.raster = Some(raster);
        Ok(())
    }

    pub fn is_rasterized(&self) -> bool {
        self.raster.is_some()
    }

    pub fn raster(&self) -> Result<&Raster, PreconditionError> {
        self.raster.as_ref().ok_or(PreconditionError::NotRasterized)
    }

    pub fn raster_mut(&mut self) -> Result<&mut Raster, PreconditionError> {
        self.raster.as_mut().ok_or(PreconditionError::NotRasterized)
    }

    /// Move the raster out, leaving the image unrasterized.
    pub fn take_raster(&mut self) -> Result<Raster, PreconditionError> {
        self.raster.take().ok_or(PreconditionError::NotRasterized)
    }

    /// Free the pixel buffer.
    pub fn clear(&mut self) {
        self.raster = None;
    }

    pub fn pixel(&self, x: u32, y: u32) -> Result<&[u8], PreconditionError> {
        self.raster()?.pixel(x, y)
    }
}
