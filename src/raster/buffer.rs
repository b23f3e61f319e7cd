//! Owned pixel buffers.

use crate::error::PreconditionError;

use super::Mode;

/// A flat, row-major pixel buffer of `width * height` pixels.
///
/// Multi-byte samples are stored in native byte order. The buffer is owned
/// by exactly one value and moves between components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    mode: Mode,
    data: Vec<u8>,
}

impl Raster {
    /// A zero-filled raster.
    pub fn new(width: u32, height: u32, mode: Mode) -> Self {
        let len = width as usize * height as usize * mode.pixel_bytes();
        Self {
            width,
            height,
            mode,
            data: vec![0; len],
        }
    }

    /// Wrap existing pixel data.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` if `data` is not exactly
    /// `width * height * pixel_bytes` long.
    pub fn from_vec(width: u32, height: u32, mode: Mode, data: Vec<u8>) -> Result<Self, PreconditionError> {
        let expected = width as usize * height as usize * mode.pixel_bytes();
        if data.len() != expected {
            return Err(PreconditionError::DimensionMismatch(format!(
                "{}x{} {} raster needs {} bytes, got {}",
                width,
                height,
                mode,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            mode,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Bytes in one row.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.mode.pixel_bytes()
    }

    /// One full row.
    pub fn row(&self, y: u32) -> Result<&[u8], PreconditionError> {
        self.check(0, y)?;
        let start = y as usize * self.row_bytes();
        Ok(&self.data[start..start + self.row_bytes()])
    }

    fn check(&self, x: u32, y: u32) -> Result<(), PreconditionError> {
        if x >= self.width || y >= self.height {
            return Err(PreconditionError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.mode.pixel_bytes()
    }

    /// Element bytes of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Result<&[u8], PreconditionError> {
        self.check(x, y)?;
        let start = self.offset(x, y);
        Ok(&self.data[start..start + self.mode.pixel_bytes()])
    }

    /// Overwrite pixel `(x, y)`.
    pub fn set_pixel(&mut self, x: u32, y: u32, value: &[u8]) -> Result<(), PreconditionError> {
        self.check(x, y)?;
        if value.len() != self.mode.pixel_bytes() {
            return Err(PreconditionError::DimensionMismatch(format!(
                "{} pixel needs {} bytes, got {}",
                self.mode,
                self.mode.pixel_bytes(),
                value.len()
            )));
        }
        let start = self.offset(x, y);
        self.data[start..start + value.len()].copy_from_slice(value);
        Ok(())
    }

    /// One sample of pixel `(x, y)`, widened to u32.
    pub fn sample(&self, x: u32, y: u32, channel: usize) -> Result<u32, PreconditionError> {
        if channel >= self.mode.channels() {
            return Err(PreconditionError::ChannelOutOfBounds {
                channel,
                channels: self.mode.channels(),
            });
        }
        let pixel = self.pixel(x, y)?;
        let size = self.mode.element_size();
        Ok(read_sample(&pixel[channel * size..(channel + 1) * size]))
    }
}

/// Widen one native-order sample of 1, 2 or 4 bytes.
pub(crate) fn read_sample(bytes: &[u8]) -> u32 {
    match *bytes {
        [b] => b as u32,
        [a, b] => u16::from_ne_bytes([a, b]) as u32,
        [a, b, c, d] => u32::from_ne_bytes([a, b, c, d]),
        _ => 0,
    }
}
