use std::fmt;

use serde::Serialize;

use crate::error::PreconditionError;
use crate::format::tiff::photometric;

/// Per-pixel storage layout of a raster.
///
/// Each mode fixes the element width (bytes per sample) and the number of
/// interleaved channels, so every allocation and address computation is
/// driven from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// One 8-bit sample
    Gray8,
    /// One 16-bit sample
    Gray16,
    /// One 32-bit sample
    Gray32,
    /// Interleaved 8-bit red, green, blue
    Rgb8,
    /// Four interleaved 8-bit samples
    Quad8,
}

impl Mode {
    /// Derive the mode from a directory's sample layout.
    ///
    /// The checks run in a fixed priority order: three samples means RGB
    /// before bit depth is looked at, then 8, 16 and 32 bits, then four
    /// samples.
    ///
    /// # Errors
    /// Returns `UnsupportedMode` when no rule matches.
    pub fn from_samples(samples_per_pixel: u16, bits_per_sample: u16) -> Result<Self, PreconditionError> {
        if samples_per_pixel == 3 {
            Ok(Mode::Rgb8)
        } else if bits_per_sample == 8 {
            Ok(Mode::Gray8)
        } else if bits_per_sample == 16 {
            Ok(Mode::Gray16)
        } else if bits_per_sample == 32 {
            Ok(Mode::Gray32)
        } else if samples_per_pixel == 4 {
            Ok(Mode::Quad8)
        } else {
            Err(PreconditionError::UnsupportedMode {
                samples: samples_per_pixel,
                bits: bits_per_sample,
            })
        }
    }

    /// Bytes per sample.
    pub const fn element_size(self) -> usize {
        match self {
            Mode::Gray8 | Mode::Rgb8 | Mode::Quad8 => 1,
            Mode::Gray16 => 2,
            Mode::Gray32 => 4,
        }
    }

    /// Samples per pixel.
    pub const fn channels(self) -> usize {
        match self {
            Mode::Gray8 | Mode::Gray16 | Mode::Gray32 => 1,
            Mode::Rgb8 => 3,
            Mode::Quad8 => 4,
        }
    }

    /// Bytes per pixel.
    pub const fn pixel_bytes(self) -> usize {
        self.element_size() * self.channels()
    }

    pub const fn bits_per_sample(self) -> u16 {
        (self.element_size() * 8) as u16
    }

    /// Photometric interpretation written for this mode when none is given.
    pub const fn default_photometric(self) -> u16 {
        match self {
            Mode::Gray8 | Mode::Gray16 | Mode::Gray32 => photometric::MIN_IS_BLACK,
            Mode::Rgb8 | Mode::Quad8 => photometric::RGB,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Mode::Gray8 => "gray8",
            Mode::Gray16 => "gray16",
            Mode::Gray32 => "gray32",
            Mode::Rgb8 => "rgb8",
            Mode::Quad8 => "quad8",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
