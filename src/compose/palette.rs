//! Channel palettes for false-color composition.
//!
//! A palette file has one channel per line:
//!
//! ```text
//! # index,name,red,green,blue,lower,upper
//! 0,DAPI,0,0,255,300,4000
//! 1,CD3,255,0,0,500,2500
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::fmt;
use std::path::Path;

use crate::error::{PaletteError, PreconditionError};

/// One palette entry: a tint color and the window applied to raw samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub number: i32,
    pub name: String,
    pub color: [u8; 3],
    pub lower: u16,
    pub upper: u16,
}

impl Channel {
    /// Parse one `index,name,r,g,b,lower,upper` line.
    pub fn parse(line: &str, line_number: usize) -> Result<Self, PaletteError> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 7 {
            return Err(PaletteError::Malformed {
                line: line_number,
                message: format!("expected 7 fields, found {}", fields.len()),
            });
        }

        fn field<T: std::str::FromStr>(raw: &str, what: &str, line: usize) -> Result<T, PaletteError> {
            raw.trim().parse().map_err(|_| PaletteError::Malformed {
                line,
                message: format!("invalid {} '{}'", what, raw.trim()),
            })
        }

        Ok(Self {
            number: field(fields[0], "channel index", line_number)?,
            name: fields[1].trim().to_string(),
            color: [
                field(fields[2], "red", line_number)?,
                field(fields[3], "green", line_number)?,
                field(fields[4], "blue", line_number)?,
            ],
            lower: field(fields[5], "lower bound", line_number)?,
            upper: field(fields[6], "upper bound", line_number)?,
        })
    }

    /// Affine window: `lower` and below map to 0, `upper` and above to 255.
    pub fn window(&self, value: u32) -> u8 {
        let (lower, upper) = (self.lower as u32, self.upper as u32);
        if value <= lower {
            0
        } else if value >= upper {
            255
        } else {
            ((value - lower) * 255 / (upper - lower)) as u8
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.color;
        write!(
            f,
            "{}:{} RGB({}, {}, {}) [{},{}]",
            self.number, self.name, r, g, b, self.lower, self.upper
        )
    }
}

/// Blend windowed samples into one RGB pixel.
///
/// Each component is the color-weighted sum of the windowed values,
/// clamped to `255 * 255` and divided by 255.
pub fn combine(values: &[u32], channels: &[&Channel]) -> [u8; 3] {
    let mut sums = [0u32; 3];
    for (&value, channel) in values.iter().zip(channels) {
        let windowed = channel.window(value) as u32;
        for (sum, &tint) in sums.iter_mut().zip(&channel.color) {
            *sum += tint as u32 * windowed;
        }
    }
    sums.map(|sum| (sum.min(255 * 255) / 255) as u8)
}

/// Channels in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Palette {
    channels: Vec<Channel>,
}

impl Palette {
    pub fn parse(text: &str) -> Result<Self, PaletteError> {
        let channels = text
            .lines()
            .enumerate()
            .filter(|(_, line)| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with('#')
            })
            .map(|(i, line)| Channel::parse(line, i + 1))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { channels })
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PaletteError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PaletteError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Channel> {
        self.channels.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    /// Entries at the given positions.
    ///
    /// # Errors
    /// `NoChannelsSelected` for an empty selection and `ChannelNotInPalette`
    /// when the largest position is past the end.
    pub fn select(&self, positions: &[usize]) -> Result<Vec<&Channel>, PreconditionError> {
        let max = positions
            .iter()
            .copied()
            .max()
            .ok_or(PreconditionError::NoChannelsSelected)?;
        if max >= self.channels.len() {
            return Err(PreconditionError::ChannelNotInPalette {
                channel: max,
                palette: self.channels.len(),
            });
        }
        Ok(positions.iter().map(|&p| &self.channels[p]).collect())
    }
}
