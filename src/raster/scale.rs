//! Data-parallel downsampling.

use rayon::prelude::*;
use tracing::debug;

use crate::error::{PreconditionError, RasterError};

use super::{Mode, Raster};

/// How each output pixel aggregates its input window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleMethod {
    /// Integer mean of the window
    #[default]
    Mean,
    /// Most frequent value, smallest on ties
    Mode,
}

impl Raster {
    /// Downsample by `factor` in `(0, 1]`.
    ///
    /// The output is `ceil(factor * width) x ceil(factor * height)`. Output
    /// pixel `(i, j)` covers the `ceil(1 / factor)` square window starting at
    /// `(round(i / factor), round(j / factor))`, clipped to the image. Rows
    /// are computed in parallel on a pool of `threads` threads (0 lets rayon
    /// choose).
    ///
    /// # Errors
    /// - `InvalidScale` for a factor outside `(0, 1]`
    /// - `UnsupportedMode` for anything but Gray8 and Rgb8
    /// - `ThreadPool` if the worker threads cannot be spawned
    pub fn scale(&self, factor: f64, method: ScaleMethod, threads: usize) -> Result<Raster, RasterError> {
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(PreconditionError::InvalidScale(factor.to_string()).into());
        }
        let mode = self.mode();
        if !matches!(mode, Mode::Gray8 | Mode::Rgb8) {
            return Err(PreconditionError::UnsupportedMode {
                samples: mode.channels() as u16,
                bits: mode.bits_per_sample(),
            }
            .into());
        }

        let out_width = (factor * self.width() as f64).ceil() as u32;
        let out_height = (factor * self.height() as f64).ceil() as u32;
        let window = (1.0 / factor).ceil() as u32;
        let mut out = Raster::new(out_width, out_height, mode);
        if out_width == 0 || out_height == 0 {
            return Ok(out);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("scale-{}", idx))
            .build()
            .map_err(|e| RasterError::ThreadPool(e.to_string()))?;

        let channels = mode.channels();
        let out_row_bytes = out.row_bytes();
        pool.install(|| {
            out.as_bytes_mut()
                .par_chunks_mut(out_row_bytes)
                .enumerate()
                .for_each(|(oy, row)| {
                    let y0 = window_start(oy as u32, factor, self.height());
                    let y1 = (y0 + window).min(self.height());
                    let mut histogram = [0u32; 256];
                    for ox in 0..out_width {
                        let x0 = window_start(ox, factor, self.width());
                        let x1 = (x0 + window).min(self.width());
                        for c in 0..channels {
                            let value = match method {
                                ScaleMethod::Mean => self.window_mean(x0..x1, y0..y1, c),
                                ScaleMethod::Mode => {
                                    self.window_mode(x0..x1, y0..y1, c, &mut histogram)
                                }
                            };
                            row[ox as usize * channels + c] = value;
                        }
                    }
                });
        });

        debug!(
            from = %format!("{}x{}", self.width(), self.height()),
            to = %format!("{}x{}", out_width, out_height),
            factor,
            ?method,
            "scaled raster"
        );
        Ok(out)
    }

    fn window_mean(&self, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>, channel: usize) -> u8 {
        let channels = self.mode().channels();
        let row_bytes = self.row_bytes();
        let data = self.as_bytes();
        let mut sum = 0u64;
        let mut count = 0u64;
        for y in ys {
            let row = &data[y as usize * row_bytes..];
            for x in xs.clone() {
                sum += row[x as usize * channels + channel] as u64;
                count += 1;
            }
        }
        if count == 0 {
            0
        } else {
            (sum / count) as u8
        }
    }

    fn window_mode(
        &self,
        xs: std::ops::Range<u32>,
        ys: std::ops::Range<u32>,
        channel: usize,
        histogram: &mut [u32; 256],
    ) -> u8 {
        histogram.fill(0);
        let channels = self.mode().channels();
        let row_bytes = self.row_bytes();
        let data = self.as_bytes();
        for y in ys {
            let row = &data[y as usize * row_bytes..];
            for x in xs.clone() {
                histogram[row[x as usize * channels + channel] as usize] += 1;
            }
        }
        // max_by_key keeps the last maximum, so walk from the top down
        histogram
            .iter()
            .enumerate()
            .rev()
            .max_by_key(|&(_, &n)| n)
            .map_or(0, |(value, _)| value as u8)
    }
}

fn window_start(index: u32, factor: f64, limit: u32) -> u32 {
    ((index as f64 / factor).round() as u32).min(limit.saturating_sub(1))
}
