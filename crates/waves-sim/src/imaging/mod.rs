//! Exposure imaging and aperture patterns.
//!
//! An [`Exposure`] integrates the field at one z layer over a fixed number of
//! steps, like a long camera exposure, then normalizes the result and hands it
//! to an [`ImageWriter`].

pub mod pattern;

pub use pattern::{ApertureMask, ImagePatternDecoder, PatternDecoder};

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use waves_core::{Cell, Grid};

/// Receives finished exposures.
pub trait ImageWriter: Send {
    /// Store a `width x height` row-major brightness buffer with values in
    /// `[0, 1]` as frame number `frame`.
    fn write_frame(
        &mut self,
        width: usize,
        height: usize,
        brightness: &[f32],
        frame: u64,
    ) -> SimResult<()>;
}

/// Writes grayscale PNG files named `{frame:08}.png` into a folder.
#[derive(Debug, Clone)]
pub struct PngWriter {
    folder: PathBuf,
}

impl PngWriter {
    /// Writer for `folder`, created if missing.
    pub fn new(folder: impl AsRef<Path>) -> SimResult<Self> {
        let folder = folder.as_ref().to_path_buf();
        std::fs::create_dir_all(&folder)?;
        Ok(Self { folder })
    }

    /// Output path of a frame.
    pub fn frame_path(&self, frame: u64) -> PathBuf {
        self.folder.join(format!("{frame:08}.png"))
    }
}

impl ImageWriter for PngWriter {
    fn write_frame(
        &mut self,
        width: usize,
        height: usize,
        brightness: &[f32],
        frame: u64,
    ) -> SimResult<()> {
        let pixels: Vec<u8> = brightness
            .iter()
            .map(|b| (b.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        let path = self.frame_path(frame);
        image::save_buffer(
            &path,
            &pixels,
            width as u32,
            height as u32,
            image::ColorType::L8,
        )
        .map_err(|e| SimError::image_write(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "exposure frame written");
        Ok(())
    }
}

/// What an exposure integrates per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureMode {
    /// Squared displacement.
    #[default]
    Energy,
    /// Absolute displacement.
    Magnitude,
}

impl ExposureMode {
    #[inline]
    fn sample(self, cell: &Cell) -> f32 {
        match self {
            ExposureMode::Energy => cell.energy(),
            ExposureMode::Magnitude => cell.location.abs(),
        }
    }
}

/// An exposure in progress.
pub struct Exposure {
    writer: Box<dyn ImageWriter>,
    mode: ExposureMode,
    plane: usize,
    duration: u64,
    elapsed: u64,
    width: usize,
    height: usize,
    accumulator: Vec<f32>,
}

impl Exposure {
    /// Integrate layer `plane` of a `width x height` grid over `duration`
    /// steps.
    pub fn new(
        writer: Box<dyn ImageWriter>,
        mode: ExposureMode,
        duration: u64,
        (width, height): (usize, usize),
        plane: usize,
    ) -> Self {
        Self {
            writer,
            mode,
            plane,
            duration,
            elapsed: 0,
            width,
            height,
            accumulator: vec![0.0; width * height],
        }
    }

    /// Steps accumulated so far.
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// Steps the exposure runs for.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Add one step; returns true once the duration is reached.
    pub fn accumulate(&mut self, grid: &Grid<Cell>) -> bool {
        let layout = grid.layout();
        let cells = grid.as_slice();
        for (y, acc_row) in self.accumulator.chunks_exact_mut(self.width).enumerate() {
            let offset = layout.row_offset(y, self.plane);
            for (acc, cell) in acc_row.iter_mut().zip(&cells[offset..offset + self.width]) {
                *acc += self.mode.sample(cell);
            }
        }
        self.elapsed += 1;
        self.elapsed >= self.duration
    }

    /// The accumulated plane scaled so its maximum is 1.
    pub fn normalized(&self) -> Vec<f32> {
        let max = self.accumulator.iter().copied().fold(0.0f32, f32::max);
        if max > 0.0 {
            self.accumulator.iter().map(|v| v / max).collect()
        } else {
            vec![0.0; self.accumulator.len()]
        }
    }

    /// Normalize and hand the image to the writer.
    pub fn finish(mut self, frame: u64) -> SimResult<()> {
        let brightness = self.normalized();
        self.writer
            .write_frame(self.width, self.height, &brightness, frame)
    }
}

impl std::fmt::Debug for Exposure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exposure")
            .field("mode", &self.mode)
            .field("plane", &self.plane)
            .field("elapsed", &self.elapsed)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waves_core::GridShape;

    #[test]
    fn test_png_writer_names_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PngWriter::new(dir.path().join("out")).unwrap();
        let brightness: Vec<f32> = (0..16 * 16).map(|i| i as f32 / 255.0).collect();
        writer.write_frame(16, 16, &brightness, 3).unwrap();

        let path = dir.path().join("out").join("00000003.png");
        assert_eq!(writer.frame_path(3), path);
        let image = image::open(&path).unwrap().to_luma8();
        assert_eq!(image.dimensions(), (16, 16));
        assert_eq!(image.get_pixel(15, 15).0[0], 255);
        assert_eq!(image.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn test_accumulate_and_normalize() {
        struct Sink;
        impl ImageWriter for Sink {
            fn write_frame(&mut self, _: usize, _: usize, _: &[f32], _: u64) -> SimResult<()> {
                Ok(())
            }
        }

        let mut grid = Grid::new(GridShape::new(16, 16, 16), Cell::default()).unwrap();
        grid.at_mut(2, 3, 5).location = -2.0;
        grid.at_mut(4, 3, 5).location = 1.0;
        grid.at_mut(4, 3, 6).location = 100.0;

        let mut exposure = Exposure::new(Box::new(Sink), ExposureMode::Energy, 2, (16, 16), 5);
        assert!(!exposure.accumulate(&grid));
        assert!(exposure.accumulate(&grid));

        let image = exposure.normalized();
        assert_eq!(image[3 * 16 + 2], 1.0);
        assert_eq!(image[3 * 16 + 4], 0.25);
        assert_eq!(image.iter().filter(|&&v| v > 0.0).count(), 2);
        exposure.finish(0).unwrap();
    }

    #[test]
    fn test_magnitude_mode_and_dark_frame() {
        struct Sink;
        impl ImageWriter for Sink {
            fn write_frame(&mut self, _: usize, _: usize, _: &[f32], _: u64) -> SimResult<()> {
                Ok(())
            }
        }
        let grid = Grid::new(GridShape::planar(16, 16), Cell::default()).unwrap();
        let mut exposure = Exposure::new(Box::new(Sink), ExposureMode::Magnitude, 1, (16, 16), 0);
        exposure.accumulate(&grid);
        assert!(exposure.normalized().iter().all(|&v| v == 0.0));
        assert_eq!(ExposureMode::Magnitude.sample(&Cell::at_rest(-3.0)), 3.0);
    }
}
