//! Oscillating sources.

use serde::{Deserialize, Serialize};
use waves_core::GridShape;

/// Axis-aligned box of logical cells, `min` inclusive and `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Lower corner (inclusive).
    pub min: [usize; 3],
    /// Upper corner (exclusive).
    pub max: [usize; 3],
}

impl Region {
    /// A box spanning `min..max`.
    pub const fn new(min: [usize; 3], max: [usize; 3]) -> Self {
        Self { min, max }
    }

    /// A rectangle in the z = 0 plane.
    pub fn planar(x: std::ops::Range<usize>, y: std::ops::Range<usize>) -> Self {
        Self {
            min: [x.start, y.start, 0],
            max: [x.end, y.end, 1],
        }
    }

    /// A `size`-sided square (or cube, when `depth > 1`) centred on a point.
    pub fn centered(center: [usize; 3], size: usize, planar: bool) -> Self {
        let half = size / 2;
        let lo = |c: usize| c.saturating_sub(half);
        let (z0, z1) = if planar {
            (0, 1)
        } else {
            (lo(center[2]), lo(center[2]) + size)
        };
        Self {
            min: [lo(center[0]), lo(center[1]), z0],
            max: [lo(center[0]) + size, lo(center[1]) + size, z1],
        }
    }

    /// Whether the logical cell lies inside.
    #[inline]
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        (self.min[0]..self.max[0]).contains(&x)
            && (self.min[1]..self.max[1]).contains(&y)
            && (self.min[2]..self.max[2]).contains(&z)
    }

    /// Number of cells covered.
    pub fn volume(&self) -> usize {
        (0..3)
            .map(|axis| self.max[axis].saturating_sub(self.min[axis]))
            .product()
    }

    /// Whether the box is non-empty and inside the logical domain.
    pub fn fits(&self, shape: &GridShape) -> bool {
        let extents = [shape.width, shape.height, shape.depth];
        self.volume() > 0 && (0..3).all(|axis| self.max[axis] <= extents[axis])
    }

    /// Logical coordinates of every covered cell, z-major.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, usize)> {
        let Self { min, max } = *self;
        (min[2]..max[2]).flat_map(move |z| {
            (min[1]..max[1]).flat_map(move |y| (min[0]..max[0]).map(move |x| (x, y, z)))
        })
    }
}

/// Square wave: `+amplitude` for the first half of each period and
/// `-amplitude` for the second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquareWave {
    /// Peak displacement.
    pub amplitude: f32,
    /// Period in iterations (at least 2).
    pub period: u64,
}

impl Default for SquareWave {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            period: 70,
        }
    }
}

impl SquareWave {
    /// A wave with the given amplitude and period.
    pub fn new(amplitude: f32, period: u64) -> Self {
        Self { amplitude, period }
    }

    /// Source value at an iteration.
    #[inline]
    pub fn value_at(&self, iteration: u64) -> f32 {
        let period = self.period.max(2);
        if iteration % period < period / 2 {
            self.amplitude
        } else {
            -self.amplitude
        }
    }
}

fn enabled_default() -> bool {
    true
}

/// A region forced to a square wave every step while enabled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Emitter {
    /// Cells driven by the source.
    pub region: Region,
    /// Drive signal.
    #[serde(default)]
    pub wave: SquareWave,
    /// Whether the source is currently driving.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

impl Emitter {
    /// An enabled emitter.
    pub fn new(region: Region, wave: SquareWave) -> Self {
        Self {
            region,
            wave,
            enabled: true,
        }
    }

    /// Flip the enabled flag.
    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_wave_halves() {
        let wave = SquareWave::new(2.0, 10);
        let values: Vec<f32> = (0..10).map(|i| wave.value_at(i)).collect();
        assert_eq!(&values[..5], &[2.0; 5]);
        assert_eq!(&values[5..], &[-2.0; 5]);
        assert_eq!(wave.value_at(10), 2.0);
        assert_eq!(wave.value_at(15), -2.0);
    }

    #[test]
    fn test_odd_period() {
        let wave = SquareWave::new(1.0, 7);
        let positive = (0..7).filter(|&i| wave.value_at(i) > 0.0).count();
        assert_eq!(positive, 3);
    }

    #[test]
    fn test_region_cells() {
        let region = Region::planar(4..6, 10..13);
        assert_eq!(region.volume(), 6);
        let cells: Vec<_> = region.cells().collect();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0], (4, 10, 0));
        assert_eq!(cells[5], (5, 12, 0));
        assert!(region.contains(5, 12, 0));
        assert!(!region.contains(6, 12, 0));
    }

    #[test]
    fn test_region_fits() {
        let shape = GridShape::planar(32, 32);
        assert!(Region::planar(28..32, 0..4).fits(&shape));
        assert!(!Region::planar(30..34, 0..4).fits(&shape));
        assert!(!Region::planar(3..3, 0..4).fits(&shape));
        assert!(!Region::new([0, 0, 0], [4, 4, 2]).fits(&shape));
    }

    #[test]
    fn test_centered() {
        let region = Region::centered([256, 256, 0], 4, true);
        assert_eq!(region, Region::planar(254..258, 254..258));
        let cube = Region::centered([8, 8, 8], 2, false);
        assert_eq!(cube.volume(), 8);
    }
}
