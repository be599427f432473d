//! Static per-cell material properties.

use serde::{Deserialize, Serialize};
use waves_core::{Grid, GridShape, Result};

/// Largest quantized resistance; `RESISTANCE_MAX / RESISTANCE_MAX = 1.0`
/// means no damping.
pub const RESISTANCE_MAX: u8 = 127;

/// Number of distinct resistance levels.
pub const RESISTANCE_LEVELS: usize = RESISTANCE_MAX as usize + 1;

/// Which stiffness a cell uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityFactor {
    /// Bulk medium.
    #[default]
    High,
    /// Slow medium, used for lenses.
    Low,
}

/// Material of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Material {
    /// Stiffness class.
    pub velocity_factor: VelocityFactor,
    /// Quantized damping multiplier in `0..=127`. Zero marks a cell that
    /// never propagates.
    pub resistance: u8,
}

impl Material {
    /// Undamped bulk medium.
    pub const OPEN: Self = Self {
        velocity_factor: VelocityFactor::High,
        resistance: RESISTANCE_MAX,
    };

    /// Fully absorbing cell.
    pub const BLOCKED: Self = Self {
        velocity_factor: VelocityFactor::High,
        resistance: 0,
    };

    /// Damping multiplier applied to the velocity update.
    #[inline]
    pub fn resistance_factor(&self) -> f32 {
        f32::from(self.resistance.min(RESISTANCE_MAX)) / f32::from(RESISTANCE_MAX)
    }

    /// Whether the stepping stage can skip this cell.
    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.resistance == 0
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::OPEN
    }
}

/// Quantize a damping multiplier in `[0, 1]` to a resistance level.
pub fn quantize_resistance(factor: f64) -> u8 {
    let scaled = (factor.clamp(0.0, 1.0) * f64::from(RESISTANCE_MAX)).round();
    scaled as u8
}

/// Resistance multipliers indexed by the raw `u8`; levels above
/// [`RESISTANCE_MAX`] saturate at 1.0.
pub fn resistance_table() -> [f32; 256] {
    let mut table = [0.0; 256];
    for (level, slot) in table.iter_mut().enumerate() {
        *slot = level.min(RESISTANCE_LEVELS - 1) as f32 / f32::from(RESISTANCE_MAX);
    }
    table
}

/// Per-cell material, laid out exactly like the dynamic grids so the same
/// offset addresses the same position in both.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialMap {
    grid: Grid<Material>,
}

impl MaterialMap {
    /// An open, undamped medium. Guard cells are blocked.
    pub fn new(shape: GridShape) -> Result<Self> {
        let mut grid = Grid::new(shape, Material::BLOCKED)?;
        let width = shape.width;
        let layout = grid.layout();
        for row in layout.rows(0..layout.outer_extent()) {
            grid.as_mut_slice()[row.offset..row.offset + width].fill(Material::OPEN);
        }
        Ok(Self { grid })
    }

    /// Wrap an already built grid.
    pub fn from_grid(grid: Grid<Material>) -> Self {
        Self { grid }
    }

    /// Underlying grid.
    pub fn grid(&self) -> &Grid<Material> {
        &self.grid
    }

    /// Mutable underlying grid.
    pub fn grid_mut(&mut self) -> &mut Grid<Material> {
        &mut self.grid
    }

    /// Logical shape.
    pub fn shape(&self) -> GridShape {
        self.grid.shape()
    }

    /// Material at a storage offset.
    #[inline(always)]
    pub fn get(&self, offset: usize) -> Material {
        self.grid[offset]
    }

    /// Material at a logical coordinate.
    pub fn at(&self, x: usize, y: usize, z: usize) -> Material {
        *self.grid.at(x as isize, y as isize, z as isize)
    }

    /// Number of logical cells with the given velocity factor.
    pub fn count_factor(&self, factor: VelocityFactor) -> usize {
        self.grid
            .logical()
            .filter(|m| m.velocity_factor == factor)
            .count()
    }

    /// Number of logical cells that damp the wave at all.
    pub fn count_damped(&self) -> usize {
        self.grid
            .logical()
            .filter(|m| m.resistance < RESISTANCE_MAX)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize() {
        assert_eq!(quantize_resistance(1.0), 127);
        assert_eq!(quantize_resistance(0.0), 0);
        assert_eq!(quantize_resistance(0.5), 64);
        assert_eq!(quantize_resistance(-3.0), 0);
        assert_eq!(quantize_resistance(2.0), 127);
        assert_eq!(quantize_resistance(0.98), 124);
    }

    #[test]
    fn test_table_matches_factor() {
        let table = resistance_table();
        for level in 0..=RESISTANCE_MAX {
            let material = Material {
                velocity_factor: VelocityFactor::Low,
                resistance: level,
            };
            assert_eq!(table[level as usize], material.resistance_factor());
        }
        assert_eq!(table[127], 1.0);
        assert_eq!(table[200], 1.0);
        assert_eq!(table[0], 0.0);
    }

    #[test]
    fn test_new_map_is_open_inside_blocked_outside() {
        let map = MaterialMap::new(GridShape::planar(16, 32)).unwrap();
        assert_eq!(map.at(0, 0, 0), Material::OPEN);
        assert_eq!(map.at(15, 31, 0), Material::OPEN);
        assert_eq!(*map.grid().at(-1, 5, 0), Material::BLOCKED);
        assert_eq!(*map.grid().at(3, 32, 0), Material::BLOCKED);
        assert_eq!(map.count_factor(VelocityFactor::High), 16 * 32);
        assert_eq!(map.count_damped(), 0);
    }
}
