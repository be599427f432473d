//! Dynamic per-cell state.

use bytemuck::{Pod, Zeroable};

/// Displacement and velocity of one medium cell.
///
/// Stored twice per grid position (current and next generation). The layout
/// is `#[repr(C)]` so a generation can be handed to a renderer as raw bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Cell {
    /// Scalar displacement ("location") of the medium.
    pub location: f32,
    /// Rate of change of the displacement.
    pub velocity: f32,
}

impl Cell {
    /// A cell at rest with the given displacement.
    pub const fn at_rest(location: f32) -> Self {
        Self {
            location,
            velocity: 0.0,
        }
    }

    /// Squared displacement, the per-cell energy measure used by exposures
    /// and diagnostics.
    #[inline(always)]
    pub fn energy(&self) -> f32 {
        self.location * self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_layout() {
        assert_eq!(std::mem::size_of::<Cell>(), 8);
        let cells = [Cell::at_rest(1.0), Cell::default()];
        let bytes: &[u8] = bytemuck::cast_slice(&cells);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn test_energy() {
        let cell = Cell {
            location: -3.0,
            velocity: 5.0,
        };
        assert_eq!(cell.energy(), 9.0);
    }
}
