//! Row kernels for the velocity and location passes.
//!
//! Both kernels process one logical row at a time: they read the current
//! generation and the material map at absolute offsets and write the row of
//! the next generation owned by the calling worker.

use super::material::{Material, VelocityFactor};
use super::params::{Stencil, WaveParams};
use crate::error::{SimError, SimResult};
use waves_core::{Cell, Layout, Row};

const MAX_TAPS: usize = 8;

/// Neighbor offsets and weights, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct Taps {
    offsets: [isize; MAX_TAPS],
    weights: [f32; MAX_TAPS],
    len: usize,
    inv_total: f32,
}

impl Taps {
    /// Taps of `stencil` for grids with `layout`.
    pub fn new(stencil: Stencil, layout: Layout) -> SimResult<Self> {
        let strides = layout.strides();
        let planar = layout.shape().is_planar();
        let mut taps: Vec<(isize, f32)> = vec![
            (strides.delta(-1, 0, 0), 1.0),
            (strides.delta(1, 0, 0), 1.0),
            (strides.delta(0, -1, 0), 1.0),
            (strides.delta(0, 1, 0), 1.0),
        ];
        match (stencil, planar) {
            (Stencil::Axis, true) => {}
            (Stencil::Axis, false) => {
                taps.push((strides.delta(0, 0, -1), 1.0));
                taps.push((strides.delta(0, 0, 1), 1.0));
            }
            (Stencil::Diagonal, true) => {
                let w = Stencil::DIAGONAL_WEIGHT;
                for (dx, dy) in [(-1, -1), (1, -1), (-1, 1), (1, 1)] {
                    taps.push((strides.delta(dx, dy, 0), w));
                }
            }
            (Stencil::Diagonal, false) => {
                return Err(SimError::invalid_scene(
                    "the diagonal stencil is only defined for planar grids",
                ));
            }
        }
        if layout.shape().guard == 0 {
            return Err(SimError::invalid_scene(
                "stencil passes need a guard of at least one cell",
            ));
        }

        let mut offsets = [0; MAX_TAPS];
        let mut weights = [0.0; MAX_TAPS];
        let mut total = 0.0f32;
        for (i, &(offset, weight)) in taps.iter().enumerate() {
            offsets[i] = offset;
            weights[i] = weight;
            total += weight;
        }
        Ok(Self {
            offsets,
            weights,
            len: taps.len(),
            inv_total: 1.0 / total,
        })
    }

    /// Number of neighbors.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; a stencil has at least four neighbors.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `location - weighted_average(neighbors)` at `offset`.
    ///
    /// Accumulated as a weighted sum of differences so that a uniform field
    /// yields exactly zero.
    #[inline(always)]
    pub fn delta(&self, cells: &[Cell], offset: usize) -> f32 {
        let center = cells[offset].location;
        let mut acc = 0.0f32;
        for i in 0..self.len {
            let neighbor = cells[offset.wrapping_add_signed(self.offsets[i])].location;
            acc += self.weights[i] * (center - neighbor);
        }
        acc * self.inv_total
    }
}

/// Everything the passes need besides the grids themselves.
#[derive(Debug, Clone)]
pub struct Kernel {
    taps: Taps,
    stiffness: [f32; 2],
    resistance: [f32; 256],
    time_step: f32,
}

impl Kernel {
    /// Build the kernel for a parameter set and grid layout.
    pub fn new(params: &WaveParams, layout: Layout) -> SimResult<Self> {
        Ok(Self {
            taps: Taps::new(params.stencil, layout)?,
            stiffness: [params.stiffness_high, params.stiffness_low],
            resistance: super::material::resistance_table(),
            time_step: params.time_step,
        })
    }

    /// Neighbor taps.
    pub fn taps(&self) -> &Taps {
        &self.taps
    }

    #[inline(always)]
    fn stiffness(&self, factor: VelocityFactor) -> f32 {
        match factor {
            VelocityFactor::High => self.stiffness[0],
            VelocityFactor::Low => self.stiffness[1],
        }
    }

    /// Velocity of one cell in the next generation.
    #[inline(always)]
    pub fn velocity(&self, current: &[Cell], material: Material, offset: usize) -> f32 {
        let delta = self.taps.delta(current, offset);
        let k = self.stiffness(material.velocity_factor);
        (current[offset].velocity - k * delta) * self.resistance[usize::from(material.resistance)]
    }

    /// Velocity pass over one row. Blocked cells are not computed; their
    /// velocity is written as zero, which is what the full update yields.
    pub fn velocity_row(
        &self,
        current: &[Cell],
        material: &[Material],
        row: Row,
        next: &mut [Cell],
    ) {
        for (x, cell) in next.iter_mut().enumerate() {
            let offset = row.offset + x;
            let m = material[offset];
            cell.velocity = if m.is_blocked() {
                0.0
            } else {
                self.velocity(current, m, offset)
            };
        }
    }

    /// Location pass over one row, using the velocities just written.
    pub fn location_row(&self, current: &[Cell], row: Row, next: &mut [Cell]) {
        let current = &current[row.offset..row.offset + next.len()];
        for (cell, old) in next.iter_mut().zip(current) {
            cell.location = old.location + cell.velocity * self.time_step;
        }
    }
}
