//! Medium parameters for the stencil update.

use serde::{Deserialize, Serialize};

/// Neighborhood used to average a cell's neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stencil {
    /// Axis neighbors only: 4 in a plane, 6 in a volume.
    #[default]
    Axis,
    /// Axis plus diagonal neighbors (planar grids only). Diagonals are
    /// weighted by 1/sqrt(2) and the divisor is normalized to match.
    Diagonal,
}

impl Stencil {
    /// Weight of a diagonal neighbor.
    pub const DIAGONAL_WEIGHT: f32 = std::f32::consts::FRAC_1_SQRT_2;

    /// Largest eigenvalue of `x - avg(x)` over the grid, used for the
    /// stability bound.
    pub fn spectral_radius(self) -> f32 {
        match self {
            Stencil::Axis => 2.0,
            Stencil::Diagonal => {
                let w = Self::DIAGONAL_WEIGHT;
                (1.0 + 2.0 * w) / (1.0 + w)
            }
        }
    }
}

/// Time step and stiffness values of the medium.
///
/// The update is a leapfrog scheme:
///
/// ```text
/// v' = (v - k * (x - avg(neighbors))) * resistance
/// x' = x + v' * dt
/// ```
///
/// It is stable while `dt * k * spectral_radius <= 4` for every stiffness
/// `k` in use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveParams {
    /// Integration step for the location pass.
    pub time_step: f32,
    /// Stiffness of the bulk medium (`VelocityFactor::High`).
    pub stiffness_high: f32,
    /// Stiffness inside lenses (`VelocityFactor::Low`).
    pub stiffness_low: f32,
    /// Neighborhood of the velocity pass.
    pub stencil: Stencil,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            time_step: 0.1,
            stiffness_high: 2.0,
            stiffness_low: 1.0,
            stencil: Stencil::Axis,
        }
    }
}

impl WaveParams {
    /// Use a different neighborhood.
    pub fn with_stencil(mut self, stencil: Stencil) -> Self {
        self.stencil = stencil;
        self
    }

    /// Squared propagation speed in cells per step for stiffness `k` in a
    /// grid with `dimensions` axes (small-wavenumber limit).
    pub fn wave_speed_squared(&self, k: f32, dimensions: usize) -> f32 {
        // avg(neighbors) - x ~ laplacian * scale
        let scale = match (self.stencil, dimensions) {
            (Stencil::Diagonal, _) => {
                let w = Stencil::DIAGONAL_WEIGHT;
                (1.0 + 2.0 * w) / (4.0 * (1.0 + w))
            }
            (Stencil::Axis, d) => 1.0 / (2.0 * d as f32),
        };
        self.time_step * k * scale
    }

    /// Refractive index of a lens relative to the bulk medium.
    pub fn refractive_index(&self) -> f32 {
        (self.stiffness_high / self.stiffness_low).sqrt()
    }

    /// Check the leapfrog stability condition.
    pub fn is_stable(&self) -> bool {
        let k = self.stiffness_high.max(self.stiffness_low);
        self.time_step > 0.0
            && self.stiffness_low > 0.0
            && self.time_step * k * self.stencil.spectral_radius() <= 4.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = WaveParams::default();
        assert_eq!(params.time_step, 0.1);
        assert_eq!(params.stiffness_high, 2.0);
        assert_eq!(params.stiffness_low, 1.0);
        assert!(params.is_stable());
    }

    #[test]
    fn test_stability_bound() {
        let mut params = WaveParams::default();
        params.stiffness_high = 20.0;
        assert!(params.is_stable(), "dt * k * 2 = 4 is on the boundary");
        params.stiffness_high = 21.0;
        assert!(!params.is_stable());
        assert!(params.with_stencil(Stencil::Diagonal).is_stable());
    }

    #[test]
    fn test_wave_speed() {
        let params = WaveParams::default();
        // dt * k / 4 in a plane, dt * k / 6 in a volume
        assert!((params.wave_speed_squared(2.0, 2) - 0.05).abs() < 1e-6);
        assert!((params.wave_speed_squared(2.0, 3) - 0.2 / 6.0).abs() < 1e-6);
        let index = params.refractive_index();
        assert!((index - std::f32::consts::SQRT_2).abs() < 1e-6);
    }
}
