//! Scene descriptions.
//!
//! A scene fixes the grid size, the medium parameters, the material layout
//! (boundary absorption, lenses, absorbers) and the emitters. Scenes are plain
//! data: they can be written in TOML, and [`SceneDescription::build_material`]
//! turns one into a [`MaterialMap`] deterministically.
//!
//! ```toml
//! name = "tank"
//! width = 256
//! height = 256
//!
//! [boundary]
//! thickness = 10
//! decay = 0.98
//!
//! [[lenses]]
//! velocity_factor = "low"
//! shape = { kind = "sphere", center = [128.0, 128.0, 0.0], radius = 40.0 }
//!
//! [[emitters]]
//! region = { min = [30, 126, 0], max = [34, 130, 1] }
//! wave = { amplitude = 1.0, period = 70 }
//! ```

mod presets;

pub use presets::{preset_names, PRESET_COUNT};

use crate::error::{SimError, SimResult};
use crate::simulation::{
    quantize_resistance, Emitter, Material, MaterialMap, Region, Stencil, VelocityFactor,
    WaveParams,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};
use waves_core::{GridShape, DEFAULT_GUARD};

/// Exponential absorbing layer along the faces of the domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryProfile {
    /// Cells from each face that are damped. Zero disables the layer.
    pub thickness: usize,
    /// Per-cell decay; a cell at distance `d < thickness` from a face is
    /// multiplied by `decay^(thickness - d)`.
    pub decay: f64,
}

impl Default for BoundaryProfile {
    fn default() -> Self {
        Self {
            thickness: 10,
            decay: 0.98,
        }
    }
}

impl BoundaryProfile {
    /// No absorbing layer; the guard acts as a reflecting wall.
    pub fn reflecting() -> Self {
        Self {
            thickness: 0,
            decay: 1.0,
        }
    }

    /// Damping multiplier for a coordinate on an axis of length `extent`.
    pub fn factor(&self, coord: usize, extent: usize) -> f64 {
        let distance = coord.min(extent - 1 - coord);
        if distance < self.thickness {
            self.decay.powi((self.thickness - distance) as i32)
        } else {
            1.0
        }
    }
}

/// Absorption outside a circular cross-section in the xy plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadialAbsorption {
    /// Cross-section centre; defaults to the centre of the xy plane.
    #[serde(default)]
    pub center: Option<[f64; 2]>,
    /// Radius inside which cells are untouched.
    pub radius: f64,
    /// Per-cell decay applied for each cell of distance beyond `radius`.
    pub decay: f64,
}

impl RadialAbsorption {
    /// Damping multiplier at `(x, y)` in a `width x height` plane.
    pub fn factor(&self, x: usize, y: usize, width: usize, height: usize) -> f64 {
        let [cx, cy] = self
            .center
            .unwrap_or([(width as f64 - 1.0) / 2.0, (height as f64 - 1.0) / 2.0]);
        let excess = (x as f64 - cx).hypot(y as f64 - cy) - self.radius;
        if excess > 0.0 {
            self.decay.powf(excess)
        } else {
            1.0
        }
    }
}

/// Coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// x axis.
    X,
    /// y axis.
    Y,
    /// z axis.
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Geometry of a lens, in cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LensShape {
    /// A sphere (a disc on planar grids, where z is 0).
    Sphere {
        /// Centre.
        center: [f64; 3],
        /// Radius.
        radius: f64,
    },
    /// A sphere cut to the slab `range[0] <= coord < range[1]` along `axis`,
    /// e.g. half a sphere for a plano-convex lens.
    SlicedSphere {
        /// Centre.
        center: [f64; 3],
        /// Radius.
        radius: f64,
        /// Slicing axis.
        axis: Axis,
        /// Kept coordinate range along `axis`.
        range: [f64; 2],
    },
}

impl LensShape {
    /// Whether the cell at `(x, y, z)` lies inside.
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        let p = [x as f64, y as f64, z as f64];
        let in_sphere = |center: &[f64; 3], radius: f64| {
            let d2: f64 = (0..3).map(|i| (p[i] - center[i]).powi(2)).sum();
            d2 <= radius * radius
        };
        match self {
            LensShape::Sphere { center, radius } => in_sphere(center, *radius),
            LensShape::SlicedSphere {
                center,
                radius,
                axis,
                range,
            } => {
                let c = p[axis.index()];
                c >= range[0] && c < range[1] && in_sphere(center, *radius)
            }
        }
    }
}

fn low_factor() -> VelocityFactor {
    VelocityFactor::Low
}

/// A region of alternate stiffness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lens {
    /// Geometry.
    pub shape: LensShape,
    /// Stiffness class inside the lens.
    #[serde(default = "low_factor")]
    pub velocity_factor: VelocityFactor,
}

impl Lens {
    /// A slow-medium sphere.
    pub fn sphere(center: [f64; 3], radius: f64) -> Self {
        Self {
            shape: LensShape::Sphere { center, radius },
            velocity_factor: VelocityFactor::Low,
        }
    }

    /// A slow-medium sliced sphere.
    pub fn sliced(center: [f64; 3], radius: f64, axis: Axis, range: [f64; 2]) -> Self {
        Self {
            shape: LensShape::SlicedSphere {
                center,
                radius,
                axis,
                range,
            },
            velocity_factor: VelocityFactor::Low,
        }
    }
}

fn default_depth() -> usize {
    1
}

fn default_guard() -> usize {
    DEFAULT_GUARD
}

/// Everything needed to build a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    /// Display name.
    pub name: String,
    /// Logical width (multiple of 16).
    pub width: usize,
    /// Logical height (multiple of 16).
    pub height: usize,
    /// Logical depth (1, or a multiple of 16).
    #[serde(default = "default_depth")]
    pub depth: usize,
    /// Guard thickness (at least 1).
    #[serde(default = "default_guard")]
    pub guard: usize,
    /// Medium parameters.
    #[serde(default)]
    pub params: WaveParams,
    /// Absorbing layer along the domain faces.
    #[serde(default)]
    pub boundary: BoundaryProfile,
    /// Optional cylindrical absorption.
    #[serde(default)]
    pub radial: Option<RadialAbsorption>,
    /// Regions of alternate stiffness; later lenses win where they overlap.
    #[serde(default)]
    pub lenses: Vec<Lens>,
    /// Fully absorbing boxes.
    #[serde(default)]
    pub absorbers: Vec<Region>,
    /// Sources.
    #[serde(default)]
    pub emitters: Vec<Emitter>,
    /// z layer recorded by exposures; defaults to the middle layer.
    #[serde(default)]
    pub exposure_plane: Option<usize>,
}

impl SceneDescription {
    /// An empty planar scene with default parameters and boundary.
    pub fn planar(name: impl Into<String>, width: usize, height: usize) -> Self {
        Self::volume(name, width, height, 1)
    }

    /// An empty scene with default parameters and boundary.
    pub fn volume(name: impl Into<String>, width: usize, height: usize, depth: usize) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            depth,
            guard: DEFAULT_GUARD,
            params: WaveParams::default(),
            boundary: BoundaryProfile::default(),
            radial: None,
            lenses: Vec::new(),
            absorbers: Vec::new(),
            emitters: Vec::new(),
            exposure_plane: None,
        }
    }

    /// Built-in scene by index, see [`preset_names`].
    pub fn preset(index: usize) -> Option<Self> {
        presets::build(index)
    }

    /// Parse a scene from TOML.
    pub fn from_toml_str(text: &str) -> SimResult<Self> {
        let scene: Self = toml::from_str(text)?;
        scene.validate()?;
        Ok(scene)
    }

    /// Load a scene from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> SimResult<String> {
        toml::to_string_pretty(self).map_err(|e| SimError::config(e.to_string()))
    }

    /// Grid shape of the scene.
    pub fn shape(&self) -> GridShape {
        GridShape::new(self.width, self.height, self.depth).with_guard(self.guard)
    }

    /// z layer recorded by exposures.
    pub fn exposure_plane(&self) -> usize {
        self.exposure_plane.unwrap_or(self.depth / 2)
    }

    /// Check the scene for inconsistencies.
    ///
    /// Unstable medium parameters only produce a warning.
    pub fn validate(&self) -> SimResult<()> {
        let shape = self.shape();
        shape.validate()?;
        if self.guard == 0 {
            return Err(SimError::invalid_scene("guard must be at least 1"));
        }
        if !shape.is_planar() && self.params.stencil == Stencil::Diagonal {
            return Err(SimError::invalid_scene(
                "the diagonal stencil needs a planar grid",
            ));
        }
        if !(self.boundary.decay > 0.0 && self.boundary.decay <= 1.0) {
            return Err(SimError::invalid_scene(format!(
                "boundary decay {} outside (0, 1]",
                self.boundary.decay
            )));
        }
        if let Some(radial) = &self.radial {
            if !(radial.decay > 0.0 && radial.decay <= 1.0) || radial.radius < 0.0 {
                return Err(SimError::invalid_scene(
                    "radial absorption needs decay in (0, 1] and a non-negative radius",
                ));
            }
        }
        for (i, emitter) in self.emitters.iter().enumerate() {
            if !emitter.region.fits(&shape) {
                return Err(SimError::invalid_scene(format!(
                    "emitter {i} region {:?}..{:?} is empty or outside the {shape} domain",
                    emitter.region.min, emitter.region.max
                )));
            }
            if emitter.wave.period < 2 {
                return Err(SimError::invalid_scene(format!(
                    "emitter {i} period must be at least 2"
                )));
            }
        }
        for (i, absorber) in self.absorbers.iter().enumerate() {
            if !absorber.fits(&shape) {
                return Err(SimError::invalid_scene(format!(
                    "absorber {i} is empty or outside the {shape} domain"
                )));
            }
        }
        if self.exposure_plane() >= self.depth {
            return Err(SimError::invalid_scene(format!(
                "exposure plane {} outside depth {}",
                self.exposure_plane(),
                self.depth
            )));
        }
        if !self.params.is_stable() {
            warn!(
                scene = %self.name,
                time_step = self.params.time_step,
                stiffness = self.params.stiffness_high.max(self.params.stiffness_low),
                "medium parameters violate the stability bound"
            );
        }
        Ok(())
    }

    /// Material of one logical cell.
    pub fn material_at(&self, x: usize, y: usize, z: usize) -> Material {
        let mut factor = self.boundary.factor(x, self.width) * self.boundary.factor(y, self.height);
        if self.depth > 1 {
            factor *= self.boundary.factor(z, self.depth);
        }
        if let Some(radial) = &self.radial {
            factor *= radial.factor(x, y, self.width, self.height);
        }

        let velocity_factor = self
            .lenses
            .iter()
            .rev()
            .find(|lens| lens.shape.contains(x, y, z))
            .map_or(VelocityFactor::High, |lens| lens.velocity_factor);

        let resistance = if self.absorbers.iter().any(|a| a.contains(x, y, z)) {
            0
        } else {
            quantize_resistance(factor)
        };

        Material {
            velocity_factor,
            resistance,
        }
    }

    /// Build the material map. The result depends only on the description.
    pub fn build_material(&self) -> SimResult<MaterialMap> {
        self.validate()?;
        let mut map = MaterialMap::new(self.shape())?;
        let outer = map.grid().layout().outer_extent();

        map.grid_mut()
            .split_outer_mut(outer)
            .into_par_iter()
            .for_each(|mut slab| {
                for row in slab.layout().rows(slab.outer()) {
                    for (x, cell) in slab.row_mut(row).iter_mut().enumerate() {
                        *cell = self.material_at(x, row.y, row.z);
                    }
                }
            });

        debug!(
            scene = %self.name,
            shape = %self.shape(),
            lens_cells = map.count_factor(VelocityFactor::Low),
            damped_cells = map.count_damped(),
            "material map built"
        );
        Ok(map)
    }
}
