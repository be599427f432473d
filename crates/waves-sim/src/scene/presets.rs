//! Built-in scenes, selectable with `--scene <n>`.

use super::{Axis, BoundaryProfile, Lens, RadialAbsorption, SceneDescription};
use crate::simulation::{Emitter, Region, SquareWave, Stencil};

/// Number of built-in scenes.
pub const PRESET_COUNT: usize = 4;

/// Names of the built-in scenes, by index.
pub fn preset_names() -> [&'static str; PRESET_COUNT] {
    ["open-water", "lens", "double-slit", "lens-3d"]
}

pub(super) fn build(index: usize) -> Option<SceneDescription> {
    let scene = match index {
        0 => open_water(),
        1 => lens(),
        2 => double_slit(),
        3 => lens_3d(),
        _ => return None,
    };
    Some(scene)
}

/// 512x512 tank with a small square source in the middle.
fn open_water() -> SceneDescription {
    let mut scene = SceneDescription::planar("open-water", 512, 512);
    scene.emitters.push(Emitter::new(
        Region::centered([256, 256, 0], 4, true),
        SquareWave::new(1.0, 70),
    ));
    scene
}

/// A line source focused by a circular slow-medium lens.
fn lens() -> SceneDescription {
    let mut scene = SceneDescription::planar("lens", 512, 512);
    scene.params.stencil = Stencil::Diagonal;
    scene.lenses.push(Lens::sphere([256.0, 256.0, 0.0], 96.0));
    scene.emitters.push(Emitter::new(
        Region::planar(32..36, 160..352),
        SquareWave::new(1.0, 40),
    ));
    scene
}

/// A plane wave diffracting through two slits in an absorbing wall.
fn double_slit() -> SceneDescription {
    let mut scene = SceneDescription::planar("double-slit", 512, 512);
    let wall = 200..204;
    for (y0, y1) in [(0, 236), (244, 268), (276, 512)] {
        scene.absorbers.push(Region::planar(wall.clone(), y0..y1));
    }
    scene.emitters.push(Emitter::new(
        Region::planar(40..44, 16..496),
        SquareWave::new(1.0, 30),
    ));
    scene
}

/// A cylindrical tank with a plano-convex lens, recorded at the mid plane.
fn lens_3d() -> SceneDescription {
    let mut scene = SceneDescription::volume("lens-3d", 128, 128, 64);
    scene.boundary = BoundaryProfile {
        thickness: 8,
        decay: 0.95,
    };
    scene.radial = Some(RadialAbsorption {
        center: None,
        radius: 56.0,
        decay: 0.9,
    });
    scene.lenses.push(Lens::sliced(
        [64.0, 64.0, 32.0],
        40.0,
        Axis::X,
        [64.0, 128.0],
    ));
    scene.emitters.push(Emitter::new(
        Region::centered([24, 64, 32], 4, false),
        SquareWave::new(1.0, 40),
    ));
    scene.exposure_plane = Some(32);
    scene
}
