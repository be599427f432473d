//! Absorbing boundary layers.
//!
//! The wave travels about `sqrt(dt * k / 4) ~ 0.22` cells per step with the
//! default medium, so every scenario places its source close enough to an edge
//! for the front to reach the outermost ring well before the run ends.

use waves_sim::prelude::*;

/// Largest |location| on the outermost ring of logical cells.
fn edge_peak(sim: &WavefieldSimulation) -> f32 {
    let (width, height) = (sim.scene().width, sim.scene().height);
    let grid = sim.current_grid();
    let mut peak = 0.0f32;
    for y in 0..height {
        for x in 0..width {
            if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                peak = peak.max(grid.at(x as isize, y as isize, 0).location.abs());
            }
        }
    }
    peak
}

/// Run `steps` iterations and return the edge peak seen from step `from` on.
fn edge_peak_after(scene: SceneDescription, steps: u64, from: u64) -> f32 {
    let mut sim = WavefieldSimulation::new(scene, 0).unwrap();
    sim.initialize(None);
    let mut peak = 0.0f32;
    for _ in 0..steps {
        sim.iterate();
        if sim.current_iteration() >= from {
            peak = peak.max(edge_peak(&sim));
        }
    }
    peak
}

fn point_source_tank(boundary: BoundaryProfile) -> SceneDescription {
    let mut scene = SceneDescription::planar("tank", 512, 512);
    scene.boundary = boundary;
    scene.emitters.push(Emitter::new(
        Region::centered([180, 255, 0], 1, true),
        SquareWave::new(1.0, 70),
    ));
    scene
}

#[test]
fn test_open_water_edge_below_one_percent() {
    let scene = point_source_tank(BoundaryProfile::default());
    assert_eq!(scene.boundary.thickness, 10);
    assert_eq!(scene.boundary.decay, 0.98);
    let emitter_peak = scene.emitters[0].wave.amplitude;

    let absorbed = edge_peak_after(scene, 1000, 500);
    let reflected = edge_peak_after(point_source_tank(BoundaryProfile::reflecting()), 1000, 500);

    assert!(
        reflected > 0.01 * emitter_peak,
        "front never reached the edge: {reflected}"
    );
    assert!(
        absorbed < 0.01 * emitter_peak,
        "edge peak {absorbed} with the absorbing layer"
    );
}

fn tank(boundary: BoundaryProfile) -> SceneDescription {
    let mut scene = SceneDescription::planar("tank", 128, 128);
    scene.boundary = boundary;
    scene.emitters.push(Emitter::new(
        Region::planar(30..34, 62..66),
        SquareWave::new(1.0, 70),
    ));
    scene
}

#[test]
fn test_absorbing_layer_suppresses_reflections() {
    let reference = edge_peak_after(tank(BoundaryProfile::reflecting()), 1000, 500);
    assert!(
        reference > 0.5,
        "edge stayed quiet without absorption: {reference}"
    );

    let gentle = edge_peak_after(tank(BoundaryProfile::default()), 1000, 500);
    assert!(gentle < 0.1 * reference, "{gentle} vs {reference}");

    let strong = edge_peak_after(
        tank(BoundaryProfile {
            thickness: 10,
            decay: 0.9,
        }),
        1000,
        500,
    );
    assert!(strong < 0.01 * reference, "{strong} vs {reference}");
    assert!(strong < gentle);
}
