//! Throughput benchmark for the wave simulation.
//!
//! Run with: cargo run -p waves-sim --bin benchmark --release

use std::time::Instant;
use waves_core::{partition, WorkerPool};
use waves_sim::prelude::*;
use waves_sim::scene::{preset_names, PRESET_COUNT};

fn main() -> Result<(), SimError> {
    let threads = WorkerPool::available_parallelism();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║              Waves Stencil Throughput Evaluation                 ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("Hardware threads: {threads}");
    println!();

    // =========================================================================
    // Part 1: Worker pool fork/join overhead
    // =========================================================================
    println!("═══════════════════════════════════════════════════════════════════");
    println!("PART 1: Fork/join round trip (empty task, 10000 runs)");
    println!("═══════════════════════════════════════════════════════════════════");
    println!();
    println!("{:<10} {:>15}", "Workers", "us/run");
    println!("{}", "-".repeat(26));

    for workers in [1, 2, 4, threads] {
        let mut pool = WorkerPool::new(workers)?;
        let runs = 10_000;
        let start = Instant::now();
        for _ in 0..runs {
            pool.run(|index, count| {
                std::hint::black_box(partition(1_000, index, count));
            });
        }
        let per_run = start.elapsed().as_secs_f64() * 1.0e6 / runs as f64;
        println!("{:<10} {:>15.2}", workers, per_run);
    }
    println!();

    // =========================================================================
    // Part 2: Built-in scenes
    // =========================================================================
    println!("═══════════════════════════════════════════════════════════════════");
    println!("PART 2: Built-in scenes (500 steps, all threads)");
    println!("═══════════════════════════════════════════════════════════════════");
    println!();
    println!(
        "{:<14} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "Scene", "Cells", "Steps/s", "Mcells/s", "Vel (us)", "Loc (us)"
    );
    println!("{}", "-".repeat(80));

    let steps = 500;
    for index in 0..PRESET_COUNT {
        let mut sim = SimulationConfig::preset(index)?.with_threads(threads).build()?;
        sim.initialize(None);
        for _ in 0..10 {
            sim.iterate();
        }
        sim.reset_performance();

        let start = Instant::now();
        for _ in 0..steps {
            sim.iterate();
        }
        let elapsed = start.elapsed().as_secs_f64();
        let cells = sim.scene().shape().cell_count();
        let averages = sim.performance_averages();
        println!(
            "{:<14} {:>12} {:>12.1} {:>12.1} {:>12.1} {:>12.1}",
            preset_names()[index],
            cells,
            steps as f64 / elapsed,
            cells as f64 * steps as f64 / elapsed / 1.0e6,
            averages.velocity / 1_000.0,
            averages.location / 1_000.0,
        );
    }
    println!();

    // =========================================================================
    // Part 3: Scaling with thread count
    // =========================================================================
    println!("═══════════════════════════════════════════════════════════════════");
    println!("PART 3: Thread scaling (1024x1024 open water, 200 steps)");
    println!("═══════════════════════════════════════════════════════════════════");
    println!();
    println!("{:<10} {:>12} {:>12}", "Threads", "Mcells/s", "Speedup");
    println!("{}", "-".repeat(36));

    let mut scene = SceneDescription::planar("scaling", 1024, 1024);
    scene.emitters.push(Emitter::new(
        Region::centered([512, 512, 0], 8, true),
        SquareWave::default(),
    ));
    let mut baseline = None;
    let mut count = 1;
    while count <= threads {
        let mut sim = WavefieldSimulation::new(scene.clone(), count)?;
        sim.initialize(None);
        let start = Instant::now();
        for _ in 0..200 {
            sim.iterate();
        }
        let rate = (1024.0 * 1024.0 * 200.0) / start.elapsed().as_secs_f64() / 1.0e6;
        let base = *baseline.get_or_insert(rate);
        println!("{:<10} {:>12.1} {:>11.2}x", count, rate, rate / base);
        count *= 2;
    }
    println!();

    Ok(())
}
