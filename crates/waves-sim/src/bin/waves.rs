//! Headless driver for the wave simulation.
//!
//! Run with: cargo run -p waves-sim --release --bin waves -- --scene 1 --auto-start
//!
//! While running, commands are read from stdin, one per line:
//!
//! - `p` pause/resume
//! - `t <n>` toggle emitter `n`
//! - `e [steps]` record an exposure into the exposure folder
//! - `s` print statistics
//! - `q` quit

use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use waves_sim::prelude::*;
use waves_sim::scene::preset_names;

/// Heterogeneous scalar wave sandbox
#[derive(Parser, Debug)]
#[command(name = "waves")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Built-in scene index
    #[arg(long)]
    scene: Option<usize>,

    /// Scene description file (TOML)
    #[arg(long)]
    scene_file: Option<PathBuf>,

    /// Runtime configuration file (TOML); flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start stepping immediately
    #[arg(long)]
    auto_start: bool,

    /// Worker threads (0 = all hardware threads)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Stop after this many iterations
    #[arg(long)]
    steps: Option<u64>,

    /// Aperture pattern image for the emitters
    #[arg(long)]
    pattern: Option<PathBuf>,

    /// Folder for exposure frames
    #[arg(long)]
    exposure_dir: Option<PathBuf>,

    /// Steps per exposure
    #[arg(long, default_value_t = 1024)]
    exposure_steps: u64,

    /// List the built-in scenes and exit
    #[arg(long)]
    list_scenes: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

enum Command {
    TogglePause,
    ToggleEmitter(usize),
    Exposure(Option<u64>),
    Stats,
    Quit,
}

fn setup_logging(verbose: bool) {
    let default = if verbose {
        "waves_sim=debug,waves_core=debug"
    } else {
        "waves_sim=info,waves_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn runtime_config(args: &Args) -> SimResult<RuntimeConfig> {
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    if let Some(scene) = args.scene {
        config.scene = scene;
        config.scene_file = None;
    }
    if let Some(path) = &args.scene_file {
        config.scene_file = Some(path.clone());
    }
    if args.auto_start {
        config.auto_start = true;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(steps) = args.steps {
        config.max_iterations = Some(steps);
    }
    if let Some(pattern) = &args.pattern {
        config.pattern = Some(pattern.clone());
    }
    if let Some(folder) = &args.exposure_dir {
        config.exposure = Some(ExposureConfig {
            folder: folder.clone(),
            steps: args.exposure_steps,
            mode: ExposureMode::Energy,
        });
    }
    Ok(config)
}

fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let command = match words.next()? {
        "p" => Command::TogglePause,
        "t" => Command::ToggleEmitter(words.next()?.parse().ok()?),
        "e" => Command::Exposure(words.next().and_then(|w| w.parse().ok())),
        "s" => Command::Stats,
        "q" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

fn spawn_stdin_reader() -> mpsc::Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None => warn!(input = %line.trim(), "unknown command"),
            }
        }
    });
    rx
}

fn print_stats(sim: &WavefieldSimulation) {
    let averages = sim.performance_averages();
    println!(
        "iteration {:>8} | energy {:>12.4} | {:>8.1} us/step | {:>8.1} Mcells/s | exposing: {}",
        sim.current_iteration(),
        sim.total_energy(),
        averages.per_iteration / 1_000.0,
        averages.cells_per_second() / 1.0e6,
        sim.is_exposing()
    );
}

fn run(args: Args) -> SimResult<()> {
    let config = runtime_config(&args)?;
    let mut sim = config.simulation_config()?.build()?;

    if !sim.initialize(config.pattern.as_deref()) {
        warn!("continuing without an aperture pattern");
    }
    if let Some(exposure) = &config.exposure {
        sim.start_exposure_with(
            Box::new(PngWriter::new(&exposure.folder)?),
            exposure.steps,
            exposure.mode,
        )?;
    }
    let exposure = config.exposure.clone();

    let options = ControllerOptions {
        auto_start: config.auto_start,
        max_iterations: config.max_iterations,
        ..ControllerOptions::default()
    };
    let sink = |sim: &WavefieldSimulation, stats: &FrameStats| {
        debug!(
            iteration = stats.iteration,
            max_location = sim.max_location(),
            us_per_step = stats.averages.per_iteration / 1_000.0,
            "frame"
        );
    };
    let mut controller = SimulationController::spawn(sim, options, sink)?;
    if !config.auto_start {
        info!("paused; type `p` to start, `q` to quit");
    }

    let commands = spawn_stdin_reader();
    while !controller.is_finished() {
        let command = match commands.recv_timeout(Duration::from_millis(100)) {
            Ok(command) => command,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // stdin closed: finish a bounded run, quit an unbounded one
                if config.max_iterations.is_some() {
                    controller.join();
                }
                break;
            }
        };
        match command {
            Command::TogglePause => {
                let paused = controller.toggle_pause();
                info!(paused, "pause toggled");
            }
            Command::ToggleEmitter(index) => {
                controller.with_simulation(|s| s.toggle_emitter(index));
            }
            Command::Exposure(steps) => {
                let folder = exposure
                    .as_ref()
                    .map_or_else(|| PathBuf::from("exposures"), |e| e.folder.clone());
                let steps = steps.unwrap_or(args.exposure_steps);
                if let Err(e) = controller.with_simulation(|s| s.start_exposure(&folder, steps)) {
                    error!(error = %e, "exposure not started");
                }
            }
            Command::Stats => controller.with_simulation(|s| print_stats(s)),
            Command::Quit => break,
        }
    }

    controller.stop();
    controller.with_simulation(|s| print_stats(s));
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbose);

    if args.list_scenes {
        for (index, name) in preset_names().iter().enumerate() {
            println!("{index}: {name}");
        }
        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "waves failed");
            ExitCode::FAILURE
        }
    }
}
