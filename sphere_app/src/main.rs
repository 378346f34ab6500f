//! Headless sphere collision run
//!
//! Builds a randomly populated world, runs it for a number of frames and
//! writes one line per collision to a log file.

mod args;
mod control;

use std::fs::File;
use std::io::BufWriter;

use clap::Parser;
use sphere_engine::foundation::logging;
use sphere_engine::foundation::time::Stopwatch;
use sphere_engine::prelude::*;

use args::Options;

fn load_config(options: &Options) -> Result<SimulationConfig, ConfigError> {
    let mut config = match &options.config {
        Some(path) => {
            log::info!("Loading configuration from {}", path.display());
            SimulationConfig::load_from_file(path)?
        }
        None => SimulationConfig::default(),
    };
    if options.single_threaded {
        config.multithreading = false;
    }
    if options.seed.is_some() {
        config.seed = options.seed;
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let options = Options::parse();
    let config = load_config(&options)?;
    log::info!(
        "Starting sphere simulation: {} bodies, {} threading",
        config.population,
        if config.multithreading { "multi" } else { "single" }
    );

    let output = BufWriter::new(File::create(&options.output)?);
    let mut engine = Engine::new(config)?.with_sink(WriterSink::new(output));

    let frames = options.frame_limit();
    if frames.is_none() {
        log::info!("Running until `{}` is entered or input closes", control::QUIT);
        control::stop_on_stdin(engine.stop_handle())?;
    }

    let stopwatch = Stopwatch::start_new();
    let result = engine.run(frames);
    println!("Time took = {}[ms]", stopwatch.elapsed().as_millis());

    match result {
        Ok(stats) => {
            log::info!(
                "Finished {} frames: {} body contacts, {} wall contacts, {:.1} fps, log at {}",
                stats.frames,
                stats.body_contacts,
                stats.wall_contacts,
                stats.average_fps,
                options.output.display()
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Simulation failed: {e}");
            Err(e.into())
        }
    }
}
