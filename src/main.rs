use clap::Parser;
use std::path::PathBuf;

use stillcam::capture_loop::CaptureLoop;
use stillcam::cli::Args;
use stillcam::config::{Config, ConfigError};
use stillcam::logging::{self, LogTarget};
use stillcam::text::RusttypeEngine;
use stillcam::{daemon, signals, source};

/// Load the config file and layer the command line over it.
fn load_config(path: Option<&PathBuf>, args: &Args) -> Result<Config, ConfigError> {
    let mut config = Config::load(path.map(PathBuf::as_path))?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn main() {
    let args = Args::parse();

    let config = match load_config(args.config.as_ref(), &args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let target = match LogTarget::resolve(config.log.as_deref(), config.background) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if config.background {
        if let Err(e) = daemon::background() {
            eprintln!("Error going into the background: {}", e);
            std::process::exit(1);
        }
    }

    let log_handle = match logging::init(target, logging::level(config.verbose, config.quiet)) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error opening log: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(pid) = &config.pid {
        if let Err(e) = daemon::write_pid(pid) {
            log::error!("Error saving PID to file '{}': {}", pid.display(), e);
            std::process::exit(1);
        }
    }

    if let Err(e) = signals::install() {
        log::warn!("Unable to install signal handlers: {}", e);
    }

    let background = config.background;
    let mut capture = CaptureLoop::new(config, Box::new(RusttypeEngine::new()), &signals::FLAGS)
        .daemonized(background)
        .on_reload(|| load_config(args.config.as_ref(), &args))
        .on_hangup(|| log_handle.reopen());

    if let Err(e) = capture.run(source::open) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
