// src/main.rs

mod analyzer;
mod apply;
mod backend;
mod cli;
mod collector;
mod config;
mod crossref;
mod error;
mod model;
mod resolver;
mod scanner;
mod store;
#[cfg(test)]
mod testing;
mod version;

use clap::Parser;
use cli::Args;
use config::Config;
use error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(args: &Args) {
    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let args = Args::parse();
    init_logging(&args);
    let start_time = Instant::now();

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("cannot install Ctrl-C handler, interrupting will lose unsaved scans: {e}");
    }

    let result =
        Config::from_args(&args).and_then(|config| analyzer::run(&config, args.stage, &cancel));

    match result {
        Ok(()) => info!("Finished in {:.2?}.", start_time.elapsed()),
        Err(e @ (Error::Interrupted { .. } | Error::Cancelled(_))) => {
            error!("{e}");
            std::process::exit(130);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}
