//! Mirror: one-way periodic folder synchronization.
//!
//! # Usage
//!
//! ```text
//! mirror <source> <replica> <interval-secs> <log-file> [--once]
//!        [--config mirror.yaml] [--compare content|metadata] [--follow-links]
//!        [--max-log-bytes N] [--max-archived-logs N]
//! ```
//!
//! Exit status: 0 after a requested stop or `--once`, 1 when a pass fails
//! fatally, 2 for configuration errors.

mod args;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use args::MirrorArgs;
use mirror_daemon::{init_logging, start_blocking, DaemonError, LogSettings, SchedulerConfig};
use mirror_sync::TracingSink;

const EXIT_FATAL: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    let args = MirrorArgs::parse();

    let config = match args.resolve() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("mirror: configuration error: {err:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if let Err(err) = init_logging(&LogSettings::from(&config)) {
        eprintln!("mirror: cannot set up logging: {err}");
        return ExitCode::from(EXIT_CONFIG);
    }

    let mut scheduler = SchedulerConfig::from(&config);
    if args.once {
        scheduler = scheduler.with_max_passes(1);
    }

    match start_blocking(scheduler, Arc::new(TracingSink)) {
        Ok(_) => ExitCode::SUCCESS,
        // Pass-fatal errors were already reported through the sink.
        Err(DaemonError::Sync(_)) => ExitCode::from(EXIT_FATAL),
        Err(err) => {
            tracing::error!(error = %err, "mirror stopped");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
