//! Mirror daemon runtime: periodic scheduler, signal handling, durable logging.

mod error;
pub mod log_rotation;
pub mod logging;
mod scheduler;

pub use error::DaemonError;
pub use log_rotation::RotatingFile;
pub use logging::{init_logging, LogSettings, UtcSeconds};
pub use scheduler::{
    run, run_until_signal, start_blocking, SchedulerConfig, SchedulerState, StopReason,
};
