// src/lib.rs
pub mod archive;
pub mod config;
pub mod errors;
pub mod models;
mod progress;
pub mod runner;
pub mod screenshots;
pub mod settings;
pub mod transport;

pub use config::{ClientConfig, ConnectionOptions, FileConfig};
pub use errors::{ClientError, Result};
pub use runner::{BatchRunOutcome, WaitOptions, execute_batch_run, wait_for_batch_run_result};
pub use screenshots::{WaitLimit, get_screenshots};
pub use settings::{ResolvedSettings, RunKind, resolve_settings};
pub use transport::{HttpTransport, MagicPodApi};
