// src/screenshots.rs
use std::path::Path;
use std::time::Duration;
use tokio::time::{Instant, sleep};

use crate::errors::{ClientError, Result};
use crate::models::{ScreenshotOptions, TaskStatus};
use crate::progress::Progress;
use crate::transport::MagicPodApi;

pub const DEFAULT_WAIT_LIMIT_SECS: u64 = 300;

/// How long to wait for the server to finish preparing screenshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitLimit {
    #[default]
    Default,
    Seconds(u64),
}

impl WaitLimit {
    /// Maps the `--wait_limit` flag; anything but a positive value means the default.
    pub fn from_flag(value: i64) -> Self {
        match u64::try_from(value) {
            Ok(secs) if secs > 0 => WaitLimit::Seconds(secs),
            _ => WaitLimit::Default,
        }
    }

    pub fn secs(self) -> u64 {
        match self {
            WaitLimit::Default => DEFAULT_WAIT_LIMIT_SECS,
            WaitLimit::Seconds(secs) => secs,
        }
    }
}

pub fn task_poll_interval(elapsed: Duration) -> Duration {
    match elapsed.as_secs() {
        0..=60 => Duration::from_secs(5),
        61..=120 => Duration::from_secs(10),
        _ => Duration::from_secs(30),
    }
}

/// Prepares the screenshot archive of a batch run, waits for it, and saves it
/// to `download_path`.
pub async fn get_screenshots<A: MagicPodApi>(
    api: &A,
    batch_run_number: u64,
    download_path: &Path,
    options: &ScreenshotOptions,
    wait_limit: WaitLimit,
    print_result: bool,
) -> Result<()> {
    let batch_task_id = api.prepare_screenshots(batch_run_number, options).await?;
    log::debug!(
        "Preparing screenshots of batch run #{} as task {}",
        batch_run_number,
        batch_task_id
    );
    let progress = Progress::new(print_result);
    progress.line("Preparing screenshots download.. ");

    let limit = Duration::from_secs(wait_limit.secs());
    let started = Instant::now();
    loop {
        match api.get_batch_task_status(batch_task_id).await? {
            TaskStatus::Succeeded => {
                progress.line("\nDone.");
                break;
            }
            TaskStatus::Running => progress.dot(),
            status => {
                return Err(ClientError::ScreenshotsFailed {
                    status: status.to_string(),
                });
            }
        }

        let elapsed = started.elapsed();
        if elapsed >= limit {
            return Err(ClientError::ScreenshotsTimeout {
                limit_secs: limit.as_secs(),
                default_used: wait_limit == WaitLimit::Default,
            });
        }
        sleep(task_poll_interval(elapsed)).await;
    }

    api.download_screenshots(batch_task_id, download_path).await?;
    log::info!("Saved screenshots to {}", download_path.display());
    Ok(())
}
