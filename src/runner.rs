// src/runner.rs
use std::time::Duration;
use tokio::time::{Instant, sleep};

use crate::errors::{ClientError, Result};
use crate::models::{BatchRun, BatchRunQuery, RunStatus, TestCaseCounts};
use crate::progress::Progress;
use crate::settings::ResolvedSettings;
use crate::transport::MagicPodApi;

/// Poll more often while a run is young.
const INITIAL_POLL_INTERVAL: Duration = Duration::from_secs(10);
const INITIAL_POLL_PERIOD: Duration = Duration::from_secs(120);
const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default wait budget per test case when no explicit limit is given.
const WAIT_PER_TEST_CASE: Duration = Duration::from_secs(10 * 60);

/// How a batch run invocation should behave after the run has started.
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub wait_for_result: bool,
    /// Seconds; 0 derives the budget from the test case count.
    pub wait_limit_secs: u64,
    pub print_result: bool,
}

/// Final state of a batch run as seen by this client.
///
/// `batch_run` is the latest snapshot obtained, even when `error` is set.
#[derive(Debug)]
pub struct BatchRunOutcome {
    pub batch_run: BatchRun,
    /// The run failed or was aborted, or its status could not be read.
    pub exists_error: bool,
    /// The run finished with unresolved test cases.
    pub exists_unresolved: bool,
    pub error: Option<ClientError>,
}

impl BatchRunOutcome {
    fn finished(batch_run: BatchRun, exists_error: bool, exists_unresolved: bool) -> Self {
        Self {
            batch_run,
            exists_error,
            exists_unresolved,
            error: None,
        }
    }

    fn failed(batch_run: BatchRun, error: ClientError) -> Self {
        Self {
            batch_run,
            exists_error: true,
            exists_unresolved: false,
            error: Some(error),
        }
    }
}

/// Budget for waiting on a run: the explicit limit, or 10 minutes per test case.
pub fn wait_budget(total_test_cases: u64, wait_limit_secs: u64) -> Duration {
    if wait_limit_secs > 0 {
        Duration::from_secs(wait_limit_secs)
    } else {
        WAIT_PER_TEST_CASE.saturating_mul(u32::try_from(total_test_cases).unwrap_or(u32::MAX))
    }
}

pub fn poll_interval(elapsed: Duration) -> Duration {
    if elapsed < INITIAL_POLL_PERIOD {
        INITIAL_POLL_INTERVAL
    } else {
        POLL_INTERVAL
    }
}

/// `"7/10 finished (2 failed, 1 unresolved)"`; non-zero counts only.
pub fn progress_line(counts: &TestCaseCounts, total: u64) -> String {
    let mut not_successful = Vec::new();
    if counts.failed > 0 {
        not_successful.push(format!("{} failed", counts.failed));
    }
    if counts.unresolved > 0 {
        not_successful.push(format!("{} unresolved", counts.unresolved));
    }

    let mut line = format!("{}/{} finished", counts.finished(), total);
    if !not_successful.is_empty() {
        line.push_str(&format!(" ({})", not_successful.join(", ")));
    }
    line
}

fn verdict_line(status: RunStatus, counts: &TestCaseCounts) -> String {
    match status {
        RunStatus::Failed if counts.failed > 0 => {
            if counts.unresolved > 0 {
                format!(
                    "batch run failed ({} failed, {} unresolved)",
                    counts.failed, counts.unresolved
                )
            } else {
                format!("batch run failed ({} failed)", counts.failed)
            }
        }
        RunStatus::Unresolved => {
            format!("batch run unresolved ({} unresolved)", counts.unresolved)
        }
        status => format!("batch run {}", status),
    }
}

/// Starts a batch run and, unless told otherwise, waits for it to finish.
///
/// An `Err` means the run could not be started at all; every later failure is
/// reported through the returned outcome together with the last known snapshot.
pub async fn execute_batch_run<A: MagicPodApi>(
    api: &A,
    settings: &ResolvedSettings,
    options: WaitOptions,
) -> Result<BatchRunOutcome> {
    let batch_run = api.start_batch_run(settings).await?;
    log::debug!(
        "Started batch run #{} ({:?})",
        batch_run.batch_run_number,
        settings.kind
    );

    let progress = Progress::new(options.print_result);
    progress.line("test result page:");
    progress.line(&batch_run.url);

    if !options.wait_for_result {
        return Ok(BatchRunOutcome::finished(batch_run, false, false));
    }

    Ok(wait_for_batch_run_result(api, batch_run, options.wait_limit_secs, options.print_result).await)
}

/// Polls `batch_run` until it reaches a terminal status or the wait budget runs out.
pub async fn wait_for_batch_run_result<A: MagicPodApi>(
    api: &A,
    batch_run: BatchRun,
    wait_limit_secs: u64,
    print_result: bool,
) -> BatchRunOutcome {
    let progress = Progress::new(print_result);
    let initial_total = batch_run.test_cases.total;
    let budget = wait_budget(initial_total, wait_limit_secs);
    let batch_run_number = batch_run.batch_run_number;

    progress.line(&format!(
        "\n#{} wait until {} tests to be finished.. ",
        batch_run_number, initial_total
    ));

    let started = Instant::now();
    let mut latest = batch_run;
    let mut prev_finished = 0;

    loop {
        let snapshot = match api.get_batch_run(batch_run_number).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Giving up on batch run #{}: {}", batch_run_number, e);
                return BatchRunOutcome::failed(latest, e);
            }
        };

        let counts = &snapshot.test_cases;
        let total = if counts.total > 0 { counts.total } else { initial_total };
        progress.dot();
        if counts.finished() != prev_finished {
            progress.line(&progress_line(counts, total));
            prev_finished = counts.finished();
        }

        let status = match snapshot.run_status() {
            Ok(status) => status,
            Err(e) => {
                log::error!("Batch run #{}: {}", batch_run_number, e);
                return BatchRunOutcome::failed(snapshot, e);
            }
        };

        if status.is_terminal() {
            progress.line(&verdict_line(status, counts));
            let exists_unresolved = counts.unresolved > 0;
            let exists_error = matches!(status, RunStatus::Failed | RunStatus::Aborted);
            return BatchRunOutcome::finished(snapshot, exists_error, exists_unresolved);
        }
        latest = snapshot;

        let elapsed = started.elapsed();
        if elapsed > budget {
            return BatchRunOutcome {
                batch_run: latest,
                exists_error: false,
                exists_unresolved: false,
                error: Some(ClientError::RunNeverFinished {
                    waited_secs: elapsed.as_secs(),
                }),
            };
        }
        sleep(poll_interval(elapsed)).await;
    }
}

/// Number of the most recent batch run in the project.
pub async fn latest_batch_run_number<A: MagicPodApi>(api: &A) -> Result<u64> {
    let query = BatchRunQuery {
        count: Some(1),
        ..Default::default()
    };
    api.list_batch_runs(&query)
        .await?
        .first()
        .map(|run| run.batch_run_number)
        .ok_or(ClientError::NoBatchRun)
}
