// src/transport/fake.rs

use reqwest::StatusCode;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::{ClientError, Result};
use crate::models::{BatchRun, BatchRunQuery, BatchRunSummary, ScreenshotOptions, TaskStatus};
use crate::settings::ResolvedSettings;
use crate::transport::MagicPodApi;

/// One scripted server answer.
#[derive(Clone)]
pub(crate) enum Reply<T> {
    Ok(T),
    Fail(StatusCode, &'static str),
}

impl<T: Clone> Reply<T> {
    fn to_result(&self) -> Result<T> {
        match self {
            Reply::Ok(value) => Ok(value.clone()),
            Reply::Fail(status, body) => Err(ClientError::Api {
                status: *status,
                body: body.to_string(),
            }),
        }
    }
}

/// Plays back scripted replies in order. Once a script runs out, its last reply
/// repeats forever. Records when each call happened on the tokio clock.
pub(crate) struct ScriptedApi {
    started: Instant,
    start_reply: BatchRun,
    run_reads: Mutex<Vec<Reply<BatchRun>>>,
    task_reads: Mutex<Vec<Reply<TaskStatus>>>,
    listed: Vec<BatchRunSummary>,
    pub(crate) run_fetch_times: Mutex<Vec<Duration>>,
    pub(crate) task_fetch_times: Mutex<Vec<Duration>>,
    pub(crate) downloads: Mutex<Vec<u64>>,
}

impl ScriptedApi {
    pub(crate) fn new(start_reply: BatchRun) -> Self {
        Self {
            started: Instant::now(),
            start_reply,
            run_reads: Mutex::new(Vec::new()),
            task_reads: Mutex::new(Vec::new()),
            listed: Vec::new(),
            run_fetch_times: Mutex::new(Vec::new()),
            task_fetch_times: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_run_reads(self, reads: Vec<Reply<BatchRun>>) -> Self {
        *self.run_reads.lock().unwrap() = reads;
        self
    }

    pub(crate) fn with_task_reads(self, reads: Vec<Reply<TaskStatus>>) -> Self {
        *self.task_reads.lock().unwrap() = reads;
        self
    }

    pub(crate) fn with_listed(mut self, listed: Vec<BatchRunSummary>) -> Self {
        self.listed = listed;
        self
    }

    pub(crate) fn run_fetches(&self) -> usize {
        self.run_fetch_times.lock().unwrap().len()
    }

    fn next<T: Clone>(script: &Mutex<Vec<Reply<T>>>, times: &Mutex<Vec<Duration>>, at: Duration) -> Result<T> {
        let mut times = times.lock().unwrap();
        let index = times.len();
        times.push(at);
        let script = script.lock().unwrap();
        let reply = script
            .get(index)
            .or_else(|| script.last())
            .expect("script has no replies");
        reply.to_result()
    }
}

pub(crate) fn run(number: u64, status: &str, succeeded: u64, failed: u64, unresolved: u64, total: u64) -> BatchRun {
    let mut run = BatchRun {
        batch_run_number: number,
        status: status.to_string(),
        url: format!("https://magic-pod.com/org/proj/batch-run/{number}/"),
        ..Default::default()
    };
    run.test_cases.succeeded = succeeded;
    run.test_cases.failed = failed;
    run.test_cases.unresolved = unresolved;
    run.test_cases.total = total;
    run
}

impl MagicPodApi for ScriptedApi {
    async fn start_batch_run(&self, _settings: &ResolvedSettings) -> Result<BatchRun> {
        Ok(self.start_reply.clone())
    }

    async fn get_batch_run(&self, _batch_run_number: u64) -> Result<BatchRun> {
        Self::next(&self.run_reads, &self.run_fetch_times, self.started.elapsed())
    }

    async fn list_batch_runs(&self, query: &BatchRunQuery) -> Result<Vec<BatchRunSummary>> {
        let count = query.count.map(|c| c as usize).unwrap_or(usize::MAX);
        Ok(self.listed.iter().take(count).cloned().collect())
    }

    async fn prepare_screenshots(&self, batch_run_number: u64, _options: &ScreenshotOptions) -> Result<u64> {
        Ok(batch_run_number * 100)
    }

    async fn get_batch_task_status(&self, _batch_task_id: u64) -> Result<TaskStatus> {
        Self::next(&self.task_reads, &self.task_fetch_times, self.started.elapsed())
    }

    async fn download_screenshots(&self, batch_task_id: u64, download_path: &Path) -> Result<()> {
        self.downloads.lock().unwrap().push(batch_task_id);
        std::fs::write(download_path, b"PK\x05\x06")?;
        Ok(())
    }
}
