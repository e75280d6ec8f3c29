// src/transport/mod.rs

use std::path::Path;

use crate::errors::Result;
use crate::models::{BatchRun, BatchRunQuery, BatchRunSummary, ScreenshotOptions, TaskStatus};
use crate::settings::ResolvedSettings;

#[cfg(test)]
pub(crate) mod fake;
pub mod http;

pub use http::HttpTransport;

/// The calls the run and screenshot controllers make against the service.
///
/// `HttpTransport` is the real implementation; tests drive the poll loops with
/// scripted ones. Note: plain `impl Future` returns, no `async_trait`.
pub trait MagicPodApi: Send + Sync {
    /// Starts a single or cross batch run, depending on `settings.kind`.
    fn start_batch_run(
        &self,
        settings: &ResolvedSettings,
    ) -> impl std::future::Future<Output = Result<BatchRun>> + Send;

    /// Fetches a fresh snapshot of a batch run.
    fn get_batch_run(
        &self,
        batch_run_number: u64,
    ) -> impl std::future::Future<Output = Result<BatchRun>> + Send;

    /// Lists runs most-recent-first, in the order the server returns them.
    fn list_batch_runs(
        &self,
        query: &BatchRunQuery,
    ) -> impl std::future::Future<Output = Result<Vec<BatchRunSummary>>> + Send;

    /// Asks the server to build a screenshot archive and returns the task id.
    fn prepare_screenshots(
        &self,
        batch_run_number: u64,
        options: &ScreenshotOptions,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    fn get_batch_task_status(
        &self,
        batch_task_id: u64,
    ) -> impl std::future::Future<Output = Result<TaskStatus>> + Send;

    /// Writes the prepared archive to `download_path`. Leaves no file behind on failure.
    fn download_screenshots(
        &self,
        batch_task_id: u64,
        download_path: &Path,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
