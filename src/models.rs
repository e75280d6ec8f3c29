// src/models.rs
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::{ClientError, Result};

/// Status of a batch run as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    Unresolved,
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl FromStr for RunStatus {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            "unresolved" => Ok(RunStatus::Unresolved),
            "aborted" => Ok(RunStatus::Aborted),
            other => Err(ClientError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Unresolved => write!(f, "unresolved"),
            RunStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// Per-category test case counters. Missing counters decode as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestCaseCounts {
    pub succeeded: u64,
    pub failed: u64,
    pub aborted: u64,
    pub unresolved: u64,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

impl TestCaseCounts {
    pub fn finished(&self) -> u64 {
        self.succeeded
            .saturating_add(self.failed)
            .saturating_add(self.aborted)
            .saturating_add(self.unresolved)
    }
}

/// One execution on the server, as returned by the start and get endpoints.
///
/// Each poll yields a new snapshot; nothing updates a `BatchRun` in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchRun {
    pub batch_run_number: u64,
    pub status: String,
    pub url: String,
    pub test_cases: TestCaseCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_setting_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl BatchRun {
    /// Parses the raw status string. Unknown values are a protocol error.
    pub fn run_status(&self) -> Result<RunStatus> {
        self.status.parse()
    }
}

/// Row of the batch run list; the list endpoint omits per-pattern details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchRunSummary {
    pub batch_run_number: u64,
    pub status: String,
    pub url: String,
    pub test_cases: TestCaseCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_setting_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BatchRuns {
    pub batch_runs: Vec<BatchRunSummary>,
}

/// Query for the batch run list. Unset fields are left to the server defaults.
#[derive(Debug, Clone, Default)]
pub struct BatchRunQuery {
    pub count: Option<u32>,
    pub max_batch_run_number: Option<u64>,
    pub min_batch_run_number: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub file_no: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PreparedTask {
    pub batch_task_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BatchTask {
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileIndexType {
    #[default]
    LineNumber,
    AutoIncrement,
}

impl FileIndexType {
    pub fn as_str(self) -> &'static str {
        match self {
            FileIndexType::LineNumber => "line_number",
            FileIndexType::AutoIncrement => "auto_increment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileNameBodyType {
    #[default]
    None,
    ScreenshotName,
}

impl FileNameBodyType {
    pub fn as_str(self) -> &'static str {
        match self {
            FileNameBodyType::None => "none",
            FileNameBodyType::ScreenshotName => "screenshot_name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadType {
    #[default]
    All,
    CommandOnly,
}

impl DownloadType {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadType::All => "all",
            DownloadType::CommandOnly => "command_only",
        }
    }
}

/// Filtering options sent with a screenshot preparation request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScreenshotOptions {
    pub file_index_type: FileIndexType,
    pub file_name_body_type: FileNameBodyType,
    pub download_type: DownloadType,
    pub mask_dynamically_changed_area: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_run_tolerant_decode() {
        let run: BatchRun = serde_json::from_value(json!({
            "batch_run_number": 42,
            "status": "running",
            "url": "https://magic-pod.com/org/proj/batch-run/42/",
            "test_cases": { "succeeded": 3, "total": 10 },
            "organization_name": "org",
            "duration_seconds": 12
        }))
        .unwrap();

        assert_eq!(run.batch_run_number, 42);
        assert_eq!(run.test_cases.failed, 0);
        assert_eq!(run.test_cases.unresolved, 0);
        assert_eq!(run.test_cases.finished(), 3);
        assert_eq!(run.run_status().unwrap(), RunStatus::Running);
        assert!(run.test_cases.details.is_none());
    }

    #[test]
    fn test_finished_saturates_on_huge_counters() {
        let counts = TestCaseCounts {
            succeeded: u64::MAX - 1,
            failed: 5,
            unresolved: 1,
            ..Default::default()
        };
        assert_eq!(counts.finished(), u64::MAX);
    }

    #[test]
    fn test_unknown_run_status_is_protocol_error() {
        let run = BatchRun {
            status: "paused".to_string(),
            ..Default::default()
        };
        match run.run_status() {
            Err(ClientError::UnknownStatus(s)) => assert_eq!(s, "paused"),
            other => panic!("expected UnknownStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!RunStatus::Running.is_terminal());
        for status in ["succeeded", "failed", "unresolved", "aborted"] {
            assert!(status.parse::<RunStatus>().unwrap().is_terminal());
        }
    }

    #[test]
    fn test_task_status_unknown_value() {
        let task: BatchTask = serde_json::from_value(json!({ "status": "queued" })).unwrap();
        assert_eq!(task.status, TaskStatus::Unknown);
    }

    #[test]
    fn test_batch_run_list_keeps_server_order() {
        let runs: BatchRuns = serde_json::from_value(json!({
            "batch_runs": [
                { "batch_run_number": 9, "status": "running" },
                { "batch_run_number": 7, "status": "succeeded" },
                { "batch_run_number": 8, "status": "failed" }
            ]
        }))
        .unwrap();
        let numbers: Vec<u64> = runs.batch_runs.iter().map(|r| r.batch_run_number).collect();
        assert_eq!(numbers, vec![9, 7, 8]);
    }
}
