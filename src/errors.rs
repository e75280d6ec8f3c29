// src/errors.rs
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to create zip archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Non-200 response. Displays as the literal status line followed by the body.
    #[error("{status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("{0}")]
    Validation(String),

    #[error("--test_settings_number and --setting have different number")]
    SettingsConflict { flag: u64, json: serde_json::Value },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected status '{0}' returned by the server")]
    UnknownStatus(String),

    #[error("no batch run exists in this project")]
    NoBatchRun,

    #[error("batch run never finished")]
    RunNeverFinished { waited_secs: u64 },

    #[error("Screenshots download failed unexpectedly")]
    ScreenshotsFailed { status: String },

    #[error("Reached timeout of {limit_secs} seconds while waiting for screenshots download.{}",
        default_timeout_hint(.limit_secs, .default_used))]
    ScreenshotsTimeout { limit_secs: u64, default_used: bool },
}

impl ClientError {
    /// True for failures detected before any request left the machine.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClientError::Validation(_) | ClientError::SettingsConflict { .. } | ClientError::Config(_)
        )
    }

    /// True when a poll budget ran out, as opposed to a transport or protocol failure.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ClientError::RunNeverFinished { .. } | ClientError::ScreenshotsTimeout { .. }
        )
    }
}

fn default_timeout_hint(limit_secs: &u64, default_used: &bool) -> String {
    if *default_used {
        format!(
            "  Default timeout is {limit_secs} seconds.  If it's not enough, please specify a longer value by --wait_limit or -w option."
        )
    } else {
        String::new()
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
