// src/progress.rs
use std::io::Write;

/// Operator-facing output on stdout; silent when printing is disabled.
pub(crate) struct Progress {
    enabled: bool,
}

impl Progress {
    pub(crate) fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub(crate) fn line(&self, message: &str) {
        if self.enabled {
            println!("{}", message);
        }
    }

    /// Keeps CI runners from killing a job that has been quiet for too long.
    pub(crate) fn dot(&self) {
        if self.enabled {
            print!(".");
            let _ = std::io::stdout().flush();
        }
    }
}
