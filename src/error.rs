// OpenUI Controller - Error types
// Failures surfaced by the lifecycle controller and its backends

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("failed to launch `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{service} did not become ready at {url} after {attempts} attempts")]
    ReadinessTimeout {
        service: String,
        url: String,
        attempts: u32,
    },

    #[error("start of {service} abandoned: stop requested")]
    Cancelled { service: String },

    #[error("process table query failed: {message}")]
    ProcessQuery { message: String },

    #[error("failed to signal {failed} process(es) matching `{pattern}`")]
    Terminate { pattern: String, failed: usize },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl LifecycleError {
    pub fn process_query<S: Into<String>>(message: S) -> Self {
        Self::ProcessQuery {
            message: message.into(),
        }
    }

    /// Whether the failure happened while launching rather than while waiting.
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Self::SpawnFailed { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReadinessTimeout { .. })
    }

    /// A stop arrived while the start was still waiting for readiness
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
