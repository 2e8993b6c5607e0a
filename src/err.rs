//! Error type shared by the calling pipeline.

use std::time::Duration;

/// Errors raised while resolving inputs, running callers, or normalizing output.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Missing reference, missing tool binary, or invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// No usable samples or no usable tool input lines.
    #[error("no valid input: {0}")]
    NoValidInput(String),
    /// A required external step exited non-zero.
    #[error("command `{command}` failed ({status}): {stderr}")]
    ExternalProcess {
        command: String,
        status: String,
        stderr: String,
    },
    /// An external step did not finish within its bound.
    #[error("command `{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    /// Unparseable tool output, VCF, or BED content.
    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Shortcut for building a `Malformed` error.
    pub fn malformed(what: &'static str, detail: impl Into<String>) -> Self {
        Error::Malformed {
            what,
            detail: detail.into(),
        }
    }
}
