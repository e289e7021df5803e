//! Error types for rangefetch.
//!
//! Every failure is fatal to the run that produced it. Library code returns
//! these values up the call chain; only the binary decides to exit.
use reqwest::StatusCode;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The metadata probe was answered with a non-success status.
    #[error("resource unavailable: server answered {status}")]
    ResourceUnavailable { status: StatusCode },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("transport error: no data received within {0:?}")]
    Timeout(std::time::Duration),

    /// A range request was not answered with a partial-content response.
    #[error("transport error: range {range} answered with {status}")]
    UnexpectedStatus { status: StatusCode, range: String },

    #[error("short write to {}: expected {expected} bytes, wrote {written}", path.display())]
    ShortWrite {
        path: PathBuf,
        expected: u64,
        written: u64,
    },

    #[error("zero-byte write to {}", path.display())]
    ZeroByteWrite { path: PathBuf },

    #[error("filesystem error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{count} ranges exceed the limit of {max}; use a larger block size")]
    TooManyRanges { count: usize, max: usize },

    #[error("fetch task panicked: {0}")]
    TaskPanicked(#[from] tokio::task::JoinError),

    #[error("download cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// True for network-level failures: connection errors, timeouts and
    /// unexpected response statuses.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Timeout(_) | Error::UnexpectedStatus { .. }
        )
    }
}

/// The step of a run at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Probe,
    Partition,
    Download,
    Merge,
    Finalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Probe => "probe",
            Stage::Partition => "partition",
            Stage::Download => "download",
            Stage::Merge => "merge",
            Stage::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// A fatal run failure, tagged with the stage that produced it.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl RunError {
    pub fn new(stage: Stage, source: Error) -> Self {
        Self { stage, source }
    }
}

/// Attaches a [`Stage`] to a library result.
pub(crate) trait StageExt<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, RunError>;
}

impl<T> StageExt<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, RunError> {
        self.map_err(|e| RunError::new(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_error_names_stage() {
        let err = RunError::new(
            Stage::Merge,
            Error::ZeroByteWrite {
                path: PathBuf::from("tmp/a.bin_0_9"),
            },
        );
        assert_eq!(err.to_string(), "merge failed: zero-byte write to tmp/a.bin_0_9");
    }

    #[test]
    fn test_transport_family() {
        let status = Error::UnexpectedStatus {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            range: "bytes=0-9".into(),
        };
        assert!(status.is_transport());
        assert!(Error::Timeout(std::time::Duration::from_secs(1)).is_transport());
        assert!(!Error::Cancelled.is_transport());
    }
}
