use std::path::PathBuf;

use thiserror::Error;

use crate::batch_api::{ApiError, JobStatus};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Chunk size must be a positive integer, got {0}")]
    InvalidChunkSize(usize),

    #[error("Batch API error: {0}")]
    Api(#[from] ApiError),

    #[error("Batch {job_id} ended with status: {status}")]
    JobTerminal { job_id: String, status: JobStatus },

    #[error("Batch {job_id} succeeded but reported no output file")]
    MissingOutput { job_id: String },

    #[error("Remote identifier {0:?} cannot be used in a file name")]
    InvalidRemoteId(String),

    #[error("Batch {job_id} still not terminal after {polls} polls")]
    PollLimit { job_id: String, polls: u32 },

    #[error("Invalid state transition for unit {index}: {from} -> {to}")]
    InvalidTransition {
        index: usize,
        from: crate::state_machine::UnitState,
        to: crate::state_machine::UnitState,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BatchError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BatchError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_terminal_display() {
        let err = BatchError::JobTerminal {
            job_id: "batch_1".into(),
            status: JobStatus::Cancelled,
        };
        assert_eq!(err.to_string(), "Batch batch_1 ended with status: cancelled");
    }

    #[test]
    fn io_error_names_the_path() {
        let err = BatchError::io(
            "data.jsonl",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(err.to_string(), "IO error on data.jsonl: missing");
    }

    #[test]
    fn api_error_converts() {
        let err: BatchError = ApiError::Decode("bad body".into()).into();
        assert!(matches!(err, BatchError::Api(ApiError::Decode(_))));
    }
}
