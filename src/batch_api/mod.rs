pub mod client;
pub mod error;
pub mod retry;
pub mod types;

pub use client::{BatchClient, ClientSettings};
pub use error::ApiError;
pub use retry::RetryPolicy;
pub use types::{JobStatus, ResultRef, StatusSnapshot, SubmitConfig, is_safe_id};

/// The four remote operations the orchestrator needs from a batch service.
///
/// Implementations are expected to apply their own retry policy; errors returned
/// here are final for the call.
#[allow(async_fn_in_trait)]
pub trait BatchApi {
    /// Uploads one work unit and returns the input file reference.
    async fn upload(&self, file_name: &str, content: Vec<u8>) -> Result<String, ApiError>;

    /// Creates a batch job for an uploaded file and returns the job id.
    async fn submit(&self, input_file_id: &str, config: &SubmitConfig) -> Result<String, ApiError>;

    /// Reads the current status of a job.
    async fn poll(&self, job_id: &str) -> Result<StatusSnapshot, ApiError>;

    /// Downloads a result artifact.
    async fn fetch(&self, result: &ResultRef) -> Result<Vec<u8>, ApiError>;
}
