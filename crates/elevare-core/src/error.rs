use std::time::Duration;
use thiserror::Error;

/// A convenience `Result` alias using [`ElevareError`].
pub type ElevareResult<T> = Result<T, ElevareError>;

/// Failure reported by an external capability.
///
/// There is one variant per capability the pipelines depend on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// The text-generation model failed or returned nothing usable.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Text-to-speech synthesis failed.
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// The deep-research service failed.
    #[error("Research error: {0}")]
    Research(String),

    /// Structured extraction failed or produced data that does not match the schema.
    #[error("Extraction error: {0}")]
    Extraction(String),
}

/// Why a single stage attempt did not produce a result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageFailure {
    /// The wrapped capability call failed.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// The capability call did not finish within the stage timeout.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The capability answered, but the value does not fit the session state schema.
    #[error("invalid output: {0}")]
    InvalidOutput(String),

    /// The connection that owned the run went away.
    #[error("cancelled")]
    Cancelled,
}

/// A stage failure tagged with the stage that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("stage '{stage}' failed: {failure}")]
pub struct StageError {
    /// Name of the failed stage.
    pub stage: String,
    /// Cause of the failure.
    pub failure: StageFailure,
}

impl StageError {
    /// Creates a stage error for `stage`.
    pub fn new(stage: impl Into<String>, failure: impl Into<StageFailure>) -> Self {
        Self {
            stage: stage.into(),
            failure: failure.into(),
        }
    }

    /// Returns `true` when the failure is a cancellation rather than a real error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.failure, StageFailure::Cancelled)
    }
}

/// Top-level error type for Elevare.
#[derive(Error, Debug)]
pub enum ElevareError {
    /// A malformed inbound message.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A stage failed after its retry.
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    /// Durable storage is unavailable or rejected a write.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// No session is known under the given id.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The session exists but has not completed its entry pipeline.
    #[error("Session not ready: {0}")]
    SessionNotReady(String),

    /// A value failed validation (session ids, state schema, request bodies).
    #[error("Validation error: {0}")]
    Validation(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the HTTP/WebSocket gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

