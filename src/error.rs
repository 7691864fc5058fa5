//! Error taxonomy for the particle engine.
//!
//! Audio and device errors are absorbed by the audio pipeline; only
//! configuration errors reach the caller synchronously.

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, FieldError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    /// Capture device access was refused
    #[error("Audio capture permission denied")]
    PermissionDenied,

    /// The audio subsystem could not be initialised
    #[error("Audio device setup failed: {0}")]
    DeviceSetupFailure(String),

    /// Invalid configuration; existing state is left untouched
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// Releasing something that was already released
    #[error("Resource already released: {0}")]
    ResourceDisposal(String),

    /// A frame could not be drawn or presented
    #[error("Render failed: {0}")]
    Render(String),
}

impl FieldError {
    pub fn device(msg: impl Into<String>) -> Self {
        Self::DeviceSetupFailure(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the pipeline can keep running after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}
