//! Error taxonomy of the pipeline core

use thiserror::Error;

/// Failures raised by sources, frames and the process worker.
///
/// Hook failures are not part of this enum: they are plain
/// [`color_eyre::Report`]s that propagate out of the engine untouched.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to open video source at {identifier}: {reason}")]
    SourceUnavailable { identifier: String, reason: String },

    #[error("can't receive frame from {identifier}")]
    FrameReadFailure { identifier: String },

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("process worker terminated before delivering a result")]
    WorkerGone,

    #[error("a process task is already in flight")]
    WorkerBusy,

    #[error("rotation found no staged input frame")]
    NothingStaged,
}

impl PipelineError {
    pub fn unavailable(identifier: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            identifier: identifier.into(),
            reason: reason.to_string(),
        }
    }

    pub fn read_failure(identifier: impl Into<String>) -> Self {
        Self::FrameReadFailure {
            identifier: identifier.into(),
        }
    }

    /// Fatal errors that end the run loop through the graceful shutdown path.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::FrameReadFailure { .. })
    }
}
