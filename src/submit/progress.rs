//! Progress callback trait for interface-agnostic updates
//!
//! The pipeline reports what it is doing through this trait so the CLI can
//! render spinners while tests stay silent.

use crate::archive::ArchiveStats;
use crate::error::Error;
use crate::types::FeedbackResult;
use async_trait::async_trait;
use std::fmt;

/// Pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Checking the remote state of the tracked submission
    CheckingState,
    /// Zipping the folder
    Packaging,
    /// Resolving task metadata and the upload slot
    Preparing,
    /// Uploading the artifact
    Uploading,
    /// Waiting for automated validation
    Validating,
    /// Registering the submission
    Registering,
    /// Submission complete
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CheckingState => "Checking submission state",
            Self::Packaging => "Packaging",
            Self::Preparing => "Preparing upload",
            Self::Uploading => "Uploading",
            Self::Validating => "Running validation",
            Self::Registering => "Registering submission",
            Self::Complete => "Complete",
        };
        f.write_str(label)
    }
}

/// Progress callback trait
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// Called when entering a new phase
    async fn on_phase(&self, phase: Phase);

    /// Called once the artifact has been written
    async fn on_packaged(&self, stats: &ArchiveStats);

    /// Called with the validation result, whatever its outcome
    async fn on_feedback(&self, feedback: &FeedbackResult);

    /// Called when an error occurs (non-fatal)
    async fn on_error(&self, error: &Error);

    /// Called with a general status message
    async fn on_message(&self, message: &str);
}

/// No-op progress callback for testing or when progress isn't needed
pub struct NoopProgress;

#[async_trait]
impl ProgressCallback for NoopProgress {
    async fn on_phase(&self, _phase: Phase) {}
    async fn on_packaged(&self, _stats: &ArchiveStats) {}
    async fn on_feedback(&self, _feedback: &FeedbackResult) {}
    async fn on_error(&self, _error: &Error) {}
    async fn on_message(&self, _message: &str) {}
}
