//! Submission pipeline
//!
//! Runs one folder through the fixed sequence of steps:
//! 1. Pre-checks - duplicate marker (create) or remote state (update)
//! 2. Packaging - zip the folder into a scratch artifact
//! 3. Preparation - task type, assignment, validation field, upload slot
//! 4. Upload, validation and registration

mod artifact;
mod execute;
mod manifest;
mod progress;

pub use artifact::ArtifactGuard;
pub use execute::{
    PipelineOutcome, PipelineState, SubmitMode, SubmitRequest, execute_pipeline,
    execute_pipeline_until,
};
pub use manifest::{FeedbackRequest, ManifestParts, SubmissionManifest};
pub use progress::{NoopProgress, Phase, ProgressCallback};
