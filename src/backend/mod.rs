//! Remote backends for the review platform
//!
//! Provides one interface over the real HTTP API and the local stub used for
//! development, so the pipeline runs unchanged against either.

mod factory;
mod http;
mod stub;
mod url;
pub mod wire;

pub use factory::create_backend;
pub use http::HttpBackend;
pub use stub::StubBackend;
pub use url::validate_upload_url;

use crate::config::Environment;
use crate::error::{Error, Result};
use crate::submit::{FeedbackRequest, SubmissionManifest};
use crate::types::{
    AssignmentRef, FeedbackField, FeedbackResult, RegisteredSubmission, SubmissionState,
    SubmissionSummary, UploadSlot, UserInfo,
};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Remote operations used by the submission pipeline
///
/// An instance is bound to one environment and one API key for its whole
/// lifetime. Implementations keep no per-run state between calls.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Environment every call of this instance targets
    fn environment(&self) -> Environment;

    /// Ordered states probed when locating a submission
    fn probe_states(&self) -> &[SubmissionState];

    /// Task type of the project's submission task
    async fn project_task_type(&self, project_id: &str) -> Result<String>;

    /// First open assignment of `task_type`, if any
    async fn find_open_assignment(
        &self,
        project_id: &str,
        task_type: &str,
    ) -> Result<Option<AssignmentRef>>;

    /// Ask the service to create an assignment of `task_type`
    async fn create_assignment(&self, project_id: &str, task_type: &str) -> Result<()>;

    /// Assignment id behind an existing submission
    async fn assignment_for_submission(
        &self,
        project_id: &str,
        submission_id: &str,
    ) -> Result<String>;

    /// Validation field declared in the project's form schema
    async fn feedback_field(&self, project_id: &str) -> Result<FeedbackField>;

    /// Acquire a single-use upload destination for `filename`
    async fn request_upload_slot(
        &self,
        project_id: &str,
        assignment_id: &str,
        filename: &str,
    ) -> Result<UploadSlot>;

    /// PUT the artifact at `artifact` to `slot`
    async fn upload_artifact(&self, slot: &UploadSlot, artifact: &Path) -> Result<()>;

    /// Run automated validation against an uploaded artifact
    async fn run_feedback(&self, request: &FeedbackRequest) -> Result<FeedbackResult>;

    /// Create or update the submission record
    async fn register_submission(
        &self,
        manifest: &SubmissionManifest,
    ) -> Result<RegisteredSubmission>;

    /// Assignments the caller holds in `state`
    ///
    /// Records without an explicit state are tagged with `state`.
    async fn assignments_in_state(
        &self,
        state: &SubmissionState,
        project_id: Option<&str>,
    ) -> Result<Vec<SubmissionSummary>>;

    /// Identity behind the API key
    async fn current_user(&self) -> Result<UserInfo>;

    /// Find an open assignment, creating one if the project has none
    ///
    /// The lookup is retried exactly once after creation.
    async fn resolve_assignment(
        &self,
        project_id: &str,
        task_type: &str,
    ) -> Result<AssignmentRef> {
        if let Some(found) = self.find_open_assignment(project_id, task_type).await? {
            return Ok(found);
        }

        debug!(project_id, task_type, "no open assignment, creating one");
        self.create_assignment(project_id, task_type).await?;

        self.find_open_assignment(project_id, task_type)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "no assignment of type {task_type} in project {project_id} after creating one"
                ))
            })
    }

    /// State the submission is currently listed under
    ///
    /// Probes every configured state in order. A state whose query is
    /// rejected by the service is skipped; other failures abort the probe.
    async fn submission_state(
        &self,
        project_id: &str,
        submission_id: &str,
    ) -> Result<SubmissionState> {
        let mut found = Vec::new();

        for state in self.probe_states() {
            match self.assignments_in_state(state, Some(project_id)).await {
                Ok(assignments) => {
                    if assignments.iter().any(|a| a.task_id == submission_id) {
                        found.push(state.clone());
                    }
                }
                Err(Error::Remote { status, .. }) => {
                    debug!(%state, status, "state query rejected, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        match found.len() {
            0 => Err(Error::NotFound(format!(
                "submission {submission_id} not found in project {project_id} in any known state"
            ))),
            1 => Ok(found.remove(0)),
            _ => Err(Error::ConflictingStates {
                submission_id: submission_id.to_string(),
                states: found.iter().map(ToString::to_string).collect(),
            }),
        }
    }

    /// Submissions across every configured state
    async fn list_submissions(&self, project_id: Option<&str>) -> Result<Vec<SubmissionSummary>> {
        let mut all = Vec::new();

        for state in self.probe_states() {
            let assignments = self.assignments_in_state(state, project_id).await?;
            all.extend(assignments.into_iter().filter(|a| {
                project_id.is_none_or(|p| a.project_id.is_empty() || a.project_id == p)
            }));
        }

        Ok(all)
    }
}
