//! Mock remote backend for testing
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use async_trait::async_trait;
use stb::backend::RemoteBackend;
use stb::config::Environment;
use stb::error::{Error, Result};
use stb::submit::{FeedbackRequest, SubmissionManifest};
use stb::types::{
    AssignmentRef, CheckStatus, FeedbackCheck, FeedbackField, FeedbackOutcome, FeedbackResult,
    RegisteredSubmission, SubmissionState, SubmissionSummary, UploadSlot, UserInfo,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Failure injected into one backend operation
#[derive(Debug, Clone)]
pub enum Failure {
    /// Non-2xx answer with this status
    Remote(u16),
    /// Transport failure
    Connectivity,
    /// Resource missing
    NotFound,
    /// Response could not be decoded
    Decode,
}

impl Failure {
    fn to_error(&self, op: &str) -> Error {
        match self {
            Self::Remote(status) => Error::Remote {
                status: *status,
                reason: "Mock".to_string(),
                body: format!("{{\"detail\":\"{op} failed\"}}"),
            },
            Self::Connectivity => Error::Connectivity(format!("{op}: connection refused")),
            Self::NotFound => Error::NotFound(format!("{op}: nothing here")),
            Self::Decode => Error::Decode(format!("{op}: expected value")),
        }
    }
}

/// What the upload saw when it was called
#[derive(Debug, Clone)]
pub struct UploadCall {
    pub slot: UploadSlot,
    pub artifact: PathBuf,
    pub artifact_existed: bool,
}

/// Hand-written mock of `RemoteBackend`
///
/// Features:
/// - Call tracking by operation name, in order
/// - Configurable task, assignment, feedback and state responses
/// - Error injection per operation
/// - Hanging an operation forever, to test interruption
pub struct MockBackend {
    probe_states: Vec<SubmissionState>,
    task_type: Mutex<String>,
    open_assignment: Mutex<Option<AssignmentRef>>,
    feedback_outcome: Mutex<FeedbackOutcome>,
    state: Mutex<SubmissionState>,
    registered_id: Mutex<Option<String>>,
    failures: Mutex<HashMap<&'static str, Failure>>,
    hang_on: Mutex<Option<&'static str>>,
    /// Notified when an operation starts hanging
    pub hanging: Arc<Notify>,
    // Call tracking
    calls: Mutex<Vec<&'static str>>,
    slot_requests: Mutex<Vec<(String, String, String)>>,
    uploads: Mutex<Vec<UploadCall>>,
    feedback_requests: Mutex<Vec<serde_json::Value>>,
    manifests: Mutex<Vec<serde_json::Value>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Mock that passes every step
    pub fn new() -> Self {
        Self {
            probe_states: SubmissionState::DEFAULT_PROBE_ORDER.to_vec(),
            task_type: Mutex::new("submission-test".to_string()),
            open_assignment: Mutex::new(Some(AssignmentRef {
                task_id: "task-new".to_string(),
                assignment_id: "asg-new".to_string(),
            })),
            feedback_outcome: Mutex::new(FeedbackOutcome::Pass),
            state: Mutex::new(SubmissionState::NeedsRevision),
            registered_id: Mutex::new(None),
            failures: Mutex::new(HashMap::new()),
            hang_on: Mutex::new(None),
            hanging: Arc::new(Notify::new()),
            calls: Mutex::new(Vec::new()),
            slot_requests: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            feedback_requests: Mutex::new(Vec::new()),
            manifests: Mutex::new(Vec::new()),
        }
    }

    // === Configuration ===

    /// Outcome returned by `run_feedback`
    pub fn set_feedback_outcome(&self, outcome: FeedbackOutcome) {
        *self.feedback_outcome.lock().unwrap() = outcome;
    }

    /// State returned by `submission_state`
    pub fn set_state(&self, state: SubmissionState) {
        *self.state.lock().unwrap() = state;
    }

    /// Id echoed by `register_submission` instead of the manifest id
    pub fn set_registered_id(&self, id: &str) {
        *self.registered_id.lock().unwrap() = Some(id.to_string());
    }

    /// Make `op` fail
    pub fn fail(&self, op: &'static str, failure: Failure) {
        self.failures.lock().unwrap().insert(op, failure);
    }

    /// Make `op` never return
    pub fn hang_on(&self, op: &'static str) {
        *self.hang_on.lock().unwrap() = Some(op);
    }

    // === Call verification ===

    /// Operations called so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls to `op`
    pub fn call_count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| **c == op).count()
    }

    /// Upload calls
    pub fn uploads(&self) -> Vec<UploadCall> {
        self.uploads.lock().unwrap().clone()
    }

    /// `(project, assignment, filename)` of every slot request
    pub fn slot_requests(&self) -> Vec<(String, String, String)> {
        self.slot_requests.lock().unwrap().clone()
    }

    /// Feedback requests as sent on the wire
    pub fn feedback_requests(&self) -> Vec<serde_json::Value> {
        self.feedback_requests.lock().unwrap().clone()
    }

    /// Registration manifests as sent on the wire
    pub fn manifests(&self) -> Vec<serde_json::Value> {
        self.manifests.lock().unwrap().clone()
    }

    /// Assert that nothing was called
    pub fn assert_no_calls(&self) {
        let calls = self.calls();
        assert!(calls.is_empty(), "Expected no backend calls but got: {calls:?}");
    }

    /// Assert that `op` was never called
    pub fn assert_not_called(&self, op: &str) {
        let calls = self.calls();
        assert!(
            !calls.iter().any(|c| *c == op),
            "Expected {op} not to be called but got: {calls:?}"
        );
    }

    async fn enter(&self, op: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(op);

        let hang = *self.hang_on.lock().unwrap() == Some(op);
        if hang {
            self.hanging.notify_one();
            std::future::pending::<()>().await;
        }

        match self.failures.lock().unwrap().get(op) {
            Some(failure) => Err(failure.to_error(op)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteBackend for MockBackend {
    fn environment(&self) -> Environment {
        Environment::Dev
    }

    fn probe_states(&self) -> &[SubmissionState] {
        &self.probe_states
    }

    async fn project_task_type(&self, _project_id: &str) -> Result<String> {
        self.enter("project_task_type").await?;
        Ok(self.task_type.lock().unwrap().clone())
    }

    async fn find_open_assignment(
        &self,
        _project_id: &str,
        _task_type: &str,
    ) -> Result<Option<AssignmentRef>> {
        self.enter("find_open_assignment").await?;
        Ok(self.open_assignment.lock().unwrap().clone())
    }

    async fn create_assignment(&self, _project_id: &str, _task_type: &str) -> Result<()> {
        self.enter("create_assignment").await
    }

    async fn assignment_for_submission(
        &self,
        _project_id: &str,
        submission_id: &str,
    ) -> Result<String> {
        self.enter("assignment_for_submission").await?;
        Ok(format!("asg-of-{submission_id}"))
    }

    async fn feedback_field(&self, _project_id: &str) -> Result<FeedbackField> {
        self.enter("feedback_field").await?;
        Ok(FeedbackField {
            field_name: "feedbackButton-test".to_string(),
            feedback_id: "eval-test:IN_APP".to_string(),
        })
    }

    async fn request_upload_slot(
        &self,
        project_id: &str,
        assignment_id: &str,
        filename: &str,
    ) -> Result<UploadSlot> {
        self.enter("request_upload_slot").await?;
        self.slot_requests.lock().unwrap().push((
            project_id.to_string(),
            assignment_id.to_string(),
            filename.to_string(),
        ));
        let key = format!("submissions/{project_id}/{assignment_id}/{filename}");
        Ok(UploadSlot {
            presigned_url: format!("https://mock.s3.amazonaws.com/{key}"),
            storage_uri: format!("s3://mock/{key}"),
            storage_key: key,
        })
    }

    async fn upload_artifact(&self, slot: &UploadSlot, artifact: &Path) -> Result<()> {
        self.uploads.lock().unwrap().push(UploadCall {
            slot: slot.clone(),
            artifact: artifact.to_path_buf(),
            artifact_existed: artifact.exists(),
        });
        self.enter("upload_artifact").await
    }

    async fn run_feedback(&self, request: &FeedbackRequest) -> Result<FeedbackResult> {
        self.feedback_requests
            .lock()
            .unwrap()
            .push(serde_json::to_value(request).unwrap());
        self.enter("run_feedback").await?;

        let outcome = *self.feedback_outcome.lock().unwrap();
        let status = if outcome == FeedbackOutcome::Pass {
            CheckStatus::Pass
        } else {
            CheckStatus::Fail
        };
        Ok(FeedbackResult {
            outcome,
            checks: vec![FeedbackCheck {
                name: "Mock Check".to_string(),
                status,
                details: String::new(),
            }],
            raw: serde_json::json!({"feedback_outcome": outcome.to_string()}),
        })
    }

    async fn register_submission(
        &self,
        manifest: &SubmissionManifest,
    ) -> Result<RegisteredSubmission> {
        self.manifests
            .lock()
            .unwrap()
            .push(serde_json::to_value(manifest).unwrap());
        self.enter("register_submission").await?;

        let id = self
            .registered_id
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| manifest.submission_id().to_string());
        Ok(RegisteredSubmission { submission_id: id })
    }

    async fn assignments_in_state(
        &self,
        _state: &SubmissionState,
        _project_id: Option<&str>,
    ) -> Result<Vec<SubmissionSummary>> {
        self.enter("assignments_in_state").await?;
        Ok(Vec::new())
    }

    async fn current_user(&self) -> Result<UserInfo> {
        self.enter("current_user").await?;
        Ok(UserInfo {
            user_id: "user-mock".to_string(),
            email: "mock@example.com".to_string(),
        })
    }

    async fn submission_state(
        &self,
        _project_id: &str,
        _submission_id: &str,
    ) -> Result<SubmissionState> {
        self.enter("submission_state").await?;
        Ok(self.state.lock().unwrap().clone())
    }
}
