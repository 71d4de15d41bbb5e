//! Local stand-in for the review platform
//!
//! Selected with `STB_DEV_MODE=1`. Every call sleeps for a scaled, fixed
//! latency and answers with canned data, so the full pipeline can be
//! exercised offline.

use crate::backend::RemoteBackend;
use crate::backend::wire;
use crate::config::{Environment, StubConfig};
use crate::error::Result;
use crate::submit::{FeedbackRequest, SubmissionManifest};
use crate::types::{
    AssignmentRef, FeedbackField, FeedbackOutcome, FeedbackResult, RegisteredSubmission,
    SubmissionState, SubmissionSummary, UploadSlot, UserInfo,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Project id reported when no project filter is given
pub const STUB_PROJECT_ID: &str = "proj-12345678-abcd-1234-efgh-567890abcdef";
/// Task type of the stubbed project
pub const STUB_TASK_TYPE: &str = "submission-90223b76-06f9-4006-8f00-3705c1921c29";
/// Caller identity
pub const STUB_USER_ID: &str = "user-aaaabbbb-cccc-dddd-eeee-ffffgggghhh";
/// Validation field of the stubbed form schema
pub const STUB_FEEDBACK_FIELD: &str = "feedbackButton-5fbf3";
/// Evaluation deployment of the stubbed validation field
pub const STUB_FEEDBACK_ID: &str = "tbench-dry-run-11-07-2025:IN_APP";

const STUB_BUCKET: &str = "stub-bucket";
const STUB_EMAIL: &str = "dev@example.com";

#[derive(Debug, Clone, Copy)]
enum Latency {
    ApiCall,
    Upload,
    Feedback,
}

impl Latency {
    const fn base(self) -> Duration {
        match self {
            Self::ApiCall => Duration::from_millis(300),
            Self::Upload => Duration::from_millis(1500),
            Self::Feedback => Duration::from_secs(3),
        }
    }
}

/// `base * scale`, zero for negative or NaN scales and saturating on overflow
fn scaled(base: Duration, scale: f64) -> Duration {
    Duration::try_from_secs_f64(base.as_secs_f64() * scale).unwrap_or(if scale > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

/// Offline backend with canned answers
pub struct StubBackend {
    config: StubConfig,
    environment: Environment,
    probe_states: Vec<SubmissionState>,
}

impl StubBackend {
    /// Create a stub backend
    pub const fn new(
        config: StubConfig,
        environment: Environment,
        probe_states: Vec<SubmissionState>,
    ) -> Self {
        Self {
            config,
            environment,
            probe_states,
        }
    }

    async fn delay(&self, latency: Latency) {
        let wait = scaled(latency.base(), self.config.delay_scale);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    fn feedback_document(&self) -> Value {
        match self.config.feedback_outcome {
            FeedbackOutcome::Pass => json!({
                "feedback_outcome": "PASS",
                "metadata": {"static_checks": [
                    {"name": "File Structure", "status": "PASS", "full_logs": "All required files present."},
                    {"name": "Code Linting", "status": "PASS", "full_logs": "No linting errors found."},
                    {"name": "Test Coverage", "status": "PASS", "full_logs": "Coverage: 87%"}
                ]}
            }),
            _ => json!({
                "feedback_outcome": "FAIL",
                "metadata": {"static_checks": [
                    {"name": "File Structure", "status": "PASS", "full_logs": "All required files present."},
                    {"name": "Code Linting", "status": "FAIL", "full_logs": "Error: line 42 - undefined variable 'foo'\nError: line 87 - missing semicolon"},
                    {"name": "Test Coverage", "status": "SKIP", "full_logs": "Skipped due to linting errors."}
                ]}
            }),
        }
    }
}

fn canned_summary(
    id: &str,
    start_time: &str,
    end_time: Option<&str>,
    state: SubmissionState,
    project_id: &str,
) -> SubmissionSummary {
    SubmissionSummary {
        submission_id: id.to_string(),
        task_id: id.to_string(),
        assignee_id: STUB_USER_ID.to_string(),
        start_time: start_time.to_string(),
        end_time: end_time.map(ToString::to_string),
        packaging_state: String::new(),
        state,
        project_id: project_id.to_string(),
    }
}

#[async_trait]
impl RemoteBackend for StubBackend {
    fn environment(&self) -> Environment {
        self.environment
    }

    fn probe_states(&self) -> &[SubmissionState] {
        &self.probe_states
    }

    async fn project_task_type(&self, _project_id: &str) -> Result<String> {
        self.delay(Latency::ApiCall).await;
        Ok(STUB_TASK_TYPE.to_string())
    }

    async fn find_open_assignment(
        &self,
        _project_id: &str,
        _task_type: &str,
    ) -> Result<Option<AssignmentRef>> {
        self.delay(Latency::ApiCall).await;
        Ok(Some(AssignmentRef {
            task_id: Uuid::new_v4().to_string(),
            assignment_id: Uuid::new_v4().to_string(),
        }))
    }

    async fn create_assignment(&self, _project_id: &str, _task_type: &str) -> Result<()> {
        self.delay(Latency::ApiCall).await;
        Ok(())
    }

    async fn assignment_for_submission(
        &self,
        _project_id: &str,
        _submission_id: &str,
    ) -> Result<String> {
        self.delay(Latency::ApiCall).await;
        Ok(Uuid::new_v4().to_string())
    }

    async fn feedback_field(&self, _project_id: &str) -> Result<FeedbackField> {
        self.delay(Latency::ApiCall).await;
        Ok(FeedbackField {
            field_name: STUB_FEEDBACK_FIELD.to_string(),
            feedback_id: STUB_FEEDBACK_ID.to_string(),
        })
    }

    async fn request_upload_slot(
        &self,
        project_id: &str,
        assignment_id: &str,
        filename: &str,
    ) -> Result<UploadSlot> {
        self.delay(Latency::ApiCall).await;
        let key = format!("submissions/{project_id}/{assignment_id}/{filename}");
        Ok(UploadSlot {
            presigned_url: format!("https://{STUB_BUCKET}.s3.amazonaws.com/{key}?signature=stub"),
            storage_uri: format!("s3://{STUB_BUCKET}/{key}"),
            storage_key: key,
        })
    }

    async fn upload_artifact(&self, slot: &UploadSlot, artifact: &Path) -> Result<()> {
        let size = tokio::fs::metadata(artifact).await?.len();
        debug!(size, key = %slot.storage_key, "stub upload");
        self.delay(Latency::Upload).await;
        Ok(())
    }

    async fn run_feedback(&self, request: &FeedbackRequest) -> Result<FeedbackResult> {
        debug!(task_id = request.task_id(), feedback_id = request.feedback_id(), "stub feedback");
        self.delay(Latency::Feedback).await;
        wire::decode_feedback(self.feedback_document())
    }

    async fn register_submission(
        &self,
        manifest: &SubmissionManifest,
    ) -> Result<RegisteredSubmission> {
        self.delay(Latency::ApiCall).await;
        Ok(RegisteredSubmission {
            submission_id: manifest.submission_id().to_string(),
        })
    }

    async fn assignments_in_state(
        &self,
        state: &SubmissionState,
        project_id: Option<&str>,
    ) -> Result<Vec<SubmissionSummary>> {
        Ok(self
            .list_submissions(project_id)
            .await?
            .into_iter()
            .filter(|s| &s.state == state)
            .collect())
    }

    async fn current_user(&self) -> Result<UserInfo> {
        self.delay(Latency::ApiCall).await;
        Ok(UserInfo {
            user_id: STUB_USER_ID.to_string(),
            email: STUB_EMAIL.to_string(),
        })
    }

    async fn submission_state(
        &self,
        _project_id: &str,
        _submission_id: &str,
    ) -> Result<SubmissionState> {
        self.delay(Latency::ApiCall).await;
        Ok(self.config.submission_state.clone())
    }

    async fn list_submissions(&self, project_id: Option<&str>) -> Result<Vec<SubmissionSummary>> {
        self.delay(Latency::ApiCall).await;
        let project = project_id.unwrap_or(STUB_PROJECT_ID);
        Ok(vec![
            canned_summary(
                "sub-11111111-aaaa-bbbb-cccc-dddddddddddd",
                "2025-01-10T10:00:00Z",
                None,
                SubmissionState::NeedsRevision,
                project,
            ),
            canned_summary(
                "sub-22222222-eeee-ffff-gggg-hhhhhhhhhhhh",
                "2025-01-08T14:30:00Z",
                Some("2025-01-09T09:15:00Z"),
                SubmissionState::Completed,
                project,
            ),
            canned_summary(
                "sub-33333333-iiii-jjjj-kkkk-llllllllllll",
                "2025-01-12T16:45:00Z",
                None,
                SubmissionState::EvaluationPending,
                project,
            ),
        ])
    }
}
