//! Review platform service implementation

use crate::backend::RemoteBackend;
use crate::backend::url::validate_upload_url;
use crate::backend::wire::{self, AssignmentPage, PresignedDoc, ProjectDoc, TaskPage};
use crate::config::{DEFAULT_TIMEOUT, Environment, LONG_TIMEOUT};
use crate::error::{Error, Result};
use crate::submit::{FeedbackRequest, SubmissionManifest};
use crate::types::{
    AssignmentRef, FeedbackField, FeedbackResult, RegisteredSubmission, SubmissionState,
    SubmissionSummary, UploadSlot, UserInfo,
};
use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const API_KEY_HEADER: &str = "x-key";
const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Review platform service using reqwest
pub struct HttpBackend {
    client: Client,
    api_key: String,
    base_url: String,
    environment: Environment,
    probe_states: Vec<SubmissionState>,
}

impl HttpBackend {
    /// Create a backend for `environment`
    pub fn new(environment: Environment, api_key: String, probe_states: Vec<SubmissionState>) -> Self {
        Self::with_base_url(environment, environment.base_url(), api_key, probe_states)
    }

    /// Create a backend against an explicit API root
    ///
    /// Redirects are never followed: the API key header and the archive body
    /// only go to the host that was asked.
    pub fn with_base_url(
        environment: Environment,
        base_url: impl Into<String>,
        api_key: String,
        probe_states: Vec<SubmissionState>,
    ) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("stb/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            environment,
            probe_states,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send one JSON request and return the decoded document
    ///
    /// An empty or `null` body decodes to an empty object.
    async fn request_json<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
        timeout: Duration,
    ) -> Result<Value> {
        debug!(%method, path, "api request");

        let mut request = self
            .client
            .request(method, self.api_url(path))
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let text = checked_text(response).await?;

        if text.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Null) => Ok(Value::Object(Map::new())),
            Ok(value @ (Value::Object(_) | Value::Array(_))) => Ok(value),
            Ok(other) => Err(Error::Decode(format!(
                "expected a JSON object or array, got {other}"
            ))),
            Err(e) => Err(Error::Decode(e.to_string())),
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.request_json::<Value>(Method::GET, path, query, None, DEFAULT_TIMEOUT)
            .await
    }

    async fn project(&self, project_id: &str) -> Result<ProjectDoc> {
        let value = self
            .get_json(&format!("/projects/{}", encode(project_id)), &[])
            .await?;
        wire::decode(value, "project")
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Connectivity(format!("request timed out: {err}"))
    } else {
        Error::Connectivity(err.to_string())
    }
}

/// Read the body, turning non-2xx statuses into `Error::Remote`
async fn checked_text(response: Response) -> Result<String> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;

    if status.is_success() {
        Ok(text)
    } else {
        Err(Error::Remote {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body: text,
        })
    }
}

#[async_trait]
impl RemoteBackend for HttpBackend {
    fn environment(&self) -> Environment {
        self.environment
    }

    fn probe_states(&self) -> &[SubmissionState] {
        &self.probe_states
    }

    async fn project_task_type(&self, project_id: &str) -> Result<String> {
        self.project(project_id)
            .await?
            .submission_task_type()
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "no SUBMISSION task in project {project_id}; \
                     the project must be configured with a submission task"
                ))
            })
    }

    async fn find_open_assignment(
        &self,
        project_id: &str,
        task_type: &str,
    ) -> Result<Option<AssignmentRef>> {
        let path = format!("/assignment/{}/{}", encode(project_id), encode(task_type));
        let value = self
            .get_json(&path, &[("skip", "0"), ("limit", "1")])
            .await?;
        wire::decode::<TaskPage>(value, "assignment lookup")?.first()
    }

    async fn create_assignment(&self, project_id: &str, task_type: &str) -> Result<()> {
        let body = json!({
            "project_id": { "id": project_id },
            "task_type": task_type,
        });
        self.request_json(Method::POST, "/assignment", &[], Some(&body), DEFAULT_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn assignment_for_submission(
        &self,
        project_id: &str,
        submission_id: &str,
    ) -> Result<String> {
        let value = self
            .get_json(
                "/assignments",
                &[("task_id", submission_id), ("project_id", project_id)],
            )
            .await?;

        wire::decode::<AssignmentPage>(value, "assignments")?
            .first_assignment_id()?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "submission {submission_id} not found in project {project_id}"
                ))
            })
    }

    async fn feedback_field(&self, project_id: &str) -> Result<FeedbackField> {
        self.project(project_id)
            .await?
            .feedback_field()
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "no feedbackButton field in the form schema of project {project_id}"
                ))
            })
    }

    async fn request_upload_slot(
        &self,
        project_id: &str,
        assignment_id: &str,
        filename: &str,
    ) -> Result<UploadSlot> {
        let path = format!(
            "/s3-file-loader/presigned-put/{}/{}",
            encode(project_id),
            encode(assignment_id)
        );
        let value = self
            .request_json::<Value>(
                Method::POST,
                &path,
                &[("filename", filename)],
                None,
                DEFAULT_TIMEOUT,
            )
            .await?;

        wire::decode::<PresignedDoc>(value, "upload slot")?.into_slot()
    }

    async fn upload_artifact(&self, slot: &UploadSlot, artifact: &Path) -> Result<()> {
        validate_upload_url(&slot.presigned_url)?;

        let bytes = tokio::fs::read(artifact).await?;
        debug!(size = bytes.len(), key = %slot.storage_key, "uploading artifact");

        let response = self
            .client
            .put(&slot.presigned_url)
            .header(reqwest::header::CONTENT_TYPE, ARCHIVE_CONTENT_TYPE)
            .body(bytes)
            .timeout(LONG_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;

        checked_text(response).await?;
        Ok(())
    }

    async fn run_feedback(&self, request: &FeedbackRequest) -> Result<FeedbackResult> {
        let value = self
            .request_json(Method::POST, "/feedback/", &[], Some(request), LONG_TIMEOUT)
            .await?;
        wire::decode_feedback(value)
    }

    async fn register_submission(
        &self,
        manifest: &SubmissionManifest,
    ) -> Result<RegisteredSubmission> {
        let value = self
            .request_json(
                Method::POST,
                "/submissions/submission",
                &[],
                Some(manifest),
                DEFAULT_TIMEOUT,
            )
            .await?;
        wire::decode_registration(value, manifest.submission_id())
    }

    async fn assignments_in_state(
        &self,
        state: &SubmissionState,
        project_id: Option<&str>,
    ) -> Result<Vec<SubmissionSummary>> {
        let mut query = vec![("assignment_status", state.as_str())];
        if let Some(project_id) = project_id {
            query.push(("project_id", project_id));
        }

        let value = self.get_json("/assignment", &query).await?;
        Ok(wire::decode::<AssignmentPage>(value, "assignment listing")?.summaries(state))
    }

    async fn current_user(&self) -> Result<UserInfo> {
        let value = self.get_json("/users/me", &[]).await?;
        wire::decode_user(value)
    }
}
