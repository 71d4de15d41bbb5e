//! Request documents built by the pipeline
//!
//! Both documents are assembled once per run from the upload metadata and
//! never modified afterwards.

use crate::types::{FeedbackField, FeedbackResult, UploadMetadata};
use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const EVALUATION_TYPE: &str = "IN_APP";

#[derive(Debug, Clone, Serialize)]
struct IdObject {
    id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    s3_key: String,
    s3_uri: String,
    filename: String,
    uploaded_at: String,
}

impl From<&UploadMetadata> for UploadedFile {
    fn from(meta: &UploadMetadata) -> Self {
        Self {
            s3_key: meta.storage_key.clone(),
            s3_uri: meta.storage_uri.clone(),
            filename: meta.filename.clone(),
            uploaded_at: meta
                .uploaded_at
                .to_rfc3339_opts(SecondsFormat::Micros, false),
        }
    }
}

/// Validation request for an uploaded artifact
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRequest {
    #[serde(rename = "task_type_str")]
    task_type: String,
    task_id: IdObject,
    task_data: FeedbackTaskData,
    feedback_id: String,
}

#[derive(Debug, Clone, Serialize)]
struct FeedbackTaskData {
    evaluation_type: &'static str,
    data: FeedbackData,
}

#[derive(Debug, Clone, Serialize)]
struct FeedbackData {
    upload_a_zip_file: UploadedFile,
    #[serde(flatten)]
    pending_fields: BTreeMap<String, Value>,
}

impl FeedbackRequest {
    /// Build the request for `task_id`
    pub fn new(
        task_type: &str,
        task_id: &str,
        field: &FeedbackField,
        upload: &UploadMetadata,
    ) -> Self {
        let mut pending_fields = BTreeMap::new();
        pending_fields.insert(field.field_name.clone(), Value::Null);

        Self {
            task_type: task_type.to_string(),
            task_id: IdObject {
                id: task_id.to_string(),
            },
            task_data: FeedbackTaskData {
                evaluation_type: EVALUATION_TYPE,
                data: FeedbackData {
                    upload_a_zip_file: UploadedFile::from(upload),
                    pending_fields,
                },
            },
            feedback_id: field.feedback_id.clone(),
        }
    }

    /// Task the validation runs against
    pub fn task_id(&self) -> &str {
        &self.task_id.id
    }

    /// Evaluation deployment id
    pub fn feedback_id(&self) -> &str {
        &self.feedback_id
    }
}

/// Registration payload for a validated submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionManifest {
    submission_payload: SubmissionPayload,
    selected_segments: Map<String, Value>,
    submission_id: IdObject,
    rebuttal_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct SubmissionPayload {
    upload_a_zip_file: UploadedFile,
    #[serde(flatten)]
    feedback: BTreeMap<String, Value>,
    code_difficulty_check_results: String,
    code_quality_check_results: String,
    checkbox_send_to_reviewer: Option<bool>,
    task_type_discriminator: String,
}

/// Inputs for [`SubmissionManifest::new`]
#[derive(Debug, Clone, Copy)]
pub struct ManifestParts<'a> {
    /// Submission task id
    pub task_id: &'a str,
    /// Project task type
    pub task_type: &'a str,
    /// Validation field the feedback is stored under
    pub feedback_field: &'a FeedbackField,
    /// Passed validation result
    pub feedback: &'a FeedbackResult,
    /// Uploaded artifact
    pub upload: &'a UploadMetadata,
    /// Whether this revises an existing submission
    pub is_update: bool,
}

impl SubmissionManifest {
    /// Compose the manifest; reviewers are notified only for updates
    pub fn new(parts: ManifestParts<'_>) -> Self {
        let mut feedback = BTreeMap::new();
        feedback.insert(
            parts.feedback_field.field_name.clone(),
            parts.feedback.raw.clone(),
        );

        Self {
            submission_payload: SubmissionPayload {
                upload_a_zip_file: UploadedFile::from(parts.upload),
                feedback,
                code_difficulty_check_results: String::new(),
                code_quality_check_results: String::new(),
                checkbox_send_to_reviewer: parts.is_update.then_some(true),
                task_type_discriminator: parts.task_type.to_string(),
            },
            selected_segments: Map::new(),
            submission_id: IdObject {
                id: parts.task_id.to_string(),
            },
            rebuttal_notes: None,
        }
    }

    /// Submission the manifest registers
    pub fn submission_id(&self) -> &str {
        &self.submission_id.id
    }

    /// Whether reviewers are notified of this submission
    pub fn sends_to_reviewer(&self) -> bool {
        self.submission_payload.checkbox_send_to_reviewer == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeedbackOutcome;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn upload() -> UploadMetadata {
        UploadMetadata {
            storage_key: "submissions/p/a/sub.zip".to_string(),
            storage_uri: "s3://bucket/submissions/p/a/sub.zip".to_string(),
            filename: "sub.zip".to_string(),
            uploaded_at: Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap(),
        }
    }

    fn field() -> FeedbackField {
        FeedbackField {
            field_name: "feedbackButton-5fbf3".to_string(),
            feedback_id: "tbench:IN_APP".to_string(),
        }
    }

    fn passed() -> FeedbackResult {
        FeedbackResult {
            outcome: FeedbackOutcome::Pass,
            checks: vec![],
            raw: json!({"feedback_outcome": "PASS"}),
        }
    }

    #[test]
    fn test_feedback_request_wire_shape() {
        let request = FeedbackRequest::new("submission-x", "task-1", &field(), &upload());
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["task_type_str"], "submission-x");
        assert_eq!(value["task_id"], json!({"id": "task-1"}));
        assert_eq!(value["feedback_id"], "tbench:IN_APP");
        assert_eq!(value["task_data"]["evaluation_type"], "IN_APP");
        let data = &value["task_data"]["data"];
        assert_eq!(data["upload_a_zip_file"]["s3Key"], "submissions/p/a/sub.zip");
        assert_eq!(
            data["upload_a_zip_file"]["uploadedAt"],
            "2025-01-10T10:00:00.000000+00:00"
        );
        assert!(data.as_object().unwrap().contains_key("feedbackButton-5fbf3"));
        assert!(data["feedbackButton-5fbf3"].is_null());
    }

    #[test]
    fn test_create_manifest_does_not_notify_reviewer() {
        let (field, feedback, upload) = (field(), passed(), upload());
        let manifest = SubmissionManifest::new(ManifestParts {
            task_id: "task-1",
            task_type: "submission-x",
            feedback_field: &field,
            feedback: &feedback,
            upload: &upload,
            is_update: false,
        });
        let value = serde_json::to_value(&manifest).unwrap();

        assert!(!manifest.sends_to_reviewer());
        assert!(value["submission_payload"]["checkbox_send_to_reviewer"].is_null());
        assert_eq!(value["submission_id"], json!({"id": "task-1"}));
        assert_eq!(
            value["submission_payload"]["feedbackButton-5fbf3"],
            json!({"feedback_outcome": "PASS"})
        );
        assert_eq!(
            value["submission_payload"]["task_type_discriminator"],
            "submission-x"
        );
        assert_eq!(value["selected_segments"], json!({}));
        assert!(value["rebuttal_notes"].is_null());
    }

    #[test]
    fn test_update_manifest_notifies_reviewer() {
        let (field, feedback, upload) = (field(), passed(), upload());
        let manifest = SubmissionManifest::new(ManifestParts {
            task_id: "task-1",
            task_type: "submission-x",
            feedback_field: &field,
            feedback: &feedback,
            upload: &upload,
            is_update: true,
        });
        let value = serde_json::to_value(&manifest).unwrap();

        assert!(manifest.sends_to_reviewer());
        assert_eq!(value["submission_payload"]["checkbox_send_to_reviewer"], true);
    }
}
