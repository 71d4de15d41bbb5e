//! Response documents of the review platform API
//!
//! The service is loose about shapes: ids arrive either as plain strings or as
//! `{"id": ...}` objects, some payloads use camelCase and others snake_case,
//! and state queries answer with either an `assignments` or a `tasks` list.
//! Everything is normalized here so callers only see crate types.

use crate::error::{Error, Result};
use crate::types::{
    AssignmentRef, CheckStatus, FeedbackCheck, FeedbackField, FeedbackOutcome, FeedbackResult,
    RegisteredSubmission, SubmissionState, SubmissionSummary, UploadSlot, UserInfo,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

const SUBMISSION_CATEGORY: &str = "SUBMISSION";
const FEEDBACK_BUTTON_TYPE: &str = "feedbackButton";

/// Identifier as a plain value or wrapped in `{"id": ...}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdRef {
    /// `"abc"`
    Plain(String),
    /// `42`
    Number(i64),
    /// `{"id": "abc"}`, or `{"id": null}` for a blank id
    Nested {
        /// Wrapped identifier
        #[serde(default)]
        id: Option<Box<IdRef>>,
    },
}

impl IdRef {
    /// Flatten to a string; empty when the id is blank
    pub fn into_string(self) -> String {
        match self {
            Self::Plain(s) => s,
            Self::Number(n) => n.to_string(),
            Self::Nested { id } => id.map_or_else(String::new, |id| (*id).into_string()),
        }
    }
}

fn id_of(id: Option<IdRef>) -> Option<String> {
    id.map(IdRef::into_string).filter(|s| !s.is_empty())
}

/// Deserialize a response object into `T`
///
/// Non-object documents are a decode failure; objects missing required
/// structure are malformed.
pub fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    if !value.is_object() {
        return Err(Error::Decode(format!(
            "expected a JSON object for {what}, got {}",
            kind_of(&value)
        )));
    }
    serde_json::from_value(value).map_err(|e| Error::Malformed(format!("{what}: {e}")))
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `GET /projects/{id}`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProjectDoc {
    task_infos: Option<Vec<TaskInfoDoc>>,
    form_schema: Option<FormSchemaDoc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TaskInfoDoc {
    task_category: Option<String>,
    task_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FormSchemaDoc {
    sections: Option<Vec<FormSectionDoc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FormSectionDoc {
    fields: Option<Vec<FormFieldDoc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FormFieldDoc {
    #[serde(rename = "type")]
    kind: Option<String>,
    field: Option<String>,
    #[serde(rename = "feedbackId")]
    feedback_id: Option<String>,
}

impl ProjectDoc {
    /// Task type of the first submission task
    pub fn submission_task_type(&self) -> Option<String> {
        self.task_infos
            .iter()
            .flatten()
            .find(|info| info.task_category.as_deref() == Some(SUBMISSION_CATEGORY))
            .and_then(|info| info.task_type.clone())
            .filter(|t| !t.is_empty())
    }

    /// First fully declared validation button of the form schema
    pub fn feedback_field(&self) -> Option<FeedbackField> {
        self.form_schema
            .iter()
            .flat_map(|schema| schema.sections.iter().flatten())
            .flat_map(|section| section.fields.iter().flatten())
            .filter(|f| f.kind.as_deref() == Some(FEEDBACK_BUTTON_TYPE))
            .find_map(|f| match (&f.field, &f.feedback_id) {
                (Some(name), Some(id)) if !name.is_empty() && !id.is_empty() => {
                    Some(FeedbackField {
                        field_name: name.clone(),
                        feedback_id: id.clone(),
                    })
                }
                _ => None,
            })
    }
}

/// One assignment as it appears in any assignment listing
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AssignmentDoc {
    submission_id: Option<IdRef>,
    task_id: Option<IdRef>,
    assignment_id: Option<IdRef>,
    assignee_id: Option<IdRef>,
    project_id: Option<IdRef>,
    created_at: Option<String>,
    submitted_at: Option<String>,
    assignment_status: Option<String>,
    status: Option<String>,
    packaging_state: Option<String>,
}

impl AssignmentDoc {
    fn into_ref(self) -> Result<AssignmentRef> {
        let task_id = id_of(self.task_id)
            .ok_or_else(|| Error::Malformed("assignment is missing task_id".to_string()))?;
        let assignment_id = id_of(self.assignment_id)
            .ok_or_else(|| Error::Malformed("assignment is missing assignment_id".to_string()))?;
        Ok(AssignmentRef {
            task_id,
            assignment_id,
        })
    }

    fn into_summary(self, queried: &SubmissionState) -> SubmissionSummary {
        let task_id = id_of(self.task_id).unwrap_or_default();
        let state = self
            .assignment_status
            .or(self.status)
            .filter(|s| !s.is_empty())
            .map_or_else(|| queried.clone(), |s| SubmissionState::from(s.as_str()));

        SubmissionSummary {
            submission_id: id_of(self.submission_id).unwrap_or_else(|| task_id.clone()),
            task_id,
            assignee_id: id_of(self.assignee_id).unwrap_or_default(),
            start_time: self.created_at.unwrap_or_default(),
            end_time: self.submitted_at.filter(|s| !s.is_empty()),
            packaging_state: self.packaging_state.unwrap_or_default(),
            state,
            project_id: id_of(self.project_id).unwrap_or_default(),
        }
    }
}

/// `GET /assignment/{project}/{task_type}`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TaskPage {
    tasks: Option<Vec<AssignmentDoc>>,
}

impl TaskPage {
    /// First listed assignment, if the page is not empty
    pub fn first(self) -> Result<Option<AssignmentRef>> {
        self.tasks
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(AssignmentDoc::into_ref)
            .transpose()
    }
}

/// `GET /assignments` and `GET /assignment?assignment_status=..`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AssignmentPage {
    assignments: Option<Vec<AssignmentDoc>>,
    tasks: Option<Vec<AssignmentDoc>>,
}

impl AssignmentPage {
    fn into_docs(self) -> Vec<AssignmentDoc> {
        match self.assignments {
            Some(list) if !list.is_empty() => list,
            _ => self.tasks.unwrap_or_default(),
        }
    }

    /// Assignment id of the first listed assignment
    pub fn first_assignment_id(self) -> Result<Option<String>> {
        match self.into_docs().into_iter().next() {
            None => Ok(None),
            Some(doc) => id_of(doc.assignment_id).map(Some).ok_or_else(|| {
                Error::Malformed("assignment is missing assignment_id".to_string())
            }),
        }
    }

    /// Summaries, tagged with `queried` when a record has no explicit state
    pub fn summaries(self, queried: &SubmissionState) -> Vec<SubmissionSummary> {
        self.into_docs()
            .into_iter()
            .map(|doc| doc.into_summary(queried))
            .collect()
    }
}

/// `POST /s3-file-loader/presigned-put/..`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PresignedDoc {
    #[serde(rename = "presignedUrl")]
    presigned_url_camel: Option<String>,
    #[serde(rename = "presigned_put_url")]
    presigned_url_snake: Option<String>,
    #[serde(rename = "s3Key")]
    key_camel: Option<String>,
    #[serde(rename = "s3_key")]
    key_snake: Option<String>,
    #[serde(rename = "s3Uri")]
    uri_camel: Option<String>,
    #[serde(rename = "s3_uri")]
    uri_snake: Option<String>,
}

fn either(camel: Option<String>, snake: Option<String>) -> Option<String> {
    camel
        .filter(|s| !s.is_empty())
        .or_else(|| snake.filter(|s| !s.is_empty()))
}

impl PresignedDoc {
    /// Validate that every slot field is present
    pub fn into_slot(self) -> Result<UploadSlot> {
        let url = either(self.presigned_url_camel, self.presigned_url_snake);
        let key = either(self.key_camel, self.key_snake);
        let uri = either(self.uri_camel, self.uri_snake);

        match (url, key, uri) {
            (Some(presigned_url), Some(storage_key), Some(storage_uri)) => Ok(UploadSlot {
                presigned_url,
                storage_key,
                storage_uri,
            }),
            (url, key, uri) => {
                let missing: Vec<&str> = [
                    (url.is_none(), "presignedUrl/presigned_put_url"),
                    (key.is_none(), "s3Key/s3_key"),
                    (uri.is_none(), "s3Uri/s3_uri"),
                ]
                .into_iter()
                .filter_map(|(absent, name)| absent.then_some(name))
                .collect();
                Err(Error::Malformed(format!(
                    "upload slot response missing required fields: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

/// Parse a validation response, keeping the original document
///
/// Missing fields yield an `UNKNOWN` outcome with no checks rather than an
/// error, since the raw document is still forwarded to registration.
pub fn decode_feedback(raw: Value) -> Result<FeedbackResult> {
    #[derive(Default, Deserialize)]
    #[serde(default)]
    struct FeedbackDoc {
        feedback_outcome: Option<String>,
        metadata: Option<MetadataDoc>,
    }

    #[derive(Default, Deserialize)]
    #[serde(default)]
    struct MetadataDoc {
        static_checks: Option<Vec<CheckDoc>>,
    }

    #[derive(Default, Deserialize)]
    #[serde(default)]
    struct CheckDoc {
        name: Option<String>,
        status: Option<String>,
        full_logs: Option<String>,
        details: Option<String>,
    }

    let doc: FeedbackDoc = decode(raw.clone(), "feedback response")?;

    let outcome = doc
        .feedback_outcome
        .as_deref()
        .map_or(FeedbackOutcome::Unknown, FeedbackOutcome::from_wire);

    let checks = doc
        .metadata
        .and_then(|m| m.static_checks)
        .unwrap_or_default()
        .into_iter()
        .map(|c| FeedbackCheck {
            name: c.name.unwrap_or_else(|| "Unknown".to_string()),
            status: c
                .status
                .as_deref()
                .map_or(CheckStatus::Skip, CheckStatus::parse),
            details: c.full_logs.or(c.details).unwrap_or_default(),
        })
        .collect();

    Ok(FeedbackResult {
        outcome,
        checks,
        raw,
    })
}

/// `POST /submissions/submission`
///
/// The service echoes the registered id; `fallback` is used when it does not.
pub fn decode_registration(value: Value, fallback: &str) -> Result<RegisteredSubmission> {
    #[derive(Default, Deserialize)]
    #[serde(default)]
    struct RegistrationDoc {
        submission_id: Option<IdRef>,
        id: Option<IdRef>,
    }

    let doc: RegistrationDoc = decode(value, "registration response")?;
    Ok(RegisteredSubmission {
        submission_id: id_of(doc.submission_id)
            .or_else(|| id_of(doc.id))
            .unwrap_or_else(|| fallback.to_string()),
    })
}

/// `GET /users/me`
pub fn decode_user(value: Value) -> Result<UserInfo> {
    #[derive(Default, Deserialize)]
    #[serde(default)]
    struct UserDoc {
        user_id: Option<IdRef>,
        id: Option<IdRef>,
        email: Option<String>,
    }

    let doc: UserDoc = decode(value, "user response")?;
    let user_id = id_of(doc.user_id)
        .or_else(|| id_of(doc.id))
        .ok_or_else(|| Error::Malformed("user response missing user_id".to_string()))?;

    Ok(UserInfo {
        user_id,
        email: doc.email.unwrap_or_default(),
    })
}
