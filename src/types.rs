//! Core types for stb

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Locally tracked submission, as stored in a folder's marker file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    /// Remote submission identifier (the submission task id)
    pub submission_id: String,
}

/// Server-issued upload destination, valid for a single PUT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSlot {
    /// Presigned object-storage URL
    pub presigned_url: String,
    /// Object key inside the bucket
    pub storage_key: String,
    /// Full storage URI (`s3://bucket/key`)
    pub storage_uri: String,
}

/// Metadata describing the uploaded artifact, threaded through later calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadMetadata {
    /// Object key inside the bucket
    pub storage_key: String,
    /// Full storage URI
    pub storage_uri: String,
    /// Artifact file name
    pub filename: String,
    /// When the slot was acquired
    pub uploaded_at: DateTime<Utc>,
}

impl UploadMetadata {
    /// Derive metadata from a freshly acquired slot
    pub fn from_slot(slot: &UploadSlot, filename: &str, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            storage_key: slot.storage_key.clone(),
            storage_uri: slot.storage_uri.clone(),
            filename: filename.to_string(),
            uploaded_at,
        }
    }
}

/// Task and assignment pair a submission is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRef {
    /// Task identifier (becomes the submission id)
    pub task_id: String,
    /// Assignment identifier (scopes the upload slot)
    pub assignment_id: String,
}

/// Validation button declared in a project's form schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackField {
    /// Form field name, e.g. `feedbackButton-5fbf3`
    pub field_name: String,
    /// Evaluation deployment id, e.g. `tbench-dry-run:IN_APP`
    pub feedback_id: String,
}

/// Overall verdict of a validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedbackOutcome {
    /// Every blocking check passed
    Pass,
    /// At least one check failed
    Fail,
    /// Service did not report a recognizable verdict
    Unknown,
}

impl FeedbackOutcome {
    /// Exact wire value; only `PASS` passes
    pub fn from_wire(value: &str) -> Self {
        match value {
            "PASS" => Self::Pass,
            "FAIL" => Self::Fail,
            _ => Self::Unknown,
        }
    }

    /// Parse a user-supplied value, ignoring case and surrounding space
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "PASS" => Self::Pass,
            "FAIL" => Self::Fail,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for FeedbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Status of an individual validation check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    /// Check passed
    Pass,
    /// Check failed
    Fail,
    /// Check was not run
    Skip,
}

impl CheckStatus {
    /// Parse a wire value; unknown statuses are treated as skipped
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "PASS" => Self::Pass,
            "FAIL" => Self::Fail,
            _ => Self::Skip,
        }
    }
}

/// One named validation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackCheck {
    /// Check name
    pub name: String,
    /// Check status
    pub status: CheckStatus,
    /// Log output or explanation
    pub details: String,
}

/// Result of the validation call
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackResult {
    /// Overall verdict
    pub outcome: FeedbackOutcome,
    /// Individual checks, in service order
    pub checks: Vec<FeedbackCheck>,
    /// Response document as returned by the service
    pub raw: serde_json::Value,
}

impl FeedbackResult {
    /// Whether the submission may be registered
    pub fn passed(&self) -> bool {
        self.outcome == FeedbackOutcome::Pass
    }

    /// Checks that did not pass
    pub fn failed_checks(&self) -> impl Iterator<Item = &FeedbackCheck> {
        self.checks.iter().filter(|c| c.status == CheckStatus::Fail)
    }
}

/// Review state of a submission's assignment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubmissionState {
    /// Reviewer requested changes; the only state that accepts updates
    NeedsRevision,
    /// Waiting for evaluation
    EvaluationPending,
    /// Review finished
    Completed,
    /// Accepted by review
    Accepted,
    /// Offered to the assignee
    Offered,
    /// Rejected by review
    Rejected,
    /// Skipped by the assignee
    Skipped,
    /// Queued for packaging
    ReadyToPackage,
    /// Queued for delivery
    ReadyToDeliver,
    /// Delivered
    Delivered,
    /// State this client does not know about
    Other(String),
}

impl SubmissionState {
    /// Default probe order used to locate a submission's state
    pub const DEFAULT_PROBE_ORDER: [Self; 10] = [
        Self::NeedsRevision,
        Self::EvaluationPending,
        Self::Completed,
        Self::Accepted,
        Self::Offered,
        Self::Rejected,
        Self::Skipped,
        Self::ReadyToPackage,
        Self::ReadyToDeliver,
        Self::Delivered,
    ];

    /// Wire name of the state
    pub fn as_str(&self) -> &str {
        match self {
            Self::NeedsRevision => "NEEDS_REVISION",
            Self::EvaluationPending => "EVALUATION_PENDING",
            Self::Completed => "COMPLETED",
            Self::Accepted => "ACCEPTED",
            Self::Offered => "OFFERED",
            Self::Rejected => "REJECTED",
            Self::Skipped => "SKIPPED",
            Self::ReadyToPackage => "READY_TO_PACKAGE",
            Self::ReadyToDeliver => "READY_TO_DELIVER",
            Self::Delivered => "DELIVERED",
            Self::Other(s) => s,
        }
    }
}

impl FromStr for SubmissionState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Ok(Self::DEFAULT_PROBE_ORDER
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .unwrap_or(Self::Other(normalized)))
    }
}

impl From<&str> for SubmissionState {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(state) => state,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submission visible to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSummary {
    /// Submission identifier
    pub submission_id: String,
    /// Task the assignment belongs to
    pub task_id: String,
    /// Assignee identifier
    pub assignee_id: String,
    /// Assignment creation time, as reported
    pub start_time: String,
    /// Submission time, if submitted
    pub end_time: Option<String>,
    /// Packaging state, if reported
    pub packaging_state: String,
    /// Assignment state (explicit, or the state it was listed under)
    pub state: SubmissionState,
    /// Owning project
    pub project_id: String,
}

/// Acknowledgement of a registered submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredSubmission {
    /// Identifier of the submission record
    pub submission_id: String,
}

/// Identity behind an API key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// User identifier
    pub user_id: String,
    /// Account email
    pub email: String,
}
