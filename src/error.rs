//! Error types for stb

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Archiving the folder
    Packaging,
    /// Resolving task metadata and acquiring the upload slot
    Preparation,
    /// Uploading the artifact to object storage
    Upload,
    /// Calling the validation (feedback) service
    ValidationCall,
    /// Registering the submission
    Registration,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Packaging => "packaging",
            Self::Preparation => "upload preparation",
            Self::Upload => "upload",
            Self::ValidationCall => "validation call",
            Self::Registration => "registration",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while packaging, validating or submitting
#[derive(Debug, Error)]
pub enum Error {
    /// A required local or remote resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Local or remote data is present but unusable
    #[error("malformed data: {0}")]
    Malformed(String),

    /// Caller supplied an argument that cannot be used
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Remote service answered with a non-2xx status
    #[error("HTTP {status} {reason}: {body}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase
        reason: String,
        /// Response body, verbatim
        body: String,
    },

    /// Network-level failure (DNS, TLS, refused connection, timeout)
    #[error("network error: {0}")]
    Connectivity(String),

    /// Response body was not valid JSON of the expected kind
    #[error("invalid JSON response: {0}")]
    Decode(String),

    /// Upload URL failed the object-storage allow-list
    #[error("refusing to upload to untrusted destination '{url}': {reason}")]
    UntrustedDestination {
        /// Offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Folder is already tracked as a submission
    #[error(
        "this folder has already been submitted (submission_id: {submission_id}); \
         use `stb submit update` to revise it, or remove the marker file to create a new one"
    )]
    DuplicateSubmission {
        /// Identifier recorded in the marker
        submission_id: String,
    },

    /// Submission is not in a state that allows an update
    #[error("cannot update submission {submission_id}: current state is {state}, must be NEEDS_REVISION")]
    InvalidState {
        /// Tracked submission identifier
        submission_id: String,
        /// State observed remotely
        state: String,
    },

    /// The same submission was reported under more than one state
    #[error("submission {submission_id} is listed under several states: {}", states.join(", "))]
    ConflictingStates {
        /// Tracked submission identifier
        submission_id: String,
        /// Every state the submission was found under, in probe order
        states: Vec<String>,
    },

    /// A pipeline stage failed
    #[error("{stage} failed: {source}")]
    StageFailed {
        /// Stage that failed
        stage: Stage,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// Run was interrupted by the user
    #[error("cancelled by user")]
    Interrupted {
        /// Artifact kept on disk because network work had already started
        retained_artifact: Option<PathBuf>,
    },

    /// Missing or invalid credentials
    #[error("authentication error: {0}")]
    Auth(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Archive writer failure
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant violation inside stb
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap this error as the failure of a pipeline stage
    #[must_use]
    pub fn at(self, stage: Stage) -> Self {
        Self::StageFailed {
            stage,
            source: Box::new(self),
        }
    }

    /// Stage this error is attributed to, if any
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error, skipping stage wrappers
    pub fn root(&self) -> &Self {
        match self {
            Self::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Remote {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body: String::new(),
            }
        } else {
            Self::Connectivity(err.to_string())
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.display().to_string());
        match err.into_io_error() {
            Some(io) => Self::Io(io),
            None => Self::Io(std::io::Error::other(format!(
                "filesystem loop at {}",
                path.unwrap_or_default()
            ))),
        }
    }
}
