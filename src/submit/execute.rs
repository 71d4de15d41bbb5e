//! Pipeline execution
//!
//! Drives one run from pre-checks to the written marker. Every remote call is
//! awaited before the next one starts.

use crate::archive::{self, ArchiveStats};
use crate::backend::RemoteBackend;
use crate::error::{Error, Result, Stage};
use crate::submit::artifact::ArtifactGuard;
use crate::submit::manifest::{FeedbackRequest, ManifestParts, SubmissionManifest};
use crate::submit::{Phase, ProgressCallback};
use crate::tracker;
use crate::types::{
    AssignmentRef, FeedbackField, FeedbackResult, SubmissionState, UploadMetadata, UploadSlot,
};
use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

/// Whether a run creates a new submission or revises a tracked one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitMode {
    /// First submission of the folder
    Create,
    /// Revision of the submission recorded in the folder's marker
    Update {
        /// Tracked submission id
        submission_id: String,
    },
}

impl SubmitMode {
    /// Whether this run revises an existing submission
    pub const fn is_update(&self) -> bool {
        matches!(self, Self::Update { .. })
    }
}

/// Input of one pipeline run
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Task folder to package
    pub folder: PathBuf,
    /// Project the submission belongs to
    pub project_id: String,
    /// Create or update
    pub mode: SubmitMode,
    /// Package only, without contacting the service
    pub dry_run: bool,
    /// Where the artifact is written; the system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
}

/// Steps of the pipeline state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Pre-checks
    Start,
    /// Artifact written
    Packaged,
    /// Upload destination acquired
    SlotAcquired,
    /// Artifact uploaded
    Uploaded,
    /// Validation returned PASS
    Validated,
    /// Submission registered
    Registered,
    /// Run finished
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Packaged => "packaged",
            Self::SlotAcquired => "slot-acquired",
            Self::Uploaded => "uploaded",
            Self::Validated => "validated",
            Self::Registered => "registered",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a completed run ended
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// Submission created or updated
    Registered {
        /// Registered submission id
        submission_id: String,
        /// Whether an existing submission was revised
        updated: bool,
        /// Whether the folder marker was written
        marker_written: bool,
    },
    /// Dry run packaged the folder and stopped
    DryRun {
        /// Artifact that would have been uploaded
        stats: ArchiveStats,
    },
    /// Validation did not pass; nothing was registered
    Rejected {
        /// Validation result
        feedback: FeedbackResult,
    },
}

impl PipelineOutcome {
    /// Process exit code for this outcome
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Registered { .. } | Self::DryRun { .. } => 0,
            Self::Rejected { .. } => 1,
        }
    }
}

/// Run the pipeline, stopping early on Ctrl-C
pub async fn execute_pipeline(
    backend: &dyn RemoteBackend,
    request: &SubmitRequest,
    progress: &dyn ProgressCallback,
) -> Result<PipelineOutcome> {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    execute_pipeline_until(backend, request, progress, ctrl_c).await
}

/// Run the pipeline until it finishes or `interrupt` resolves
///
/// On interrupt the artifact is deleted if no remote step has used it yet,
/// and kept (its path reported in the error) otherwise.
pub async fn execute_pipeline_until<F>(
    backend: &dyn RemoteBackend,
    request: &SubmitRequest,
    progress: &dyn ProgressCallback,
    interrupt: F,
) -> Result<PipelineOutcome>
where
    F: Future<Output = ()> + Send,
{
    let scratch = request.scratch_dir.clone().unwrap_or_else(std::env::temp_dir);
    let artifact = ArtifactGuard::new_in(&scratch);

    let finished = tokio::select! {
        biased;
        () = interrupt => None,
        outcome = run(backend, request, progress, &artifact) => Some(outcome),
    };

    match finished {
        Some(outcome) => outcome,
        None if artifact.network_started() => {
            let kept = artifact.retain();
            warn!(path = %kept.display(), "interrupted after remote work started, keeping artifact");
            Err(Error::Interrupted {
                retained_artifact: Some(kept),
            })
        }
        None => {
            info!("interrupted before any remote work, discarding artifact");
            Err(Error::Interrupted {
                retained_artifact: None,
            })
        }
    }
}

fn enter(state: PipelineState) {
    info!(%state, "pipeline transition");
}

async fn run(
    backend: &dyn RemoteBackend,
    request: &SubmitRequest,
    progress: &dyn ProgressCallback,
    artifact: &ArtifactGuard,
) -> Result<PipelineOutcome> {
    enter(PipelineState::Start);
    check_preconditions(backend, request, progress).await?;

    progress.on_phase(Phase::Packaging).await;
    let stats = package(request, artifact)
        .await
        .map_err(|e| e.at(Stage::Packaging))?;
    progress.on_packaged(&stats).await;
    enter(PipelineState::Packaged);

    if request.dry_run {
        progress
            .on_message("Dry run: skipping upload, validation and registration")
            .await;
        return Ok(PipelineOutcome::DryRun { stats });
    }

    artifact.mark_network_started();
    progress.on_phase(Phase::Preparing).await;
    let prepared = prepare(backend, request, &artifact.filename())
        .await
        .map_err(|e| e.at(Stage::Preparation))?;
    enter(PipelineState::SlotAcquired);

    progress.on_phase(Phase::Uploading).await;
    backend
        .upload_artifact(&prepared.slot, artifact.path())
        .await
        .map_err(|e| e.at(Stage::Upload))?;
    enter(PipelineState::Uploaded);

    progress.on_phase(Phase::Validating).await;
    let feedback_request = FeedbackRequest::new(
        &prepared.task_type,
        &prepared.assignment.task_id,
        &prepared.feedback_field,
        &prepared.upload,
    );
    let feedback = backend
        .run_feedback(&feedback_request)
        .await
        .map_err(|e| e.at(Stage::ValidationCall))?;
    progress.on_feedback(&feedback).await;

    if !feedback.passed() {
        info!(outcome = %feedback.outcome, "validation did not pass, not registering");
        return Ok(PipelineOutcome::Rejected { feedback });
    }
    enter(PipelineState::Validated);

    progress.on_phase(Phase::Registering).await;
    let manifest = SubmissionManifest::new(ManifestParts {
        task_id: &prepared.assignment.task_id,
        task_type: &prepared.task_type,
        feedback_field: &prepared.feedback_field,
        feedback: &feedback,
        upload: &prepared.upload,
        is_update: request.mode.is_update(),
    });
    let registered = backend
        .register_submission(&manifest)
        .await
        .map_err(|e| e.at(Stage::Registration))?;
    enter(PipelineState::Registered);

    let marker_written = match request.mode {
        SubmitMode::Create => match tracker::write(&request.folder, &registered.submission_id) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "submission registered but the marker could not be written");
                progress.on_error(&e).await;
                false
            }
        },
        SubmitMode::Update { .. } => false,
    };

    progress.on_phase(Phase::Complete).await;
    enter(PipelineState::Done);

    Ok(PipelineOutcome::Registered {
        submission_id: registered.submission_id,
        updated: request.mode.is_update(),
        marker_written,
    })
}

async fn check_preconditions(
    backend: &dyn RemoteBackend,
    request: &SubmitRequest,
    progress: &dyn ProgressCallback,
) -> Result<()> {
    if request.dry_run {
        return Ok(());
    }

    match &request.mode {
        SubmitMode::Create => {
            if tracker::exists(&request.folder) {
                let record = tracker::read(&request.folder)?;
                return Err(Error::DuplicateSubmission {
                    submission_id: record.submission_id,
                });
            }
        }
        SubmitMode::Update { submission_id } => {
            progress.on_phase(Phase::CheckingState).await;
            let state = backend
                .submission_state(&request.project_id, submission_id)
                .await?;
            debug!(%state, submission_id, "current submission state");

            if state != SubmissionState::NeedsRevision {
                return Err(Error::InvalidState {
                    submission_id: submission_id.clone(),
                    state: state.to_string(),
                });
            }
        }
    }
    Ok(())
}

async fn package(request: &SubmitRequest, artifact: &ArtifactGuard) -> Result<ArchiveStats> {
    let folder = request.folder.clone();
    let output = artifact.path().to_path_buf();
    let abandoned = artifact.abandon_flag();

    tokio::task::spawn_blocking(move || {
        let result = archive::pack_folder(&folder, &output);
        if abandoned.load(Ordering::SeqCst) {
            let _ = std::fs::remove_file(&output);
        }
        result
    })
    .await
    .map_err(|e| Error::Internal(format!("packaging task failed: {e}")))?
}

struct Prepared {
    task_type: String,
    assignment: AssignmentRef,
    feedback_field: FeedbackField,
    slot: UploadSlot,
    upload: UploadMetadata,
}

async fn prepare(
    backend: &dyn RemoteBackend,
    request: &SubmitRequest,
    filename: &str,
) -> Result<Prepared> {
    let project_id = request.project_id.as_str();

    let task_type = backend.project_task_type(project_id).await?;
    debug!(task_type, "resolved task type");

    let assignment = match &request.mode {
        SubmitMode::Update { submission_id } => AssignmentRef {
            task_id: submission_id.clone(),
            assignment_id: backend
                .assignment_for_submission(project_id, submission_id)
                .await?,
        },
        SubmitMode::Create => backend.resolve_assignment(project_id, &task_type).await?,
    };
    debug!(task_id = %assignment.task_id, assignment_id = %assignment.assignment_id, "resolved assignment");

    let feedback_field = backend.feedback_field(project_id).await?;
    let slot = backend
        .request_upload_slot(project_id, &assignment.assignment_id, filename)
        .await?;
    let upload = UploadMetadata::from_slot(&slot, filename, Utc::now());

    Ok(Prepared {
        task_type,
        assignment,
        feedback_field,
        slot,
        upload,
    })
}
