//! Pipeline tests against the mock backend

mod common;

use async_trait::async_trait;
use common::fixtures::{
    PROJECT_ID, make_request, make_task_folder, make_update_request, scratch_files,
};
use common::mock_backend::{Failure, MockBackend};
use stb::archive::ArchiveStats;
use stb::error::{Error, Stage};
use stb::submit::{
    NoopProgress, Phase, PipelineOutcome, ProgressCallback, SubmitMode, execute_pipeline_until,
};
use stb::tracker;
use stb::types::{FeedbackOutcome, FeedbackResult, SubmissionState};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Interrupt that never fires
async fn never() {
    std::future::pending::<()>().await;
}

/// Records phases in order
#[derive(Default)]
struct RecordingProgress {
    phases: Mutex<Vec<Phase>>,
}

#[async_trait]
impl ProgressCallback for RecordingProgress {
    async fn on_phase(&self, phase: Phase) {
        self.phases.lock().unwrap().push(phase);
    }
    async fn on_packaged(&self, _stats: &ArchiveStats) {}
    async fn on_feedback(&self, _feedback: &FeedbackResult) {}
    async fn on_error(&self, _error: &Error) {}
    async fn on_message(&self, _message: &str) {}
}

// =============================================================================
// Pre-checks
// =============================================================================

#[tokio::test]
async fn test_create_refuses_tracked_folder() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    tracker::write(folder.path(), "sub-old").unwrap();
    let mock = MockBackend::new();

    let request = make_request(folder.path(), SubmitMode::Create, scratch.path());
    let result = execute_pipeline_until(&mock, &request, &NoopProgress, never()).await;

    match result {
        Err(Error::DuplicateSubmission { submission_id }) => assert_eq!(submission_id, "sub-old"),
        other => panic!("expected DuplicateSubmission, got {other:?}"),
    }
    mock.assert_no_calls();
    assert!(scratch_files(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_create_with_unreadable_marker_aborts() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    std::fs::write(tracker::marker_path(folder.path()), "project: p-1\n").unwrap();
    let mock = MockBackend::new();

    let request = make_request(folder.path(), SubmitMode::Create, scratch.path());
    let result = execute_pipeline_until(&mock, &request, &NoopProgress, never()).await;

    assert!(matches!(result, Err(Error::Malformed(_))));
    mock.assert_no_calls();
}

#[tokio::test]
async fn test_update_requires_needs_revision() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    let mock = MockBackend::new();
    mock.set_state(SubmissionState::Completed);

    let request = make_update_request(folder.path(), "sub-1", scratch.path());
    let result = execute_pipeline_until(&mock, &request, &NoopProgress, never()).await;

    match result {
        Err(Error::InvalidState {
            submission_id,
            state,
        }) => {
            assert_eq!(submission_id, "sub-1");
            assert_eq!(state, "COMPLETED");
        }
        other => panic!("expected InvalidState, got {other:?}"),
    }
    assert_eq!(mock.calls(), vec!["submission_state"]);
    assert!(scratch_files(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_update_state_lookup_failure_propagates() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    let mock = MockBackend::new();
    mock.fail("submission_state", Failure::Connectivity);

    let request = make_update_request(folder.path(), "sub-1", scratch.path());
    let err = execute_pipeline_until(&mock, &request, &NoopProgress, never())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Connectivity(_)));
    assert_eq!(err.stage(), None);
    mock.assert_not_called("upload_artifact");
}

// =============================================================================
// Dry run
// =============================================================================

#[tokio::test]
async fn test_dry_run_makes_no_remote_calls() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    let mock = MockBackend::new();

    let mut request = make_request(folder.path(), SubmitMode::Create, scratch.path());
    request.dry_run = true;
    let outcome = execute_pipeline_until(&mock, &request, &NoopProgress, never())
        .await
        .unwrap();

    match &outcome {
        PipelineOutcome::DryRun { stats } => {
            assert_eq!(stats.entries, 3);
            assert!(stats.size_bytes > 0);
        }
        other => panic!("expected DryRun, got {other:?}"),
    }
    assert_eq!(outcome.exit_code(), 0);
    mock.assert_no_calls();
    assert!(scratch_files(scratch.path()).is_empty());
    assert!(!tracker::exists(folder.path()));
}

#[tokio::test]
async fn test_dry_run_skips_duplicate_check() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    tracker::write(folder.path(), "sub-old").unwrap();
    let mock = MockBackend::new();

    let mut request = make_request(folder.path(), SubmitMode::Create, scratch.path());
    request.dry_run = true;
    let outcome = execute_pipeline_until(&mock, &request, &NoopProgress, never()).await;

    assert!(matches!(outcome, Ok(PipelineOutcome::DryRun { .. })));
    assert_eq!(tracker::read(folder.path()).unwrap().submission_id, "sub-old");
}

// =============================================================================
// Full runs
// =============================================================================

#[tokio::test]
async fn test_create_registers_and_writes_marker() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    let mock = MockBackend::new();
    let progress = RecordingProgress::default();

    let request = make_request(folder.path(), SubmitMode::Create, scratch.path());
    let outcome = execute_pipeline_until(&mock, &request, &progress, never())
        .await
        .unwrap();

    match &outcome {
        PipelineOutcome::Registered {
            submission_id,
            updated,
            marker_written,
        } => {
            assert_eq!(submission_id, "task-new");
            assert!(!updated);
            assert!(marker_written);
        }
        other => panic!("expected Registered, got {other:?}"),
    }
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(tracker::read(folder.path()).unwrap().submission_id, "task-new");
    assert!(scratch_files(scratch.path()).is_empty());

    assert_eq!(
        mock.calls(),
        vec![
            "project_task_type",
            "find_open_assignment",
            "feedback_field",
            "request_upload_slot",
            "upload_artifact",
            "run_feedback",
            "register_submission",
        ]
    );
    assert_eq!(
        *progress.phases.lock().unwrap(),
        vec![
            Phase::Packaging,
            Phase::Preparing,
            Phase::Uploading,
            Phase::Validating,
            Phase::Registering,
            Phase::Complete,
        ]
    );
}

#[tokio::test]
async fn test_create_threads_upload_metadata_through_calls() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    let mock = MockBackend::new();

    let request = make_request(folder.path(), SubmitMode::Create, scratch.path());
    execute_pipeline_until(&mock, &request, &NoopProgress, never())
        .await
        .unwrap();

    let slots = mock.slot_requests();
    assert_eq!(slots.len(), 1);
    let (project, assignment, filename) = &slots[0];
    assert_eq!(project, PROJECT_ID);
    assert_eq!(assignment, "asg-new");
    assert!(filename.starts_with("submission_"));
    assert!(filename.ends_with(".zip"));

    let uploads = mock.uploads();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].artifact_existed);
    assert_eq!(
        uploads[0].artifact.file_name().unwrap().to_str().unwrap(),
        filename
    );

    let feedback = &mock.feedback_requests()[0];
    assert_eq!(feedback["task_id"]["id"], "task-new");
    assert_eq!(feedback["task_type_str"], "submission-test");
    assert_eq!(feedback["feedback_id"], "eval-test:IN_APP");
    let zip_field = &feedback["task_data"]["data"]["upload_a_zip_file"];
    assert_eq!(zip_field["filename"], filename.as_str());
    assert_eq!(
        zip_field["s3Key"],
        format!("submissions/{PROJECT_ID}/asg-new/{filename}")
    );

    let manifest = &mock.manifests()[0];
    assert_eq!(manifest["submission_id"]["id"], "task-new");
    assert_eq!(
        manifest["submission_payload"]["upload_a_zip_file"],
        *zip_field
    );
    assert_eq!(
        manifest["submission_payload"]["feedbackButton-test"]["feedback_outcome"],
        "PASS"
    );
    assert!(manifest["submission_payload"]["checkbox_send_to_reviewer"].is_null());
}

#[tokio::test]
async fn test_marker_records_id_returned_by_registration() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    let mock = MockBackend::new();
    mock.set_registered_id("sub-from-server");

    let request = make_request(folder.path(), SubmitMode::Create, scratch.path());
    execute_pipeline_until(&mock, &request, &NoopProgress, never())
        .await
        .unwrap();

    assert_eq!(
        tracker::read(folder.path()).unwrap().submission_id,
        "sub-from-server"
    );
}

#[tokio::test]
async fn test_failed_validation_is_not_registered() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    let mock = MockBackend::new();
    mock.set_feedback_outcome(FeedbackOutcome::Fail);

    let request = make_request(folder.path(), SubmitMode::Create, scratch.path());
    let outcome = execute_pipeline_until(&mock, &request, &NoopProgress, never())
        .await
        .unwrap();

    match &outcome {
        PipelineOutcome::Rejected { feedback } => {
            assert_eq!(feedback.outcome, FeedbackOutcome::Fail);
            assert_eq!(feedback.failed_checks().count(), 1);
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert_eq!(outcome.exit_code(), 1);
    mock.assert_not_called("register_submission");
    assert!(!tracker::exists(folder.path()));
    assert!(scratch_files(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_unknown_validation_outcome_is_not_registered() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    let mock = MockBackend::new();
    mock.set_feedback_outcome(FeedbackOutcome::Unknown);

    let request = make_request(folder.path(), SubmitMode::Create, scratch.path());
    let outcome = execute_pipeline_until(&mock, &request, &NoopProgress, never())
        .await
        .unwrap();

    assert!(matches!(outcome, PipelineOutcome::Rejected { .. }));
    mock.assert_not_called("register_submission");
}

#[tokio::test]
async fn test_update_registers_revision_without_new_assignment() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    let mock = MockBackend::new();
    let progress = RecordingProgress::default();

    let request = make_update_request(folder.path(), "sub-1", scratch.path());
    let outcome = execute_pipeline_until(&mock, &request, &progress, never())
        .await
        .unwrap();

    match outcome {
        PipelineOutcome::Registered {
            submission_id,
            updated,
            marker_written,
        } => {
            assert_eq!(submission_id, "sub-1");
            assert!(updated);
            assert!(!marker_written);
        }
        other => panic!("expected Registered, got {other:?}"),
    }

    mock.assert_not_called("find_open_assignment");
    mock.assert_not_called("create_assignment");
    assert_eq!(mock.call_count("assignment_for_submission"), 1);
    assert_eq!(mock.slot_requests()[0].1, "asg-of-sub-1");

    let manifest = &mock.manifests()[0];
    assert_eq!(manifest["submission_id"]["id"], "sub-1");
    assert_eq!(manifest["submission_payload"]["checkbox_send_to_reviewer"], true);

    assert!(!tracker::exists(folder.path()));
    assert_eq!(progress.phases.lock().unwrap()[0], Phase::CheckingState);
}

// =============================================================================
// Stage failures
// =============================================================================

#[tokio::test]
async fn test_remote_failures_are_attributed_to_their_stage() {
    let cases = [
        ("project_task_type", Stage::Preparation),
        ("find_open_assignment", Stage::Preparation),
        ("feedback_field", Stage::Preparation),
        ("request_upload_slot", Stage::Preparation),
        ("upload_artifact", Stage::Upload),
        ("run_feedback", Stage::ValidationCall),
        ("register_submission", Stage::Registration),
    ];

    for (op, stage) in cases {
        let folder = make_task_folder();
        let scratch = TempDir::new().unwrap();
        let mock = MockBackend::new();
        mock.fail(op, Failure::Remote(500));

        let request = make_request(folder.path(), SubmitMode::Create, scratch.path());
        let err = execute_pipeline_until(&mock, &request, &NoopProgress, never())
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(stage), "{op}");
        assert!(
            matches!(err.root(), Error::Remote { status: 500, .. }),
            "{op}: {err}"
        );
        assert!(!tracker::exists(folder.path()), "{op}");
        assert!(scratch_files(scratch.path()).is_empty(), "{op}");
    }
}

#[tokio::test]
async fn test_missing_folder_fails_packaging() {
    let scratch = TempDir::new().unwrap();
    let missing = scratch.path().join("does-not-exist");
    let mock = MockBackend::new();

    let request = make_request(&missing, SubmitMode::Create, scratch.path());
    let err = execute_pipeline_until(&mock, &request, &NoopProgress, never())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Packaging));
    assert!(matches!(err.root(), Error::NotFound(_)));
    mock.assert_no_calls();
    assert!(scratch_files(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_upload_connectivity_failure_removes_artifact() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    let mock = MockBackend::new();
    mock.fail("upload_artifact", Failure::Connectivity);

    let request = make_request(folder.path(), SubmitMode::Create, scratch.path());
    let err = execute_pipeline_until(&mock, &request, &NoopProgress, never())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Upload));
    assert!(matches!(err.root(), Error::Connectivity(_)));
    mock.assert_not_called("run_feedback");
    assert!(scratch_files(scratch.path()).is_empty());
}

// =============================================================================
// Interruption
// =============================================================================

#[tokio::test]
async fn test_interrupt_before_remote_work_discards_artifact() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    let mock = MockBackend::new();

    let request = make_request(folder.path(), SubmitMode::Create, scratch.path());
    let result = execute_pipeline_until(&mock, &request, &NoopProgress, async {}).await;

    match result {
        Err(Error::Interrupted { retained_artifact }) => assert!(retained_artifact.is_none()),
        other => panic!("expected Interrupted, got {other:?}"),
    }
    mock.assert_no_calls();
    assert!(scratch_files(scratch.path()).is_empty());
    assert!(!tracker::exists(folder.path()));
}

#[tokio::test]
async fn test_interrupt_during_upload_keeps_artifact() {
    let folder = make_task_folder();
    let scratch = TempDir::new().unwrap();
    let mock = MockBackend::new();
    mock.hang_on("upload_artifact");
    let hanging = Arc::clone(&mock.hanging);

    let request = make_request(folder.path(), SubmitMode::Create, scratch.path());
    let result = execute_pipeline_until(&mock, &request, &NoopProgress, async move {
        hanging.notified().await;
    })
    .await;

    let kept = match result {
        Err(Error::Interrupted {
            retained_artifact: Some(path),
        }) => path,
        other => panic!("expected Interrupted with a kept artifact, got {other:?}"),
    };
    assert!(kept.exists());
    assert_eq!(kept, mock.uploads()[0].artifact);
    assert_eq!(scratch_files(scratch.path()), vec![kept]);
    mock.assert_not_called("run_feedback");
    assert!(!tracker::exists(folder.path()));
}
