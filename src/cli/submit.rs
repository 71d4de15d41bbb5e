//! Submit command - package, validate and register a task folder

use crate::cli::progress::CliProgress;
use crate::cli::style::{Stylize, check};
use anstream::{eprintln, println};
use stb::archive;
use stb::auth::get_api_key;
use stb::backend::create_backend;
use stb::config::Settings;
use stb::error::{Error, Result};
use stb::submit::{PipelineOutcome, SubmitMode, SubmitRequest, execute_pipeline};
use stb::tracker::{self, MARKER_FILE_NAME};
use std::path::Path;

const FILE_PREVIEW_LIMIT: usize = 15;

/// Create or update, as chosen on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitAction {
    /// `stb submit create`
    Create,
    /// `stb submit update`
    Update,
}

/// Run the submit command, returning the process exit code
pub async fn run_submit(
    settings: &Settings,
    action: SubmitAction,
    folder: &Path,
    project_id: &str,
    dry_run: bool,
) -> Result<u8> {
    let api_key = get_api_key(settings)?;
    let folder = folder.canonicalize().unwrap_or_else(|_| folder.to_path_buf());

    let mode = match action {
        SubmitAction::Create => SubmitMode::Create,
        SubmitAction::Update => SubmitMode::Update {
            submission_id: tracked_submission_id(&folder)?,
        },
    };

    print_header(&folder, project_id, &mode, dry_run);

    let backend = create_backend(settings, &api_key);
    let progress = CliProgress::new();
    let request = SubmitRequest {
        folder,
        project_id: project_id.to_string(),
        mode,
        dry_run,
        scratch_dir: None,
    };

    let outcome = match execute_pipeline(backend.as_ref(), &request, &progress).await {
        Ok(outcome) => outcome,
        Err(e) => {
            progress.fail();
            return Err(e);
        }
    };

    match &outcome {
        PipelineOutcome::Registered {
            submission_id,
            updated,
            marker_written,
        } => {
            let verb = if *updated { "updated" } else { "created" };
            println!("{} Submission {verb}", check());
            println!("  {} {}", "Submission ID:".muted(), submission_id.accent());
            if *marker_written {
                println!(
                    "  {}",
                    format!("Recorded in {MARKER_FILE_NAME}; use `stb submit update` for revisions")
                        .muted()
                );
            }
        }
        PipelineOutcome::DryRun { .. } => {
            println!("{} Dry run complete - no upload performed", check());
        }
        PipelineOutcome::Rejected { .. } => {
            eprintln!(
                "{}",
                "Validation did not pass; the submission was not registered".error()
            );
            eprintln!(
                "  {}",
                "Fix the failing checks and run the command again".muted().for_stderr()
            );
        }
    }

    Ok(outcome.exit_code())
}

/// Submission id recorded in the folder's marker
fn tracked_submission_id(folder: &Path) -> Result<String> {
    match tracker::read(folder) {
        Ok(record) => {
            println!(
                "Using submission_id from {MARKER_FILE_NAME}: {}",
                record.submission_id.accent()
            );
            Ok(record.submission_id)
        }
        Err(Error::NotFound(_)) => Err(Error::NotFound(format!(
            "no {MARKER_FILE_NAME} file in {}; `stb submit update` needs the marker \
             written by `stb submit create`",
            folder.display()
        ))),
        Err(Error::Malformed(_)) => Err(Error::Malformed(format!(
            "the {MARKER_FILE_NAME} file is missing the submission_id field; \
             check or remove it"
        ))),
        Err(e) => Err(e),
    }
}

fn print_header(folder: &Path, project_id: &str, mode: &SubmitMode, dry_run: bool) {
    let title = if mode.is_update() {
        "Updating submission"
    } else {
        "New submission"
    };
    println!("{}", title.emphasis());
    println!("  {} {}", "Folder: ".muted(), folder.display());
    println!("  {} {}", "Project:".muted(), project_id.accent());
    if dry_run {
        println!("  {}", "DRY RUN - no upload will occur".warn().for_stdout());
    }
    // Missing folders are reported by the pipeline
    if let Ok(preview) = archive::preview(folder, FILE_PREVIEW_LIMIT) {
        println!("  {}", "Files:".muted());
        for name in &preview.names {
            println!("    {name}");
        }
        if preview.remaining > 0 {
            println!("    {}", format!("... and {} more", preview.remaining).muted());
        }
    }
    println!();
}
