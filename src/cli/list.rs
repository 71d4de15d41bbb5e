//! List command - show the caller's submissions

use crate::cli::style::Stylize;
use anstream::println;
use stb::auth::get_api_key;
use stb::backend::create_backend;
use stb::config::Settings;
use stb::error::Result;
use stb::types::{SubmissionState, SubmissionSummary};

const ID_WIDTH: usize = 38;
const STATE_WIDTH: usize = 20;

/// Run the list command
pub async fn run_list(settings: &Settings, project_id: Option<&str>) -> Result<()> {
    let api_key = get_api_key(settings)?;
    let backend = create_backend(settings, &api_key);

    println!("{}", "Fetching submissions...".muted());
    let submissions = backend.list_submissions(project_id).await?;

    if submissions.is_empty() {
        println!("No submissions found");
        return Ok(());
    }

    println!("Found {} submission(s):\n", submissions.len().accent());
    for line in render_table(&submissions) {
        println!("{line}");
    }
    Ok(())
}

fn fit(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        format!("{value:<width$}")
    } else {
        let cut: String = value.chars().take(width - 3).collect();
        format!("{cut}...")
    }
}

fn state_label(state: &SubmissionState) -> String {
    fit(state.as_str(), STATE_WIDTH)
}

/// Plain-text rows: a header, a rule, then one row per submission
fn render_table(submissions: &[SubmissionSummary]) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{:>3}  {}  {}  {}",
            "#",
            fit("SUBMISSION ID", ID_WIDTH),
            fit("STATE", STATE_WIDTH),
            "PROJECT ID"
        ),
        "-".repeat(3 + 2 + ID_WIDTH + 2 + STATE_WIDTH + 2 + ID_WIDTH),
    ];

    lines.extend(submissions.iter().enumerate().map(|(idx, sub)| {
        format!(
            "{:>3}  {}  {}  {}",
            idx + 1,
            fit(&sub.submission_id, ID_WIDTH),
            state_label(&sub.state),
            fit(&sub.project_id, ID_WIDTH).trim_end()
        )
    }));
    lines
}
