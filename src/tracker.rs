//! Per-folder submission marker
//!
//! A task folder that has been submitted carries a `.snorkel_config` file:
//!
//! ```text
//! # written by stb
//! submission_id: 3f0c...
//! ```
//!
//! Lines are `key: value`; blank lines, `#` comments and unknown keys are ignored.

use crate::error::{Error, Result};
use crate::types::SubmissionRecord;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the marker inside a task folder
pub const MARKER_FILE_NAME: &str = ".snorkel_config";

const SUBMISSION_ID_KEY: &str = "submission_id";

/// Path of the marker for `folder`
pub fn marker_path(folder: &Path) -> PathBuf {
    folder.join(MARKER_FILE_NAME)
}

/// Whether `folder` carries a marker
pub fn exists(folder: &Path) -> bool {
    marker_path(folder).exists()
}

/// Read the marker of `folder`
pub fn read(folder: &Path) -> Result<SubmissionRecord> {
    let path = marker_path(folder);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(format!(
                "no {MARKER_FILE_NAME} in {}",
                folder.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    parse(&content).ok_or_else(|| {
        Error::Malformed(format!(
            "{} is missing the '{SUBMISSION_ID_KEY}' field",
            path.display()
        ))
    })
}

/// Record `submission_id` as the submission of `folder`, replacing any marker
pub fn write(folder: &Path, submission_id: &str) -> Result<()> {
    fs::write(
        marker_path(folder),
        format!("{SUBMISSION_ID_KEY}: {submission_id}\n"),
    )?;
    Ok(())
}

fn parse(content: &str) -> Option<SubmissionRecord> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .filter(|(key, _)| key.trim() == SUBMISSION_ID_KEY)
        .map(|(_, value)| value.trim())
        .last()
        .filter(|value| !value.is_empty())
        .map(|value| SubmissionRecord {
            submission_id: value.to_string(),
        })
}
