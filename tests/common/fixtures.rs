//! Test data factories for stb pipeline runs
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use stb::submit::{SubmitMode, SubmitRequest};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PROJECT_ID: &str = "proj-test";

/// Task folder with a few files, including a nested one
pub fn make_task_folder() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("task.yaml"), "instruction: solve it\n").unwrap();
    fs::write(dir.path().join("solution.sh"), "#!/bin/sh\necho ok\n").unwrap();
    fs::create_dir(dir.path().join("tests")).unwrap();
    fs::write(dir.path().join("tests").join("test_outputs.py"), "def test(): pass\n").unwrap();
    dir
}

/// Request that writes its artifact into `scratch`
pub fn make_request(folder: &Path, mode: SubmitMode, scratch: &Path) -> SubmitRequest {
    SubmitRequest {
        folder: folder.to_path_buf(),
        project_id: PROJECT_ID.to_string(),
        mode,
        dry_run: false,
        scratch_dir: Some(scratch.to_path_buf()),
    }
}

/// Update request for `submission_id`
pub fn make_update_request(
    folder: &Path,
    submission_id: &str,
    scratch: &Path,
) -> SubmitRequest {
    make_request(
        folder,
        SubmitMode::Update {
            submission_id: submission_id.to_string(),
        },
        scratch,
    )
}

/// Files currently left in the scratch dir
pub fn scratch_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}
