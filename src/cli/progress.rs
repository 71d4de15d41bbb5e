//! Shared CLI progress callback with styled output and spinners

use crate::cli::style::{Stylize, check, cross, format_size, skip, spinner_style};
use anstream::{eprintln, println};
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::sync::Mutex;
use std::time::Duration;
use stb::archive::ArchiveStats;
use stb::error::Error;
use stb::submit::{Phase, ProgressCallback};
use stb::types::{CheckStatus, FeedbackResult};

/// CLI progress callback: one spinner per phase, styled results on stdout
pub struct CliProgress {
    current: Mutex<Option<(Phase, ProgressBar)>>,
}

impl CliProgress {
    /// Create a progress reporter with no active spinner
    pub const fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    fn take_current(&self) -> Option<(Phase, ProgressBar)> {
        self.current.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Mark the running phase as done
    fn finish_current(&self) {
        if let Some((phase, bar)) = self.take_current() {
            bar.finish_and_clear();
            println!("{} {}", check(), phase.to_string().muted());
        }
    }

    /// Mark the running phase as failed; call when the pipeline aborts
    pub fn fail(&self) {
        if let Some((phase, bar)) = self.take_current() {
            bar.finish_and_clear();
            eprintln!("{} {}", cross(), phase.to_string().error());
        }
    }

    fn print_feedback(feedback: &FeedbackResult) {
        if feedback.passed() {
            println!("\n  {}\n", "All checks passed".success().emphasis());
        } else {
            println!("\n  {}\n", "Some checks failed".error().for_stdout());
        }

        for item in &feedback.checks {
            match item.status {
                CheckStatus::Pass => println!("  {} {}", check(), item.name),
                CheckStatus::Fail => {
                    println!("  {} {}", cross().for_stdout(), item.name.emphasis());
                    for line in item.details.lines() {
                        println!("      {}", line.muted());
                    }
                }
                CheckStatus::Skip => println!(
                    "  {} {} {}",
                    skip(),
                    item.name,
                    "(skipped)".muted()
                ),
            }
        }
        println!();
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_phase(&self, phase: Phase) {
        self.finish_current();
        if phase == Phase::Complete {
            return;
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.set_message(format!("{phase}..."));
        bar.enable_steady_tick(Duration::from_millis(80));

        if let Ok(mut slot) = self.current.lock() {
            *slot = Some((phase, bar));
        }
    }

    async fn on_packaged(&self, stats: &ArchiveStats) {
        self.finish_current();
        println!(
            "  {} files, {}",
            stats.entries.accent(),
            format_size(stats.size_bytes).accent()
        );
    }

    async fn on_feedback(&self, feedback: &FeedbackResult) {
        self.finish_current();
        Self::print_feedback(feedback);
    }

    async fn on_error(&self, err: &Error) {
        eprintln!("{}: {}", "warning".warn(), err);
    }

    async fn on_message(&self, message: &str) {
        println!("{}", message.muted());
    }
}
