//! Progress reporting for long-running phases.
//!
//! Engines accept an optional [`ProgressCallback`] so the library stays free
//! of terminal concerns; the CLI installs a [`ConsoleProgress`] backed by
//! `indicatif`.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Callback trait for phase progress reporting.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase begins, with the number of items it will process.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called after each item is processed.
    fn on_progress(&self, completed: usize, detail: &str);

    /// Called when a phase ends.
    fn on_phase_end(&self, phase: &str);
}

/// No-op callback for tests and embedding.
#[derive(Debug, Default)]
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_phase_start(&self, _phase: &str, _total: usize) {}
    fn on_progress(&self, _completed: usize, _detail: &str) {}
    fn on_phase_end(&self, _phase: &str) {}
}

/// Terminal progress bar reporter.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleProgress {
    /// Create a new console reporter with no active bar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{prefix:>10} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );
        bar.set_prefix(phase.to_string());
        *self.bar.lock().expect("progress bar lock poisoned") = Some(bar);
    }

    fn on_progress(&self, completed: usize, detail: &str) {
        if let Some(bar) = self.bar.lock().expect("progress bar lock poisoned").as_ref() {
            bar.set_position(completed as u64);
            bar.set_message(detail.to_string());
        }
    }

    fn on_phase_end(&self, _phase: &str) {
        if let Some(bar) = self.bar.lock().expect("progress bar lock poisoned").take() {
            bar.finish_and_clear();
        }
    }
}
