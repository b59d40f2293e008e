//! Progress bar reporter for the CLI

use crate::services::{ItemProgress, ProgressReporter};
use crate::types::{BatchSummary, StageWarning};
use indicatif::{ProgressBar, ProgressStyle};

/// Renders batch progress as an `indicatif` bar
///
/// Warnings and failures are printed above the bar so they stay visible.
#[derive(Debug)]
pub(crate) struct IndicatifProgressReporter {
    bar: ProgressBar,
}

impl IndicatifProgressReporter {
    pub(crate) fn new(total: usize) -> Self {
        Self::with_bar(ProgressBar::new(total as u64))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} (ETA: {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }
}

impl ProgressReporter for IndicatifProgressReporter {
    fn report_item_done(&self, progress: &ItemProgress) {
        self.bar.set_length(progress.total as u64);
        self.bar.set_position(progress.index as u64);
        self.bar.set_message(progress.name.clone());
    }

    fn report_warning(&self, name: &str, warning: &StageWarning) {
        self.bar.println(format!("warning: {}: {}", name, warning));
    }

    fn report_error(&self, name: &str, error: &str) {
        self.bar
            .println(format!("error: failed to process {}: {}", name, error));
    }

    fn report_batch_completion(&self, summary: &BatchSummary) {
        let status = if summary.cancelled { "Interrupted" } else { "Completed" };
        self.bar.finish_with_message(format!(
            "{}! Succeeded: {}, Failed: {}",
            status, summary.succeeded, summary.failed
        ));
    }
}
