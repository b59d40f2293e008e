//! Progress reporting service
//!
//! This module separates progress reporting concerns from batch processing,
//! allowing different frontends to implement their own progress handling.
//! Reporting is a pure observation hook and never alters processing.

use crate::types::{BatchSummary, StageWarning};
use instant::Instant;
use std::sync::Arc;

/// Progress update emitted after one batch item completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemProgress {
    /// 1-based position of the completed item
    pub index: usize,
    /// Number of items in the batch
    pub total: usize,
    /// Display name of the item
    pub name: String,
    /// Whether the item produced an output
    pub succeeded: bool,
    /// Elapsed time since the batch started (milliseconds)
    pub elapsed_ms: u64,
    /// Estimated time remaining (milliseconds, if available)
    pub eta_ms: Option<u64>,
}

impl ItemProgress {
    /// Completion percentage (0-100)
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.index.min(self.total) * 100) / self.total) as u8
    }
}

/// Trait for reporting progress during batch processing
pub trait ProgressReporter: Send + Sync {
    /// Report that an item finished, successfully or not
    fn report_item_done(&self, progress: &ItemProgress);

    /// Report a non-fatal warning for an item
    fn report_warning(&self, _name: &str, _warning: &StageWarning) {}

    /// Report a per-item failure
    fn report_error(&self, name: &str, error: &str);

    /// Report the end of a batch run
    fn report_batch_completion(&self, _summary: &BatchSummary) {}
}

/// No-op progress reporter that discards all updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_item_done(&self, _progress: &ItemProgress) {
        // Intentionally empty
    }

    fn report_error(&self, _name: &str, _error: &str) {
        // Intentionally empty
    }
}

/// Reporter that writes progress to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// # Arguments
    /// * `verbose` - Whether to include timing details
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_item_done(&self, progress: &ItemProgress) {
        let status = if progress.succeeded { "done" } else { "failed" };
        match (self.verbose, progress.eta_ms) {
            (true, Some(eta)) => log::info!(
                "[{}/{}] {} {} ({}ms elapsed, ~{}ms remaining)",
                progress.index,
                progress.total,
                progress.name,
                status,
                progress.elapsed_ms,
                eta
            ),
            (true, None) => log::info!(
                "[{}/{}] {} {} ({}ms elapsed)",
                progress.index,
                progress.total,
                progress.name,
                status,
                progress.elapsed_ms
            ),
            (false, _) => log::info!(
                "[{}/{}] {} {}",
                progress.index,
                progress.total,
                progress.name,
                status
            ),
        }
    }

    fn report_warning(&self, name: &str, warning: &StageWarning) {
        log::warn!("{}: {}", name, warning);
    }

    fn report_error(&self, name: &str, error: &str) {
        log::error!("Failed to process {}: {}", name, error);
    }

    fn report_batch_completion(&self, summary: &BatchSummary) {
        log::info!(
            "Batch finished: {} succeeded, {} failed, {} of {} processed in {}ms{}",
            summary.succeeded,
            summary.failed,
            summary.processed,
            summary.total_inputs,
            summary.elapsed_ms,
            if summary.cancelled { " (cancelled)" } else { "" }
        );
    }
}

/// Tracks elapsed time and ETA for a batch and forwards updates to a reporter
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    start_time: Instant,
    total: usize,
}

impl ProgressTracker {
    /// Create a new tracker for a batch of `total` items
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>, total: usize) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            total,
        }
    }

    /// Report completion of the item at 0-based `position`
    pub fn item_done(&self, position: usize, name: &str, succeeded: bool) {
        let index = position + 1;
        let elapsed_ms = self.elapsed_ms();
        let remaining = self.total.saturating_sub(index) as u64;
        let eta_ms = (remaining > 0).then(|| elapsed_ms / index as u64 * remaining);

        self.reporter.report_item_done(&ItemProgress {
            index,
            total: self.total,
            name: name.to_string(),
            succeeded,
            elapsed_ms,
            eta_ms,
        });
    }

    /// Forward a stage warning
    pub fn warning(&self, name: &str, warning: &StageWarning) {
        self.reporter.report_warning(name, warning);
    }

    /// Forward a per-item failure
    pub fn error(&self, name: &str, error: &str) {
        self.reporter.report_error(name, error);
    }

    /// Forward the final summary
    pub fn completion(&self, summary: &BatchSummary) {
        self.reporter.report_batch_completion(summary);
    }

    /// Elapsed milliseconds since the tracker was created
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("total", &self.total)
            .field("elapsed_ms", &self.elapsed_ms())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::RecordingProgressReporter;

    #[test]
    fn test_item_progress_percentage() {
        let progress = ItemProgress {
            index: 1,
            total: 4,
            name: "a.png".to_string(),
            succeeded: true,
            elapsed_ms: 10,
            eta_ms: None,
        };
        assert_eq!(progress.percentage(), 25);

        let empty = ItemProgress {
            index: 0,
            total: 0,
            ..progress
        };
        assert_eq!(empty.percentage(), 100);
    }

    #[test]
    fn test_tracker_reports_one_based_indices() {
        let reporter = Arc::new(RecordingProgressReporter::new());
        let tracker = ProgressTracker::new(reporter.clone(), 3);

        tracker.item_done(0, "a.jpg", true);
        tracker.item_done(1, "b.jpg", false);
        tracker.item_done(2, "c.jpg", true);

        let items = reporter.items();
        let indices: Vec<(usize, usize)> = items.iter().map(|p| (p.index, p.total)).collect();
        assert_eq!(indices, vec![(1, 3), (2, 3), (3, 3)]);
        assert!(!items.get(1).unwrap().succeeded);
        assert_eq!(items.last().unwrap().eta_ms, None);
    }

    #[test]
    fn test_tracker_forwards_warnings_and_errors() {
        let reporter = Arc::new(RecordingProgressReporter::new());
        let tracker = ProgressTracker::new(reporter.clone(), 1);

        tracker.warning("empty.png", &StageWarning::NoSubjectDetected);
        tracker.error("broken.jpg", "Decode error: bad header");

        assert_eq!(
            reporter.warnings(),
            vec![("empty.png".to_string(), StageWarning::NoSubjectDetected)]
        );
        assert_eq!(
            reporter.errors(),
            vec![(
                "broken.jpg".to_string(),
                "Decode error: bad header".to_string()
            )]
        );
    }

    #[test]
    fn test_no_op_tracker() {
        let tracker = ProgressTracker::new(Arc::new(NoOpProgressReporter), 2);
        tracker.item_done(0, "a", true);
        tracker.warning("a", &StageWarning::NoSubjectDetected);
        tracker.error("a", "ignored");
        assert!(format!("{tracker:?}").contains("total: 2"));
    }
}
