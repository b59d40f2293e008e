//! Batch orchestrator
//!
//! Decodes, runs the stage sequencer on, and encodes each input in order. A
//! failing item is recorded and never aborts the batch.

use crate::config::PipelineConfig;
use crate::error::{BgCanvasError, Result};
use crate::pipeline;
use crate::segmentation::{SegmentationSession, SessionCache, SessionFactory};
use crate::services::{NoOpProgressReporter, OutputFormatHandler, ProgressReporter, ProgressTracker};
use crate::types::{
    output_file_name, BatchInput, BatchResult, ProcessedImage, ProcessedResult, SourceImage,
};
use chrono::Utc;
use instant::Instant;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Applies one [`PipelineConfig`] to batches of images
pub struct BatchProcessor {
    config: PipelineConfig,
    session: Option<Arc<dyn SegmentationSession>>,
    reporter: Arc<dyn ProgressReporter>,
    cancellation: CancellationToken,
}

impl BatchProcessor {
    /// Start building a processor for `config`
    #[must_use]
    pub fn builder(config: PipelineConfig) -> BatchProcessorBuilder {
        BatchProcessorBuilder::new(config)
    }

    /// Configuration this processor applies
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Token that stops the batch before its next item when cancelled
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Process every input in order
    ///
    /// Cancellation is checked before each item; items already processed are
    /// kept and the result is flagged as cancelled.
    #[instrument(
        skip(self, inputs),
        fields(total = inputs.len(), model = %self.config.model)
    )]
    pub fn process_batch(&self, inputs: &[BatchInput]) -> BatchResult {
        let started_at = Utc::now();
        let tracker = ProgressTracker::new(Arc::clone(&self.reporter), inputs.len());
        let mut items = Vec::with_capacity(inputs.len());
        let mut cancelled = false;

        info!(stages = ?self.config.stages.enabled_stages(), "Starting batch");

        for (position, input) in inputs.iter().enumerate() {
            if self.cancellation.is_cancelled() {
                warn!(
                    processed = position,
                    remaining = inputs.len() - position,
                    "Batch cancelled"
                );
                cancelled = true;
                break;
            }

            let item = match self.process_item(input) {
                Ok(image) => {
                    for warning in &image.warnings {
                        tracker.warning(&input.name, warning);
                    }
                    ProcessedResult::Success(image)
                },
                Err(e) => {
                    warn!(name = %input.name, error = %e, "Item failed");
                    tracker.error(&input.name, &e.to_string());
                    ProcessedResult::from_error(&input.name, &e)
                },
            };

            tracker.item_done(position, &input.name, item.is_success());
            items.push(item);
        }

        let result = BatchResult {
            items,
            total_inputs: inputs.len(),
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            succeeded = result.success_count(),
            failed = result.failure_count(),
            cancelled,
            "Batch finished"
        );
        tracker.completion(&result.summary());
        result
    }

    /// Run [`Self::process_batch`] on the blocking thread pool
    ///
    /// # Errors
    /// - The blocking task panicked or was aborted
    pub async fn process_batch_async(
        self: Arc<Self>,
        inputs: Vec<BatchInput>,
    ) -> Result<BatchResult> {
        tokio::task::spawn_blocking(move || self.process_batch(&inputs))
            .await
            .map_err(|e| BgCanvasError::internal(format!("Batch task failed: {}", e)))
    }

    /// Decode, transform and encode a single input
    ///
    /// # Errors
    /// - `Decode`, `Segmentation` or `Encode` failures for this item
    #[instrument(skip(self, input), fields(name = %input.name, bytes = input.bytes.len()))]
    pub fn process_item(&self, input: &BatchInput) -> Result<ProcessedImage> {
        let start = Instant::now();

        let source = SourceImage::decode(&input.bytes)?;
        debug!(width = source.width(), height = source.height(), "Decoded input");

        let outcome = pipeline::run(source, &self.config.stages, self.session.as_deref())?;
        let bytes = OutputFormatHandler::encode_png(&outcome.image)?;

        Ok(ProcessedImage {
            original_name: input.name.clone(),
            output_name: output_file_name(&input.name),
            width: outcome.image.width(),
            height: outcome.image.height(),
            bytes,
            warnings: outcome.warnings,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

impl std::fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Builder for [`BatchProcessor`]
pub struct BatchProcessorBuilder {
    config: PipelineConfig,
    session: Option<Arc<dyn SegmentationSession>>,
    reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation: Option<CancellationToken>,
}

impl BatchProcessorBuilder {
    fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            session: None,
            reporter: None,
            cancellation: None,
        }
    }

    /// Use an already resolved segmentation session
    #[must_use]
    pub fn session(mut self, session: Arc<dyn SegmentationSession>) -> Self {
        self.session = Some(session);
        self
    }

    /// Resolve the configured model through a shared session cache
    ///
    /// Does nothing when background removal is disabled.
    ///
    /// # Errors
    /// - Session creation failures
    pub fn session_from_cache(
        mut self,
        cache: &SessionCache,
        factory: &dyn SessionFactory,
    ) -> Result<Self> {
        if self.config.stages.remove_background {
            self.session = Some(cache.get_or_create(self.config.model, factory)?);
        }
        Ok(self)
    }

    /// Observe per-item progress
    #[must_use]
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Share a cancellation token with the caller
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Validate the configuration and build the processor
    ///
    /// # Errors
    /// - Invalid canvas configuration
    /// - Background removal enabled without a session
    pub fn build(self) -> Result<BatchProcessor> {
        self.config.validate()?;

        if self.config.stages.remove_background {
            match &self.session {
                None => {
                    return Err(BgCanvasError::invalid_config(
                        "Background removal is enabled but no segmentation session was provided",
                    ));
                },
                Some(session) if session.model() != self.config.model => {
                    log::warn!(
                        "Session model {} differs from configured model {}",
                        session.model(),
                        self.config.model
                    );
                },
                Some(_) => {},
            }
        }

        Ok(BatchProcessor {
            config: self.config,
            session: self.session,
            reporter: self
                .reporter
                .unwrap_or_else(|| Arc::new(NoOpProgressReporter)),
            cancellation: self.cancellation.unwrap_or_default(),
        })
    }
}
