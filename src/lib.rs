#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # IMG.LY Batch Canvas Library
//!
//! Batch image pipeline that removes backgrounds, crops every image to its
//! subject and centers the subject on a fixed-size canvas, then packages the
//! results into a single zip archive.
//!
//! ## Features
//!
//! - **Stage toggles**: background removal, crop to content and canvas
//!   composition can each be switched off; all eight combinations work
//! - **Exact canvas math**: the binding dimension fills exactly
//!   `floor(target * occupancy / 100)` pixels, centered with floor division
//! - **Pluggable segmentation**: any [`SegmentationSession`]; the Tract backend
//!   runs the U²-Net family in pure Rust
//! - **Model Management**: downloading and caching of model weights
//! - **Resilient batches**: per-image failures are reported, never fatal
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgly_bgcanvas::{
//!     BatchInput, BatchProcessor, ModelCache, ModelDownloader, PipelineConfig, SessionCache,
//!     TractSessionFactory,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = PipelineConfig::default();
//!
//! // Download and cache the model weights (one-time setup)
//! let cache = ModelCache::new()?;
//! ModelDownloader::with_cache(cache.clone())?
//!     .download_model(config.model, false)
//!     .await?;
//!
//! let sessions = SessionCache::new();
//! let processor = BatchProcessor::builder(config)
//!     .session_from_cache(&sessions, &TractSessionFactory::new(cache))?
//!     .build()?;
//!
//! let inputs = vec![BatchInput::new("cat.jpg", std::fs::read("cat.jpg")?)];
//! let result = processor.process_batch(&inputs);
//! std::fs::write("processed_images.zip", result.to_archive()?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): Pure Rust segmentation backend
//! - `cli` (default): Command-line interface and progress bar
//! - `tracing-json`: JSON log output for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! imgly-bgcanvas = { version = "0.1", default-features = false, features = ["tract"] }
//! ```

pub mod archive;
pub mod backends;
pub mod batch;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod download;
pub mod error;
pub mod pipeline;
pub mod segmentation;
pub mod services;
pub mod tracing_config;
pub mod types;

use std::sync::Arc;

// Public API exports
#[cfg(feature = "tract")]
pub use backends::{TractSession, TractSessionFactory};
pub use batch::{BatchProcessor, BatchProcessorBuilder};
pub use cache::{format_size, CachedModelInfo, ModelCache};
pub use compositor::{compose, compute_placement, CanvasPlacement};
pub use config::{
    BackgroundColor, CanvasConfig, ModelSelector, PipelineConfig, PipelineConfigBuilder,
    StageConfig,
};
pub use download::{validate_model_url, ModelDownloader};
pub use error::{BgCanvasError, FailureKind, Result};
pub use segmentation::{SegmentationSession, SessionCache, SessionCacheStats, SessionFactory};
pub use services::{
    ConsoleProgressReporter, ImageIOService, ItemProgress, NoOpProgressReporter,
    OutputFormatHandler, ProgressReporter,
};
pub use types::{
    BatchInput, BatchResult, BatchSummary, BoundingBox, ItemSummary, PipelineStage,
    ProcessedImage, ProcessedResult, ProcessingFailure, SourceImage, StageOutcome, StageWarning,
};

pub use tracing_config::{TracingConfig, TracingFormat};
#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;

/// Process a batch and package every success into a zip archive
///
/// Convenience wrapper around [`BatchProcessor`] for callers that only need
/// the archive bytes and the per-item results.
///
/// # Arguments
/// * `inputs` - Named encoded images, processed in order
/// * `config` - Pipeline configuration
/// * `session` - Segmentation session, required when background removal is enabled
///
/// # Errors
/// - Invalid configuration, or background removal enabled without a session
/// - Archive packaging failures
///
/// # Examples
///
/// ```rust
/// use imgly_bgcanvas::{process_to_archive, BatchInput, OutputFormatHandler, PipelineConfig};
/// use image::{Rgba, RgbaImage};
///
/// let png = OutputFormatHandler::encode_png(&RgbaImage::from_pixel(40, 20, Rgba([200, 0, 0, 255])))?;
/// let config = PipelineConfig::builder()
///     .remove_background(false)
///     .target_size(100, 100)
///     .build()?;
///
/// let (archive, result) = process_to_archive(&[BatchInput::new("red.jpg", png)], config, None)?;
/// assert_eq!(result.success_count(), 1);
/// assert!(!archive.is_empty());
/// # Ok::<(), imgly_bgcanvas::BgCanvasError>(())
/// ```
pub fn process_to_archive(
    inputs: &[BatchInput],
    config: PipelineConfig,
    session: Option<Arc<dyn SegmentationSession>>,
) -> Result<(Vec<u8>, BatchResult)> {
    let mut builder = BatchProcessor::builder(config);
    if let Some(session) = session {
        builder = builder.session(session);
    }

    let result = builder.build()?.process_batch(inputs);
    let archive = result.to_archive()?;
    Ok((archive, result))
}
