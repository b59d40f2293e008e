//! Core types shared by the pipeline, the batch processor and the packager

use crate::error::{BgCanvasError, FailureKind, Result};
use chrono::{DateTime, Utc};
use image::{DynamicImage, RgbaImage};
use serde::Serialize;
use std::path::Path;

/// Extension of the canonical output format
pub const OUTPUT_EXTENSION: &str = "png";

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Segmentation collaborator adds an alpha mask
    BackgroundRemoval,
    /// Crop to the non-transparent bounding box
    ContentCrop,
    /// Scale and center on the target canvas
    CanvasComposition,
}

impl PipelineStage {
    /// Get a human-readable description of the stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            PipelineStage::BackgroundRemoval => "Removing background",
            PipelineStage::ContentCrop => "Cropping to content",
            PipelineStage::CanvasComposition => "Composing on canvas",
        }
    }
}

/// Decoded input raster, always RGBA8
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pixels: RgbaImage,
}

impl SourceImage {
    /// Decode raw bytes and normalize to RGBA8
    ///
    /// # Errors
    /// - Bytes are not a supported raster format
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| BgCanvasError::decode(format!("Failed to decode image: {}", e)))?;
        Ok(Self::from(image))
    }

    /// Image width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Image height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Borrow the RGBA pixels
    #[must_use]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Take ownership of the RGBA pixels
    #[must_use]
    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }
}

impl From<DynamicImage> for SourceImage {
    fn from(image: DynamicImage) -> Self {
        Self {
            pixels: image.into_rgba8(),
        }
    }
}

impl From<RgbaImage> for SourceImage {
    fn from(pixels: RgbaImage) -> Self {
        Self { pixels }
    }
}

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Non-fatal condition observed while running the stages for one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageWarning {
    /// Content crop found no pixel with alpha > 0; the image passed through uncropped
    NoSubjectDetected,
    /// Canvas composition skipped for a zero-sized image
    DegenerateDimensions { width: u32, height: u32 },
}

impl std::fmt::Display for StageWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSubjectDetected => {
                write!(f, "no subject detected, image left uncropped")
            },
            Self::DegenerateDimensions { width, height } => write!(
                f,
                "degenerate {}x{} image, canvas composition skipped",
                width, height
            ),
        }
    }
}

/// Result of running the stage sequencer over one image
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Final image (composite, crop, mask or untouched input)
    pub image: RgbaImage,
    /// Warnings raised along the way
    pub warnings: Vec<StageWarning>,
}

impl StageOutcome {
    /// Whether content crop reported an empty subject
    #[must_use]
    pub fn no_subject_detected(&self) -> bool {
        self.warnings.contains(&StageWarning::NoSubjectDetected)
    }
}

/// One named input of a batch
#[derive(Debug, Clone)]
pub struct BatchInput {
    /// Display name, usually the uploaded file name
    pub name: String,
    /// Encoded image bytes
    pub bytes: Vec<u8>,
}

impl BatchInput {
    /// Create a new batch input
    pub fn new<S: Into<String>>(name: S, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Re-suffix a display name to the canonical output extension
///
/// Directory components are dropped and an empty stem becomes `image`.
///
/// ```rust
/// use imgly_bgcanvas::types::output_file_name;
///
/// assert_eq!(output_file_name("photos/cat.jpeg"), "cat.png");
/// assert_eq!(output_file_name("archive.tar.gz"), "archive.tar.png");
/// assert_eq!(output_file_name(""), "image.png");
/// ```
#[must_use]
pub fn output_file_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    format!("{}.{}", stem, OUTPUT_EXTENSION)
}

/// Successfully processed image
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    /// Name of the input as supplied
    pub original_name: String,
    /// Input name re-suffixed to `.png`
    pub output_name: String,
    /// Encoded PNG bytes
    pub bytes: Vec<u8>,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Warnings raised while processing
    pub warnings: Vec<StageWarning>,
    /// Processing time in milliseconds
    pub elapsed_ms: u64,
}

/// Input that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingFailure {
    /// Name of the input as supplied
    pub original_name: String,
    /// Failure category
    pub kind: FailureKind,
    /// Human-readable reason
    pub reason: String,
}

/// Outcome for a single batch input
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessedResult {
    Success(ProcessedImage),
    Failure(ProcessingFailure),
}

impl ProcessedResult {
    /// Build a failure record from an error
    #[must_use]
    pub fn from_error(original_name: &str, error: &BgCanvasError) -> Self {
        Self::Failure(ProcessingFailure {
            original_name: original_name.to_string(),
            kind: error.failure_kind(),
            reason: error.to_string(),
        })
    }

    /// Name of the input this result belongs to
    #[must_use]
    pub fn original_name(&self) -> &str {
        match self {
            Self::Success(image) => &image.original_name,
            Self::Failure(failure) => &failure.original_name,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Borrow the success payload, if any
    #[must_use]
    pub fn as_success(&self) -> Option<&ProcessedImage> {
        match self {
            Self::Success(image) => Some(image),
            Self::Failure(_) => None,
        }
    }

    /// Borrow the failure payload, if any
    #[must_use]
    pub fn as_failure(&self) -> Option<&ProcessingFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

/// Ordered results of one batch run
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// One entry per processed input, in input order
    pub items: Vec<ProcessedResult>,
    /// Number of inputs handed to the batch
    pub total_inputs: usize,
    /// Whether the run was cancelled before every input was processed
    pub cancelled: bool,
    /// When processing started
    pub started_at: DateTime<Utc>,
    /// When processing finished
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    /// Successful items in input order
    pub fn successes(&self) -> impl Iterator<Item = &ProcessedImage> {
        self.items.iter().filter_map(ProcessedResult::as_success)
    }

    /// Failed items in input order
    pub fn failures(&self) -> impl Iterator<Item = &ProcessingFailure> {
        self.items.iter().filter_map(ProcessedResult::as_failure)
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// `(output_name, bytes)` pairs of every success, ready for packaging
    #[must_use]
    pub fn archive_entries(&self) -> Vec<(&str, &[u8])> {
        self.successes()
            .map(|image| (image.output_name.as_str(), image.bytes.as_slice()))
            .collect()
    }

    /// Package every success into a zip archive
    ///
    /// # Errors
    /// - Archive serialization failures
    pub fn to_archive(&self) -> Result<Vec<u8>> {
        crate::archive::pack(&self.archive_entries())
    }

    /// Serializable summary of this run
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        let items = self
            .items
            .iter()
            .map(|item| match item {
                ProcessedResult::Success(image) => ItemSummary {
                    name: image.original_name.clone(),
                    output_name: Some(image.output_name.clone()),
                    succeeded: true,
                    width: Some(image.width),
                    height: Some(image.height),
                    warnings: image.warnings.iter().map(ToString::to_string).collect(),
                    failure: None,
                },
                ProcessedResult::Failure(failure) => ItemSummary {
                    name: failure.original_name.clone(),
                    output_name: None,
                    succeeded: false,
                    width: None,
                    height: None,
                    warnings: Vec::new(),
                    failure: Some(failure.clone()),
                },
            })
            .collect();

        BatchSummary {
            total_inputs: self.total_inputs,
            processed: self.items.len(),
            succeeded: self.success_count(),
            failed: self.failure_count(),
            cancelled: self.cancelled,
            started_at: self.started_at,
            finished_at: self.finished_at,
            elapsed_ms: (self.finished_at - self.started_at)
                .num_milliseconds()
                .max(0)
                .unsigned_abs(),
            items,
        }
    }
}

/// Per-item entry of a [`BatchSummary`]
#[derive(Debug, Clone, Serialize)]
pub struct ItemSummary {
    pub name: String,
    pub output_name: Option<String>,
    pub succeeded: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub warnings: Vec<String>,
    pub failure: Option<ProcessingFailure>,
}

/// Serializable report of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total_inputs: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub items: Vec<ItemSummary>,
}
