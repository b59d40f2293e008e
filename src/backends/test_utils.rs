//! Test utilities and mock segmentation sessions
//!
//! This module provides mock implementations of the segmentation and progress
//! traits so the pipeline and batch processor can be tested without model
//! files or an inference engine.

use crate::{
    config::ModelSelector,
    error::{BgCanvasError, Result},
    segmentation::{SegmentationSession, SessionFactory},
    services::{ItemProgress, OutputFormatHandler, ProgressReporter},
    types::{BatchSummary, StageWarning},
};
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// What a mock session does with its input
#[derive(Debug, Clone)]
enum MockBehavior {
    /// Return the input unchanged
    Identity,
    /// Make near-white pixels transparent
    AlphaMask,
    /// Make every pixel transparent
    EraseAll,
    /// Return an image half the input size
    Shrinking,
    /// Fail with a segmentation error
    Failing(String),
}

/// Mock segmentation session for testing
#[derive(Debug, Clone)]
pub struct MockSegmentationSession {
    model: ModelSelector,
    behavior: MockBehavior,
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl MockSegmentationSession {
    fn with_behavior(model: ModelSelector, behavior: MockBehavior) -> Self {
        Self {
            model,
            behavior,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Session that returns its input unchanged
    #[must_use]
    pub fn identity(model: ModelSelector) -> Self {
        Self::with_behavior(model, MockBehavior::Identity)
    }

    /// Session that treats near-white pixels as background
    #[must_use]
    pub fn alpha_mask(model: ModelSelector) -> Self {
        Self::with_behavior(model, MockBehavior::AlphaMask)
    }

    /// Session that detects no foreground at all
    #[must_use]
    pub fn erase_all(model: ModelSelector) -> Self {
        Self::with_behavior(model, MockBehavior::EraseAll)
    }

    /// Session that violates the same-size contract
    #[must_use]
    pub fn shrinking(model: ModelSelector) -> Self {
        Self::with_behavior(model, MockBehavior::Shrinking)
    }

    /// Session whose every call fails
    #[must_use]
    pub fn failing(model: ModelSelector, message: &str) -> Self {
        Self::with_behavior(model, MockBehavior::Failing(message.to_string()))
    }

    /// Dimensions of every image passed to this session
    pub fn get_call_history(&self) -> Vec<(u32, u32)> {
        self.call_history.lock().unwrap().clone()
    }
}

impl SegmentationSession for MockSegmentationSession {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(image.dimensions());
        }

        match &self.behavior {
            MockBehavior::Identity => Ok(image.clone()),
            MockBehavior::AlphaMask => {
                let mut masked = image.clone();
                for pixel in masked.pixels_mut() {
                    let [r, g, b, _] = pixel.0;
                    if r > 240 && g > 240 && b > 240 {
                        pixel.0[3] = 0;
                    }
                }
                Ok(masked)
            },
            MockBehavior::EraseAll => {
                let mut erased = image.clone();
                for pixel in erased.pixels_mut() {
                    pixel.0[3] = 0;
                }
                Ok(erased)
            },
            MockBehavior::Shrinking => Ok(RgbaImage::new(
                (image.width() / 2).max(1),
                (image.height() / 2).max(1),
            )),
            MockBehavior::Failing(message) => Err(BgCanvasError::segmentation(format!(
                "Mock session failed: {}",
                message
            ))),
        }
    }

    fn model(&self) -> ModelSelector {
        self.model
    }
}

/// Mock session factory that counts session creations
pub struct MockSessionFactory {
    constructor: Option<fn(ModelSelector) -> MockSegmentationSession>,
    failure: Option<String>,
    created: AtomicUsize,
}

impl MockSessionFactory {
    /// Factory producing sessions from `constructor`
    #[must_use]
    pub fn new(constructor: fn(ModelSelector) -> MockSegmentationSession) -> Self {
        Self {
            constructor: Some(constructor),
            failure: None,
            created: AtomicUsize::new(0),
        }
    }

    /// Factory whose session creation always fails
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            constructor: None,
            failure: Some(message.to_string()),
            created: AtomicUsize::new(0),
        }
    }

    /// Number of `new_session` calls so far
    pub fn creation_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl SessionFactory for MockSessionFactory {
    fn new_session(&self, model: ModelSelector) -> Result<Arc<dyn SegmentationSession>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        match (self.constructor, &self.failure) {
            (Some(constructor), None) => Ok(Arc::new(constructor(model))),
            (_, failure) => Err(BgCanvasError::model(format!(
                "Mock factory failed: {}",
                failure.as_deref().unwrap_or("no constructor")
            ))),
        }
    }
}

/// Progress reporter that captures reports for verification
#[derive(Default)]
pub struct RecordingProgressReporter {
    items: Mutex<Vec<ItemProgress>>,
    warnings: Mutex<Vec<(String, StageWarning)>>,
    errors: Mutex<Vec<(String, String)>>,
    completions: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl RecordingProgressReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reporter that cancels `token` once `count` items have completed
    #[must_use]
    pub fn cancel_after(count: usize, token: CancellationToken) -> Self {
        Self {
            cancel_after: Some((count, token)),
            ..Self::default()
        }
    }

    pub fn items(&self) -> Vec<ItemProgress> {
        self.items.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<(String, StageWarning)> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().unwrap().clone()
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

impl ProgressReporter for RecordingProgressReporter {
    fn report_item_done(&self, progress: &ItemProgress) {
        let mut items = self.items.lock().unwrap();
        items.push(progress.clone());
        if let Some((count, token)) = &self.cancel_after {
            if items.len() >= *count {
                token.cancel();
            }
        }
    }

    fn report_warning(&self, name: &str, warning: &StageWarning) {
        self.warnings
            .lock()
            .unwrap()
            .push((name.to_string(), warning.clone()));
    }

    fn report_error(&self, name: &str, error: &str) {
        self.errors
            .lock()
            .unwrap()
            .push((name.to_string(), error.to_string()));
    }

    fn report_batch_completion(&self, _summary: &BatchSummary) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }
}

/// Opaque gradient image encoded as PNG
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 20 % 240) as u8, (y * 30 % 240) as u8, 90, 255])
    });
    OutputFormatHandler::encode_png(&image).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_session_records_calls() {
        let session = MockSegmentationSession::identity(ModelSelector::U2NetP);
        let image = RgbaImage::new(3, 2);
        assert_eq!(session.remove_background(&image).unwrap(), image);
        assert_eq!(session.get_call_history(), vec![(3, 2)]);
        assert_eq!(session.model(), ModelSelector::U2NetP);
    }

    #[test]
    fn test_alpha_mask_clears_white() {
        let session = MockSegmentationSession::alpha_mask(ModelSelector::U2Net);
        let mut image = RgbaImage::from_pixel(2, 1, Rgba([255, 255, 255, 255]));
        image.put_pixel(1, 0, Rgba([10, 10, 10, 255]));

        let masked = session.remove_background(&image).unwrap();
        assert_eq!(masked.get_pixel(0, 0).0[3], 0);
        assert_eq!(masked.get_pixel(1, 0).0[3], 255);
    }
}
