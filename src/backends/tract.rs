//! Tract segmentation backend
//!
//! Runs the U²-Net family of ONNX models with Tract, a pure Rust neural
//! network inference library with no external dependencies.
//!
//! Pre- and post-processing follow the reference pipeline for these models:
//! - resize to 320x320 with Lanczos3
//! - scale by the largest channel value, then ImageNet mean/std normalization
//! - min-max normalize the first output and resize it back as the alpha mask

use crate::cache::ModelCache;
use crate::config::ModelSelector;
use crate::error::{BgCanvasError, Result};
use crate::segmentation::{SegmentationSession, SessionFactory};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};
use instant::Instant;
use std::path::Path;
use std::sync::Arc;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Square input resolution of the U²-Net models
pub const INPUT_SIZE: u32 = 320;

const NORMALIZATION_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const NORMALIZATION_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Loaded U²-Net model ready for inference
#[derive(Debug)]
pub struct TractSession {
    model: TractModel,
    selector: ModelSelector,
}

impl TractSession {
    /// Load and optimize an ONNX model from disk
    ///
    /// # Errors
    /// - Model file missing or not valid ONNX
    /// - Graph optimization failures
    pub fn load(path: &Path, selector: ModelSelector) -> Result<Self> {
        let load_start = Instant::now();
        log::info!("Loading {} with Tract from {}", selector, path.display());

        let size = INPUT_SIZE as usize;
        let model = onnx()
            .model_for_path(path)
            .map_err(|e| BgCanvasError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, size, size]).into())
            .map_err(|e| BgCanvasError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| BgCanvasError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                BgCanvasError::model(format!("Failed to create runnable model: {e}"))
            })?;

        log::info!(
            "Tract session for {} ready in {}ms",
            selector,
            load_start.elapsed().as_millis()
        );

        Ok(Self { model, selector })
    }
}

impl SegmentationSession for TractSession {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        if image.width() == 0 || image.height() == 0 {
            return Err(BgCanvasError::segmentation(format!(
                "Cannot segment a {}x{} image",
                image.width(),
                image.height()
            )));
        }

        let inference_start = Instant::now();
        let input = preprocess(image);

        let outputs = self
            .model
            .run(tvec![input.into()])
            .map_err(|e| BgCanvasError::segmentation(format!("Tract inference failed: {e}")))?;

        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgCanvasError::segmentation("No output tensor found"))?
            .into_arc_tensor();

        let view = output.to_array_view::<f32>().map_err(|e| {
            BgCanvasError::segmentation(format!("Failed to read output tensor: {e}"))
        })?;

        let shape = view.shape();
        let (height, width) = match shape.len() {
            n if n >= 2 => (
                shape.get(n - 2).copied().unwrap_or(0),
                shape.get(n - 1).copied().unwrap_or(0),
            ),
            n => {
                return Err(BgCanvasError::segmentation(format!(
                    "Expected at least 2D output tensor, got {n}D"
                )))
            },
        };

        let values: Vec<f32> = view.iter().take(width * height).copied().collect();
        let mask = prediction_to_mask(&values, width as u32, height as u32)?;

        log::debug!(
            "Tract inference for {} took {}ms",
            self.selector,
            inference_start.elapsed().as_millis()
        );

        Ok(apply_mask(image, &mask))
    }

    fn model(&self) -> ModelSelector {
        self.selector
    }
}

/// Creates [`TractSession`]s from weights in a [`ModelCache`]
///
/// Weights must already be downloaded; see [`crate::download::ModelDownloader`].
#[derive(Debug, Clone)]
pub struct TractSessionFactory {
    cache: ModelCache,
}

impl TractSessionFactory {
    #[must_use]
    pub fn new(cache: ModelCache) -> Self {
        Self { cache }
    }
}

impl SessionFactory for TractSessionFactory {
    fn new_session(&self, model: ModelSelector) -> Result<Arc<dyn SegmentationSession>> {
        if !self.cache.is_model_cached(model) {
            return Err(BgCanvasError::model(format!(
                "Model {} is not cached in {}. Download it first (--only-download --model {}).",
                model,
                self.cache.get_current_cache_dir().display(),
                model
            )));
        }

        let session = TractSession::load(&self.cache.get_model_path(model), model)?;
        Ok(Arc::new(session))
    }
}

/// Build the normalized `[1, 3, 320, 320]` input tensor
fn preprocess(image: &RgbaImage) -> Tensor {
    let resized = imageops::resize(image, INPUT_SIZE, INPUT_SIZE, FilterType::Lanczos3);
    let max_value = resized
        .pixels()
        .flat_map(|pixel| pixel.0.into_iter().take(3))
        .max()
        .map_or(0.0, f32::from)
        .max(1e-6);

    let size = INPUT_SIZE as usize;
    let mut input = tract_ndarray::Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let channels = pixel
            .0
            .iter()
            .zip(NORMALIZATION_MEAN)
            .zip(NORMALIZATION_STD)
            .enumerate();
        for (c, ((value, mean), std)) in channels {
            input[[0, c, y as usize, x as usize]] = (f32::from(*value) / max_value - mean) / std;
        }
    }

    Tensor::from(input)
}

/// Min-max normalize raw predictions into an 8-bit mask
fn prediction_to_mask(values: &[f32], width: u32, height: u32) -> Result<GrayImage> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = (max - min).max(f32::EPSILON);

    let pixels = values
        .iter()
        .map(|&v| ((v - min) / range * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect();

    GrayImage::from_raw(width, height, pixels).ok_or_else(|| {
        BgCanvasError::segmentation(format!(
            "Output tensor has {} values, expected {}x{}",
            values.len(),
            width,
            height
        ))
    })
}

/// Resize the mask to the image and multiply it into the alpha channel
fn apply_mask(image: &RgbaImage, mask: &GrayImage) -> RgbaImage {
    let mask = if mask.dimensions() == image.dimensions() {
        mask.clone()
    } else {
        imageops::resize(mask, image.width(), image.height(), FilterType::Lanczos3)
    };

    let mut result = image.clone();
    for (pixel, mask_pixel) in result.pixels_mut().zip(mask.pixels()) {
        let alpha = u16::from(pixel.0[3]) * u16::from(mask_pixel.0[0]);
        pixel.0[3] = ((alpha + 127) / 255) as u8;
    }
    result
}
