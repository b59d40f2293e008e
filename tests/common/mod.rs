//! Shared fixtures for integration tests
//!
//! Fake segmentation sessions and progress reporters that exercise the public
//! API without model files.

#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use imgly_bgcanvas::{
    BgCanvasError, ItemProgress, ModelSelector, OutputFormatHandler, ProgressReporter, Result,
    SegmentationSession, SessionFactory, StageWarning,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Background color used by [`subject_on_white`]
pub(crate) const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Session that treats pure white as background
#[derive(Debug)]
pub(crate) struct WhiteKeySession {
    model: ModelSelector,
    calls: AtomicUsize,
}

impl WhiteKeySession {
    pub(crate) fn new(model: ModelSelector) -> Self {
        Self {
            model,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SegmentationSession for WhiteKeySession {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut keyed = image.clone();
        for pixel in keyed.pixels_mut() {
            if pixel.0[..3] == [255, 255, 255] {
                pixel.0[3] = 0;
            }
        }
        Ok(keyed)
    }

    fn model(&self) -> ModelSelector {
        self.model
    }
}

/// Session that always fails
#[derive(Debug)]
pub(crate) struct BrokenSession;

impl SegmentationSession for BrokenSession {
    fn remove_background(&self, _image: &RgbaImage) -> Result<RgbaImage> {
        Err(BgCanvasError::segmentation("inference backend unavailable"))
    }

    fn model(&self) -> ModelSelector {
        ModelSelector::U2Net
    }
}

/// Factory counting how many sessions it created
#[derive(Default)]
pub(crate) struct CountingFactory {
    created: AtomicUsize,
}

impl CountingFactory {
    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl SessionFactory for CountingFactory {
    fn new_session(&self, model: ModelSelector) -> Result<Arc<dyn SegmentationSession>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(WhiteKeySession::new(model)))
    }
}

/// Reporter capturing every callback
#[derive(Default)]
pub(crate) struct CapturingReporter {
    pub(crate) items: Mutex<Vec<ItemProgress>>,
    pub(crate) warnings: Mutex<Vec<(String, StageWarning)>>,
    pub(crate) errors: Mutex<Vec<String>>,
}

impl ProgressReporter for CapturingReporter {
    fn report_item_done(&self, progress: &ItemProgress) {
        self.items.lock().unwrap().push(progress.clone());
    }

    fn report_warning(&self, name: &str, warning: &StageWarning) {
        self.warnings
            .lock()
            .unwrap()
            .push((name.to_string(), warning.clone()));
    }

    fn report_error(&self, name: &str, _error: &str) {
        self.errors.lock().unwrap().push(name.to_string());
    }
}

/// White image with an opaque red rectangle at `(x, y)` of size `w`x`h`
pub(crate) fn subject_on_white(width: u32, height: u32, x: u32, y: u32, w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |px, py| {
        if (x..x + w).contains(&px) && (y..y + h).contains(&py) {
            Rgba([200, 30, 30, 255])
        } else {
            WHITE
        }
    })
}

/// Encode an image as PNG bytes
pub(crate) fn png_bytes(image: &RgbaImage) -> Vec<u8> {
    OutputFormatHandler::encode_png(image).unwrap()
}

/// Encode an image as JPEG bytes
pub(crate) fn jpeg_bytes(image: &RgbaImage) -> Vec<u8> {
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, 95)
        .encode_image(&rgb)
        .unwrap();
    bytes
}

/// Encode an image as lossless WebP bytes
pub(crate) fn webp_bytes(image: &RgbaImage) -> Vec<u8> {
    use image::ImageEncoder;

    let mut bytes = Vec::new();
    image::codecs::webp::WebPEncoder::new_lossless(&mut bytes)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
    bytes
}

/// Decode PNG bytes back into RGBA
pub(crate) fn decode(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes).unwrap().to_rgba8()
}

/// Names of the archive members in order
pub(crate) fn archive_names(archive: &[u8]) -> Vec<String> {
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect()
}
