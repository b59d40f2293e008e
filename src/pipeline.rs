//! Stage sequencer
//!
//! Runs background removal, content crop and canvas composition in that fixed
//! order over a single image. Every stage can be toggled independently.

use crate::compositor;
use crate::config::StageConfig;
use crate::error::{BgCanvasError, Result};
use crate::segmentation::SegmentationSession;
use crate::types::{BoundingBox, PipelineStage, SourceImage, StageOutcome, StageWarning};
use image::RgbaImage;
use tracing::{debug, instrument, span, warn, Level};

/// Tightest box containing every pixel with alpha > 0
///
/// Returns `None` when the image is fully transparent or empty.
#[must_use]
pub fn content_bounds(image: &RgbaImage) -> Option<BoundingBox> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel.0[3] > 0 {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    found.then(|| BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Crop to the non-transparent content
///
/// A fully transparent image is returned unchanged together with `None`, so
/// callers can raise a "no subject detected" warning instead of failing.
#[must_use]
pub fn crop_to_content(image: RgbaImage) -> (RgbaImage, Option<BoundingBox>) {
    match content_bounds(&image) {
        Some(bounds) if (bounds.width, bounds.height) == image.dimensions() => {
            (image, Some(bounds))
        },
        Some(bounds) => {
            let cropped =
                image::imageops::crop_imm(&image, bounds.x, bounds.y, bounds.width, bounds.height)
                    .to_image();
            (cropped, Some(bounds))
        },
        None => (image, None),
    }
}

/// Run the enabled stages over one image
///
/// `session` is required only when background removal is enabled.
///
/// # Errors
/// - Background removal enabled without a session
/// - Segmentation failures, or a mask whose size differs from the input
#[instrument(
    skip(image, stages, session),
    fields(
        dimensions = %format!("{}x{}", image.width(), image.height()),
        remove_background = stages.remove_background,
        crop = stages.crop_to_content,
        canvas = stages.compose_on_canvas
    )
)]
pub fn run(
    image: SourceImage,
    stages: &StageConfig,
    session: Option<&dyn SegmentationSession>,
) -> Result<StageOutcome> {
    let mut warnings = Vec::new();
    let mut current = image.into_pixels();

    if stages.remove_background {
        let _span = span!(Level::INFO, "background_removal").entered();
        debug!("{}", PipelineStage::BackgroundRemoval.description());
        let session = session.ok_or_else(|| {
            BgCanvasError::segmentation("Background removal enabled but no session was provided")
        })?;

        let masked = session.remove_background(&current)?;
        if masked.dimensions() != current.dimensions() {
            return Err(BgCanvasError::segmentation(format!(
                "Model {} returned {}x{} for a {}x{} input",
                session.model(),
                masked.width(),
                masked.height(),
                current.width(),
                current.height()
            )));
        }
        current = masked;
    }

    if stages.crop_to_content {
        let _span = span!(Level::DEBUG, "content_crop").entered();
        debug!("{}", PipelineStage::ContentCrop.description());
        let (cropped, bounds) = crop_to_content(current);
        match bounds {
            Some(bounds) => debug!(?bounds, "Cropped to content"),
            None => {
                warn!("No subject detected, leaving image uncropped");
                warnings.push(StageWarning::NoSubjectDetected);
            },
        }
        current = cropped;
    }

    if stages.compose_on_canvas {
        let _span = span!(
            Level::DEBUG,
            "canvas_composition",
            target_width = stages.canvas.target_width,
            target_height = stages.canvas.target_height,
            occupancy = stages.canvas.occupancy_percent
        )
        .entered();
        debug!("{}", PipelineStage::CanvasComposition.description());

        if current.width() == 0 || current.height() == 0 {
            warn!(
                width = current.width(),
                height = current.height(),
                "Skipping canvas composition for degenerate image"
            );
            warnings.push(StageWarning::DegenerateDimensions {
                width: current.width(),
                height: current.height(),
            });
        } else {
            current = compositor::compose(&current, &stages.canvas)?;
        }
    }

    Ok(StageOutcome {
        image: current,
        warnings,
    })
}
