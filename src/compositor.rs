//! Canvas compositor
//!
//! Scales a subject uniformly so it fills at most `occupancy_percent` of both
//! canvas dimensions, then alpha-blends it centered onto a fixed-size canvas.

use crate::config::CanvasConfig;
use crate::error::{BgCanvasError, Result};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::debug;

/// Geometry of a subject placed on a canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasPlacement {
    /// Uniform scale factor applied to the subject
    pub ratio: f64,
    /// Scaled subject width
    pub width: u32,
    /// Scaled subject height
    pub height: u32,
    /// Left edge of the subject on the canvas
    pub offset_x: u32,
    /// Top edge of the subject on the canvas
    pub offset_y: u32,
}

/// Compute scale, scaled size and centering offset for a subject
///
/// The scaled size is `floor(src * ratio)` with
/// `ratio = min(W·p/100 / w, H·p/100 / h)`, evaluated in integer arithmetic
/// so the binding dimension lands exactly on `floor(T·p/100)`.
///
/// Unlike a plain `floor`, a dimension that would truncate to zero is clamped
/// to one pixel, so extreme aspect ratios still leave a visible sliver.
///
/// # Errors
/// - `DegenerateDimensions` when the source has zero width or height
///
/// # Examples
/// ```rust
/// use imgly_bgcanvas::{compositor::compute_placement, CanvasConfig};
///
/// let canvas = CanvasConfig::default(); // 1080x1080 at 90%
/// let placement = compute_placement(400, 600, &canvas).unwrap();
/// assert_eq!((placement.width, placement.height), (648, 972));
/// assert_eq!((placement.offset_x, placement.offset_y), (216, 54));
/// ```
pub fn compute_placement(
    src_width: u32,
    src_height: u32,
    canvas: &CanvasConfig,
) -> Result<CanvasPlacement> {
    if src_width == 0 || src_height == 0 {
        return Err(BgCanvasError::DegenerateDimensions {
            width: src_width,
            height: src_height,
        });
    }

    let percent = u128::from(canvas.occupancy_percent);
    let (target_w, target_h) = (
        u128::from(canvas.target_width),
        u128::from(canvas.target_height),
    );
    let (src_w, src_h) = (u128::from(src_width), u128::from(src_height));

    // Width binds when target_w / src_w <= target_h / src_h
    let (scaled_w, scaled_h) = if target_w * src_h <= target_h * src_w {
        (
            target_w * percent / 100,
            src_h * target_w * percent / (100 * src_w),
        )
    } else {
        (
            src_w * target_h * percent / (100 * src_h),
            target_h * percent / 100,
        )
    };

    let width = clamp_dimension(scaled_w, canvas.target_width);
    let height = clamp_dimension(scaled_h, canvas.target_height);

    let occupancy = f64::from(canvas.occupancy_percent) / 100.0;
    let ratio = (f64::from(canvas.target_width) * occupancy / f64::from(src_width))
        .min(f64::from(canvas.target_height) * occupancy / f64::from(src_height));

    Ok(CanvasPlacement {
        ratio,
        width,
        height,
        offset_x: canvas.target_width.saturating_sub(width) / 2,
        offset_y: canvas.target_height.saturating_sub(height) / 2,
    })
}

fn clamp_dimension(value: u128, limit: u32) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX).clamp(1, limit.max(1))
}

/// Compose an RGBA subject centered on a canvas of exactly the target size
///
/// The subject is resized with Lanczos3 and blended using its own alpha as
/// the mask. The output is always `target_width x target_height`.
///
/// # Errors
/// - `DegenerateDimensions` when the subject has zero width or height
pub fn compose(image: &RgbaImage, canvas: &CanvasConfig) -> Result<RgbaImage> {
    let placement = compute_placement(image.width(), image.height(), canvas)?;

    debug!(
        src_width = image.width(),
        src_height = image.height(),
        ratio = placement.ratio,
        width = placement.width,
        height = placement.height,
        offset_x = placement.offset_x,
        offset_y = placement.offset_y,
        "Placing subject on canvas"
    );

    let subject = resize_premultiplied(image, placement.width, placement.height);
    let mut composite = RgbaImage::from_pixel(
        canvas.target_width,
        canvas.target_height,
        canvas.fill_pixel(),
    );

    for (x, y, pixel) in subject.enumerate_pixels() {
        if let Some(target) =
            composite.get_pixel_mut_checked(x + placement.offset_x, y + placement.offset_y)
        {
            blend_over(target, *pixel);
        }
    }

    Ok(composite)
}

/// Lanczos3 resize in premultiplied alpha space
///
/// Transparent pixels carry no color into their neighbours this way.
fn resize_premultiplied(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }

    if image.pixels().all(|pixel| pixel.0[3] == u8::MAX) {
        return imageops::resize(image, width, height, FilterType::Lanczos3);
    }

    let mut premultiplied = image.clone();
    for pixel in premultiplied.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let scale = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
        pixel.0 = [scale(r), scale(g), scale(b), a];
    }

    let mut resized = imageops::resize(&premultiplied, width, height, FilterType::Lanczos3);
    for pixel in resized.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            pixel.0 = [0, 0, 0, 0];
            continue;
        }
        let unscale =
            |c: u8| ((u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8;
        pixel.0 = [unscale(r), unscale(g), unscale(b), a];
    }

    resized
}

/// Porter-Duff "source over" for straight-alpha RGBA8
///
/// Fully opaque sources and fully transparent destinations copy the source
/// pixel exactly.
fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let [sr, sg, sb, sa] = src.0;
    if sa == 0 {
        return;
    }

    let [dr, dg, db, da] = dst.0;
    if sa == u8::MAX || da == 0 {
        *dst = src;
        return;
    }

    let src_alpha = f32::from(sa) / 255.0;
    let dst_alpha = f32::from(da) / 255.0 * (1.0 - src_alpha);
    let out_alpha = src_alpha + dst_alpha;

    let channel = |s: u8, d: u8| {
        ((f32::from(s) * src_alpha + f32::from(d) * dst_alpha) / out_alpha)
            .round()
            .clamp(0.0, 255.0) as u8
    };

    *dst = Rgba([
        channel(sr, dr),
        channel(sg, dg),
        channel(sb, db),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ]);
}
