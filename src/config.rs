//! Configuration types for the canvas pipeline

use crate::error::{BgCanvasError, Result};
use crate::types::PipelineStage;
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Smallest accepted occupancy percentage
pub const MIN_OCCUPANCY_PERCENT: u8 = 50;

/// Largest accepted occupancy percentage
pub const MAX_OCCUPANCY_PERCENT: u8 = 100;

/// Upper bound for either canvas dimension
pub const MAX_CANVAS_DIMENSION: u32 = 16_384;

/// Segmentation model variant (quality/speed tradeoff)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelSelector {
    /// U²-Net general purpose model (best quality)
    #[serde(rename = "u2net")]
    U2Net,
    /// Lightweight U²-Net (fast)
    #[serde(rename = "u2netp")]
    U2NetP,
    /// U²-Net trained for human segmentation
    #[serde(rename = "u2net_human_seg")]
    U2NetHumanSeg,
    /// Size-reduced U²-Net variant
    #[serde(rename = "silueta")]
    Silueta,
}

impl ModelSelector {
    /// All known model variants
    pub const ALL: [ModelSelector; 4] = [
        ModelSelector::U2Net,
        ModelSelector::U2NetP,
        ModelSelector::U2NetHumanSeg,
        ModelSelector::Silueta,
    ];

    /// Identifier used on the command line and in config files
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::U2Net => "u2net",
            Self::U2NetP => "u2netp",
            Self::U2NetHumanSeg => "u2net_human_seg",
            Self::Silueta => "silueta",
        }
    }

    /// File name of the model weights inside the model cache
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.onnx", self.as_str())
    }

    /// Release URL the model weights are downloaded from
    #[must_use]
    pub fn download_url(&self) -> String {
        format!(
            "https://github.com/danielgatis/rembg/releases/download/v0.0.0/{}",
            self.file_name()
        )
    }

    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::U2Net => "standard model, better quality (~170 MB)",
            Self::U2NetP => "lightweight model, faster (~4 MB)",
            Self::U2NetHumanSeg => "tuned for people (~170 MB)",
            Self::Silueta => "compressed u2net (~43 MB)",
        }
    }
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::U2Net
    }
}

impl std::fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSelector {
    type Err = BgCanvasError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|model| model.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(ModelSelector::as_str).collect();
                BgCanvasError::invalid_config(format!(
                    "Unknown model '{}'. Known models: {}",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// Opaque RGB canvas fill color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackgroundColor(pub [u8; 3]);

impl BackgroundColor {
    /// Pure white, the default fill
    pub const WHITE: BackgroundColor = BackgroundColor([255, 255, 255]);

    /// Create a color from its components
    #[must_use]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Fully opaque RGBA pixel for this color
    #[must_use]
    pub fn to_rgba(self) -> Rgba<u8> {
        let [r, g, b] = self.0;
        Rgba([r, g, b, 255])
    }
}

impl Default for BackgroundColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl std::fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

impl FromStr for BackgroundColor {
    type Err = BgCanvasError;

    /// Parse `#rrggbb`, `rrggbb`, `#rgb` or `rgb`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            BgCanvasError::invalid_config(format!(
                "Invalid background color '{}'. Expected #rrggbb or #rgb",
                s
            ))
        };

        let hex = s.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(invalid()),
        };

        let channel = |range: std::ops::Range<usize>| {
            expanded
                .get(range)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(invalid)
        };

        Ok(Self([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
    }
}

impl TryFrom<String> for BackgroundColor {
    type Error = BgCanvasError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BackgroundColor> for String {
    fn from(color: BackgroundColor) -> Self {
        color.to_string()
    }
}

/// Canvas composition settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Output canvas width in pixels
    pub target_width: u32,

    /// Output canvas height in pixels
    pub target_height: u32,

    /// Share of each canvas dimension the subject may fill (50-100)
    pub occupancy_percent: u8,

    /// Fill the canvas with transparent pixels instead of `background_color`
    pub transparent_background: bool,

    /// Canvas fill, only used when `transparent_background` is false
    pub background_color: BackgroundColor,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            target_width: 1080,
            target_height: 1080,
            occupancy_percent: 90,
            transparent_background: true,
            background_color: BackgroundColor::WHITE,
        }
    }
}

impl CanvasConfig {
    /// Pixel the canvas base layer is filled with
    #[must_use]
    pub fn fill_pixel(&self) -> Rgba<u8> {
        if self.transparent_background {
            Rgba([0, 0, 0, 0])
        } else {
            self.background_color.to_rgba()
        }
    }

    /// Validate canvas parameters
    ///
    /// # Errors
    /// - Zero or oversized target dimensions
    /// - Occupancy percent outside 50-100
    pub fn validate(&self) -> Result<()> {
        let dimension_range = format!("1-{}", MAX_CANVAS_DIMENSION);
        if self.target_width == 0 || self.target_width > MAX_CANVAS_DIMENSION {
            return Err(BgCanvasError::config_value_error(
                "target width",
                self.target_width,
                &dimension_range,
                Some(1080),
            ));
        }

        if self.target_height == 0 || self.target_height > MAX_CANVAS_DIMENSION {
            return Err(BgCanvasError::config_value_error(
                "target height",
                self.target_height,
                &dimension_range,
                Some(1080),
            ));
        }

        if !(MIN_OCCUPANCY_PERCENT..=MAX_OCCUPANCY_PERCENT).contains(&self.occupancy_percent) {
            return Err(BgCanvasError::config_value_error(
                "occupancy percent",
                self.occupancy_percent,
                "50-100",
                Some(90),
            ));
        }

        Ok(())
    }
}

/// Which pipeline stages run, plus the canvas sub-config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Run the segmentation collaborator
    pub remove_background: bool,

    /// Crop to the bounding box of non-transparent pixels
    pub crop_to_content: bool,

    /// Scale and center the subject on a fixed-size canvas
    pub compose_on_canvas: bool,

    /// Settings for the canvas stage
    pub canvas: CanvasConfig,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            remove_background: true,
            crop_to_content: true,
            compose_on_canvas: true,
            canvas: CanvasConfig::default(),
        }
    }
}

impl StageConfig {
    /// Stage config with every stage disabled (pure re-encode)
    #[must_use]
    pub fn passthrough() -> Self {
        Self {
            remove_background: false,
            crop_to_content: false,
            compose_on_canvas: false,
            canvas: CanvasConfig::default(),
        }
    }

    /// Enabled stages in execution order
    #[must_use]
    pub fn enabled_stages(&self) -> Vec<PipelineStage> {
        [
            (self.remove_background, PipelineStage::BackgroundRemoval),
            (self.crop_to_content, PipelineStage::ContentCrop),
            (self.compose_on_canvas, PipelineStage::CanvasComposition),
        ]
        .into_iter()
        .filter_map(|(enabled, stage)| enabled.then_some(stage))
        .collect()
    }
}

/// Complete configuration of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Segmentation model used by the background removal stage
    pub model: ModelSelector,

    /// Stage toggles and canvas settings
    pub stages: StageConfig,
}

impl PipelineConfig {
    /// Create a new configuration builder for fluent API construction
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imgly_bgcanvas::{ModelSelector, PipelineConfig};
    ///
    /// let config = PipelineConfig::builder()
    ///     .model(ModelSelector::U2NetP)
    ///     .target_size(800, 600)
    ///     .occupancy_percent(80)
    ///     .background_color("#336699".parse().unwrap())
    ///     .transparent_background(false)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(config.stages.canvas.target_width, 800);
    /// ```
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// Canvas parameters are only checked when the canvas stage is enabled.
    ///
    /// # Errors
    /// - Invalid canvas dimensions or occupancy (see [`CanvasConfig::validate`])
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imgly_bgcanvas::PipelineConfig;
    ///
    /// let mut config = PipelineConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.stages.canvas.occupancy_percent = 30; // Invalid
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.stages.compose_on_canvas {
            self.stages.canvas.validate()?;
        }
        Ok(())
    }

    /// Load a configuration from a JSON document
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Errors
    /// - Malformed JSON or unknown enum values
    /// - Values that fail [`PipelineConfig::validate`]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            BgCanvasError::invalid_config(format!("Failed to parse configuration: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the segmentation model
    #[must_use]
    pub fn model(mut self, model: ModelSelector) -> Self {
        self.config.model = model;
        self
    }

    /// Enable or disable background removal
    #[must_use]
    pub fn remove_background(mut self, enabled: bool) -> Self {
        self.config.stages.remove_background = enabled;
        self
    }

    /// Enable or disable cropping to content
    #[must_use]
    pub fn crop_to_content(mut self, enabled: bool) -> Self {
        self.config.stages.crop_to_content = enabled;
        self
    }

    /// Enable or disable canvas composition
    #[must_use]
    pub fn compose_on_canvas(mut self, enabled: bool) -> Self {
        self.config.stages.compose_on_canvas = enabled;
        self
    }

    /// Set the canvas size
    #[must_use]
    pub fn target_size(mut self, width: u32, height: u32) -> Self {
        self.config.stages.canvas.target_width = width;
        self.config.stages.canvas.target_height = height;
        self
    }

    /// Set occupancy percent (clamped to 50-100)
    #[must_use]
    pub fn occupancy_percent(mut self, percent: u8) -> Self {
        self.config.stages.canvas.occupancy_percent =
            percent.clamp(MIN_OCCUPANCY_PERCENT, MAX_OCCUPANCY_PERCENT);
        self
    }

    /// Use a transparent canvas
    #[must_use]
    pub fn transparent_background(mut self, transparent: bool) -> Self {
        self.config.stages.canvas.transparent_background = transparent;
        self
    }

    /// Set the opaque canvas fill color
    #[must_use]
    pub fn background_color(mut self, color: BackgroundColor) -> Self {
        self.config.stages.canvas.background_color = color;
        self
    }

    /// Replace the whole stage configuration
    #[must_use]
    pub fn stages(mut self, stages: StageConfig) -> Self {
        self.config.stages = stages;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Zero or oversized canvas dimensions
    ///
    /// # Examples
    /// ```rust
    /// use imgly_bgcanvas::PipelineConfig;
    ///
    /// // Occupancy values are clamped into 50-100
    /// let config = PipelineConfig::builder().occupancy_percent(20).build().unwrap();
    /// assert_eq!(config.stages.canvas.occupancy_percent, 50);
    ///
    /// assert!(PipelineConfig::builder().target_size(0, 100).build().is_err());
    /// ```
    pub fn build(self) -> Result<PipelineConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}
