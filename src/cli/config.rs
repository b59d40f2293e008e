//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::{BackgroundColor, ModelSelector, PipelineConfig};
use anyhow::{Context, Result};
use std::path::Path;

/// Convert CLI arguments to a [`PipelineConfig`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the pipeline configuration
    ///
    /// Starts from `--config` (or the defaults) and applies every flag that
    /// was given on top of it.
    pub(crate) fn from_cli(cli: &Cli) -> Result<PipelineConfig> {
        let mut config = match &cli.config {
            Some(path) => Self::load_config_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(model) = &cli.model {
            config.model = model
                .parse::<ModelSelector>()
                .context("Invalid --model")?;
        }

        let stages = &mut config.stages;
        if cli.no_remove_background {
            stages.remove_background = false;
        }
        if cli.no_crop {
            stages.crop_to_content = false;
        }
        if cli.no_canvas {
            stages.compose_on_canvas = false;
        }

        let canvas = &mut stages.canvas;
        if let Some(width) = cli.width {
            canvas.target_width = width;
        }
        if let Some(height) = cli.height {
            canvas.target_height = height;
        }
        if let Some(occupancy) = cli.occupancy {
            canvas.occupancy_percent = occupancy;
        }
        if let Some(color) = &cli.background {
            canvas.background_color = color
                .parse::<BackgroundColor>()
                .context("Invalid --background")?;
        }
        if cli.opaque {
            canvas.transparent_background = false;
        } else if cli.transparent {
            canvas.transparent_background = true;
        }

        config.validate().context("Invalid pipeline configuration")?;
        Ok(config)
    }

    /// Read a JSON configuration file
    fn load_config_file(path: &Path) -> Result<PipelineConfig> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        PipelineConfig::from_json(&json)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Validate CLI arguments that don't map onto the pipeline configuration
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(pattern) = &cli.pattern {
            glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid --pattern '{}'", pattern))?;
        }

        if cli.output.is_dir() {
            anyhow::bail!(
                "Output path is a directory, expected an archive file: {}",
                cli.output.display()
            );
        }

        if let Some(dir) = &cli.output_dir {
            if dir.is_file() {
                anyhow::bail!(
                    "Output directory exists and is a file: {}",
                    dir.display()
                );
            }
        }

        if cli.background.is_some() && cli.transparent {
            log::warn!("--background has no effect on a transparent canvas");
        }

        Ok(())
    }
}
