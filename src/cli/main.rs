//! Batch canvas CLI tool
//!
//! Command-line interface that removes backgrounds, crops to the subject and
//! centers every input on a fixed-size canvas, then packages the results.

use super::config::CliConfigBuilder;
use super::progress::IndicatifProgressReporter;
use crate::{
    batch::BatchProcessor,
    cache::{format_size, ModelCache, CACHE_DIR_ENV},
    config::{ModelSelector, PipelineConfig},
    download::ModelDownloader,
    services::{ConsoleProgressReporter, ImageIOService, OutputFormatHandler, ProgressReporter},
    tracing_config::{init_cli_tracing, spans},
    types::{BatchInput, BatchResult, PipelineStage},
};
use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Default archive written when `--output` is not given
pub const DEFAULT_ARCHIVE_NAME: &str = "processed_images.zip";

/// Batch background removal and canvas composition tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "imgly-bgcanvas")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image files or directories
    ///
    /// Inputs are processed in argument order; files found inside a directory
    /// are sorted by path.
    #[arg(value_name = "INPUT", required_unless_present_any = &["only_download", "list_models", "clear_cache", "show_cache_dir"])]
    pub input: Vec<String>,

    /// Zip archive receiving every processed image
    #[arg(short, long, value_name = "OUTPUT", default_value = DEFAULT_ARCHIVE_NAME)]
    pub output: PathBuf,

    /// Also write individual PNGs into this directory
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Write a JSON batch report to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// JSON configuration file; command line flags take precedence
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Segmentation model (u2net, u2netp, u2net_human_seg, silueta) [default: u2net]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Canvas width in pixels [default: 1080]
    #[arg(long)]
    pub width: Option<u32>,

    /// Canvas height in pixels [default: 1080]
    #[arg(long)]
    pub height: Option<u32>,

    /// Share of the binding canvas dimension filled by the subject (50-100) [default: 90]
    #[arg(long, value_parser = clap::value_parser!(u8).range(50..=100))]
    pub occupancy: Option<u8>,

    /// Canvas fill color as #rrggbb, used with --opaque [default: #ffffff]
    #[arg(long, value_name = "COLOR")]
    pub background: Option<String>,

    /// Fill the canvas with the background color
    #[arg(long, conflicts_with = "transparent")]
    pub opaque: bool,

    /// Keep the canvas fully transparent
    #[arg(long)]
    pub transparent: bool,

    /// Skip the background removal stage
    #[arg(long)]
    pub no_remove_background: bool,

    /// Skip cropping to the subject
    #[arg(long)]
    pub no_crop: bool,

    /// Skip canvas composition
    #[arg(long)]
    pub no_canvas: bool,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Explicit tracing filter, overrides -v
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// File name pattern for directory inputs (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Show a progress bar instead of per-image log lines
    #[arg(long)]
    pub progress: bool,

    /// Download the selected model but don't process any images
    #[arg(long)]
    pub only_download: bool,

    /// List cached models and exit
    #[arg(long)]
    pub list_models: bool,

    /// Clear cached models (combine with --model to clear a specific model)
    #[arg(long)]
    pub clear_cache: bool,

    /// Show current cache directory
    #[arg(long)]
    pub show_cache_dir: bool,

    /// Use custom cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,
}

/// Main CLI entry point
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = cli
        .log_filter
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok());
    init_cli_tracing(cli.verbose, filter)
        .context("Failed to initialize tracing")?;

    // Handle special flags that don't require inputs
    if cli.list_models {
        return list_cached_models(&cli);
    }

    if cli.only_download {
        return download_model_only(&cli).await;
    }

    if cli.clear_cache {
        return clear_cache_models(&cli);
    }

    if cli.show_cache_dir {
        return show_current_cache_dir(&cli);
    }

    if cli.input.is_empty() {
        anyhow::bail!("At least one input is required");
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    info!("Starting batch canvas run");
    info!("Input(s): {}", cli.input.join(", "));
    let stages: Vec<&str> = config
        .stages
        .enabled_stages()
        .iter()
        .map(PipelineStage::description)
        .collect();
    info!("Model: {}, stages: {}", config.model, stages.join(" -> "));

    let files = collect_input_files(&cli)?;
    if files.is_empty() {
        anyhow::bail!("No supported images found in the given inputs");
    }
    let inputs = load_inputs(&files);

    let cancellation = CancellationToken::new();
    spawn_interrupt_handler(cancellation.clone());

    let reporter: Arc<dyn ProgressReporter> = if cli.progress {
        Arc::new(IndicatifProgressReporter::new(inputs.len()))
    } else {
        Arc::new(ConsoleProgressReporter::new(cli.verbose > 0))
    };

    let processor = build_processor(&cli, config, reporter, cancellation).await?;
    let result = Arc::new(processor)
        .process_batch_async(inputs)
        .await
        .context("Batch processing failed")?;

    write_results(&cli, &result)?;

    if result.cancelled {
        warn!(
            "Interrupted: archived {} of {} image(s)",
            result.success_count(),
            result.total_inputs
        );
    }
    if result.failure_count() > 0 {
        warn!(
            "Some images failed to process. Succeeded: {}, Failed: {}",
            result.success_count(),
            result.failure_count()
        );
    }

    Ok(())
}

/// Resolve the model cache, honoring `--cache-dir`
fn model_cache(cli: &Cli) -> Result<ModelCache> {
    match &cli.cache_dir {
        Some(dir) => ModelCache::with_custom_cache_dir(dir)
            .context("Failed to create cache with custom directory"),
        None => ModelCache::new().context("Failed to initialize model cache"),
    }
}

/// Model named by `--model`, or the default
fn selected_model(cli: &Cli) -> Result<ModelSelector> {
    match cli.model.as_deref() {
        Some(name) => name.parse::<ModelSelector>().context("Invalid --model"),
        None => Ok(ModelSelector::default()),
    }
}

/// Download weights when needed and assemble the batch processor
async fn build_processor(
    cli: &Cli,
    config: PipelineConfig,
    reporter: Arc<dyn ProgressReporter>,
    cancellation: CancellationToken,
) -> Result<BatchProcessor> {
    let builder = BatchProcessor::builder(config.clone())
        .progress_reporter(reporter)
        .cancellation(cancellation);

    if !config.stages.remove_background {
        return builder.build().context("Failed to create batch processor");
    }

    let cache = model_cache(cli)?;
    let span = spans::model_loading(config.model.as_str());
    ModelDownloader::with_cache(cache.clone())
        .context("Failed to create model downloader")?
        .download_model(config.model, true)
        .instrument(span.clone())
        .await
        .context("Failed to ensure model is available")?;

    let _entered = span.entered();
    attach_session(builder, &cache)?
        .build()
        .context("Failed to create batch processor")
}

#[cfg(feature = "tract")]
fn attach_session(
    builder: crate::batch::BatchProcessorBuilder,
    cache: &ModelCache,
) -> Result<crate::batch::BatchProcessorBuilder> {
    use crate::backends::TractSessionFactory;
    use crate::segmentation::SessionCache;

    let factory = TractSessionFactory::new(cache.clone());
    builder
        .session_from_cache(&SessionCache::new(), &factory)
        .context("Failed to load segmentation model")
}

#[cfg(not(feature = "tract"))]
fn attach_session(
    _builder: crate::batch::BatchProcessorBuilder,
    _cache: &ModelCache,
) -> Result<crate::batch::BatchProcessorBuilder> {
    anyhow::bail!(
        "Background removal needs the tract feature. Rebuild with --features tract or pass --no-remove-background"
    )
}

/// Cancel the batch on Ctrl-C; the current image still finishes
fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the current image");
            token.cancel();
        }
    });
}

/// Write the archive, loose PNGs and JSON report
fn write_results(cli: &Cli, result: &BatchResult) -> Result<()> {
    let _span = spans::output_writing(&cli.output).entered();

    ImageIOService::write_archive(&cli.output, result)
        .with_context(|| format!("Failed to write archive {}", cli.output.display()))?;

    if let Some(dir) = &cli.output_dir {
        let written = ImageIOService::write_outputs(dir, result)
            .with_context(|| format!("Failed to write images to {}", dir.display()))?;
        info!("Wrote {} image(s) to {}", written.len(), dir.display());
    }

    if let Some(report_path) = &cli.report {
        let report = serde_json::to_string_pretty(&result.summary())
            .context("Failed to serialize batch report")?;
        ImageIOService::write_bytes(report_path, report.as_bytes())
            .with_context(|| format!("Failed to write report {}", report_path.display()))?;
        info!("Wrote batch report to {}", report_path.display());
    }

    Ok(())
}

/// Expand the CLI inputs into a sorted list of image files
fn collect_input_files(cli: &Cli) -> Result<Vec<PathBuf>> {
    let _span = spans::input_discovery(cli.input.len()).entered();
    let mut files = Vec::new();

    for input in &cli.input {
        let path = PathBuf::from(input);
        if path.is_dir() {
            let mut found = find_image_files(&path, cli.recursive, cli.pattern.as_deref())?;
            files.append(&mut found);
        } else if path.is_file() {
            if OutputFormatHandler::is_supported_input(&path) {
                files.push(path);
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else {
            anyhow::bail!("Input not found: {}", path.display());
        }
    }

    Ok(files)
}

/// Read every file into memory; unreadable files are logged and skipped
fn load_inputs(files: &[PathBuf]) -> Vec<BatchInput> {
    files
        .iter()
        .filter_map(|path| match ImageIOService::load_input(path) {
            Ok(input) => Some(input),
            Err(e) => {
                error!("Skipping {}: {}", path.display(), e);
                None
            },
        })
        .collect()
}

/// List the models present in the cache
fn list_cached_models(cli: &Cli) -> Result<()> {
    let cache = model_cache(cli)?;
    let models = cache
        .scan_cached_models()
        .context("Failed to list cached models")?;

    println!("Cached Models");
    println!("-------------");

    if models.is_empty() {
        println!("No cached models found.");
    }

    for info in &models {
        println!("{} ({})", info.model, info.model.description());
        println!("  Cache location: {}", info.path.display());
        println!("  Size: {}", format_size(info.size_bytes));
    }

    let missing: Vec<&str> = ModelSelector::ALL
        .iter()
        .filter(|model| !cache.is_model_cached(**model))
        .map(ModelSelector::as_str)
        .collect();
    if !missing.is_empty() {
        println!("\nAvailable for download: {}", missing.join(", "));
        println!("  imgly-bgcanvas --only-download --model MODEL");
    }

    Ok(())
}

/// Download a model without processing images
async fn download_model_only(cli: &Cli) -> Result<()> {
    let model = selected_model(cli)?;
    let cache = model_cache(cli)?;

    println!("Downloading model: {}", model);
    let downloader =
        ModelDownloader::with_cache(cache).context("Failed to create model downloader")?;
    let path = downloader
        .download_model(model, true)
        .await
        .with_context(|| format!("Failed to download model {}", model))?;

    println!("Model {} ready", model);
    println!("   Cache location: {}", path.display());
    Ok(())
}

/// Clear cached models
fn clear_cache_models(cli: &Cli) -> Result<()> {
    let cache = model_cache(cli)?;

    if cli.model.is_some() {
        let model = selected_model(cli)?;
        println!("Clearing cached model: {}", model);

        if cache
            .clear_specific_model(model)
            .with_context(|| format!("Failed to clear model '{}'", model))?
        {
            println!("Removed model: {}", model);
        } else {
            println!("Model '{}' not found in cache", model);
            println!("   Use --list-models to see cached models");
        }
    } else {
        println!("Clearing entire model cache...");
        let removed = cache.clear_all_models().context("Failed to clear cache")?;
        if removed.is_empty() {
            println!("Cache was already empty");
        } else {
            println!("Removed {} file(s):", removed.len());
            for name in &removed {
                println!("   {}", name);
            }
        }
    }

    println!(
        "   Cache location: {}",
        cache.get_current_cache_dir().display()
    );
    Ok(())
}

/// Show the current cache directory
fn show_current_cache_dir(cli: &Cli) -> Result<()> {
    let cache = model_cache(cli)?;
    println!("Current cache directory:");
    println!("   Path: {}", cache.get_current_cache_dir().display());

    let source = if cli.cache_dir.is_some() {
        "--cache-dir flag".to_string()
    } else if std::env::var_os(CACHE_DIR_ENV).is_some() {
        format!("{} environment variable", CACHE_DIR_ENV)
    } else {
        "XDG cache directory specification".to_string()
    };
    println!("   Source: {}", source);
    Ok(())
}

/// Find all supported images in a directory, sorted by path
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let candidates: Vec<PathBuf> = if recursive {
        walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() => Some(entry.into_path()),
                Ok(_) => None,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                },
            })
            .collect()
    } else {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory {}", dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
        paths
    };

    for path in candidates {
        if !matches_pattern(&path, pattern) {
            continue;
        }
        if OutputFormatHandler::is_supported_input(&path) {
            files.push(path);
        } else {
            warn!("Skipping unsupported file: {}", path.display());
        }
    }

    files.sort();
    Ok(files)
}

/// Check if file name matches the given glob pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}
