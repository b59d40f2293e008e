//! Model download functionality
//!
//! Fetches segmentation weights into the [`ModelCache`]. Downloads stream into
//! a `.part` file which is renamed into place only after it completed, so an
//! interrupted download never looks like a cached model.

use crate::cache::ModelCache;
use crate::config::ModelSelector;
use crate::error::{BgCanvasError, Result};
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

/// Host all model weights are fetched from
const MODEL_RELEASE_PREFIX: &str = "https://github.com/danielgatis/rembg/releases/download/";

/// Model downloader with progress reporting
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

// Arguments are only consumed by the indicatif variant
#[cfg_attr(not(feature = "cli"), allow(unused_variables))]
impl ProgressIndicator {
    /// Set message for progress indicator
    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {},
        }
    }

    /// Set length for progress indicator
    pub fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {},
        }
    }

    /// Set position for progress indicator
    pub fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {},
        }
    }

    /// Finish progress indicator with message
    pub fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {},
        }
    }
}

impl ModelDownloader {
    /// Create a new model downloader using the default cache
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - Failed to initialize model cache
    pub fn new() -> Result<Self> {
        Self::with_cache(ModelCache::new()?)
    }

    /// Create a downloader writing into `cache`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn with_cache(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // 5 minute timeout
            .build()
            .map_err(|e| BgCanvasError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, cache })
    }

    /// Make sure the weights for `model` are cached, downloading them if needed
    ///
    /// # Returns
    /// Path of the cached weights
    ///
    /// # Errors
    /// - Network errors during download
    /// - File system errors during caching
    pub async fn download_model(&self, model: ModelSelector, show_progress: bool) -> Result<PathBuf> {
        self.cache.cleanup_partial_downloads()?;

        let final_path = self.cache.get_model_path(model);
        if self.cache.is_model_cached(model) {
            log::debug!("Model {} already cached at {}", model, final_path.display());
            return Ok(final_path);
        }

        let url = model.download_url();
        validate_model_url(&url)?;
        log::info!("Downloading model {} from {}", model, url);

        let partial_path = self.cache.get_partial_path(model);
        let progress = if show_progress {
            Self::create_progress_indicator()
        } else {
            ProgressIndicator::NoOp
        };
        progress.set_message(format!("Downloading {}", model));

        if let Err(e) = self.download_file(&url, &partial_path, &progress).await {
            // Leave no partial file behind
            let _ = tokio::fs::remove_file(&partial_path).await;
            return Err(e);
        }

        tokio::fs::rename(&partial_path, &final_path)
            .await
            .map_err(|e| BgCanvasError::file_io_error("move downloaded model", &final_path, &e))?;

        progress.finish_with_message(format!("Downloaded {}", model));
        log::info!("Model {} cached at {}", model, final_path.display());
        Ok(final_path)
    }

    /// Create a progress indicator for download reporting
    fn create_progress_indicator() -> ProgressIndicator {
        #[cfg(feature = "cli")]
        {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            ProgressIndicator::Indicatif(pb)
        }
        #[cfg(not(feature = "cli"))]
        {
            ProgressIndicator::NoOp
        }
    }

    async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        progress: &ProgressIndicator,
    ) -> Result<()> {
        log::debug!("Downloading: {} -> {}", url, local_path.display());

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BgCanvasError::file_io_error("create directory", parent, &e))?;
        }

        let response =
            self.client.get(url).send().await.map_err(|e| {
                BgCanvasError::network_error(format!("Failed to download {}", url), e)
            })?;

        if !response.status().is_success() {
            return Err(BgCanvasError::network_error(
                format!("HTTP error for {}", url),
                response.status(),
            ));
        }

        if let Some(total) = response.content_length() {
            progress.set_length(total);
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| BgCanvasError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut downloaded = 0u64;
        let mut buffer = vec![0; 64 * 1024];

        loop {
            let bytes_read = stream
                .read(&mut buffer)
                .await
                .map_err(|e| BgCanvasError::network_error("Failed to read download stream", e))?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| BgCanvasError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;
            progress.set_position(downloaded);
        }

        file.flush()
            .await
            .map_err(|e| BgCanvasError::file_io_error("flush file", local_path, &e))?;

        if downloaded == 0 {
            return Err(BgCanvasError::network_error(
                format!("Empty response for {}", url),
                "no bytes received",
            ));
        }

        log::debug!(
            "Downloaded {} bytes to {}",
            downloaded,
            local_path.display()
        );
        Ok(())
    }

    /// Get reference to the model cache
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }
}

/// Validate that a URL points at the model release host
///
/// # Errors
/// - Empty URL, wrong host, or a URL that does not name an `.onnx` file
pub fn validate_model_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(BgCanvasError::invalid_config("Model URL cannot be empty"));
    }

    let Some(path) = url.strip_prefix(MODEL_RELEASE_PREFIX) else {
        return Err(BgCanvasError::invalid_config(format!(
            "Unsupported URL: {}. Models are downloaded from {}",
            url, MODEL_RELEASE_PREFIX
        )));
    };

    if !path.ends_with(".onnx") || !path.contains('/') {
        return Err(BgCanvasError::invalid_config(format!(
            "Invalid model URL: {}. Expected {}<tag>/<model>.onnx",
            url, MODEL_RELEASE_PREFIX
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_model_url() {
        for model in ModelSelector::ALL {
            assert!(validate_model_url(&model.download_url()).is_ok(), "{model}");
        }

        assert!(validate_model_url("").is_err());
        assert!(validate_model_url("https://example.com/u2net.onnx").is_err());
        assert!(validate_model_url(
            "https://github.com/danielgatis/rembg/releases/download/u2net.onnx"
        )
        .is_err());
        assert!(validate_model_url(
            "https://github.com/danielgatis/rembg/releases/download/v0.0.0/readme.md"
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_cached_model_skips_download() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp_dir.path()).unwrap();
        let path = cache.get_model_path(ModelSelector::U2NetP);
        std::fs::write(&path, b"weights").unwrap();

        let downloader = ModelDownloader::with_cache(cache).unwrap();
        let resolved = downloader
            .download_model(ModelSelector::U2NetP, false)
            .await
            .unwrap();
        assert_eq!(resolved, path);
    }

    #[tokio::test]
    async fn test_interrupted_downloads_are_cleaned_up() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp_dir.path()).unwrap();
        std::fs::write(cache.get_model_path(ModelSelector::U2NetP), b"weights").unwrap();
        let stale = cache.get_partial_path(ModelSelector::Silueta);
        std::fs::write(&stale, b"half").unwrap();

        let downloader = ModelDownloader::with_cache(cache).unwrap();
        downloader
            .download_model(ModelSelector::U2NetP, false)
            .await
            .unwrap();

        assert!(!stale.exists());
        assert!(downloader.cache().is_model_cached(ModelSelector::U2NetP));
    }

    #[test]
    fn test_progress_indicator_no_op() {
        let indicator = ProgressIndicator::NoOp;
        indicator.set_message("test".to_string());
        indicator.set_length(100);
        indicator.set_position(50);
        indicator.finish_with_message("done".to_string());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_progress_indicator_with_indicatif() {
        let indicator = ProgressIndicator::Indicatif(ProgressBar::hidden());
        indicator.set_length(10);
        indicator.set_position(5);
        indicator.finish_with_message("done".to_string());
    }

    #[test]
    fn test_downloader_cache_access() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp_dir.path()).unwrap();
        let expected = cache.get_current_cache_dir().clone();

        let downloader = ModelDownloader::with_cache(cache).unwrap();
        assert_eq!(downloader.cache().get_current_cache_dir(), &expected);
    }
}
