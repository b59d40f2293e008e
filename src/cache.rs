//! Model cache management for downloaded models
//!
//! Segmentation weights live as flat `<model>.onnx` files in an XDG-compliant
//! cache directory. This module resolves that directory, lists what is cached
//! for `--list-models`, and removes entries for `--clear-cache`.

use crate::config::ModelSelector;
use crate::error::{BgCanvasError, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "IMGLY_BGCANVAS_CACHE_DIR";

/// Suffix of in-progress downloads
pub const PARTIAL_SUFFIX: &str = "part";

/// Information about a cached model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedModelInfo {
    /// Model variant
    pub model: ModelSelector,
    /// Path to the cached weights
    pub path: PathBuf,
    /// Size of the weights in bytes
    pub size_bytes: u64,
}

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a new model cache manager
    ///
    /// Uses XDG Base Directory specification for cache location:
    /// - Linux/macOS: `~/.cache/imgly-bgcanvas/models/`
    /// - Windows: `%LOCALAPPDATA%/imgly-bgcanvas/models/`
    ///
    /// # Errors
    /// - Failed to determine cache directory
    /// - Failed to create cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = resolve_cache_dir(std::env::var_os(CACHE_DIR_ENV))?;
        Self::ensure_dir(&cache_dir, "create cache directory")?;
        Ok(Self { cache_dir })
    }

    /// Create a new model cache rooted at a custom directory
    ///
    /// # Errors
    /// - Failed to create cache directory
    pub fn with_custom_cache_dir(cache_dir: &Path) -> Result<Self> {
        let models_dir = cache_dir.join("models");
        Self::ensure_dir(&models_dir, "create custom cache directory")?;
        Ok(Self {
            cache_dir: models_dir,
        })
    }

    fn ensure_dir(dir: &Path, operation: &str) -> Result<()> {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| BgCanvasError::file_io_error(operation, dir, &e))?;
        }
        Ok(())
    }

    /// Get the current cache directory path
    #[must_use]
    pub fn get_current_cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    /// Path where the weights for `model` are stored (may not exist)
    #[must_use]
    pub fn get_model_path(&self, model: ModelSelector) -> PathBuf {
        self.cache_dir.join(model.file_name())
    }

    /// Path used while `model` is downloading
    #[must_use]
    pub fn get_partial_path(&self, model: ModelSelector) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", model.file_name(), PARTIAL_SUFFIX))
    }

    /// Check if non-empty weights for `model` are cached
    #[must_use]
    pub fn is_model_cached(&self, model: ModelSelector) -> bool {
        fs::metadata(self.get_model_path(model)).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
    }

    /// List every known model that is present in the cache
    ///
    /// # Errors
    /// - Failed to read file metadata
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let mut models = Vec::new();
        for model in ModelSelector::ALL {
            if !self.is_model_cached(model) {
                continue;
            }
            let path = self.get_model_path(model);
            let size_bytes = fs::metadata(&path)
                .map_err(|e| BgCanvasError::file_io_error("read model metadata", &path, &e))?
                .len();
            models.push(CachedModelInfo {
                model,
                path,
                size_bytes,
            });
        }
        Ok(models)
    }

    /// Remove leftover `.part` files from interrupted downloads
    ///
    /// # Errors
    /// - Failed to read the cache directory or remove a file
    pub fn cleanup_partial_downloads(&self) -> Result<Vec<PathBuf>> {
        self.remove_matching(|path| {
            path.extension()
                .is_some_and(|ext| ext == PARTIAL_SUFFIX)
        })
    }

    /// Clear all cached models
    ///
    /// # Returns
    /// Names of removed files for user feedback
    ///
    /// # Errors
    /// - Failed to read the cache directory or remove a file
    pub fn clear_all_models(&self) -> Result<Vec<String>> {
        let removed = self.remove_matching(|path| {
            path.extension()
                .is_some_and(|ext| ext == "onnx" || ext == PARTIAL_SUFFIX)
        })?;

        Ok(removed
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    /// Clear a specific cached model
    ///
    /// # Returns
    /// `true` if the model was found and removed
    ///
    /// # Errors
    /// - Failed to remove the model file
    pub fn clear_specific_model(&self, model: ModelSelector) -> Result<bool> {
        let path = self.get_model_path(model);
        if !path.exists() {
            return Ok(false);
        }

        log::info!("Removing cached model: {}", model);
        fs::remove_file(&path)
            .map_err(|e| BgCanvasError::file_io_error("remove cached model", &path, &e))?;
        Ok(true)
    }

    fn remove_matching<F>(&self, predicate: F) -> Result<Vec<PathBuf>>
    where
        F: Fn(&Path) -> bool,
    {
        let mut removed = Vec::new();
        if !self.cache_dir.exists() {
            return Ok(removed);
        }

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            BgCanvasError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        for entry in entries {
            let path = entry
                .map_err(|e| {
                    BgCanvasError::file_io_error("read cache directory entry", &self.cache_dir, &e)
                })?
                .path();

            if path.is_file() && predicate(&path) {
                log::info!("Removing cached file: {}", path.display());
                fs::remove_file(&path)
                    .map_err(|e| BgCanvasError::file_io_error("remove cached file", &path, &e))?;
                removed.push(path);
            }
        }

        removed.sort();
        Ok(removed)
    }
}

/// Resolve the models directory from an optional override
///
/// # Errors
/// - No override and no platform cache directory
pub fn resolve_cache_dir(env_override: Option<OsString>) -> Result<PathBuf> {
    if let Some(root) = env_override.filter(|root| !root.is_empty()) {
        return Ok(PathBuf::from(root).join("models"));
    }

    Ok(dirs::cache_dir()
        .ok_or_else(|| {
            BgCanvasError::invalid_config(format!(
                "Failed to determine cache directory. Set {} environment variable.",
                CACHE_DIR_ENV
            ))
        })?
        .join("imgly-bgcanvas")
        .join("models"))
}

/// Format file size in human-readable format
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS.get(unit_index).unwrap_or(&"B"))
    } else {
        format!("{:.1} {}", size, UNITS.get(unit_index).unwrap_or(&"B"))
    }
}
