//! File I/O service
//!
//! Keeps filesystem access out of the batch processor: inputs are read into
//! [`BatchInput`]s and results are written back as archives or loose PNGs.

use crate::archive::unique_names;
use crate::error::{BgCanvasError, Result};
use crate::types::{BatchInput, BatchResult};
use std::path::{Path, PathBuf};

/// Service for reading batch inputs and writing batch outputs
pub struct ImageIOService;

impl ImageIOService {
    /// Read a file into a batch input named after its file name
    ///
    /// # Errors
    /// - File missing or unreadable
    ///
    /// # Examples
    /// ```rust,no_run
    /// use imgly_bgcanvas::services::ImageIOService;
    ///
    /// let input = ImageIOService::load_input("photos/cat.jpg")?;
    /// assert_eq!(input.name, "cat.jpg");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_input<P: AsRef<Path>>(path: P) -> Result<BatchInput> {
        let path_ref = path.as_ref();
        let bytes = std::fs::read(path_ref)
            .map_err(|e| BgCanvasError::file_io_error("read input image", path_ref, &e))?;

        let name = path_ref
            .file_name()
            .and_then(|name| name.to_str())
            .map_or_else(|| path_ref.display().to_string(), str::to_string);

        Ok(BatchInput::new(name, bytes))
    }

    /// Write bytes to a file, creating parent directories
    ///
    /// # Errors
    /// - Directory creation or write failures
    pub fn write_bytes<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| BgCanvasError::file_io_error("create output directory", parent, &e))?;
        }
        std::fs::write(path_ref, bytes)
            .map_err(|e| BgCanvasError::file_io_error("write output file", path_ref, &e))
    }

    /// Package all successes and write the archive
    ///
    /// # Errors
    /// - Packaging failures
    /// - Write failures
    pub fn write_archive<P: AsRef<Path>>(path: P, result: &BatchResult) -> Result<()> {
        let archive = result.to_archive()?;
        Self::write_bytes(path.as_ref(), &archive)?;
        log::info!(
            "Wrote {} images to {}",
            result.success_count(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Write each success as a PNG into `dir`, using the archive naming rules
    ///
    /// # Errors
    /// - Directory creation or write failures
    pub fn write_outputs<P: AsRef<Path>>(dir: P, result: &BatchResult) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let names = unique_names(result.successes().map(|image| image.output_name.as_str()));

        names
            .iter()
            .zip(result.successes())
            .map(|(name, image)| {
                let path = dir.join(name);
                Self::write_bytes(&path, &image.bytes)?;
                Ok(path)
            })
            .collect()
    }
}
