//! Error types for batch canvas processing

use thiserror::Error;

/// Result type alias for canvas processing operations
pub type Result<T> = std::result::Result<T, BgCanvasError>;

/// Error types for background removal, composition and packaging
#[derive(Error, Debug)]
pub enum BgCanvasError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input bytes are not a valid or supported image
    #[error("Decode error: {0}")]
    Decode(String),

    /// The segmentation collaborator failed or is unavailable
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    /// Output image serialization failed
    #[error("Encode error: {0}")]
    Encode(String),

    /// Archive serialization failed
    #[error("Packaging error: {0}")]
    Packaging(String),

    /// An image with zero width or height reached the compositor
    #[error("Degenerate image dimensions: {width}x{height}")]
    DegenerateDimensions { width: u32, height: u32 },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Model download errors
    #[error("Network error: {0}")]
    Network(String),

    /// Processing stopped by a cancellation request
    #[error("Processing cancelled")]
    Cancelled,

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgCanvasError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new packaging error
    pub fn packaging<S: Into<String>>(msg: S) -> Self {
        Self::Packaging(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create network error with request context
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Network(format!("{}: {}", context.into(), error))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Classify this error for per-item failure reporting
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Decode(_) => FailureKind::Decode,
            Self::Segmentation(_) | Self::Model(_) => FailureKind::Segmentation,
            Self::Encode(_) => FailureKind::Encode,
            _ => FailureKind::Other,
        }
    }
}

/// Category of a per-item failure inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Input could not be decoded
    Decode,
    /// Background removal failed
    Segmentation,
    /// Output could not be encoded
    Encode,
    /// Anything else
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode => write!(f, "decode"),
            Self::Segmentation => write!(f, "segmentation"),
            Self::Encode => write!(f, "encode"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = BgCanvasError::invalid_config("test config error");
        assert!(matches!(err, BgCanvasError::InvalidConfig(_)));

        let err = BgCanvasError::decode("not an image");
        assert!(matches!(err, BgCanvasError::Decode(_)));
    }

    #[test]
    fn test_error_display() {
        let err = BgCanvasError::invalid_config("Invalid target width");
        assert_eq!(err.to_string(), "Invalid configuration: Invalid target width");

        let err = BgCanvasError::DegenerateDimensions {
            width: 0,
            height: 12,
        };
        assert_eq!(err.to_string(), "Degenerate image dimensions: 0x12");
    }

    #[test]
    fn test_enhanced_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = BgCanvasError::file_io_error("write archive", Path::new("/out/batch.zip"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("write archive"));
        assert!(error_string.contains("/out/batch.zip"));

        let err = BgCanvasError::config_value_error("occupancy percent", 120, "50-100", Some(90));
        let error_string = err.to_string();
        assert!(error_string.contains("occupancy percent"));
        assert!(error_string.contains("120"));
        assert!(error_string.contains("50-100"));
        assert!(error_string.contains("Recommended: 90"));

        let err = BgCanvasError::network_error("Failed to download u2net", "timed out");
        assert_eq!(
            err.to_string(),
            "Network error: Failed to download u2net: timed out"
        );
    }

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(BgCanvasError::decode("x").failure_kind(), FailureKind::Decode);
        assert_eq!(
            BgCanvasError::segmentation("x").failure_kind(),
            FailureKind::Segmentation
        );
        assert_eq!(BgCanvasError::model("x").failure_kind(), FailureKind::Segmentation);
        assert_eq!(BgCanvasError::encode("x").failure_kind(), FailureKind::Encode);
        assert_eq!(BgCanvasError::Cancelled.failure_kind(), FailureKind::Other);
        assert_eq!(FailureKind::Segmentation.to_string(), "segmentation");
    }
}
