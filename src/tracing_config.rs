//! Tracing configuration for the command line tool
//!
//! The library only emits `tracing` events and `log` records; the binary
//! installs a subscriber through [`TracingConfig`].

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors (default for CLI)
    Console,
    /// Compact console output without colors, for CI logs
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    /// Output format
    pub format: TracingFormat,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Run identifier attached to the first event
    pub run_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            env_filter: None,
            run_id: None,
        }
    }
}

impl TracingConfig {
    /// Create a new tracing configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-3+)
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set output format
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Set custom environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Set run identifier for correlating log lines
    pub fn with_run_id<S: Into<String>>(mut self, run_id: S) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    ///
    /// Without `-v` dependencies are limited to warnings.
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "warn,imgly_bgcanvas=info",
            1 => "info,imgly_bgcanvas=debug",
            2 => "debug,imgly_bgcanvas=trace",
            _ => "trace",
        }
    }

    /// Filter string actually used, preferring an explicit filter
    pub fn effective_filter(&self) -> String {
        self.env_filter
            .clone()
            .filter(|filter| !filter.trim().is_empty())
            .unwrap_or_else(|| self.verbosity_to_filter().to_string())
    }

    /// Initialize the global tracing subscriber
    ///
    /// `log` records from the library are forwarded into the subscriber.
    ///
    /// # Errors
    /// - Invalid filter string
    /// - A global subscriber is already installed
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = EnvFilter::try_new(self.effective_filter())?;
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr);
                registry.with(fmt_layer).try_init()?;
            },
        }

        if let Some(run_id) = &self.run_id {
            tracing::debug!(run_id = %run_id, "Batch run started");
        }

        Ok(())
    }
}

/// Initialize tracing with CLI-friendly defaults
///
/// # Errors
/// - Subscriber installation failures
#[cfg(feature = "cli")]
pub fn init_cli_tracing(verbosity: u8, filter: Option<String>) -> anyhow::Result<()> {
    let mut config = TracingConfig::new()
        .with_verbosity(verbosity)
        .with_run_id(chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string());
    if let Some(filter) = filter {
        config = config.with_env_filter(filter);
    }
    config.init()
}

/// Span creation helpers for CLI operations
pub mod spans {
    use tracing::{Level, Span};

    /// Span covering input discovery
    pub fn input_discovery(input_count: usize) -> Span {
        tracing::span!(Level::INFO, "input_discovery", inputs = %input_count)
    }

    /// Span covering model resolution and session creation
    pub fn model_loading(model_name: &str) -> Span {
        tracing::span!(Level::INFO, "model_loading", model_name = %model_name)
    }

    /// Span covering output writing
    pub fn output_writing(destination: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "output_writing",
            destination = %destination.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(
            TracingConfig::new().with_verbosity(0).verbosity_to_filter(),
            "warn,imgly_bgcanvas=info"
        );
        assert_eq!(
            TracingConfig::new().with_verbosity(1).verbosity_to_filter(),
            "info,imgly_bgcanvas=debug"
        );
        assert_eq!(TracingConfig::new().with_verbosity(3).verbosity_to_filter(), "trace");
        assert_eq!(TracingConfig::new().with_verbosity(10).verbosity_to_filter(), "trace");
    }

    #[test]
    fn test_explicit_filter_wins() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_env_filter("imgly_bgcanvas::batch=trace");
        assert_eq!(config.effective_filter(), "imgly_bgcanvas::batch=trace");

        let blank = TracingConfig::new().with_env_filter("  ");
        assert_eq!(blank.effective_filter(), "warn,imgly_bgcanvas=info");
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_format(TracingFormat::Compact)
            .with_run_id("run-1");

        assert_eq!(config.verbosity, 2);
        assert_eq!(config.format, TracingFormat::Compact);
        assert_eq!(config.run_id.as_deref(), Some("run-1"));
    }

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.verbosity, 0);
        assert_eq!(config.format, TracingFormat::Console);
        assert!(config.env_filter.is_none());
        assert!(config.run_id.is_none());
    }
}
