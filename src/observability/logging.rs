//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything but `json` is pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "warn".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from file settings and the verbose flag.
    ///
    /// `CSVBRIDGE_LOG_FORMAT` and `CSVBRIDGE_LOG_FILE` override the file
    /// settings. `--verbose` raises the crate's own level to `debug`.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        Self::from_settings_with(settings, verbose, |key| std::env::var(key).ok())
    }

    /// Like [`Self::from_settings`], reading overrides through `lookup`.
    #[must_use]
    pub fn from_settings_with(
        settings: Option<&LoggingSettings>,
        verbose: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut config = Self::default();

        if let Some(settings) = settings {
            if let Some(format) = &settings.format {
                config.format = LogFormat::parse(format);
            }
            if let Some(filter) = &settings.filter {
                config.filter.clone_from(filter);
            }
            config.file.clone_from(&settings.file);
        }

        if let Some(format) = lookup("CSVBRIDGE_LOG_FORMAT") {
            config.format = LogFormat::parse(&format);
        }
        if let Some(file) = lookup("CSVBRIDGE_LOG_FILE").filter(|f| !f.trim().is_empty()) {
            config.file = Some(PathBuf::from(file));
        }
        if verbose {
            config.filter = format!("{},csvbridge=debug", config.filter);
        }

        config
    }
}
