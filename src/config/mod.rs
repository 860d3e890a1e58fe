//! Configuration management.
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML
//! config file, `CSVBRIDGE_*` environment variables, and CLI flags (applied
//! by the binary).
//!
//! ```toml
//! threads = 4
//!
//! [server]
//! url = "https://foreman.example.com"
//! username = "admin"
//! password = "changeme"
//! timeout_ms = 30000
//!
//! [logging]
//! format = "json"
//! file = "/var/log/csvbridge.log"
//! ```

use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration for csvbridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Remote server settings.
    pub server: ServerConfig,
    /// Worker threads per dispatch run.
    pub threads: usize,
    /// Keep processing a chunk after one of its rows fails.
    pub keep_going: bool,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Remote server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL of the server.
    pub url: Option<String>,
    /// Basic auth user.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<SecretString>,
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

/// Logging settings as written in the config file.
#[derive(Debug, Clone, Default)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive, e.g. `csvbridge=debug`.
    pub filter: Option<String>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Worker threads.
    pub threads: Option<usize>,
    /// Keep going after row failures.
    pub keep_going: Option<bool>,
    /// Server section.
    pub server: Option<ConfigFileServer>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Server section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileServer {
    /// Base URL.
    pub url: Option<String>,
    /// Username.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Output format.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            threads: 1,
            keep_going: false,
            logging: LoggingSettings::default(),
        }
    }
}

impl BridgeConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/csvbridge/` on macOS)
    /// 2. XDG config dir (`~/.config/csvbridge/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("csvbridge").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("csvbridge")
                .join("config.toml"),
        ];
        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file"),
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `BridgeConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(threads) = file.threads {
            config.threads = threads;
        }
        if let Some(keep_going) = file.keep_going {
            config.keep_going = keep_going;
        }
        if let Some(server) = file.server {
            config.server.url = server.url;
            config.server.username = server.username;
            config.server.password = server.password.map(SecretString::from);
            if let Some(v) = server.timeout_ms {
                config.server.timeout_ms = v;
            }
            if let Some(v) = server.connect_timeout_ms {
                config.server.connect_timeout_ms = v;
            }
        }
        if let Some(logging) = file.logging {
            config.logging = LoggingSettings {
                format: logging.format,
                file: logging.file.map(PathBuf::from),
                filter: logging.filter,
            };
        }

        config
    }

    /// Applies `CSVBRIDGE_*` environment variable overrides.
    ///
    /// | Variable | Setting |
    /// |----------|---------|
    /// | `CSVBRIDGE_SERVER` | `server.url` |
    /// | `CSVBRIDGE_USERNAME` | `server.username` |
    /// | `CSVBRIDGE_PASSWORD` | `server.password` |
    /// | `CSVBRIDGE_THREADS` | `threads` |
    /// | `CSVBRIDGE_HTTP_TIMEOUT_MS` | `server.timeout_ms` |
    /// | `CSVBRIDGE_HTTP_CONNECT_TIMEOUT_MS` | `server.connect_timeout_ms` |
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup`; unparseable values are ignored.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("CSVBRIDGE_SERVER") {
            self.server.url = Some(url);
        }
        if let Some(username) = get("CSVBRIDGE_USERNAME") {
            self.server.username = Some(username);
        }
        if let Some(password) = get("CSVBRIDGE_PASSWORD") {
            self.server.password = Some(SecretString::from(password));
        }
        if let Some(threads) = get("CSVBRIDGE_THREADS").and_then(|v| v.parse().ok()) {
            self.threads = threads;
        }
        if let Some(ms) = get("CSVBRIDGE_HTTP_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.server.timeout_ms = ms;
        }
        if let Some(ms) = get("CSVBRIDGE_HTTP_CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.server.connect_timeout_ms = ms;
        }
        self
    }

    /// Sets the server URL.
    #[must_use]
    pub fn with_server(mut self, url: impl Into<String>) -> Self {
        self.server.url = Some(url.into());
        self
    }

    /// Sets the worker thread count.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }
}
