//! Configuration types and loading for the application.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::paths::expand;
use crate::{AppPaths, env_prefix};

/// Entra ID authority that issues app-only tokens.
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
/// Microsoft Graph v1.0 endpoint.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
/// The application's default Graph scope for the client-credential flow.
pub const DEFAULT_GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
/// Secrets file loaded into the environment at startup.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Graph and token endpoint configuration.
    pub graph: GraphConfig,
}

impl AppConfig {
    /// Load configuration from the discovered file and the environment.
    ///
    /// A missing file is not an error and nothing is written to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load(paths: &AppPaths) -> Result<Self> {
        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn load_from_path(config_file: &Path) -> Result<Self> {
        let env_prefix = env_prefix();
        let built = Config::builder()
            .set_default("logging.level", "warn")?
            .set_default("graph.authority_url", DEFAULT_AUTHORITY_URL)?
            .set_default("graph.base_url", DEFAULT_GRAPH_BASE_URL)?
            .set_default("graph.scope", DEFAULT_GRAPH_SCOPE)?
            .set_default("graph.timeout", 60_i64)?
            .set_default("graph.env_file", DEFAULT_ENV_FILE)?
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix(env_prefix.as_str()).separator("__"))
            .build()?;

        let mut config: Self = built.try_deserialize()?;

        if let Some(ref file) = config.logging.file {
            let expanded = expand(file)?;
            config.logging.file = Some(expanded.display().to_string());
        }
        if let Some(ref file) = config.graph.env_file {
            let expanded = expand(file)?;
            config.graph.env_file = Some(expanded.display().to_string());
        }

        Ok(config)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace).
    pub level: LogLevel,

    /// Optional path for log file output. Supports ~ and environment variables.
    pub file: Option<String>,
}

/// Log level enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only emit error-level messages.
    Error,
    /// Emit warnings and errors (default).
    #[default]
    Warn,
    /// Emit informational messages and above.
    Info,
    /// Emit debug diagnostics and above.
    Debug,
    /// Emit all messages including fine-grained traces.
    Trace,
}

impl LogLevel {
    /// Convert to the `log` crate's level filter.
    #[must_use]
    pub const fn as_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Token endpoint and Graph API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Authority host; the token endpoint is `{authority_url}/{tenant}/oauth2/v2.0/token`.
    pub authority_url: String,

    /// Graph API base URL including the version segment.
    pub base_url: String,

    /// Scope requested for app-only tokens.
    pub scope: String,

    /// HTTP timeout in seconds (default: 60).
    pub timeout: Option<u64>,

    /// Dotenv file holding `CLIENT_ID`, `SECRET` and `TENANT_ID`.
    pub env_file: Option<String>,
}

impl GraphConfig {
    /// HTTP timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(60))
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            authority_url: DEFAULT_AUTHORITY_URL.to_string(),
            base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            scope: DEFAULT_GRAPH_SCOPE.to_string(),
            timeout: Some(60),
            env_file: Some(DEFAULT_ENV_FILE.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn scratch_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("graphmail-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = scratch_file("does-not-exist.toml");
        let cfg = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(cfg.logging.level, LogLevel::Warn);
        assert_eq!(cfg.graph.authority_url, DEFAULT_AUTHORITY_URL);
        assert_eq!(cfg.graph.base_url, DEFAULT_GRAPH_BASE_URL);
        assert_eq!(cfg.graph.scope, DEFAULT_GRAPH_SCOPE);
        assert_eq!(cfg.graph.timeout(), Duration::from_secs(60));
        assert_eq!(cfg.graph.env_file.as_deref(), Some(".env"));
    }

    #[test]
    fn file_values_override_defaults() {
        let path = scratch_file("override.toml");
        fs::write(
            &path,
            r#"
[logging]
level = "debug"

[graph]
base_url = "http://localhost:8080/v1.0"
timeout = 5
"#,
        )
        .unwrap();

        let cfg = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(cfg.logging.level, LogLevel::Debug);
        assert_eq!(cfg.graph.base_url, "http://localhost:8080/v1.0");
        assert_eq!(cfg.graph.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.graph.authority_url, DEFAULT_AUTHORITY_URL);
    }

    #[test]
    fn loading_never_creates_the_config_file() {
        let path = scratch_file("absent").join("config.toml");
        let paths = AppPaths {
            config_file: path.clone(),
        };

        let cfg = AppConfig::load(&paths).unwrap();
        assert_eq!(cfg.graph.base_url, DEFAULT_GRAPH_BASE_URL);
        assert!(!path.exists());
        assert!(!path.parent().unwrap().exists());
    }

    #[test]
    fn log_level_maps_to_filter() {
        assert_eq!(LogLevel::Warn.as_filter(), log::LevelFilter::Warn);
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }
}
