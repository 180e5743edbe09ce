//! Configuration loading and constants.
//!
//! Loads application configuration from an optional TOML file, applies
//! environment overrides, and defines defaults for HTTP limits, the CORS
//! policy, the removal backend, and logging. `AppConfig` is the root
//! configuration struct containing all settings.

use serde::Deserialize;
use std::path::Path;

// =============================================================================
// HTTP Defaults
// =============================================================================

/// Default bind address (all interfaces)
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";

/// Default listening port
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Default maximum request body size (20 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Environment variable that overrides `http.port`
pub const PORT_ENV_VAR: &str = "PORT";

/// Cache-Control value for processed images, which are never reused
pub const CACHE_CONTROL_NO_STORE: &str = "no-store";

// =============================================================================
// Remover Defaults
// =============================================================================

/// Default colour distance under which a pixel matches the border colour
pub const DEFAULT_TOLERANCE: u8 = 32;

/// Default maximum decoded width or height, in pixels
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

/// Default external removal program
pub const DEFAULT_REMOVER_PROGRAM: &str = "rembg";

/// Default arguments: read the image from stdin, write the result to stdout
pub const DEFAULT_REMOVER_ARGS: [&str; 3] = ["i", "-", "-"];

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Configuration file used when `--config` is not given and the file exists
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Multipart field carrying the uploaded image
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "cutout=debug,tower_http=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server configuration
    pub http: HttpServerConfig,
    /// Cross-origin policy
    pub cors: CorsConfig,
    /// Background removal backend
    pub remover: RemoverConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Cross-origin resource sharing policy.
///
/// `"*"` in `allowed_origins` or `expose_headers` means "any". With
/// `allow_credentials` the wildcard is mirrored from the request instead,
/// see [`crate::cors::build_cors_layer`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
    pub expose_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allow_credentials: true,
            expose_headers: vec!["*".to_string()],
        }
    }
}

/// Which removal implementation serves requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemoverBackend {
    /// Built-in border colour flood fill
    #[default]
    BorderKey,
    /// External program speaking PNG over stdin/stdout
    Command,
}

/// Background removal configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoverConfig {
    pub backend: RemoverBackend,
    /// Colour distance threshold for the border-key backend
    pub tolerance: u8,
    /// Maximum decoded width and height, in pixels
    pub max_dimension: u32,
    /// Upper bound for a single removal call, in seconds (unbounded if unset)
    pub timeout_seconds: Option<u64>,
    pub command: CommandConfig,
}

impl Default for RemoverConfig {
    fn default() -> Self {
        Self {
            backend: RemoverBackend::default(),
            tolerance: DEFAULT_TOLERANCE,
            max_dimension: DEFAULT_MAX_DIMENSION,
            timeout_seconds: None,
            command: CommandConfig::default(),
        }
    }
}

/// External removal program invocation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_REMOVER_PROGRAM.to_string(),
            args: DEFAULT_REMOVER_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load from `path` if given, else from [`DEFAULT_CONFIG_PATH`] if it
    /// exists, else fall back to built-in defaults. Environment overrides
    /// are applied last.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve(
            path,
            Path::new(DEFAULT_CONFIG_PATH),
            std::env::var(PORT_ENV_VAR).ok().as_deref(),
        )
    }

    fn resolve(
        path: Option<&Path>,
        default_path: &Path,
        port: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None if default_path.exists() => Self::load(default_path)?,
            None => Self::default(),
        };

        config.apply_port_override(port)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the value of the `PORT` environment variable, if any.
    pub fn apply_port_override(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        let Some(raw) = value else {
            return Ok(());
        };
        self.http.port = raw.trim().parse().map_err(|_| {
            ConfigError::Validation(format!("{PORT_ENV_VAR} must be a port number, got {raw:?}"))
        })?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.max_upload_bytes == 0 {
            return Err(ConfigError::Validation(
                "http.max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.remover.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "remover.max_dimension must be greater than zero".to_string(),
            ));
        }
        if self.remover.backend == RemoverBackend::Command
            && self.remover.command.program.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "remover.command.program is required for the command backend".to_string(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::Validation(format!(
                "logging.format must be \"text\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
