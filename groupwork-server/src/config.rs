//! Configuration system for the groupwork server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/groupwork/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;

use groupwork::EngineConfig;
use groupwork::notify::DEFAULT_MAX_PENDING;
use groupwork_proto::group::DEFAULT_LOCALE;

/// Errors that can occur when loading server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerConfigFile {
    server: ServerFileConfig,
    engine: EngineFileConfig,
    logging: LoggingFileConfig,
}

/// `[server]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    snapshot_path: Option<PathBuf>,
}

/// `[engine]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct EngineFileConfig {
    max_pending_notifications: Option<usize>,
    default_locale: Option<String>,
}

/// `[logging]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LoggingFileConfig {
    level: Option<String>,
    file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Groupwork group task server")]
pub struct ServerCliArgs {
    /// Address to bind the server to.
    #[arg(short, long, env = "GROUPWORK_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/groupwork/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum pending notifications kept per user.
    #[arg(long)]
    pub max_pending_notifications: Option<usize>,

    /// Locale for users registered without one.
    #[arg(long, env = "GROUPWORK_LOCALE")]
    pub default_locale: Option<String>,

    /// Snapshot file restored at startup and written on shutdown.
    #[arg(long, env = "GROUPWORK_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, env = "GROUPWORK_LOG")]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stdout.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:8080`).
    pub bind_addr: String,
    /// Maximum pending notifications per user before FIFO eviction.
    pub max_pending_notifications: usize,
    /// Locale for users registered without one.
    pub default_locale: String,
    /// Snapshot file, if persistence is enabled.
    pub snapshot_path: Option<PathBuf>,
    /// Log level filter string.
    pub log_level: String,
    /// Log file, stdout when absent.
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            max_pending_notifications: DEFAULT_MAX_PENDING,
            default_locale: DEFAULT_LOCALE.to_string(),
            snapshot_path: None,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &ServerCliArgs, file: &ServerConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            max_pending_notifications: cli
                .max_pending_notifications
                .or(file.engine.max_pending_notifications)
                .unwrap_or(defaults.max_pending_notifications),
            default_locale: cli
                .default_locale
                .clone()
                .or_else(|| file.engine.default_locale.clone())
                .unwrap_or(defaults.default_locale),
            snapshot_path: cli
                .snapshot
                .clone()
                .or_else(|| file.server.snapshot_path.clone()),
            log_level: cli
                .log_level
                .clone()
                .or_else(|| file.logging.level.clone())
                .unwrap_or(defaults.log_level),
            log_file: cli.log_file.clone().or_else(|| file.logging.file.clone()),
        }
    }

    /// Engine settings derived from this configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_pending_notifications: self.max_pending_notifications,
            default_locale: self.default_locale.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<ServerConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ServerConfigFile::default());
        };
        config_dir.join("groupwork").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
