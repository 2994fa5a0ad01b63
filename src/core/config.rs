//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.termcv/config.toml` unless `--config` points elsewhere.
//! If the default file is missing on first run, a commented-out default is
//! generated so operators can discover all options.
//!
//! The shared secret is *not* part of the file: it comes from the `PASSWORD`
//! environment variable only (see [`read_secret`]).

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::tui::render::Theme;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TermcvConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub host_key_path: Option<PathBuf>,
    pub shutdown_grace_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DisplayConfig {
    pub theme: Option<Theme>,
    pub char_limit: Option<usize>,
    pub mask_input: Option<bool>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 23234;
pub const DEFAULT_HOST_KEY_PATH: &str = ".ssh/term_info_ed25519";
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;
/// Zero disables the idle timeout.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 0;
pub const SECRET_ENV_VAR: &str = "PASSWORD";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub host: String,
    pub port: u16,
    pub host_key_path: PathBuf,
    pub shutdown_grace_secs: u64,
    pub idle_timeout_secs: u64,
    pub theme: Theme,
    pub char_limit: usize,
    pub mask_input: bool,
}

impl ResolvedConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Values given on the command line. `None` = flag not passed.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub host_key_path: Option<PathBuf>,
    pub theme: Option<Theme>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    /// An environment override could not be parsed (variable, value).
    Env(String, String),
    /// The shared secret is not set.
    MissingSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Env(var, value) => write!(f, "invalid value for {var}: {value:?}"),
            ConfigError::MissingSecret => {
                write!(f, "no {SECRET_ENV_VAR} environment variable set")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.termcv/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".termcv").join("config.toml"))
}

/// Load the config file.
///
/// With an explicit path the file must exist. Without one, the default path
/// is used; if that file doesn't exist a commented-out default is generated
/// and `TermcvConfig::default()` is returned.
pub fn load_config(explicit: Option<&Path>) -> Result<TermcvConfig, ConfigError> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(TermcvConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(TermcvConfig::default());
    }

    read_config(&path)
}

fn read_config(path: &Path) -> Result<TermcvConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: TermcvConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# termcv Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.
# The shared password is read from the PASSWORD environment variable only.

# [server]
# host = "0.0.0.0"                          # Or TERMCV_HOST
# port = 23234                              # Or TERMCV_PORT
# host_key_path = ".ssh/term_info_ed25519"  # Or TERMCV_HOST_KEY
# shutdown_grace_secs = 10                  # Time sessions get to finish on SIGINT/SIGTERM
# idle_timeout_secs = 0                     # 0 = sessions never time out

# [display]
# theme = "dark"                            # "dark" or "light"
# char_limit = 20                           # Max password length accepted by the input
# mask_input = true                         # Echo typed characters as bullets
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &TermcvConfig, cli: &CliOverrides) -> Result<ResolvedConfig, ConfigError> {
    // Host: CLI → env → config → default
    let host = cli
        .host
        .clone()
        .or_else(|| std::env::var("TERMCV_HOST").ok())
        .or_else(|| config.server.host.clone())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    // Port: CLI → env → config → default
    let env_port = match std::env::var("TERMCV_PORT") {
        Ok(raw) => Some(
            raw.parse::<u16>()
                .map_err(|_| ConfigError::Env("TERMCV_PORT".to_string(), raw))?,
        ),
        Err(_) => None,
    };
    let port = cli
        .port
        .or(env_port)
        .or(config.server.port)
        .unwrap_or(DEFAULT_PORT);

    // Host key: CLI → env → config → default
    let host_key_path = cli
        .host_key_path
        .clone()
        .or_else(|| std::env::var("TERMCV_HOST_KEY").ok().map(PathBuf::from))
        .or_else(|| config.server.host_key_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HOST_KEY_PATH));

    Ok(ResolvedConfig {
        host,
        port,
        host_key_path,
        shutdown_grace_secs: config
            .server
            .shutdown_grace_secs
            .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
        idle_timeout_secs: config
            .server
            .idle_timeout_secs
            .unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS),
        theme: cli.theme.or(config.display.theme).unwrap_or_default(),
        char_limit: config
            .display
            .char_limit
            .unwrap_or(crate::core::input::DEFAULT_CHAR_LIMIT),
        mask_input: config.display.mask_input.unwrap_or(true),
    })
}

/// Read the shared secret from `PASSWORD`. Missing or empty is an error.
pub fn read_secret() -> Result<String, ConfigError> {
    secret_from(std::env::var(SECRET_ENV_VAR).ok())
}

fn secret_from(value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(secret) if !secret.is_empty() => Ok(secret),
        _ => Err(ConfigError::MissingSecret),
    }
}

/// Widen `char_limit` so the whole secret can be typed. Zero stays unlimited.
pub fn fit_char_limit(char_limit: usize, secret: &str) -> usize {
    let needed = secret.chars().count();
    if char_limit == 0 || char_limit >= needed {
        return char_limit;
    }
    warn!(
        "char_limit {} is shorter than {}; raising it to {}",
        char_limit, SECRET_ENV_VAR, needed
    );
    needed
}
