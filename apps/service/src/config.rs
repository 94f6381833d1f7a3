use std::{env, fmt, fs, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitoring::checker::DEFAULT_PROBE_TIMEOUT;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config: {0}")]
    ReadFailed(#[source] std::io::Error),
    #[error("failed to write config: {0}")]
    WriteFailed(#[source] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub checks: ChecksConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: path::PathBuf,
    pub pool_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    /// Hard limit for one probe
    pub timeout_seconds: u64,
    /// Monitors probed at the same time within a cycle
    pub concurrency: usize,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "healthbeat.db".into(), pool_size: 16 }
    }
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_PROBE_TIMEOUT.as_secs(),
            concurrency: 16,
            user_agent: format!("healthbeat/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 8080 }
    }
}

impl ChecksConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Config files are always TOML; a bare `--config ./healthbeat` gets the extension added
fn with_toml_extension(path: &path::Path) -> path::PathBuf {
    match path.extension() {
        Some(ext) if ext == "toml" => path.to_path_buf(),
        _ => path.with_extension("toml"),
    }
}

/// `$XDG_CONFIG_HOME/healthbeat/config.toml`, falling back to `~/.config`
fn default_config_path() -> Result<path::PathBuf, Error> {
    let base = env::var_os("XDG_CONFIG_HOME")
        .map(path::PathBuf::from)
        .or_else(|| env::home_dir().map(|home| home.join(".config")))
        .ok_or(Error::ConfigPathUnavailable)?;

    Ok(base.join("healthbeat").join("config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn entry(f: &mut fmt::Formatter<'_>, label: &str, value: impl fmt::Display) -> fmt::Result {
            writeln!(f, "    {label}: {value}")
        }

        writeln!(f, "Current Configuration:")?;
        writeln!(f, "  Database")?;
        entry(f, "Path", self.database.path.display())?;
        entry(f, "Pool Size", self.database.pool_size)?;
        writeln!(f, "  Checks")?;
        entry(f, "Timeout (s)", self.checks.timeout_seconds)?;
        entry(f, "Concurrency", self.checks.concurrency)?;
        entry(f, "User Agent", &self.checks.user_agent)?;
        writeln!(f, "  Server")?;
        entry(f, "Bind Address", &self.server.bind)?;
        entry(f, "Port", self.server.port)
    }
}

impl Config {
    /// Load the config at `path`, or at the default location when `None`.
    ///
    /// A missing file is created with the defaults so operators have something
    /// to edit. The result is validated before it is returned.
    pub fn from_config(path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path = match path {
            Some(path) => with_toml_extension(path.as_ref()),
            None => default_config_path()?,
        };

        let config = match fs::read_to_string(&config_path) {
            Ok(raw) => toml::from_str(&raw)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                let defaults = Self::default();
                defaults.write_config(&config_path)?;
                defaults
            }
            Err(error) => return Err(Error::ReadFailed(error)),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let rendered = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(Error::WriteFailed)?;
        }

        fs::write(path, rendered).map_err(Error::WriteFailed)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), Error> {
        if self.checks.timeout_seconds == 0 {
            return Err(Error::Invalid("checks.timeout_seconds must be at least 1".into()));
        }
        if self.checks.concurrency == 0 {
            return Err(Error::Invalid("checks.concurrency must be at least 1".into()));
        }
        if self.database.pool_size == 0 {
            return Err(Error::Invalid("database.pool_size must be at least 1".into()));
        }
        Ok(())
    }
}
