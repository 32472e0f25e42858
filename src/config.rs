//! Layered configuration for the GearGuard CLI and reference server.
//!
//! Values resolve file → environment → CLI flags. The file is
//! `gearguard.toml` in the working directory when present, otherwise
//! `<config_dir>/gearguard/config.toml`.
//!
//! ```toml
//! [client]
//! api_url = "http://localhost:3000/api/v1"
//! mutation_timeout_secs = 10
//! request_timeout_secs = 30
//!
//! [server]
//! bind = "127.0.0.1"
//! port = 3000
//! data_path = "gearguard-data.json"
//! seed = true
//! dev_mode = false
//! jwt_secret = "change-me"
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! directory = "logs"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub const LOCAL_CONFIG_FILE: &str = "gearguard.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format '{}'. Valid values: pretty, json", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSection {
    /// API root including the version prefix
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Upper bound on one remote mutation before it is rolled back
    #[serde(default = "default_mutation_timeout_secs")]
    pub mutation_timeout_secs: u64,
    /// Transport-level timeout for every HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:3000/api/v1".to_string()
}

fn default_mutation_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            mutation_timeout_secs: default_mutation_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// JSON file backing the document store; in-memory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub seed: bool,
    /// Permissive CORS for a locally served frontend
    #[serde(default)]
    pub dev_mode: bool,
    /// Session signing secret; the data file keeps a generated one otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            data_path: None,
            seed: true,
            dev_mode: false,
            jwt_secret: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// `tracing` filter directive, e.g. `info` or `gearguard=debug`
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Also write daily-rolling log files here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

/// Contents of a GearGuard config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GearGuardToml {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl GearGuardToml {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults when `path` does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Overlay `GEARGUARD_*` variables read through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(url) = var("GEARGUARD_API_URL") {
            self.client.api_url = url;
        }
        if let Some(secs) = var("GEARGUARD_MUTATION_TIMEOUT_SECS") {
            self.client.mutation_timeout_secs = parse_env("GEARGUARD_MUTATION_TIMEOUT_SECS", &secs)?;
        }
        if let Some(port) = var("GEARGUARD_PORT") {
            self.server.port = parse_env("GEARGUARD_PORT", &port)?;
        }
        if let Some(path) = var("GEARGUARD_DATA_PATH") {
            self.server.data_path = Some(PathBuf::from(path));
        }
        if let Some(secret) = var("GEARGUARD_JWT_SECRET") {
            self.server.jwt_secret = Some(secret);
        }
        if let Some(level) = var("GEARGUARD_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = var("GEARGUARD_LOG_FORMAT") {
            self.logging.format = parse_env("GEARGUARD_LOG_FORMAT", &format)?;
        }
        Ok(())
    }

    /// Problems that make the configuration unusable, one message each.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let url = &self.client.api_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            problems.push(format!(
                "client.api_url '{}' must start with http:// or https://",
                url
            ));
        }
        if self.client.mutation_timeout_secs == 0 {
            problems.push("client.mutation_timeout_secs must be at least 1".to_string());
        }
        if self.client.request_timeout_secs == 0 {
            problems.push("client.request_timeout_secs must be at least 1".to_string());
        }
        if self.server.bind.trim().is_empty() {
            problems.push("server.bind must not be empty".to_string());
        }
        if self
            .server
            .jwt_secret
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            problems.push("server.jwt_secret must not be blank when set".to_string());
        }
        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            problems.push(format!(
                "logging.level '{}' is not a valid filter directive",
                self.logging.level
            ));
        }

        problems
    }

    /// Fail with every problem `validate` finds.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Problems(problems))
        }
    }

    /// Copy safe to print, with secrets masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.server.jwt_secret.is_some() {
            copy.server.jwt_secret = Some("********".to_string());
        }
        copy
    }
}

/// Reportable `.env` problems. A missing file is not one.
fn dotenv_warning(result: Result<PathBuf, dotenvy::Error>) -> Option<String> {
    match result {
        Ok(_) => None,
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => Some(format!("Ignoring .env: {}", e)),
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// `<config_dir>/gearguard`, e.g. `~/.config/gearguard` on Linux.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gearguard"))
}

pub fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Where the logged-in session token is kept between invocations.
pub fn session_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("session"))
}

/// `gearguard.toml` in `cwd`, else the per-user file if it exists.
pub fn discover_config_path(cwd: &Path) -> Option<PathBuf> {
    let local = cwd.join(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    user_config_path().filter(|path| path.exists())
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct GearGuardConfig {
    /// File the settings came from, if any
    pub source: Option<PathBuf>,
    pub toml: GearGuardToml,
    /// Session token from `GEARGUARD_TOKEN`; overrides the saved session
    pub token: Option<String>,
    /// Non-fatal problems found while loading, logged once tracing is up
    pub warnings: Vec<String>,
}

impl GearGuardConfig {
    /// Load from `explicit` or the discovered file, then overlay `.env` and
    /// the process environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let warnings = dotenv_warning(dotenvy::dotenv()).into_iter().collect();

        let source = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::current_dir()
                .ok()
                .and_then(|cwd| discover_config_path(&cwd)),
        };
        let mut toml = match &source {
            Some(path) if explicit.is_some() => GearGuardToml::load(path)?,
            Some(path) => GearGuardToml::load_or_default(path)?,
            None => GearGuardToml::default(),
        };
        toml.apply_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))?;

        Ok(Self {
            source,
            toml,
            token: std::env::var("GEARGUARD_TOKEN").ok().filter(|t| !t.is_empty()),
            warnings,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.toml.client.api_url
    }

    pub fn mutation_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.client.mutation_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.client.request_timeout_secs)
    }

    /// Emit the load-time warnings through `tracing`.
    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            tracing::warn!("{}", warning);
        }
    }

    /// CLI flag layer.
    pub fn with_api_url(mut self, api_url: Option<String>) -> Self {
        if let Some(url) = api_url {
            self.toml.client.api_url = url;
        }
        self
    }
}

/// Read the saved session token, if any.
pub fn load_session(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|token| !token.is_empty())
}

pub fn save_session(path: &Path, token: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, token)
        .with_context(|| format!("Failed to write session file {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict {}", path.display()))?;
    }
    Ok(())
}

pub fn clear_session(path: &Path) -> anyhow::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}
