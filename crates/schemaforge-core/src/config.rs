use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::job::PollSchedule;

pub const ENV_SUBMIT_URL: &str = "SCHEMAFORGE_SUBMIT_URL";
pub const ENV_POLL_URL: &str = "SCHEMAFORGE_POLL_URL";
pub const ENV_POLL_SCHEDULE: &str = "SCHEMAFORGE_POLL_SCHEDULE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid {field} URL {value:?}: {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("Poll schedule must contain at least one delay")]
    EmptySchedule,
    #[error("Invalid poll schedule {0:?}: expected comma-separated seconds")]
    InvalidSchedule(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Endpoints and timing for the async extraction path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Where each file of a job is uploaded
    pub submit_url: String,
    /// Where the job's result is polled, keyed by `request_id`
    pub poll_url: String,
    /// Waits before each poll, in seconds
    #[serde(rename = "poll_schedule_secs")]
    pub poll_schedule: PollSchedule,
    pub connect_timeout_seconds: u32,
    pub request_timeout_seconds: u32,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            submit_url: "http://localhost:8000/extract".to_string(),
            poll_url: "http://localhost:8790/api/webhook".to_string(),
            poll_schedule: PollSchedule::default(),
            connect_timeout_seconds: 10,
            request_timeout_seconds: 120,
        }
    }
}

impl ForgeConfig {
    /// `<config_dir>/schemaforge/config.toml`, when the platform has one.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("schemaforge").join("config.toml"))
    }

    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads `path`, or the default location, falling back to defaults when
    /// no file exists. Environment overrides are applied and the result is
    /// validated.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) if path.exists() => {
                tracing::debug!("Loading config from {}", path.display());
                Self::load(&path)?
            }
            _ => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides looked up by environment variable name.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(url) = lookup(ENV_SUBMIT_URL) {
            self.submit_url = url;
        }
        if let Some(url) = lookup(ENV_POLL_URL) {
            self.poll_url = url;
        }
        if let Some(raw) = lookup(ENV_POLL_SCHEDULE) {
            self.poll_schedule = parse_schedule(&raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.endpoints()?;
        if self.poll_schedule.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        Ok(())
    }

    /// Parsed submit and poll URLs.
    pub fn endpoints(&self) -> ConfigResult<(Url, Url)> {
        Ok((
            parse_url("submit", &self.submit_url)?,
            parse_url("poll", &self.poll_url)?,
        ))
    }
}

fn parse_url(field: &'static str, value: &str) -> ConfigResult<Url> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        source,
    })
}

/// Parses `"10, 15, 15"` into a schedule.
pub fn parse_schedule(raw: &str) -> ConfigResult<PollSchedule> {
    let secs = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ConfigError::InvalidSchedule(raw.to_string()))?;

    if secs.is_empty() {
        return Err(ConfigError::EmptySchedule);
    }
    Ok(PollSchedule::from_secs(&secs))
}
