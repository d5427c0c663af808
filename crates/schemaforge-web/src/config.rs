use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8790;
pub const DEFAULT_SESSION_TTL_MINUTES: u64 = 60;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Front-end directory to serve at `/`. Nothing is served when unset.
    pub static_dir: Option<String>,
    /// Sessions idle for longer than this are dropped
    pub session_ttl_minutes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: None,
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: lookup("SCHEMAFORGE_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            static_dir: lookup("SCHEMAFORGE_STATIC")
                .filter(|v| !v.is_empty())
                .or(defaults.static_dir),
            session_ttl_minutes: lookup("SCHEMAFORGE_SESSION_TTL_MINUTES")
                .and_then(|v| v.parse().ok())
                .filter(|&m| m > 0)
                .unwrap_or(defaults.session_ttl_minutes),
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        i64::try_from(self.session_ttl_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or(chrono::Duration::MAX)
    }
}
