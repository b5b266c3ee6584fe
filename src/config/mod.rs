//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of the human readable format
    pub log_json: bool,
    /// Allowed client origins for CORS (comma separated)
    pub client_origin: String,

    /// Simulation frames per second for each session task
    pub frame_rate: u32,
    /// Render frames pushed to the client per second
    pub snapshot_rate: u32,
    /// Entrant count when the client does not pass `players`
    pub default_entrants: u32,
    /// Upper bound on concurrently running sessions
    pub max_sessions: usize,

    /// Optional mirror tried before every asset fallback list
    pub asset_base_url: Option<String>,
    /// Timeout for a single texture/asset source
    pub asset_timeout: Duration,
    /// Timeout for a single model source
    pub model_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR when a platform injects it
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let frame_rate: u32 = parse_or("FRAME_RATE", 60)?;
        let snapshot_rate: u32 = parse_or("SNAPSHOT_RATE", 30)?;
        if frame_rate == 0 {
            return Err(ConfigError::Invalid("FRAME_RATE"));
        }
        if snapshot_rate == 0 || snapshot_rate > frame_rate {
            return Err(ConfigError::Invalid("SNAPSHOT_RATE"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            frame_rate,
            snapshot_rate,
            default_entrants: parse_or("DEFAULT_ENTRANTS", 9)?,
            max_sessions: parse_or("MAX_SESSIONS", 64)?,

            asset_base_url: env::var("ASSET_BASE_URL").ok().filter(|s| !s.trim().is_empty()),
            asset_timeout: Duration::from_millis(parse_or("ASSET_TIMEOUT_MS", 8000)?),
            model_timeout: Duration::from_millis(parse_or("MODEL_TIMEOUT_MS", 7000)?),
        })
    }

    /// Frames between two render snapshots
    pub fn snapshot_interval(&self) -> u32 {
        (self.frame_rate / self.snapshot_rate).max(1)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
            log_json: false,
            client_origin: "http://localhost:5173".to_string(),
            frame_rate: 60,
            snapshot_rate: 30,
            default_entrants: 9,
            max_sessions: 64,
            asset_base_url: None,
            asset_timeout: Duration::from_millis(8000),
            model_timeout: Duration::from_millis(7000),
        }
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
