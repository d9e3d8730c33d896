//! Main application configuration
//!
//! This module defines the primary configuration structures for the paddock
//! race session service, including environment variable loading, TOML file
//! loading, and validation.

use crate::config::matchmaking::MatchmakingSettings;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub server: ServerSettings,
    pub matchmaking: MatchmakingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// WebSocket/HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
    /// Port for the WebSocket and health endpoints
    pub port: u16,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "paddock".to_string(),
            log_level: "info".to_string(),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Server settings
        if let Ok(host) = env::var("LISTEN_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("LISTEN_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| anyhow!("Invalid LISTEN_PORT value: {}", port))?;
        }

        // Matchmaking settings
        if let Ok(min_players) = env::var("MIN_PLAYERS_TO_START") {
            config.matchmaking.min_players_to_start = min_players
                .parse()
                .map_err(|_| anyhow!("Invalid MIN_PLAYERS_TO_START value: {}", min_players))?;
        }
        if let Ok(min_ready) = env::var("MIN_PLAYERS_READY") {
            config.matchmaking.min_players_ready = min_ready
                .parse()
                .map_err(|_| anyhow!("Invalid MIN_PLAYERS_READY value: {}", min_ready))?;
        }
        if let Ok(join_wait) = env::var("JOIN_WAIT_SECONDS") {
            config.matchmaking.join_wait_seconds = join_wait
                .parse()
                .map_err(|_| anyhow!("Invalid JOIN_WAIT_SECONDS value: {}", join_wait))?;
        }
        if let Ok(countdown) = env::var("COUNTDOWN_SECONDS") {
            config.matchmaking.countdown_seconds = countdown
                .parse()
                .map_err(|_| anyhow!("Invalid COUNTDOWN_SECONDS value: {}", countdown))?;
        }
        if let Ok(race) = env::var("RACE_DURATION_SECONDS") {
            config.matchmaking.race_duration_seconds = race
                .parse()
                .map_err(|_| anyhow!("Invalid RACE_DURATION_SECONDS value: {}", race))?;
        }
        if let Ok(map_min) = env::var("MAP_ID_MIN") {
            config.matchmaking.map_id_min = map_min
                .parse()
                .map_err(|_| anyhow!("Invalid MAP_ID_MIN value: {}", map_min))?;
        }
        if let Ok(map_max) = env::var("MAP_ID_MAX") {
            config.matchmaking.map_id_max = map_max
                .parse()
                .map_err(|_| anyhow!("Invalid MAP_ID_MAX value: {}", map_max))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get the socket address to bind the server to
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| {
                anyhow!(
                    "Invalid listen address: {}:{}",
                    self.server.host,
                    self.server.port
                )
            })
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports and timeouts
    if config.server.port == 0 {
        return Err(anyhow!("Listen port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate matchmaking settings
    if config.matchmaking.min_players_to_start < 2 {
        return Err(anyhow!("At least 2 players are required to start a race"));
    }
    if config.matchmaking.min_players_ready > config.matchmaking.min_players_to_start {
        return Err(anyhow!(
            "min_players_ready ({}) cannot exceed min_players_to_start ({})",
            config.matchmaking.min_players_ready,
            config.matchmaking.min_players_to_start
        ));
    }
    if config.matchmaking.join_wait_seconds == 0 {
        return Err(anyhow!("Join wait must be greater than 0"));
    }
    if config.matchmaking.countdown_seconds == 0 {
        return Err(anyhow!("Countdown duration must be greater than 0"));
    }
    if config.matchmaking.race_duration_seconds == 0 {
        return Err(anyhow!("Race duration must be greater than 0"));
    }
    if config.matchmaking.map_id_min > config.matchmaking.map_id_max {
        return Err(anyhow!(
            "map_id_min ({}) cannot exceed map_id_max ({})",
            config.matchmaking.map_id_min,
            config.matchmaking.map_id_max
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.service.name, "paddock");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "noisy".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_min_players_bounds() {
        let mut config = AppConfig::default();
        config.matchmaking.min_players_to_start = 1;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.matchmaking.min_players_ready = 5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_map_range_must_be_ordered() {
        let mut config = AppConfig::default();
        config.matchmaking.map_id_min = 5;
        config.matchmaking.map_id_max = 4;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_listen_addr_parses() {
        let config = AppConfig::default();
        let addr = config.listen_addr().unwrap();
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_from_toml_fragment() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [matchmaking]
            min_players_to_start = 4
            min_players_ready = 2
            join_wait_seconds = 30
            countdown_seconds = 5
            race_duration_seconds = 60
            map_id_min = 1
            map_id_max = 3
            "#,
        )
        .unwrap();

        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.matchmaking.min_players_to_start, 4);
        // Sections not present fall back to defaults
        assert_eq!(parsed.service.name, "paddock");
    }
}
