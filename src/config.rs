//! Configuration for combridge.
//!
//! Loaded from `~/.combridge/config.toml`; credentials may instead come
//! from the environment (`COM_HOST`, `COM_PORT`, `COM_USERNAME`,
//! `COM_SECRET`), which takes precedence over the file.
//!
//! # Configuration File
//!
//! ```toml
//! [connection]
//! host = "sdf.org"
//! port = 22
//! username = "someone"
//! secret = "hunter2"
//!
//! [screen]
//! cols = 80
//! rows = 24
//! scrollback_limit = 1000
//!
//! [timing]
//! poll_interval_ms = 3000
//! connect_timeout_secs = 30
//! prompt_wait_ms = 2000
//!
//! [reconnect]
//! max_attempts = 5
//! base_delay_ms = 1000
//! max_delay_ms = 30000
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::session::LoginPolicy;
use crate::protocol::adapter::AdapterOptions;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub screen: ScreenConfig,
    pub timing: TimingConfig,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub secret: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "sdf.org".to_string(),
            port: 22,
            username: String::new(),
            secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub cols: u16,
    pub rows: u16,
    pub scrollback_limit: usize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            scrollback_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_ms: u64,
    pub connect_timeout_secs: u64,
    pub login_settle_ms: u64,
    pub login_reprompt_limit: u32,
    pub prompt_wait_ms: u64,
    pub desync_limit: u32,
    pub recent_limit: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            connect_timeout_secs: 30,
            login_settle_ms: 700,
            login_reprompt_limit: 2,
            prompt_wait_ms: 2000,
            desync_limit: 5,
            recent_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl Config {
    /// Load from the config file, then let environment variables override
    /// the connection block.
    pub fn load() -> Self {
        let mut config = Self::load_file().unwrap_or_default();
        config.apply_env();
        config
    }

    fn load_file() -> Option<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return None;
        }
        let content = fs::read_to_string(&path).ok()?;
        toml::from_str(&content).ok()
    }

    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("COM_HOST") {
            self.connection.host = host;
        }
        if let Ok(port) = std::env::var("COM_PORT") {
            if let Ok(port) = port.parse() {
                self.connection.port = port;
            }
        }
        if let Ok(username) = std::env::var("COM_USERNAME") {
            self.connection.username = username;
        }
        if let Ok(secret) = std::env::var("COM_SECRET") {
            self.connection.secret = secret;
        }
    }

    /// Config file path, creating the directory on first use.
    fn config_path() -> Option<PathBuf> {
        let home = home_dir()?;
        let dir = home.join(".combridge");
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir.join("config.toml"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.timing.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.connect_timeout_secs)
    }

    pub fn login_policy(&self) -> LoginPolicy {
        LoginPolicy {
            timeout: self.connect_timeout(),
            settle: Duration::from_millis(self.timing.login_settle_ms),
            reprompt_limit: self.timing.login_reprompt_limit,
        }
    }

    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            prompt_wait: Duration::from_millis(self.timing.prompt_wait_ms),
            settle: Duration::from_millis(self.timing.login_settle_ms.min(300)),
            desync_limit: self.timing.desync_limit,
            recent_limit: self.timing.recent_limit,
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = Config::default();
        assert_eq!(config.screen.cols, 80);
        assert_eq!(config.screen.rows, 24);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert!(config.poll_interval() >= Duration::from_millis(100));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            host = "example.net"
            username = "op"
            "#,
        )
        .unwrap();
        assert_eq!(config.connection.host, "example.net");
        assert_eq!(config.connection.port, 22);
        assert_eq!(config.timing.poll_interval_ms, 3000);
    }
}
