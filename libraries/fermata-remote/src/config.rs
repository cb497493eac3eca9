//! Remote server configuration
use crate::error::{RemoteError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Basic auth username for `/credentials`
    #[serde(default = "default_username")]
    pub username: String,

    /// Basic auth password for `/credentials`
    #[serde(default)]
    pub password: String,

    /// JWT signing secret; a random one is generated per run when unset
    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: u64,

    /// Window for a new connection to authenticate
    #[serde(default = "default_auth_timeout_ms")]
    pub auth_timeout_ms: u64,

    /// Per-session outbound queue bound; oldest messages drop first
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,

    /// Active sessions beyond this supersede the oldest (close 4001)
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Directory holding the remote web client, served at `/`
    ///
    /// The client opens its socket on its own page URL, so `/` also accepts
    /// the WebSocket upgrade; `/ws` stays available for other clients.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4333
}

fn default_username() -> String {
    "fermata".to_string()
}

fn default_token_ttl_minutes() -> u64 {
    60
}

fn default_auth_timeout_ms() -> u64 {
    5000
}

fn default_outbound_capacity() -> usize {
    64
}

fn default_max_sessions() -> usize {
    8
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
            username: default_username(),
            password: String::new(),
            secret: None,
            token_ttl_minutes: default_token_ttl_minutes(),
            auth_timeout_ms: default_auth_timeout_ms(),
            outbound_capacity: default_outbound_capacity(),
            max_sessions: default_max_sessions(),
            static_dir: None,
        }
    }
}

impl RemoteConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.username.is_empty() || self.password.is_empty() {
            return Err(RemoteError::Config(
                "remote.username and remote.password must be set when the remote is enabled"
                    .to_string(),
            ));
        }

        if self.auth_timeout_ms == 0 {
            return Err(RemoteError::Config(
                "remote.auth_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.outbound_capacity == 0 || self.max_sessions == 0 {
            return Err(RemoteError::Config(
                "remote.outbound_capacity and remote.max_sessions must be greater than zero"
                    .to_string(),
            ));
        }

        if let Some(dir) = &self.static_dir {
            if !dir.is_dir() {
                return Err(RemoteError::Config(format!(
                    "remote.static_dir {} is not a directory",
                    dir.display()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_needs_no_password() {
        assert!(RemoteConfig::default().validate().is_ok());
    }

    #[test]
    fn test_enabled_requires_password() {
        let mut config = RemoteConfig::default();
        config.enabled = true;
        assert!(config.validate().is_err());

        config.password = "hunter2".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_static_dir_rejected() {
        let mut config = RemoteConfig::default();
        config.enabled = true;
        config.password = "hunter2".to_string();
        config.static_dir = Some(PathBuf::from("/definitely/not/here"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_address() {
        let config = RemoteConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:4333");
    }
}
