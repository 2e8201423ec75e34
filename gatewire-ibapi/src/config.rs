//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection settings for a [`Client`](crate::client::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub host: String,
    /// 4001/4002 for IB Gateway live/paper, 7496/7497 for TWS.
    pub port: u16,
    pub client_id: i32,
    /// Appended to the version announcement, e.g. `"+PACEAPI"`.
    pub connect_options: Option<String>,
    /// Sent in START_API when the server accepts it.
    pub optional_capabilities: String,
    /// Bound on the whole handshake, dial included.
    pub handshake_timeout_ms: u64,
    /// How long a cancelled stream keeps forwarding frames.
    pub cancel_grace_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 4002,
            client_id: 0,
            connect_options: None,
            optional_capabilities: String::new(),
            handshake_timeout_ms: 10_000,
            cancel_grace_ms: 200,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16, client_id: i32) -> Self {
        Self {
            host: host.into(),
            port,
            client_id,
            ..Default::default()
        }
    }

    /// Defaults overridden by `IB_HOST`, `IB_PORT` and `IB_CLIENT_ID`.
    ///
    /// Unset or unparsable variables keep the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("IB_HOST")
                .ok()
                .filter(|h| !h.is_empty())
                .unwrap_or(defaults.host),
            port: parse_env("IB_PORT", defaults.port),
            client_id: parse_env("IB_CLIENT_ID", defaults.client_id),
            ..Self::default()
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(name, value = %raw, "ignoring unparsable environment variable");
            default
        }),
        Err(_) => default,
    }
}
