use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{ACTIVATION_HOST, PING_PATH};

/// Errors from [`WalletTarget::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TargetError {
    #[error("wallet name is empty")]
    EmptyName,

    #[error("invalid protocol scheme: {0:?}")]
    InvalidProtocol(String),

    #[error("wallet url must start with http:// or https://: {0:?}")]
    InvalidUrl(String),
}

/// Where to look for a wallet daemon and how long to wait at each stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTarget {
    pub wallet_name: String,
    /// Scheme registered by the wallet for activation links.
    pub protocol: String,
    /// Base URL without a port, e.g. `http://localhost`.
    pub url: String,
    /// Upper bound for the socket handshake.
    #[serde(with = "duration_ms")]
    pub connection_waiting_time: Duration,
    /// Blind delay after an activation request.
    #[serde(with = "duration_ms")]
    pub request_waiting_time: Duration,
}

impl WalletTarget {
    /// Checks that the target can produce usable URLs.
    pub fn validate(&self) -> Result<(), TargetError> {
        if self.wallet_name.trim().is_empty() {
            return Err(TargetError::EmptyName);
        }
        let scheme_ok = self
            .protocol
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && self
                .protocol
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_ok {
            return Err(TargetError::InvalidProtocol(self.protocol.clone()));
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(TargetError::InvalidUrl(self.url.clone()));
        }
        Ok(())
    }

    /// `<url>:<port>`
    pub fn address(&self, port: u16) -> String {
        format!("{}:{port}", self.url.trim_end_matches('/'))
    }

    /// Liveness endpoint for `port`.
    pub fn ping_url(&self, port: u16) -> String {
        format!("{}/{PING_PATH}", self.address(port))
    }

    /// Deep link asking the wallet to start listening on `port`.
    pub fn activation_link(&self, port: u16) -> String {
        format!("{}://{ACTIVATION_HOST}/{port}", self.protocol)
    }

    /// Websocket URL for `port`.
    pub fn socket_url(&self, port: u16) -> String {
        let addr = self.address(port);
        if let Some(rest) = addr.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = addr.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            addr
        }
    }
}

/// An actor/permission pair the wallet can sign with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Authorization {
    pub actor: String,
    pub permission: String,
}

impl Authorization {
    pub fn new(actor: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            permission: permission.into(),
        }
    }
}

impl std::fmt::Display for Authorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.actor, self.permission)
    }
}

/// A single contract action inside a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub account: String,
    pub name: String,
    pub authorization: Vec<Authorization>,
    /// Opaque action payload, forwarded untouched.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// An ordered list of actions handed to the wallet for signing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub actions: Vec<Action>,
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        u64::try_from(value.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
