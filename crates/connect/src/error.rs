//! Error types surfaced by the connection manager and facade.

use simpleos_connect_protocol::TargetError;

use crate::channel::ChannelError;
use crate::session::SessionError;

/// Errors returned to callers of the connect API.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("wallet not initialized")]
    NotInitialized,

    #[error("invalid wallet target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("failed to connect to wallet: no port available")]
    NoPortAvailable,

    #[error("failed to connect to wallet on port {port}")]
    HandshakeFailed { port: u16 },

    #[error("wallet not connected")]
    NotConnected,

    #[error("not logged in")]
    NotLoggedIn,

    #[error("transaction failed: {0}")]
    TransactionRejected(String),

    #[error("channel error: {0}")]
    Channel(ChannelError),

    #[error("session store error: {0}")]
    Session(#[from] SessionError),

    #[error("failed to build probe client: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<ChannelError> for ConnectError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Closed => ConnectError::NotConnected,
            other => ConnectError::Channel(other),
        }
    }
}
