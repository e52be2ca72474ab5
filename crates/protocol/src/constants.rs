use std::time::Duration;

use serde::{Deserialize, Serialize};

/// First port of the discovery range (inclusive).
pub const PORT_RANGE_BEGIN: u16 = 5000;

/// End of the discovery range (exclusive).
pub const PORT_RANGE_END: u16 = 5010;

/// Path of the daemon's HTTP liveness endpoint.
pub const PING_PATH: &str = "simpleos_ping";

/// Host component of the activation deep link.
pub const ACTIVATION_HOST: &str = "websocket_connection";

/// Deadline for a single liveness probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// How long the scanner collects probe results before returning.
///
/// Shorter than [`PROBE_TIMEOUT`]: a port that neither answers nor refuses
/// within this window is left out of both the free and the live set.
pub const SCAN_WINDOW: Duration = Duration::from_millis(200);

/// Time to wait for any incoming frame before the socket is considered dead.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// How often the client pings the daemon.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(10);

/// Maximum inbound message size in bytes (4 MB).
pub const WS_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Timeout for a single request/response exchange.
pub const WS_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Storage key under which the session token is persisted.
pub const SESSION_KEY: &str = "session_uuid";

/// RPC event understood by the wallet daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    GetAuthorizations,
    LogIn,
    LogOut,
    IsLoggedIn,
    GetCurrentAuthorization,
    Transact,
}

impl EventType {
    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::GetAuthorizations => "get_authorizations",
            EventType::LogIn => "log_in",
            EventType::LogOut => "log_out",
            EventType::IsLoggedIn => "is_logged_in",
            EventType::GetCurrentAuthorization => "get_current_authorization",
            EventType::Transact => "transact",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
