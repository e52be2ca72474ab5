//! Public types for the connection manager.

use std::ops::Range;
use std::time::Duration;

use simpleos_connect_protocol::constants::{
    PORT_RANGE_BEGIN, PORT_RANGE_END, PROBE_TIMEOUT, SCAN_WINDOW, WS_REQUEST_TIMEOUT,
};

/// Where the connection state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No connection and no attempt in progress.
    Idle,
    /// Probing the port range.
    Scanning,
    /// Activation link sent; waiting for the wallet to start listening.
    Activating { port: u16 },
    /// Opening the socket.
    Handshaking { port: u16 },
    /// Socket open, revalidating the stored session.
    SessionCheck,
    /// Ready for requests.
    Connected,
    /// The socket went away.
    Disconnected,
}

/// Events emitted by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    PhaseChanged(ConnectionPhase),
    /// A scan finished.
    PortsScanned { free: Vec<u16>, live: Option<u16> },
    /// The wallet was asked to listen on `port`.
    ActivationRequested { port: u16, link: String },
    /// The stored session was confirmed by the wallet.
    SessionRestored,
    /// The stored session was rejected by the wallet or lost with the socket.
    SessionInvalidated,
    LoggedIn,
    LoggedOut,
}

/// Tunables for discovery and requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Candidate ports, end exclusive.
    pub port_range: Range<u16>,
    /// Deadline for one liveness probe.
    pub probe_timeout: Duration,
    /// How long a scan collects probe results.
    pub scan_window: Duration,
    /// Deadline for one request/response exchange.
    pub request_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            port_range: PORT_RANGE_BEGIN..PORT_RANGE_END,
            probe_timeout: PROBE_TIMEOUT,
            scan_window: SCAN_WINDOW,
            request_timeout: WS_REQUEST_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_cover_ten_ports() {
        let opts = ConnectOptions::default();
        assert_eq!(opts.port_range, 5000..5010);
        assert_eq!(opts.port_range.len(), 10);
        assert_eq!(opts.probe_timeout, Duration::from_millis(500));
        assert_eq!(opts.scan_window, Duration::from_millis(200));
    }

    #[test]
    fn phase_equality() {
        assert_eq!(
            ConnectionPhase::Handshaking { port: 5000 },
            ConnectionPhase::Handshaking { port: 5000 }
        );
        assert_ne!(
            ConnectionPhase::Activating { port: 5000 },
            ConnectionPhase::Handshaking { port: 5000 }
        );
    }
}
