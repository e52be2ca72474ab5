//! Client for a local SimpleOS wallet daemon.
//!
//! Finds the wallet by probing a small port range, wakes it through its
//! URL scheme when nothing answers, and keeps a websocket to it for
//! login, authorization queries and transaction signing.

pub mod activation;
pub mod channel;
pub mod error;
pub mod facade;
pub mod manager;
pub mod probe;
mod pumps;
pub mod scanner;
pub mod session;
pub mod types;

pub use activation::{ActivationError, Activator, SystemActivator};
pub use channel::{ChannelError, WalletChannel};
pub use error::ConnectError;
pub use facade::SimpleosConnect;
pub use manager::ConnectionManager;
pub use probe::{HttpProber, ProbeOutcome, Prober};
pub use scanner::{PortScanner, ScanOutcome};
pub use session::{
    FileSessionStore, MemorySessionStore, SessionError, SessionStore, default_session_path,
    generate_session_token,
};
pub use types::{ConnectOptions, ConnectionEvent, ConnectionPhase};
