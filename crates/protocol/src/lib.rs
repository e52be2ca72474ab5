//! Wire types shared between the SimpleOS Connect client and the wallet daemon.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

pub use constants::EventType;
pub use envelope::{DaemonError, Message};
pub use types::{Action, Authorization, TargetError, Transaction, WalletTarget};
