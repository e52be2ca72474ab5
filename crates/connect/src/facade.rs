//! Application-facing entry point.

use std::sync::Arc;

use simpleos_connect_protocol::{Authorization, Transaction, WalletTarget};

use crate::error::ConnectError;
use crate::manager::ConnectionManager;
use crate::session::SessionStore;
use crate::types::ConnectOptions;

/// Client for a local SimpleOS wallet.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use simpleos_connect::{MemorySessionStore, SimpleosConnect};
/// # use simpleos_connect_protocol::{Authorization, WalletTarget};
/// # async fn run() -> Result<(), simpleos_connect::ConnectError> {
/// let client = SimpleosConnect::new(Arc::new(MemorySessionStore::new()))?;
/// client
///     .init_wallet(WalletTarget {
///         wallet_name: "SimpleOS".into(),
///         protocol: "simpleos".into(),
///         url: "http://localhost".into(),
///         connection_waiting_time: Duration::from_millis(1000),
///         request_waiting_time: Duration::from_millis(500),
///     })
///     .await?;
/// client.connect_wallet().await?;
/// client.log_in(Authorization::new("alice", "active")).await?;
/// # Ok(())
/// # }
/// ```
pub struct SimpleosConnect {
    manager: Arc<ConnectionManager>,
}

impl SimpleosConnect {
    /// Creates a client with default options.
    pub fn new(store: Arc<dyn SessionStore>) -> Result<Self, ConnectError> {
        Ok(Self::from_manager(ConnectionManager::new(
            ConnectOptions::default(),
            store,
        )?))
    }

    pub fn from_manager(manager: ConnectionManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }

    /// Validates and records the wallet to talk to.
    pub async fn init_wallet(&self, target: WalletTarget) -> Result<(), ConnectError> {
        self.manager.set_target(target).await
    }

    pub fn wallet(&self) -> Option<WalletTarget> {
        self.manager.target()
    }

    /// Returns `true` if a session token is stored.
    pub fn session_created(&self) -> bool {
        self.manager.session_created()
    }

    pub async fn connect_wallet(&self) -> Result<(), ConnectError> {
        self.manager.connect().await
    }

    pub async fn disconnect_wallet(&self) {
        self.manager.disconnect().await
    }

    pub async fn is_wallet_connected(&self) -> bool {
        self.manager.is_wallet_connected().await
    }

    pub async fn get_authorizations(
        &self,
        chain_id: &str,
    ) -> Result<Vec<Authorization>, ConnectError> {
        self.manager.authorizations(chain_id).await
    }

    pub async fn log_in(&self, authorization: Authorization) -> Result<(), ConnectError> {
        self.manager.login(authorization).await
    }

    pub async fn log_out(&self) -> Result<(), ConnectError> {
        self.manager.logout().await
    }

    pub async fn is_logged_in(&self) -> Result<bool, ConnectError> {
        self.manager.is_logged_in().await
    }

    pub async fn get_current_authorization(&self) -> Result<Authorization, ConnectError> {
        self.manager.current_authorization().await
    }

    /// Submits a transaction and returns the wallet's acknowledgment.
    pub async fn transact(
        &self,
        transaction: &Transaction,
    ) -> Result<serde_json::Value, ConnectError> {
        self.manager.submit_transaction(transaction).await
    }

    /// Underlying manager, for phase inspection and events.
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }
}
