//! Connection manager driving discovery, activation, handshake and session
//! revalidation against the local wallet.
//!
//! `connect()` walks `Idle → Scanning → Activating → Handshaking →
//! SessionCheck → Connected`. Any socket disconnect drops the session, both
//! in memory and in the store, because the session was only ever valid
//! for the socket that confirmed it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, trace, warn};

use simpleos_connect_protocol::messages::{
    CurrentAuthorizationRequest, GetAuthorizationsRequest, IsLoggedInRequest, LogInRequest,
};
use simpleos_connect_protocol::{Authorization, EventType, Transaction, WalletTarget};

use crate::activation::{Activator, SystemActivator};
use crate::channel::{ChannelError, DisconnectCallback, WalletChannel};
use crate::error::ConnectError;
use crate::probe::{HttpProber, Prober};
use crate::scanner::PortScanner;
use crate::session::{SessionStore, generate_session_token};
use crate::types::{ConnectOptions, ConnectionEvent, ConnectionPhase};

/// Socket and port of the current connection.
///
/// The session token lives in [`ManagerContext`] instead, because the
/// disconnect callback has to clear it without awaiting.
#[derive(Default)]
struct ConnectionState {
    channel: Option<Arc<WalletChannel>>,
    /// 0 when no port is bound.
    port: u16,
}

/// State shared with the disconnect callback.
#[derive(Clone)]
struct ManagerContext {
    store: Arc<dyn SessionStore>,
    session: Arc<std::sync::Mutex<Option<String>>>,
    phase: Arc<std::sync::RwLock<ConnectionPhase>>,
    /// Bumped for every socket; callbacks from older sockets are ignored.
    generation: Arc<AtomicU64>,
    events_tx: mpsc::Sender<ConnectionEvent>,
}

impl ManagerContext {
    fn emit(&self, event: ConnectionEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            trace!("connection event not delivered: {e}");
        }
    }

    fn set_phase(&self, phase: ConnectionPhase) {
        if let Ok(mut current) = self.phase.write() {
            if *current == phase {
                return;
            }
            debug!(from = ?*current, to = ?phase, "connection phase");
            *current = phase;
        }
        self.emit(ConnectionEvent::PhaseChanged(phase));
    }

    fn phase(&self) -> ConnectionPhase {
        self.phase
            .read()
            .map(|p| *p)
            .unwrap_or(ConnectionPhase::Idle)
    }

    fn session(&self) -> Option<String> {
        self.session.lock().ok().and_then(|s| s.clone())
    }

    fn set_session(&self, token: Option<String>) {
        if let Ok(mut slot) = self.session.lock() {
            *slot = token;
        }
    }

    /// Forgets the session in memory and in the store.
    fn invalidate_session(&self) {
        let had_session = self.session.lock().ok().and_then(|mut s| s.take()).is_some();
        if let Err(e) = self.store.clear() {
            warn!("failed to clear stored session: {e}");
        }
        if had_session {
            self.emit(ConnectionEvent::SessionInvalidated);
        }
    }
}

/// Builds the callback a socket runs when it goes away.
fn disconnect_callback(ctx: ManagerContext, generation: u64) -> DisconnectCallback {
    Box::new(move || {
        if ctx.generation.load(Ordering::SeqCst) != generation {
            trace!(generation, "ignoring disconnect from superseded socket");
            return;
        }
        info!("wallet socket disconnected, dropping session");
        ctx.invalidate_session();
        ctx.set_phase(ConnectionPhase::Disconnected);
    })
}

/// Connection manager for a single wallet.
pub struct ConnectionManager {
    options: ConnectOptions,
    scanner: PortScanner,
    activator: Arc<dyn Activator>,
    target: std::sync::RwLock<Option<WalletTarget>>,
    conn: Mutex<ConnectionState>,
    /// Serialises `connect()` calls.
    connect_lock: Mutex<()>,
    ctx: ManagerContext,
    events_rx: Mutex<Option<mpsc::Receiver<ConnectionEvent>>>,
}

impl ConnectionManager {
    /// Creates a manager that probes over HTTP and activates through the
    /// desktop's URL handler.
    pub fn new(options: ConnectOptions, store: Arc<dyn SessionStore>) -> Result<Self, ConnectError> {
        let prober = Arc::new(HttpProber::new(options.probe_timeout)?);
        Ok(Self::with_components(
            options,
            prober,
            Arc::new(SystemActivator),
            store,
        ))
    }

    /// Creates a manager from explicit collaborators.
    pub fn with_components(
        options: ConnectOptions,
        prober: Arc<dyn Prober>,
        activator: Arc<dyn Activator>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        let scanner = PortScanner::new(prober, options.port_range.clone(), options.scan_window);

        Self {
            options,
            scanner,
            activator,
            target: std::sync::RwLock::new(None),
            conn: Mutex::new(ConnectionState::default()),
            connect_lock: Mutex::new(()),
            ctx: ManagerContext {
                store,
                session: Arc::new(std::sync::Mutex::new(None)),
                phase: Arc::new(std::sync::RwLock::new(ConnectionPhase::Idle)),
                generation: Arc::new(AtomicU64::new(0)),
                events_tx,
            },
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<ConnectionEvent>> {
        self.events_rx.lock().await.take()
    }

    /// Sets the wallet to connect to.
    ///
    /// Switching to a different target drops the current connection so the
    /// bound port and socket never outlive the target they were found for.
    pub async fn set_target(&self, target: WalletTarget) -> Result<(), ConnectError> {
        target.validate()?;
        if self.target().as_ref() != Some(&target) {
            self.disconnect().await;
        }
        info!(wallet = %target.wallet_name, url = %target.url, "wallet target set");
        if let Ok(mut slot) = self.target.write() {
            *slot = Some(target);
        }
        Ok(())
    }

    /// Returns the current wallet target.
    pub fn target(&self) -> Option<WalletTarget> {
        self.target.read().ok().and_then(|t| t.clone())
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.ctx.phase()
    }

    /// Port of the current or last connection, 0 if none.
    pub async fn bound_port(&self) -> u16 {
        self.conn.lock().await.port
    }

    /// Returns `true` if a session is active in memory.
    pub fn has_session(&self) -> bool {
        self.ctx.session().is_some()
    }

    /// Returns `true` if the store holds a session token.
    pub fn session_created(&self) -> bool {
        self.ctx.store.load().is_some()
    }

    /// Returns `true` if a socket is open and connected.
    pub async fn is_wallet_connected(&self) -> bool {
        self.live_channel().await.is_ok()
    }

    /// Finds, wakes if needed, and connects to the wallet.
    ///
    /// Returns immediately if already connected. A `disconnect()` issued
    /// while this runs wins: the attempt is abandoned with `NotConnected`
    /// at the next stage boundary.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let target = self.target().ok_or(ConnectError::NotInitialized)?;
        let _serial = self.connect_lock.lock().await;

        if self.is_wallet_connected().await {
            debug!("wallet already connected");
            return Ok(());
        }
        let attempt = self.ctx.generation.load(Ordering::SeqCst);

        self.ctx.set_phase(ConnectionPhase::Scanning);
        let scan = self.scanner.scan(&target).await;
        self.ctx.emit(ConnectionEvent::PortsScanned {
            free: scan.free.clone(),
            live: scan.live,
        });
        if !self.is_current(attempt) {
            return Err(self.abandon(None).await);
        }

        let known_port = {
            let mut conn = self.conn.lock().await;
            if let Some(live) = scan.live {
                conn.port = live;
            }
            conn.port
        };

        let port = if known_port != 0 {
            debug!(port = known_port, "wallet port already known");
            known_port
        } else {
            let Some(&port) = scan.free.first() else {
                warn!(range = ?self.scanner.range(), "no free port to activate the wallet on");
                self.ctx.set_phase(ConnectionPhase::Idle);
                return Err(ConnectError::NoPortAvailable);
            };
            self.conn.lock().await.port = port;
            self.activate(&target, port).await;
            port
        };

        // Claim the next generation for this socket; fails if a disconnect
        // slipped in since the attempt started.
        let generation = attempt + 1;
        if self
            .ctx
            .generation
            .compare_exchange(attempt, generation, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(self.abandon(None).await);
        }

        let channel = match self.handshake(&target, port, generation).await {
            Ok(channel) => Arc::new(channel),
            Err(e) => {
                if !self.is_current(generation) {
                    return Err(self.abandon(None).await);
                }
                self.reset(ConnectionPhase::Idle).await;
                return Err(e);
            }
        };

        {
            // disconnect() bumps the generation under this lock, so either it
            // sees the channel and closes it, or we see its bump here.
            let mut conn = self.conn.lock().await;
            if !self.is_current(generation) {
                drop(conn);
                return Err(self.abandon(Some(&channel)).await);
            }
            conn.channel = Some(channel.clone());
        }

        let checked = self.check_session(&channel).await;
        if !self.is_current(generation) {
            return Err(self.abandon(Some(&channel)).await);
        }
        if let Err(e) = checked {
            warn!("session check failed: {e}");
            // Reset first so the socket's disconnect callback is already stale.
            self.reset(ConnectionPhase::Idle).await;
            channel.close().await;
            return Err(e);
        }

        if !channel.is_connected() {
            self.reset(ConnectionPhase::Idle).await;
            return Err(ConnectError::HandshakeFailed { port });
        }

        {
            let conn = self.conn.lock().await;
            if !self.is_current(generation) {
                drop(conn);
                return Err(self.abandon(Some(&channel)).await);
            }
            self.ctx.set_phase(ConnectionPhase::Connected);
        }
        info!(port, logged_in = self.has_session(), "connected to wallet");
        Ok(())
    }

    /// Closes the socket and resets the connection state.
    ///
    /// Also supersedes a `connect()` in progress.
    pub async fn disconnect(&self) {
        let channel = {
            let mut conn = self.conn.lock().await;
            self.ctx.generation.fetch_add(1, Ordering::SeqCst);
            std::mem::take(&mut *conn).channel
        };
        if let Some(channel) = channel {
            channel.close().await;
            self.ctx.invalidate_session();
            self.ctx.set_phase(ConnectionPhase::Disconnected);
            info!("disconnected from wallet");
        }
    }

    /// Lists the authorizations the wallet offers for `chain_id`.
    pub async fn authorizations(&self, chain_id: &str) -> Result<Vec<Authorization>, ConnectError> {
        let channel = self.live_channel().await?;
        let req = GetAuthorizationsRequest {
            chain_id: chain_id.to_string(),
        };
        let auths = channel
            .call::<_, Vec<Authorization>>(EventType::GetAuthorizations, Some(&req))
            .await?;
        Ok(auths.unwrap_or_default())
    }

    /// Opens a session for `authorization`.
    ///
    /// The token is stored only after the wallet acknowledges it.
    pub async fn login(&self, authorization: Authorization) -> Result<(), ConnectError> {
        let channel = self.live_channel().await?;
        let token = generate_session_token();
        let req = LogInRequest {
            session_uuid: token.clone(),
            authorization,
        };
        channel.send(EventType::LogIn, Some(&req)).await?;

        self.ctx.store.save(&token)?;
        self.ctx.set_session(Some(token));
        info!(authorization = %req.authorization, "logged in to wallet");
        self.ctx.emit(ConnectionEvent::LoggedIn);
        Ok(())
    }

    /// Ends the current session.
    pub async fn logout(&self) -> Result<(), ConnectError> {
        let channel = self.live_channel().await?;
        channel.send::<()>(EventType::LogOut, None).await?;

        self.ctx.set_session(None);
        self.ctx.store.clear()?;
        info!("logged out of wallet");
        self.ctx.emit(ConnectionEvent::LoggedOut);
        Ok(())
    }

    /// Asks the wallet whether the current session is logged in.
    ///
    /// Without a local session the answer is `false` and nothing is sent.
    pub async fn is_logged_in(&self) -> Result<bool, ConnectError> {
        let channel = self.live_channel().await?;
        match self.ctx.session() {
            Some(token) => Ok(query_logged_in(&channel, &token).await?),
            None => Ok(false),
        }
    }

    /// Returns the authorization the current session was opened with.
    pub async fn current_authorization(&self) -> Result<Authorization, ConnectError> {
        let channel = self.live_channel().await?;
        let token = self.require_session(&channel).await?;
        let req = CurrentAuthorizationRequest {
            session_uuid: token,
        };
        channel
            .call::<_, Authorization>(EventType::GetCurrentAuthorization, Some(&req))
            .await?
            .ok_or(ConnectError::NotLoggedIn)
    }

    /// Hands `transaction` to the wallet for signing and broadcast.
    ///
    /// Returns the wallet's acknowledgment. A falsy acknowledgment or a
    /// wallet-side error is a [`ConnectError::TransactionRejected`].
    pub async fn submit_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<serde_json::Value, ConnectError> {
        let channel = self.live_channel().await?;
        self.require_session(&channel).await?;

        let ack = match channel
            .call::<_, serde_json::Value>(EventType::Transact, Some(transaction))
            .await
        {
            Ok(ack) => ack.unwrap_or(serde_json::Value::Null),
            Err(ChannelError::Daemon { message, .. }) => {
                warn!("wallet rejected transaction: {message}");
                return Err(ConnectError::TransactionRejected(message));
            }
            Err(e) => return Err(e.into()),
        };

        if !is_truthy(&ack) {
            warn!(ack = %ack, "wallet returned no transaction result");
            return Err(ConnectError::TransactionRejected(
                "wallet returned no result".into(),
            ));
        }
        info!(actions = transaction.actions.len(), "transaction accepted");
        Ok(ack)
    }

    async fn live_channel(&self) -> Result<Arc<WalletChannel>, ConnectError> {
        self.conn
            .lock()
            .await
            .channel
            .clone()
            .filter(|c| c.is_connected())
            .ok_or(ConnectError::NotConnected)
    }

    /// Returns the session token if the wallet still honours it.
    async fn require_session(&self, channel: &WalletChannel) -> Result<String, ConnectError> {
        let token = self.ctx.session().ok_or(ConnectError::NotLoggedIn)?;
        if !query_logged_in(channel, &token).await? {
            return Err(ConnectError::NotLoggedIn);
        }
        Ok(token)
    }

    async fn activate(&self, target: &WalletTarget, port: u16) {
        self.ctx.set_phase(ConnectionPhase::Activating { port });
        let link = target.activation_link(port);
        info!(port, %link, "requesting wallet activation");
        if let Err(e) = self.activator.activate(&link) {
            warn!("activation request failed: {e}");
        }
        self.ctx
            .emit(ConnectionEvent::ActivationRequested { port, link });

        // The wallet never acknowledges activation; give it a fixed head start.
        tokio::time::sleep(target.request_waiting_time).await;
    }

    async fn handshake(
        &self,
        target: &WalletTarget,
        port: u16,
        generation: u64,
    ) -> Result<WalletChannel, ConnectError> {
        self.ctx.set_phase(ConnectionPhase::Handshaking { port });
        let url = target.socket_url(port);
        let on_disconnect = disconnect_callback(self.ctx.clone(), generation);

        let open = WalletChannel::open(&url, self.options.request_timeout, on_disconnect);
        match tokio::time::timeout(target.connection_waiting_time, open).await {
            Ok(Ok(channel)) => {
                debug!(%url, "wallet handshake complete");
                Ok(channel)
            }
            Ok(Err(e)) => {
                warn!(%url, error = %e, "wallet handshake failed");
                Err(ConnectError::HandshakeFailed { port })
            }
            Err(_) => {
                warn!(%url, wait = ?target.connection_waiting_time, "wallet handshake timed out");
                Err(ConnectError::HandshakeFailed { port })
            }
        }
    }

    async fn check_session(&self, channel: &WalletChannel) -> Result<(), ConnectError> {
        self.ctx.set_phase(ConnectionPhase::SessionCheck);
        let Some(token) = self.ctx.store.load() else {
            self.ctx.set_session(None);
            return Ok(());
        };

        if query_logged_in(channel, &token).await? {
            debug!("stored session confirmed by wallet");
            self.ctx.set_session(Some(token));
            self.ctx.emit(ConnectionEvent::SessionRestored);
        } else {
            info!("stored session rejected by wallet, clearing");
            self.ctx.set_session(None);
            self.ctx.store.clear()?;
            self.ctx.emit(ConnectionEvent::SessionInvalidated);
        }
        Ok(())
    }

    /// Drops socket, port and in-memory session after a failed attempt.
    async fn reset(&self, phase: ConnectionPhase) {
        {
            let mut conn = self.conn.lock().await;
            self.ctx.generation.fetch_add(1, Ordering::SeqCst);
            *conn = ConnectionState::default();
        }
        self.ctx.set_session(None);
        self.ctx.set_phase(phase);
    }

    /// `true` while no disconnect or reset happened since `generation`.
    fn is_current(&self, generation: u64) -> bool {
        self.ctx.generation.load(Ordering::SeqCst) == generation
    }

    /// Gives up a `connect()` overtaken by `disconnect()`.
    async fn abandon(&self, channel: Option<&WalletChannel>) -> ConnectError {
        info!("disconnect requested during connect, abandoning attempt");
        self.reset(ConnectionPhase::Disconnected).await;
        if let Some(channel) = channel {
            channel.close().await;
        }
        ConnectError::NotConnected
    }
}

impl Drop for ConnectionManager {
    /// Dropping the manager is not a disconnect: the socket's callback is
    /// silenced so the stored session survives for the next process.
    fn drop(&mut self) {
        self.ctx.generation.fetch_add(1, Ordering::SeqCst);
    }
}

async fn query_logged_in(channel: &WalletChannel, token: &str) -> Result<bool, ChannelError> {
    let req = IsLoggedInRequest {
        session_uuid: token.to_string(),
    };
    let logged_in = channel
        .call::<_, serde_json::Value>(EventType::IsLoggedIn, Some(&req))
        .await?;
    Ok(logged_in.as_ref().is_some_and(is_truthy))
}

/// JavaScript-style truthiness of a wallet acknowledgment.
fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}
