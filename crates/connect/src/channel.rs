//! Persistent websocket channel to the wallet daemon.
//!
//! Every request gets a fresh correlation id; the read pump routes the
//! matching response back to the waiting caller through a oneshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use simpleos_connect_protocol::constants::WS_MAX_MESSAGE_SIZE;
use simpleos_connect_protocol::{EventType, Message};

/// Errors from the wallet channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("websocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("wallet error {code}: {message}")]
    Daemon { code: i32, message: String },
}

/// Invoked once when the socket goes away, whatever the cause.
pub type DisconnectCallback = Box<dyn Fn() + Send + Sync>;

/// Requests waiting for their response, keyed by correlation id.
pub(crate) type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>;

/// One open socket to the wallet daemon.
pub struct WalletChannel {
    write_tx: mpsc::Sender<tungstenite::Message>,
    pending: PendingMap,
    connected: Arc<AtomicBool>,
    request_timeout: Duration,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
    _ping_handle: tokio::task::JoinHandle<()>,
    cancel: CancellationToken,
}

impl WalletChannel {
    /// Opens the socket and starts the read, write and ping pumps.
    ///
    /// The transport never reconnects on its own; `on_disconnect` fires
    /// when the read pump stops and the channel is dead from then on.
    pub async fn open(
        url: &str,
        request_timeout: Duration,
        on_disconnect: DisconnectCallback,
    ) -> Result<Self, ChannelError> {
        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false).await?;
        debug!(url, "wallet socket open");
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(64);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let write_handle = tokio::spawn(crate::pumps::write::write_pump(
            write,
            write_rx,
            cancel.clone(),
        ));

        let read_handle = tokio::spawn(crate::pumps::read::read_pump(
            read,
            pending.clone(),
            connected.clone(),
            on_disconnect,
            write_tx.clone(),
            cancel.clone(),
        ));

        let ping_handle = tokio::spawn(crate::pumps::ping::ping_pump(
            write_tx.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            write_tx,
            pending,
            connected,
            request_timeout,
            _read_handle: read_handle,
            _write_handle: write_handle,
            _ping_handle: ping_handle,
            cancel,
        })
    }

    /// Returns `true` while the socket is up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Sends `event` and waits for the daemon's response to it.
    pub async fn send<T: Serialize>(
        &self,
        event: EventType,
        payload: Option<&T>,
    ) -> Result<Message, ChannelError> {
        let id = uuid::Uuid::new_v4().to_string();
        let json = serde_json::to_string(&Message::new(&id, event, payload)?)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            // Checked under the lock: the read pump flips the flag before it
            // drains the map, so a late insert can never be stranded.
            if !self.is_connected() {
                return Err(ChannelError::Closed);
            }
            pending.insert(id.clone(), tx);
        }

        trace!(%event, %id, "sending request");
        if self
            .write_tx
            .send(tungstenite::Message::Text(json.into()))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            return Err(ChannelError::Closed);
        }

        let result = tokio::time::timeout(self.request_timeout, rx).await;
        self.pending.lock().await.remove(&id);

        match result {
            Ok(Ok(resp)) => {
                if let Some(err) = &resp.error {
                    return Err(ChannelError::Daemon {
                        code: err.code,
                        message: err.message.clone(),
                    });
                }
                Ok(resp)
            }
            Ok(Err(_)) => Err(ChannelError::Closed),
            Err(_) => Err(ChannelError::Timeout),
        }
    }

    /// Sends `event` and decodes the response payload.
    pub async fn call<T: Serialize, R: DeserializeOwned>(
        &self,
        event: EventType,
        payload: Option<&T>,
    ) -> Result<Option<R>, ChannelError> {
        let resp = self.send(event, payload).await?;
        Ok(resp.parse_payload::<R>()?)
    }

    /// Closes the socket. The disconnect callback still fires.
    pub async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.write_tx.send(tungstenite::Message::Close(None)).await;
        self.cancel.cancel();
    }
}

impl Drop for WalletChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
        self._write_handle.abort();
        self._ping_handle.abort();
    }
}
