//! In-process stand-in for the wallet daemon plus scripted collaborators.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;

use simpleos_connect::{
    ActivationError, Activator, ConnectOptions, ConnectionManager, ConnectionPhase, ProbeOutcome,
    Prober, SessionStore,
};
use simpleos_connect_protocol::messages::{
    CurrentAuthorizationRequest, IsLoggedInRequest, LogInRequest,
};
use simpleos_connect_protocol::{Authorization, EventType, Message, WalletTarget};

/// How the daemon answers `transact`.
#[derive(Debug, Clone)]
pub enum TransactReply {
    Ack(Value),
    Reject(String),
}

pub struct DaemonState {
    pub sessions: Mutex<HashMap<String, Authorization>>,
    pub authorizations: Mutex<Vec<Authorization>>,
    pub transact_reply: Mutex<TransactReply>,
    /// Answer `is_logged_in` with an error.
    pub fail_session_check: AtomicBool,
    /// Answer `is_logged_in` with this payload instead of the session lookup.
    pub logged_in_reply: Mutex<Option<Value>>,
    /// Answer `get_current_authorization` without a payload.
    pub empty_current_authorization: AtomicBool,
    received: Mutex<Vec<(EventType, Value)>>,
    connections: AtomicUsize,
}

/// Websocket server speaking the wallet's request/response envelope.
pub struct FakeDaemon {
    pub port: u16,
    pub state: Arc<DaemonState>,
    kick_tx: broadcast::Sender<()>,
    accept: JoinHandle<()>,
}

impl FakeDaemon {
    pub async fn start() -> Self {
        Self::start_with_upgrade_delay(Duration::ZERO).await
    }

    /// Starts a daemon that holds every websocket upgrade for `delay`.
    pub async fn start_with_upgrade_delay(delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(DaemonState {
            sessions: Mutex::new(HashMap::new()),
            authorizations: Mutex::new(vec![Authorization::new("alice", "active")]),
            transact_reply: Mutex::new(TransactReply::Ack(
                serde_json::json!({ "transaction_id": "abc123" }),
            )),
            fail_session_check: AtomicBool::new(false),
            logged_in_reply: Mutex::new(None),
            empty_current_authorization: AtomicBool::new(false),
            received: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
        });
        let (kick_tx, _) = broadcast::channel(4);

        let accept = {
            let state = state.clone();
            let kick_tx = kick_tx.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let state = state.clone();
                    let kick_rx = kick_tx.subscribe();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                            state.connections.fetch_add(1, Ordering::SeqCst);
                            serve(ws, state, kick_rx).await;
                        }
                    });
                }
            })
        };

        Self {
            port,
            state,
            kick_tx,
            accept,
        }
    }

    /// Drops every open socket without a close handshake.
    pub fn kick(&self) {
        let _ = self.kick_tx.send(());
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<EventType> {
        self.state
            .received
            .lock()
            .unwrap()
            .iter()
            .map(|(event, _)| *event)
            .collect()
    }

    pub fn payloads(&self, event: EventType) -> Vec<Value> {
        self.state
            .received
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == event)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn grant_session(&self, token: &str, authorization: Authorization) {
        self.state
            .sessions
            .lock()
            .unwrap()
            .insert(token.to_string(), authorization);
    }

    pub fn forget_sessions(&self) {
        self.state.sessions.lock().unwrap().clear();
    }
}

impl Drop for FakeDaemon {
    fn drop(&mut self) {
        self.kick();
        self.accept.abort();
    }
}

async fn serve(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    state: Arc<DaemonState>,
    mut kick_rx: broadcast::Receiver<()>,
) {
    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            _ = kick_rx.recv() => return,
            frame = read.next() => {
                let text = match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => text,
                    Some(Ok(tungstenite::Message::Close(_))) | None | Some(Err(_)) => return,
                    Some(Ok(_)) => continue,
                };
                let Ok(request) = serde_json::from_str::<Message>(text.as_str()) else {
                    continue;
                };
                let response = handle(&state, &request);
                let json = serde_json::to_string(&response).unwrap();
                if write.send(tungstenite::Message::Text(json.into())).await.is_err() {
                    return;
                }
            }
        }
    }
}

fn handle(state: &DaemonState, request: &Message) -> Message {
    let payload: Value = request
        .parse_payload::<Value>()
        .ok()
        .flatten()
        .unwrap_or(Value::Null);
    state
        .received
        .lock()
        .unwrap()
        .push((request.event, payload));

    match request.event {
        EventType::GetAuthorizations => {
            let auths = state.authorizations.lock().unwrap().clone();
            request.reply(Some(&auths)).unwrap()
        }
        EventType::LogIn => match request.parse_payload::<LogInRequest>() {
            Ok(Some(req)) => {
                state
                    .sessions
                    .lock()
                    .unwrap()
                    .insert(req.session_uuid, req.authorization);
                request.reply::<()>(None).unwrap()
            }
            _ => request.reply_error(400, "bad log_in payload"),
        },
        EventType::LogOut => {
            state.sessions.lock().unwrap().clear();
            request.reply::<()>(None).unwrap()
        }
        EventType::IsLoggedIn => {
            if state.fail_session_check.load(Ordering::SeqCst) {
                return request.reply_error(500, "session lookup failed");
            }
            if let Some(reply) = state.logged_in_reply.lock().unwrap().clone() {
                return request.reply(Some(&reply)).unwrap();
            }
            match request.parse_payload::<IsLoggedInRequest>() {
                Ok(Some(req)) => {
                    let known = state.sessions.lock().unwrap().contains_key(&req.session_uuid);
                    request.reply(Some(&known)).unwrap()
                }
                _ => request.reply_error(400, "bad is_logged_in payload"),
            }
        }
        EventType::GetCurrentAuthorization => {
            if state.empty_current_authorization.load(Ordering::SeqCst) {
                return request.reply::<()>(None).unwrap();
            }
            match request.parse_payload::<CurrentAuthorizationRequest>() {
                Ok(Some(req)) => match state.sessions.lock().unwrap().get(&req.session_uuid) {
                    Some(auth) => request.reply(Some(auth)).unwrap(),
                    None => request.reply_error(404, "unknown session"),
                },
                _ => request.reply_error(400, "bad get_current_authorization payload"),
            }
        }
        EventType::Transact => match state.transact_reply.lock().unwrap().clone() {
            TransactReply::Ack(Value::Null) => request.reply::<()>(None).unwrap(),
            TransactReply::Ack(value) => request.reply(Some(&value)).unwrap(),
            TransactReply::Reject(reason) => request.reply_error(402, reason),
        },
    }
}

/// Reports a fixed set of ports as live and everything else as free.
pub struct StaticProber {
    live: HashSet<u16>,
}

impl StaticProber {
    pub fn new(live: impl IntoIterator<Item = u16>) -> Self {
        Self {
            live: live.into_iter().collect(),
        }
    }
}

impl Prober for StaticProber {
    fn probe(&self, ping_url: String) -> BoxFuture<'static, ProbeOutcome> {
        let port = port_of(&ping_url);
        let outcome = if self.live.contains(&port) {
            ProbeOutcome::Live
        } else {
            ProbeOutcome::Free
        };
        Box::pin(async move { outcome })
    }
}

fn port_of(url: &str) -> u16 {
    url.rsplit_once(':')
        .and_then(|(_, rest)| rest.split('/').next())
        .and_then(|p| p.parse().ok())
        .unwrap()
}

/// Records activation links instead of opening them.
#[derive(Default)]
pub struct RecordingActivator {
    links: Mutex<Vec<String>>,
}

impl RecordingActivator {
    pub fn links(&self) -> Vec<String> {
        self.links.lock().unwrap().clone()
    }
}

impl Activator for RecordingActivator {
    fn activate(&self, link: &str) -> Result<(), ActivationError> {
        self.links.lock().unwrap().push(link.to_string());
        Ok(())
    }
}

pub fn target(request_waiting_time: Duration) -> WalletTarget {
    WalletTarget {
        wallet_name: "SimpleOS".into(),
        protocol: "simpleos".into(),
        url: "http://127.0.0.1".into(),
        connection_waiting_time: Duration::from_millis(1000),
        request_waiting_time,
    }
}

/// Builds a manager scanning only `ports`, with the target already set.
pub async fn manager(
    ports: std::ops::Range<u16>,
    prober: StaticProber,
    activator: Arc<RecordingActivator>,
    store: Arc<dyn SessionStore>,
) -> ConnectionManager {
    let options = ConnectOptions {
        port_range: ports,
        request_timeout: Duration::from_secs(5),
        ..ConnectOptions::default()
    };
    let mgr = ConnectionManager::with_components(options, Arc::new(prober), activator, store);
    mgr.set_target(target(Duration::from_millis(10)))
        .await
        .unwrap();
    mgr
}

/// Polls until the manager reaches `phase`.
pub async fn wait_for_phase(mgr: &ConnectionManager, phase: ConnectionPhase) {
    for _ in 0..400 {
        if mgr.phase() == phase {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("never reached {phase:?}, stuck in {:?}", mgr.phase());
}

/// Polls until the manager reports the socket gone.
pub async fn wait_for_disconnect(mgr: &ConnectionManager) {
    for _ in 0..100 {
        if !mgr.is_wallet_connected().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("socket still connected");
}
