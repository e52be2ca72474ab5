//! Read pump: routes responses to their callers and detects disconnects.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use simpleos_connect_protocol::Message;
use simpleos_connect_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PONG_WAIT};

use crate::channel::{DisconnectCallback, PendingMap};

/// Reads frames until the socket ends, errors, goes silent for
/// [`WS_PONG_WAIT`], or the channel is cancelled.
///
/// On exit the channel is marked disconnected, every pending request is
/// failed by dropping its responder, and `on_disconnect` runs once.
pub(crate) async fn read_pump<S>(
    mut read: S,
    pending: PendingMap,
    connected: Arc<AtomicBool>,
    on_disconnect: DisconnectCallback,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::sleep(WS_PONG_WAIT);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("wallet channel cancelled");
                break;
            }

            () = &mut deadline => {
                warn!("wallet socket silent for {WS_PONG_WAIT:?}, closing");
                break;
            }

            frame = read.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        warn!("wallet socket read error: {e}");
                        break;
                    }
                    None => {
                        debug!("wallet socket stream ended");
                        break;
                    }
                };

                deadline.as_mut().reset(tokio::time::Instant::now() + WS_PONG_WAIT);

                match frame {
                    tungstenite::Message::Text(text) => route_response(&text, &pending).await,
                    tungstenite::Message::Ping(data) => {
                        let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                    }
                    tungstenite::Message::Close(frame) => {
                        debug!(?frame, "wallet closed the socket");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    cancel.cancel();
    pending.lock().await.clear();
    on_disconnect();
}

/// Hands a response to the request waiting on its id.
async fn route_response(text: &str, pending: &PendingMap) {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        warn!("message too large ({} bytes), dropping", text.len());
        return;
    }

    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("failed to parse wallet message: {e}");
            return;
        }
    };

    trace!(event = %msg.event, id = %msg.id, "received response");

    match pending.lock().await.remove(&msg.id) {
        Some(tx) => {
            let _ = tx.send(msg);
        }
        None => warn!(event = %msg.event, id = %msg.id, "no request waiting, dropping"),
    }
}
