//! Write pump: the only task that touches the socket's sink half.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Drains `write_rx` into the socket until cancelled or the socket fails.
///
/// A write failure cancels the whole channel so the read pump reports the
/// disconnect.
pub(crate) async fn write_pump<S>(
    mut sink: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = write_rx.recv() => frame,
        };
        let Some(frame) = frame else { break };
        let closing = matches!(frame, tungstenite::Message::Close(_));
        if let Err(e) = sink.send(frame).await {
            warn!("wallet socket write failed: {e}");
            cancel.cancel();
            return;
        }
        if closing {
            cancel.cancel();
            return;
        }
    }

    let _ = sink.send(tungstenite::Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::sink;

    fn recording_sink(
        tx: mpsc::Sender<tungstenite::Message>,
    ) -> impl futures_util::Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin {
        Box::pin(sink::unfold(tx, |tx, msg: tungstenite::Message| async move {
            let _ = tx.send(msg).await;
            Ok::<_, tungstenite::Error>(tx)
        }))
    }

    #[tokio::test]
    async fn forwards_frames_in_order() {
        let (sink_tx, mut sink_rx) = mpsc::channel(16);
        let (write_tx, write_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(write_pump(recording_sink(sink_tx), write_rx, cancel.clone()));

        write_tx
            .send(tungstenite::Message::Text(String::from("one").into()))
            .await
            .unwrap();
        write_tx
            .send(tungstenite::Message::Text(String::from("two").into()))
            .await
            .unwrap();

        for expected in ["one", "two"] {
            match sink_rx.recv().await {
                Some(tungstenite::Message::Text(t)) => assert_eq!(t.as_str(), expected),
                other => panic!("unexpected frame {other:?}"),
            }
        }

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn close_frame_ends_pump_and_cancels() {
        let (sink_tx, mut sink_rx) = mpsc::channel(16);
        let (write_tx, write_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(write_pump(recording_sink(sink_tx), write_rx, cancel.clone()));

        write_tx.send(tungstenite::Message::Close(None)).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("pump should stop")
            .expect("no panic");

        assert!(cancel.is_cancelled());
        assert!(matches!(
            sink_rx.recv().await,
            Some(tungstenite::Message::Close(_))
        ));
    }

    #[tokio::test]
    async fn cancel_sends_close() {
        let (sink_tx, mut sink_rx) = mpsc::channel(16);
        let (_write_tx, write_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(write_pump(recording_sink(sink_tx), write_rx, cancel.clone()));

        cancel.cancel();
        handle.await.unwrap();
        assert!(matches!(
            sink_rx.recv().await,
            Some(tungstenite::Message::Close(_))
        ));
    }
}
