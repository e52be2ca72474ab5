//! Concurrent port discovery.
//!
//! One probe task per candidate port, all racing a single scan window.
//! Whatever has reported by the end of the window counts; anything still
//! running is left to finish on its own and its result is thrown away.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use simpleos_connect_protocol::WalletTarget;

use crate::probe::{ProbeOutcome, Prober};

/// Ports observed during one scan window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Ports that refused or failed the ping, ascending.
    pub free: Vec<u16>,
    /// The first port that answered the ping.
    pub live: Option<u16>,
}

/// Races a [`Prober`] across a port range.
#[derive(Clone)]
pub struct PortScanner {
    prober: Arc<dyn Prober>,
    range: Range<u16>,
    window: Duration,
}

impl PortScanner {
    pub fn new(prober: Arc<dyn Prober>, range: Range<u16>, window: Duration) -> Self {
        Self {
            prober,
            range,
            window,
        }
    }

    pub fn range(&self) -> Range<u16> {
        self.range.clone()
    }

    /// Probes every port in the range and returns after the scan window.
    pub async fn scan(&self, target: &WalletTarget) -> ScanOutcome {
        let (tx, mut rx) = mpsc::unbounded_channel::<(u16, ProbeOutcome)>();

        for port in self.range.clone() {
            let probe = self.prober.probe(target.ping_url(port));
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = probe.await;
                // The receiver is gone once the window closed; late results
                // are dropped here.
                let _ = tx.send((port, outcome));
            });
        }
        drop(tx);

        tokio::time::sleep(self.window).await;

        let mut outcome = ScanOutcome::default();
        while let Ok((port, result)) = rx.try_recv() {
            match result {
                ProbeOutcome::Live => {
                    if outcome.live.is_none() {
                        outcome.live = Some(port);
                    }
                }
                ProbeOutcome::Free => outcome.free.push(port),
            }
        }
        outcome.free.sort_unstable();

        debug!(
            range = ?self.range,
            free = ?outcome.free,
            live = ?outcome.live,
            "port scan finished"
        );
        outcome
    }
}
