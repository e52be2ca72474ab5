//! Liveness probe for a single candidate port.

use std::time::Duration;

use futures_util::future::BoxFuture;
use tracing::trace;

/// What a finished probe saw on a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Something answered the ping; a wallet already owns the port.
    Live,
    /// Refused, errored, or timed out; the port can be offered for activation.
    Free,
}

/// Checks whether a wallet answers on a port.
///
/// The future is `'static` so the scanner can spawn it and walk away if it
/// runs past the scan window.
pub trait Prober: Send + Sync {
    fn probe(&self, ping_url: String) -> BoxFuture<'static, ProbeOutcome>;
}

/// Probes the wallet's HTTP ping endpoint.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    /// Builds a prober whose requests give up after `timeout`.
    ///
    /// The wallet always lives on this machine, so system proxies are
    /// bypassed.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

impl Prober for HttpProber {
    fn probe(&self, ping_url: String) -> BoxFuture<'static, ProbeOutcome> {
        let client = self.client.clone();
        Box::pin(async move {
            match client.get(&ping_url).send().await {
                Ok(resp) => {
                    trace!(url = %ping_url, status = %resp.status(), "ping answered");
                    ProbeOutcome::Live
                }
                Err(e) => {
                    trace!(url = %ping_url, "ping failed: {e}");
                    ProbeOutcome::Free
                }
            }
        })
    }
}
