//! Connects to the wallet and runs the configured requests.

use std::sync::Arc;

use anyhow::Context;

use simpleos_connect::{
    ConnectionEvent, FileSessionStore, SimpleosConnect, default_session_path,
};
use simpleos_connect_protocol::Transaction;

use crate::config::CliConfig;

pub async fn run(config: CliConfig) -> anyhow::Result<()> {
    let session_path = match config.session_file.clone() {
        Some(path) => path,
        None => default_session_path().context("no config directory for the session file")?,
    };
    let store = Arc::new(FileSessionStore::new(session_path)?);
    tracing::debug!(path = %store.path().display(), "session store opened");
    let client = SimpleosConnect::new(store)?;

    if let Some(mut events) = client.manager().take_events().await {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ConnectionEvent::ActivationRequested { port, link } => {
                        tracing::info!(port, %link, "asked wallet to start listening");
                    }
                    ConnectionEvent::SessionInvalidated => {
                        tracing::info!("previous session is no longer valid");
                    }
                    other => tracing::debug!(event = ?other, "connection event"),
                }
            }
        });
    }

    client.init_wallet(config.wallet.clone()).await?;
    client.connect_wallet().await?;
    tracing::info!(
        port = client.manager().bound_port().await,
        restored = client.manager().has_session(),
        "wallet connected"
    );

    let authorizations = client.get_authorizations(&config.chain_id).await?;
    for auth in &authorizations {
        println!("{auth}");
    }

    if config.login && !client.is_logged_in().await? {
        let auth = authorizations
            .first()
            .cloned()
            .context("wallet offered no authorizations to log in with")?;
        client.log_in(auth).await?;
    }

    if let Some(path) = &config.transaction_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let transaction: Transaction = serde_json::from_str(&content)?;
        let ack = client.transact(&transaction).await?;
        println!("{ack}");
    }

    // Dropping the client keeps the stored session for the next run;
    // disconnect_wallet() would end it.
    Ok(())
}
