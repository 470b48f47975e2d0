//! TCP accept loop (component C7): binds the well-known port, accepts
//! connections, and hands each one to the admission handler on its own
//! task. A transient accept error is logged and the loop continues; a
//! fatal bind failure is fatal to the process.

use crate::admission;
use crate::config::{ServerSettings, LISTEN_BACKLOG};
use crate::inventory::Ledger;
use crate::supervisor::Supervisor;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Binds the listening socket. Split out from [`serve`] so tests can bind
/// an ephemeral port (`settings.port == 0`) and read back the address the
/// OS actually assigned.
pub async fn bind(settings: &ServerSettings) -> Result<TcpListener> {
    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    // tokio's listener binds with a fixed OS-level backlog; LISTEN_BACKLOG
    // documents the originally intended queue depth for operators reading
    // the startup log rather than a value actually plumbed into listen(2).
    tracing::info!(addr = %listener.local_addr()?, backlog = LISTEN_BACKLOG, "listening for connections");
    Ok(listener)
}

/// Runs the accept loop against an already-bound listener until a fatal
/// accept error. Transient errors are logged and the loop continues.
pub async fn serve(
    listener: TcpListener,
    settings: Arc<ServerSettings>,
    ledger: Arc<Ledger>,
    supervisor: Arc<Supervisor>,
) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                tracing::debug!(%peer, "accepted connection");
                if let Err(err) = socket.set_nodelay(true) {
                    tracing::debug!(%peer, %err, "failed to set TCP_NODELAY");
                }
                tokio::spawn(admission::handle_connection(
                    socket,
                    ledger.clone(),
                    supervisor.clone(),
                    settings.clone(),
                ));
            }
            Err(err) => {
                tracing::warn!(%err, "transient accept failure, continuing");
            }
        }
    }
}

/// Binds and serves in one call; what the server binary actually runs.
pub async fn run(
    settings: Arc<ServerSettings>,
    ledger: Arc<Ledger>,
    supervisor: Arc<Supervisor>,
) -> Result<()> {
    let listener = bind(&settings).await?;
    serve(listener, settings, ledger, supervisor).await
}
