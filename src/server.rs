//! Top-level server orchestration, analogous to the teacher's game-server
//! struct: owns the ledger, the room supervisor, and the resolved
//! settings, and wires them into the listener's accept loop with a
//! graceful farewell on Ctrl-C (§9's supplemented shutdown behavior).

use crate::config::ServerSettings;
use crate::inventory::{Inventory, Ledger};
use crate::listener;
use crate::supervisor::Supervisor;
use anyhow::Result;
use std::sync::Arc;

pub struct RoomkeeperServer {
    settings: Arc<ServerSettings>,
    ledger: Arc<Ledger>,
    supervisor: Arc<Supervisor>,
}

impl RoomkeeperServer {
    pub fn new(settings: ServerSettings, inventory: Inventory) -> Self {
        let room_capacity = settings.room_capacity;
        Self {
            settings: Arc::new(settings),
            ledger: Arc::new(Ledger::new(inventory)),
            supervisor: Arc::new(Supervisor::new(room_capacity)),
        }
    }

    /// Runs until a fatal listener error or a Ctrl-C signal, whichever
    /// comes first.
    pub async fn run(self) -> Result<()> {
        log_startup_banner(&self.ledger, &self.settings).await;

        tokio::select! {
            result = listener::run(self.settings.clone(), self.ledger.clone(), self.supervisor.clone()) => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received shutdown signal, closing down");
                Ok(())
            }
        }
    }
}

async fn log_startup_banner(ledger: &Ledger, settings: &ServerSettings) {
    tracing::info!(
        port = settings.port,
        room_capacity = settings.room_capacity,
        max_quota = settings.max_quota,
        inventory_path = %settings.inventory_path.display(),
        "roomkeeper starting up"
    );
    let snapshot = ledger.snapshot().await;
    for (item, quantity) in snapshot.iter() {
        tracing::info!(item = %item, quantity, "inventory item");
    }
}
