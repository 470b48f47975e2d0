//! `roomkeeper-server` entry point: parse CLI flags, load the startup
//! inventory, and run until a fatal error or Ctrl-C.

use anyhow::Result;
use roomkeeper::config::{self, ParseOutcome};
use roomkeeper::logging::{self, LoggingConfig};
use roomkeeper::server::RoomkeeperServer;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let settings = match config::parse_server_args(&args) {
        Ok(ParseOutcome::Settings(settings)) => settings,
        Ok(ParseOutcome::PrintConfig) => {
            println!("default port: {}", config::DEFAULT_PORT);
            println!("usage: roomkeeper-server -p <players_per_room> -q <max_quota_per_player> -i <inventory_file>");
            return Ok(());
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = config::validate_server_settings(&settings) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    logging::init(&LoggingConfig {
        file_dir: settings.log_dir.clone(),
    });

    let inventory = match config::load_inventory_file(&settings.inventory_path) {
        Ok(inventory) => inventory,
        Err(err) => {
            tracing::error!(%err, "failed to load inventory file");
            std::process::exit(1);
        }
    };

    RoomkeeperServer::new(settings, inventory).run().await
}
