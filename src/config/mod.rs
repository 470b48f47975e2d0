//! CLI argument parsing, inventory loading, and settings validation
//! (component of the ambient configuration layer, §6/§9).

mod defaults;
mod loader;
mod types;
mod validation;

pub use defaults::{DEFAULT_PORT, LISTEN_BACKLOG};
pub use loader::{load_claim_file, load_inventory_file, parse_client_args, parse_server_args};
pub use types::{ClientSettings, ConfigError, ParseOutcome, ServerSettings};
pub use validation::validate_server_settings;
