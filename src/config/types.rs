//! Settings structs produced by CLI parsing and the errors that can stop a
//! binary before it ever opens a socket.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fully validated settings for the `roomkeeper-server` binary.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Always [`super::defaults::DEFAULT_PORT`] in production; overridable
    /// only by tests that need an ephemeral port (`0`), since neither CLI
    /// grammar of §6 carries a port argument.
    pub port: u16,
    /// Players required to seal a room (§4.3's capacity `P`), from `-p`.
    pub room_capacity: u16,
    /// Per-request claim ceiling (§4.1's `MaxQuota`), from `-q`.
    pub max_quota: u32,
    pub inventory_path: PathBuf,
    pub log_dir: Option<String>,
    /// Bound on the admission handshake (§4.4, §5's `WAIT`). Always
    /// [`super::defaults::ADMISSION_WAIT_SECS`] in production; overridable
    /// only by tests that need to exercise the timeout path quickly.
    pub admission_deadline: Duration,
}

/// Fully validated settings for the `roomkeeper-client` binary.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub player_name: String,
    pub claim_path: PathBuf,
    pub hostname: String,
    pub log_dir: Option<String>,
}

/// Why argument parsing, inventory loading, or validation failed. Every
/// variant maps to a process exit code of 1 (§6, §7) with the message
/// logged before exit.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("usage: {0}")]
    Usage(String),
    #[error("unknown or duplicate flag: {0}")]
    BadFlag(String),
    #[error("invalid value for {flag}: {value:?}")]
    InvalidValue { flag: &'static str, value: String },
    #[error("failed to read inventory file {path:?}: {source}")]
    InventoryIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed inventory file {path:?}: {source}")]
    InventoryFormat {
        path: PathBuf,
        #[source]
        source: crate::protocol::CodecError,
    },
    #[error("player count must be at least 2, got {0}")]
    RoomTooSmall(u16),
}

/// What a settings-parsing call produced: either settings ready to run
/// with, or a request to print the resolved defaults and exit 0, honored
/// only when `--print-config` is the sole argument (§9).
pub enum ParseOutcome<T> {
    Settings(T),
    PrintConfig,
}
