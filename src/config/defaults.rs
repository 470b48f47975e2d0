//! Constants shared by the server and client CLI grammars (§6).

/// Well-known TCP port the server listens on and the client connects to.
/// Neither CLI grammar carries a port argument, so this is the single
/// source of truth for both binaries.
pub const DEFAULT_PORT: u16 = 5623;

/// Listen backlog passed to the socket (component C7).
pub const LISTEN_BACKLOG: u32 = 150;

/// Default bound, in seconds, on the admission handshake (§4.4, §5's
/// `WAIT`). Production settings always resolve to this; it is a field on
/// [`super::types::ServerSettings`] rather than a bare constant only so
/// integration tests can shrink it and exercise the timeout path without
/// waiting on real wall-clock minutes.
pub const ADMISSION_WAIT_SECS: u64 = 60;
