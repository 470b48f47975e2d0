//! Shared scaffolding for the integration tests: spins up a real
//! `roomkeeper` server bound to an ephemeral port and gives each test a
//! plain `TcpStream` to talk to it with, mirroring how the binaries
//! actually connect.

use roomkeeper::config::ServerSettings;
use roomkeeper::inventory::{Inventory, Ledger};
use roomkeeper::listener;
use roomkeeper::protocol::{self, AdmissionRequest};
use roomkeeper::supervisor::Supervisor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub struct TestServer {
    pub addr: SocketAddr,
    pub ledger: Arc<Ledger>,
    pub supervisor: Arc<Supervisor>,
}

impl TestServer {
    pub async fn start(room_capacity: u16, max_quota: u32, inventory: Inventory) -> Self {
        Self::start_with_deadline(room_capacity, max_quota, inventory, Duration::from_secs(60)).await
    }

    /// Like [`start`](Self::start) but with a caller-chosen admission
    /// deadline, so a test can exercise the §4.4/§5 handshake timeout
    /// without waiting on the real 60-second production default.
    pub async fn start_with_deadline(
        room_capacity: u16,
        max_quota: u32,
        inventory: Inventory,
        admission_deadline: Duration,
    ) -> Self {
        let settings = Arc::new(ServerSettings {
            port: 0,
            room_capacity,
            max_quota,
            inventory_path: PathBuf::from("test-inventory.txt"),
            log_dir: None,
            admission_deadline,
        });
        let ledger = Arc::new(Ledger::new(inventory));
        let supervisor = Arc::new(Supervisor::new(room_capacity));

        let tcp_listener = listener::bind(&settings).await.expect("bind ephemeral port");
        let addr = tcp_listener.local_addr().expect("local addr");

        tokio::spawn(listener::serve(
            tcp_listener,
            settings,
            ledger.clone(),
            supervisor.clone(),
        ));

        Self {
            addr,
            ledger,
            supervisor,
        }
    }

    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.expect("connect to test server")
    }
}

/// Builds a ready-to-send admission request frame for `name` claiming
/// `items`.
pub fn request_frame(name: &str, items: &[(&str, u32)]) -> [u8; protocol::REQUEST_FRAME_LEN] {
    let mut inventory = Inventory::new();
    for (item, qty) in items {
        inventory.push(*item, *qty).unwrap();
    }
    protocol::serialize_request(&AdmissionRequest {
        player_name: name.to_string(),
        inventory,
    })
    .unwrap()
}

/// Sends an admission request and returns whether the server accepted it.
pub async fn admit(socket: &mut TcpStream, name: &str, items: &[(&str, u32)]) -> bool {
    socket.write_all(&request_frame(name, items)).await.unwrap();
    let mut reply = [0u8; protocol::REPLY_FRAME_LEN];
    socket.read_exact(&mut reply).await.unwrap();
    protocol::is_ok_reply(&reply)
}

pub fn sample_inventory(pairs: &[(&str, u32)]) -> Inventory {
    let mut inventory = Inventory::new();
    for (item, qty) in pairs {
        inventory.push(*item, *qty).unwrap();
    }
    inventory
}
