//! Admission handshake (component C4): read one request frame under a
//! bounded deadline, jointly debit the ledger and reserve a room slot, and
//! hand a successfully admitted connection off to the chat relay.

use crate::broadcast::{self, MemberContext};
use crate::config::ServerSettings;
use crate::inventory::Ledger;
use crate::protocol;
use crate::room::AdmitOutcome;
use crate::supervisor::Supervisor;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Per-connection outbox capacity for buffered relayed chat frames.
const OUTBOX_CAPACITY: usize = 32;

/// Outcome of the bounded read-parse-decide phase: either a fully resolved
/// rejection (nothing committed, so the caller only needs to reply and
/// close), or a committed admission ready to proceed unconditionally.
enum Decision {
    Reject,
    Admitted {
        outcome: AdmitOutcome,
        session_id: Uuid,
        room: Arc<crate::room::Room>,
        player_name: String,
        debited: Vec<(String, u32)>,
        outbox_rx: mpsc::Receiver<bytes::Bytes>,
    },
}

/// Entry point spawned by the listener for every accepted connection.
///
/// `settings.admission_deadline` bounds only the read-parse-decide phase
/// (§4.4 step 1-4): reading the request frame, parsing it, and running the
/// joint ledger-debit-plus-room-reservation check. Nothing is committed
/// until that phase finishes, so a timeout here always closes the
/// connection with no reservation left behind. Once a request is admitted
/// and committed, the remaining steps (replying `OK`, entering chat) are
/// not subject to this deadline: a slow-reading peer past that point is
/// already a member and is handled like any other chat-phase peer,
/// terminated on I/O error rather than on a clock (§5).
pub async fn handle_connection(
    socket: TcpStream,
    ledger: Arc<Ledger>,
    supervisor: Arc<Supervisor>,
    settings: Arc<ServerSettings>,
) {
    let peer = socket.peer_addr().ok();
    let (mut socket, decision) = match tokio::time::timeout(
        settings.admission_deadline,
        decide(socket, &ledger, &supervisor, &settings),
    )
    .await
    {
        Ok(resolved) => resolved,
        Err(_) => {
            tracing::warn!(?peer, "admission handshake timed out");
            return;
        }
    };

    let (session_id, room, player_name, debited, outbox_rx, outcome) = match decision {
        Decision::Reject => {
            let _ = socket.write_all(&protocol::reject_reply()).await;
            return;
        }
        Decision::Admitted {
            outcome,
            session_id,
            room,
            player_name,
            debited,
            outbox_rx,
        } => (session_id, room, player_name, debited, outbox_rx, outcome),
    };

    let already_running = matches!(outcome, AdmitOutcome::Sealed { .. });
    if let AdmitOutcome::Sealed { bus_rx, .. } = outcome {
        tracing::info!(room = %room.id, capacity = room.capacity, "room sealed, starting chat relay");
        tokio::spawn(broadcast::relay_loop(room.clone(), bus_rx, room.capacity));
        // Rotated before the OK reply is even sent, so the window in which
        // another in-flight admission could still observe this now-sealed
        // room through `Supervisor::current_room` is as small as possible
        // (§8's exactly-one-forming property).
        supervisor.rotate(&room).await;
    }

    if socket.write_all(&protocol::ok_reply()).await.is_err() {
        tracing::debug!(session = %session_id, "player vanished right after admission");
    }

    tracing::info!(
        session = %session_id,
        player = %player_name,
        room = %room.id,
        "admitted"
    );

    let bus_tx = room.bus_sender();
    let ctx = MemberContext {
        room,
        ledger,
        session_id,
        name: player_name,
        debited,
        already_running,
    };
    let (reader, writer) = socket.into_split();
    tokio::spawn(broadcast::run_member(reader, writer, outbox_rx, bus_tx, ctx));
}

/// Reads one request frame, parses it, and (under the ledger's lock)
/// decides whether to commit a joint debit-plus-room-reservation. Returns
/// the socket back to the caller either way, plus what was decided.
async fn decide(
    mut socket: TcpStream,
    ledger: &Arc<Ledger>,
    supervisor: &Arc<Supervisor>,
    settings: &Arc<ServerSettings>,
) -> (TcpStream, Decision) {
    let mut buf = [0u8; protocol::REQUEST_FRAME_LEN];
    if socket.read_exact(&mut buf).await.is_err() {
        return (socket, Decision::Reject);
    }

    let request = match protocol::parse_request(&buf) {
        Ok(request) => request,
        Err(err) => {
            tracing::info!(%err, "rejecting malformed admission request");
            return (socket, Decision::Reject);
        }
    };

    let session_id = Uuid::new_v4();
    let room = supervisor.current_room().await;
    let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
    let debited: Vec<(String, u32)> = request.inventory.iter().cloned().collect();

    // §4.4/§5: the ledger's lock is held across the room's own admission
    // check so the debit and the slot reservation succeed or fail jointly,
    // with the ledger lock always acquired first.
    let admission = {
        let mut guard = ledger.lock().await;
        match guard.check(&request.inventory, settings.max_quota) {
            Ok(plan) => {
                match room.try_admit(session_id, request.player_name.clone(), outbox_tx.clone(), debited.clone()) {
                    Ok(outcome) => {
                        guard.commit(plan);
                        Ok(outcome)
                    }
                    Err(room_err) => Err(room_err.to_string()),
                }
            }
            Err(reject) => Err(reject.to_string()),
        }
    };

    match admission {
        Ok(outcome) => (
            socket,
            Decision::Admitted {
                outcome,
                session_id,
                room,
                player_name: request.player_name,
                debited,
                outbox_rx,
            },
        ),
        Err(reason) => {
            tracing::info!(player = %request.player_name, reason = %reason, "admission rejected");
            (socket, Decision::Reject)
        }
    }
}
