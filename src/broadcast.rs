//! Per-room chat fan-out (component C5).
//!
//! Each admitted member runs its own read loop over its socket and publishes
//! what it reads onto the room's `RoomBroadcastBus`, a multi-producer,
//! single-consumer channel carrying `(sender, frame)` pairs. A single relay
//! task drains that channel and writes each record to every other member's
//! outbox. Writes to a departed member never block or propagate a failure
//! back to the sender.

use crate::inventory::Ledger;
use crate::protocol;
use crate::room::Room;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Bound on the room broadcast bus. Generous relative to any realistic
/// room capacity so a burst of simultaneous chat lines never backs up.
pub const CHANNEL_CAPACITY: usize = 256;

/// A record carried on the room broadcast bus.
#[derive(Debug)]
pub enum ChatEvent {
    Message { sender: Uuid, frame: Bytes },
    Departed { session: Uuid },
}

/// Interval between `"Waiting for more players ..."` keep-alive frames
/// while a room is still Forming (§4.5).
pub const WAITING_KEEPALIVE: Duration = Duration::from_secs(5);

/// Drains a sealed room's bus until every member has departed, relaying
/// each message to everyone but its sender. This is the room's single
/// consumer task, spawned exactly once by the admission that sealed it.
pub async fn relay_loop(room: Arc<Room>, mut bus_rx: mpsc::Receiver<ChatEvent>, capacity: u16) {
    let mut remaining = capacity;
    while remaining > 0 {
        let Some(event) = bus_rx.recv().await else {
            break;
        };
        match event {
            ChatEvent::Message { sender, frame } => {
                let snapshot = room_member_snapshot(&room);
                for (id, outbox) in snapshot {
                    if id == sender {
                        continue;
                    }
                    if outbox.send(frame.clone()).await.is_err() {
                        tracing::debug!(room = %room.id, member = %id, "dropped message to a departed member");
                    }
                }
            }
            ChatEvent::Departed { session } => {
                remaining = remaining.saturating_sub(1);
                tracing::info!(room = %room.id, session = %session, remaining, "member departed");
            }
        }
    }
    room.mark_drained();
    tracing::info!(room = %room.id, "room drained");
}

fn room_member_snapshot(room: &Room) -> Vec<(Uuid, mpsc::Sender<Bytes>)> {
    // The relay only needs the outbox handles, not the room's internal
    // lock held for the send: `Room` keeps the authoritative roster, but
    // exposing a snapshot here avoids holding the room's std::sync::Mutex
    // across the awaited `send` calls above.
    room.snapshot_outboxes()
}

/// Everything a single member's connection task needs once admitted.
pub struct MemberContext {
    pub room: Arc<Room>,
    pub ledger: Arc<Ledger>,
    pub session_id: Uuid,
    pub name: String,
    pub debited: Vec<(String, u32)>,
    /// `true` if this session's own admission was the one that sealed the
    /// room (it already observed `AdmitOutcome::Sealed` and the relay has
    /// already been spawned).
    pub already_running: bool,
}

/// Runs a single admitted member for the lifetime of its connection: the
/// pre-start keep-alive wait (if applicable), then the chat phase.
pub async fn run_member(
    reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    mut outbox_rx: mpsc::Receiver<Bytes>,
    bus_tx: mpsc::Sender<ChatEvent>,
    ctx: MemberContext,
) {
    let mut reader = reader;

    if !ctx.already_running {
        match wait_for_start(&mut writer, &ctx, &bus_tx).await {
            WaitOutcome::DepartedBeforeSeal => {
                tracing::info!(room = %ctx.room.id, session = %ctx.session_id, "player departed before game start, refunding debit");
                return;
            }
            WaitOutcome::DepartedAfterSeal => {
                tracing::info!(room = %ctx.room.id, session = %ctx.session_id, "player departed right as the room sealed, relay already notified");
                return;
            }
            WaitOutcome::Started => {}
        }
    }

    if writer.write_all(&protocol::start_frame()).await.is_err() {
        let _ = bus_tx.send(ChatEvent::Departed { session: ctx.session_id }).await;
        return;
    }

    tracing::info!(room = %ctx.room.id, session = %ctx.session_id, name = %ctx.name, "entering chat phase");

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            if writer.write_all(&frame).await.is_err() {
                break;
            }
        }
    });

    let mut buf = [0u8; protocol::CHAT_FRAME_LEN];
    loop {
        match reader.read_exact(&mut buf).await {
            Ok(_) => {
                let text = protocol::extract_text(&buf);
                let frame = protocol::chat_frame(&ctx.name, &text);
                if bus_tx
                    .send(ChatEvent::Message {
                        sender: ctx.session_id,
                        frame,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(_) => {
                let _ = bus_tx
                    .send(ChatEvent::Departed {
                        session: ctx.session_id,
                    })
                    .await;
                break;
            }
        }
    }

    writer_task.abort();
}

/// What became of a member waiting out the pre-start keep-alive.
enum WaitOutcome {
    /// The room sealed normally; the caller should proceed to send `START`.
    Started,
    /// The peer went away while the room was still Forming. The slot and
    /// debit have already been released, and the room never reached
    /// capacity for this member, so the relay (not yet spawned) needs no
    /// departure event.
    DepartedBeforeSeal,
    /// The peer went away in the narrow window between this branch's
    /// Running check and the keep-alive write failing, during which a
    /// concurrent admission sealed the room. The member is already part of
    /// the sealed roster the relay was spawned to expect a departure from,
    /// so a `Departed` event has already been published on its behalf.
    DepartedAfterSeal,
}

/// Waits for the room to seal, sending a keep-alive every
/// [`WAITING_KEEPALIVE`] in the meantime. Races the room's seal
/// notification against the keep-alive timer so a member already waiting
/// learns of `START` immediately rather than at its next poll.
async fn wait_for_start(
    writer: &mut OwnedWriteHalf,
    ctx: &MemberContext,
    bus_tx: &mpsc::Sender<ChatEvent>,
) -> WaitOutcome {
    loop {
        tokio::select! {
            _ = ctx.room.wait_until_running() => return WaitOutcome::Started,
            _ = tokio::time::sleep(WAITING_KEEPALIVE) => {
                if ctx.room.state() == crate::room::RoomState::Running {
                    return WaitOutcome::Started;
                }
                if writer.write_all(&protocol::waiting_frame()).await.is_err() {
                    return resolve_pre_start_departure(&ctx.room, &ctx.ledger, ctx.session_id, bus_tx).await;
                }
            }
        }
    }
}

/// Settles a member whose pre-start keep-alive write just failed. The room
/// may or may not have sealed in the time that write was in flight, and the
/// two cases need different bookkeeping: a still-Forming room just loses the
/// slot and refunds the debit, while an already-sealed room has already
/// counted this member toward the relay's expected departure count, so a
/// `Departed` event must be published on its behalf instead.
async fn resolve_pre_start_departure(
    room: &Room,
    ledger: &Ledger,
    session_id: Uuid,
    bus_tx: &mpsc::Sender<ChatEvent>,
) -> WaitOutcome {
    match room.remove_forming_member(session_id) {
        Some(debited) => {
            ledger.refund(&debited).await;
            WaitOutcome::DepartedBeforeSeal
        }
        None => {
            // The room sealed out from under us while the write above was
            // in flight: this member is already counted in the sealed
            // roster, so the relay still needs its departure accounted for.
            let _ = bus_tx.send(ChatEvent::Departed { session: session_id }).await;
            WaitOutcome::DepartedAfterSeal
        }
    }
}
