//! Room state machine and member bookkeeping (component C3).
//!
//! `Room.state` and `Room.members` are guarded by a single `std::sync::Mutex`
//! so a membership check-and-increment is a single atomic step; §5 requires
//! this lock to always be acquired *after* the ledger's lock when an
//! operation needs both, which is exactly how [`crate::admission`] uses it.

use crate::broadcast::ChatEvent;
use bytes::Bytes;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

/// The four states a room passes through (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Forming,
    Sealing,
    Running,
    Drained,
}

/// Why an admission into a room was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    #[error("room is no longer accepting admissions")]
    RoomClosed,
}

/// Bookkeeping kept for one admitted member.
pub struct Member {
    pub session_id: Uuid,
    pub name: String,
    pub outbox: mpsc::Sender<Bytes>,
    /// Items debited for this member's request, kept so a pre-start
    /// departure (§4.5) can be refunded to the ledger.
    pub debited: Vec<(String, u32)>,
}

/// Outcome of a successful [`Room::try_admit`] call.
pub enum AdmitOutcome {
    /// The room still has open slots.
    Forming,
    /// This admission was the P-th: the room is now `Running`. The caller
    /// owns the bus receiver and the member roster and must spawn the chat
    /// relay and broadcast `START` exactly once.
    Sealed {
        bus_rx: mpsc::Receiver<ChatEvent>,
        members: Vec<(Uuid, String, mpsc::Sender<Bytes>)>,
    },
}

struct Inner {
    state: RoomState,
    members: Vec<Member>,
    bus_rx: Option<mpsc::Receiver<ChatEvent>>,
}

/// A bounded set of admitted sessions plus the sealing state machine and
/// the broadcast bus that feeds the chat relay once running.
pub struct Room {
    pub id: Uuid,
    pub capacity: u16,
    bus_tx: mpsc::Sender<ChatEvent>,
    inner: Mutex<Inner>,
    /// Notified once, from inside `try_admit`, the instant the room seals.
    /// Lets an already-waiting member's keep-alive loop learn of `START`
    /// immediately instead of only at its next 5-second poll.
    sealed: Notify,
}

impl Room {
    pub fn new(capacity: u16) -> Self {
        let (bus_tx, bus_rx) = mpsc::channel(crate::broadcast::CHANNEL_CAPACITY);
        Self {
            id: Uuid::new_v4(),
            capacity,
            bus_tx,
            inner: Mutex::new(Inner {
                state: RoomState::Forming,
                members: Vec::new(),
                bus_rx: Some(bus_rx),
            }),
            sealed: Notify::new(),
        }
    }

    /// The sender half of the room's broadcast bus. Every member's read
    /// loop gets a clone to publish chat events and departures into.
    pub fn bus_sender(&self) -> mpsc::Sender<ChatEvent> {
        self.bus_tx.clone()
    }

    pub fn state(&self) -> RoomState {
        self.inner.lock().expect("room lock poisoned").state
    }

    pub fn member_count(&self) -> usize {
        self.inner.lock().expect("room lock poisoned").members.len()
    }

    /// Resolves as soon as the room seals, or immediately if it already
    /// has. Used by a waiting member to learn of `START` without relying
    /// solely on its own keep-alive poll interval.
    pub async fn wait_until_running(&self) {
        loop {
            if self.state() == RoomState::Running {
                return;
            }
            let notified = self.sealed.notified();
            if self.state() == RoomState::Running {
                return;
            }
            notified.await;
        }
    }

    /// A snapshot of (session, outbox) pairs for every member, taken under
    /// the room lock and then released. Callers must not hold this across
    /// an `.await` on the room lock itself, only on the cloned senders.
    pub fn snapshot_outboxes(&self) -> Vec<(Uuid, mpsc::Sender<Bytes>)> {
        self.inner
            .lock()
            .expect("room lock poisoned")
            .members
            .iter()
            .map(|m| (m.session_id, m.outbox.clone()))
            .collect()
    }

    /// Attempts to reserve a slot for a new member. Must be called while
    /// the caller already holds the ledger's lock (§4.4, §5): the debit and
    /// this reservation are committed or abandoned together by the caller.
    pub fn try_admit(
        &self,
        session_id: Uuid,
        name: String,
        outbox: mpsc::Sender<Bytes>,
        debited: Vec<(String, u32)>,
    ) -> Result<AdmitOutcome, RoomError> {
        let mut inner = self.inner.lock().expect("room lock poisoned");
        if inner.state != RoomState::Forming {
            return Err(RoomError::RoomClosed);
        }

        inner.members.push(Member {
            session_id,
            name,
            outbox,
            debited,
        });

        if inner.members.len() == self.capacity as usize {
            inner.state = RoomState::Sealing;
            inner.state = RoomState::Running;
            let bus_rx = inner.bus_rx.take().expect("bus receiver taken at most once");
            let members = inner
                .members
                .iter()
                .map(|m| (m.session_id, m.name.clone(), m.outbox.clone()))
                .collect();
            drop(inner);
            self.sealed.notify_waiters();
            Ok(AdmitOutcome::Sealed { bus_rx, members })
        } else {
            Ok(AdmitOutcome::Forming)
        }
    }

    /// Removes a member who disconnected while the room was still
    /// `Forming` (the keep-alive write failed). Returns the items that were
    /// debited for them, which the caller must refund to the ledger. No-op
    /// (returns `None`) if the room has since sealed out from under the
    /// caller: in that case the member is already part of the running
    /// room's roster, and the caller must publish a departure event for it
    /// instead of refunding.
    pub fn remove_forming_member(&self, session_id: Uuid) -> Option<Vec<(String, u32)>> {
        let mut inner = self.inner.lock().expect("room lock poisoned");
        if inner.state != RoomState::Forming {
            return None;
        }
        let pos = inner.members.iter().position(|m| m.session_id == session_id)?;
        Some(inner.members.remove(pos).debited)
    }

    /// Marks the room fully drained. Called once by the chat relay after
    /// every member has departed.
    pub fn mark_drained(&self) {
        self.inner.lock().expect("room lock poisoned").state = RoomState::Drained;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn outbox() -> mpsc::Sender<Bytes> {
        mpsc::channel(8).0
    }

    #[test]
    fn capacity_is_enforced_and_exactly_one_admission_seals() {
        let room = Room::new(2);
        assert!(matches!(
            room.try_admit(Uuid::new_v4(), "A".into(), outbox(), vec![]).unwrap(),
            AdmitOutcome::Forming
        ));
        assert_eq!(room.state(), RoomState::Forming);

        match room.try_admit(Uuid::new_v4(), "B".into(), outbox(), vec![]).unwrap() {
            AdmitOutcome::Sealed { members, .. } => assert_eq!(members.len(), 2),
            AdmitOutcome::Forming => panic!("expected the second admission to seal the room"),
        }
        assert_eq!(room.state(), RoomState::Running);

        let rejected = room.try_admit(Uuid::new_v4(), "C".into(), outbox(), vec![]);
        assert!(matches!(rejected, Err(RoomError::RoomClosed)));
    }

    #[test]
    fn forming_member_can_be_removed_before_seal() {
        let room = Room::new(2);
        let id = Uuid::new_v4();
        room.try_admit(id, "A".into(), outbox(), vec![("gold".to_string(), 3)])
            .unwrap();
        let refund = room.remove_forming_member(id).unwrap();
        assert_eq!(refund, vec![("gold".to_string(), 3)]);
        assert_eq!(room.member_count(), 0);
    }

    #[test]
    fn cannot_remove_forming_member_after_seal() {
        let room = Room::new(1);
        let id = Uuid::new_v4();
        room.try_admit(id, "A".into(), outbox(), vec![]).unwrap();
        assert_eq!(room.state(), RoomState::Running);
        assert!(room.remove_forming_member(id).is_none());
    }
}
