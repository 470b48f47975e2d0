//! Owns the single currently-Forming room and opens the next one the
//! instant the current one seals (component C6).
//!
//! §8's Exactly-one-forming property requires that a fresh Forming room
//! exist before any connection that would otherwise have reached the
//! sealed one. Correctness of admission itself never depends on this
//! ([`crate::room::Room::try_admit`] already refuses anyone once its own
//! state leaves `Forming`), but routing a new arrival into a room that can
//! actually accept it, rather than bouncing it off a room that just
//! sealed, does. The admission task that observes `AdmitOutcome::Sealed`
//! is responsible for calling [`Supervisor::rotate`] before doing anything
//! else with the result.

use crate::room::{Room, RoomState};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct Supervisor {
    current: RwLock<Arc<Room>>,
    capacity: u16,
    rooms_opened: AtomicU64,
    /// Every room sealed so far, kept around for diagnostics (`roomkeeper`
    /// has no admin surface of its own, but this is what a metrics/health
    /// endpoint would read from if one were added). Drained rooms are
    /// pruned lazily on the next rotation rather than eagerly, since no
    /// caller currently needs tight bounds on this set's size.
    sealed_rooms: DashMap<Uuid, Arc<Room>>,
}

impl Supervisor {
    /// Opens the first Forming room at `capacity` members.
    pub fn new(capacity: u16) -> Self {
        Self {
            current: RwLock::new(Arc::new(Room::new(capacity))),
            capacity,
            rooms_opened: AtomicU64::new(1),
            sealed_rooms: DashMap::new(),
        }
    }

    /// The room new connections should be offered. Always reflects the
    /// most recently opened Forming room.
    pub async fn current_room(&self) -> Arc<Room> {
        self.current.read().await.clone()
    }

    /// Opens a fresh Forming room and swaps it in as current. Called
    /// exactly once per sealed room, by whichever admission sealed it.
    pub async fn rotate(&self, sealed: &Arc<Room>) -> Arc<Room> {
        self.sealed_rooms.retain(|_, room| room.state() != RoomState::Drained);
        self.sealed_rooms.insert(sealed.id, sealed.clone());

        let fresh = Arc::new(Room::new(self.capacity));
        let opened = self.rooms_opened.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(room = %fresh.id, rooms_opened = opened, "opened a new forming room");
        *self.current.write().await = fresh.clone();
        fresh
    }

    /// Rooms that have sealed but not yet fully drained.
    pub fn active_room_count(&self) -> usize {
        self.sealed_rooms.len()
    }
}
