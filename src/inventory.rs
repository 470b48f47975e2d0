//! Shared inventory ledger with atomic multi-item debit (component C1).
//!
//! The ledger holds the authoritative "remaining" quantity for every item in
//! the game's inventory. `try_debit` is the only mutator; it runs the quota,
//! existence, and stock checks and the decrement under a single exclusive
//! lock so two concurrent admissions can never oversell an item.

use thiserror::Error;
use tokio::sync::Mutex;

/// A short printable item token, e.g. `"gold"`.
pub type Item = String;

/// Maximum length, in bytes, of an item name or player name (§3).
pub const MAX_TOKEN_LEN: usize = 31;

/// Maximum quantity that may be requested for a single item (§4.2).
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

/// An ordered sequence of (item, quantity) pairs with no duplicate item.
///
/// Used both for the server-wide inventory definition and for a single
/// player's requested claim against it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    entries: Vec<(Item, u32)>,
}

/// Returned by [`Inventory::push`] when the item is already present.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("duplicate item in inventory: {0}")]
pub struct DuplicateItem(pub String);

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an (item, quantity) record, rejecting duplicates.
    pub fn push(&mut self, item: impl Into<String>, quantity: u32) -> Result<(), DuplicateItem> {
        let item = item.into();
        if self.entries.iter().any(|(existing, _)| existing == &item) {
            return Err(DuplicateItem(item));
        }
        self.entries.push((item, quantity));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Item, u32)> {
        self.entries.iter()
    }

    pub fn get(&self, item: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == item)
            .map(|(_, qty)| *qty)
    }

    /// Sum of all quantities (the request's quota, or the ledger's total
    /// stock). Widened to `u64` since individual quantities may each
    /// approach `i32::MAX`.
    pub fn quota(&self) -> u64 {
        self.entries.iter().map(|(_, qty)| u64::from(*qty)).sum()
    }
}

/// Why a `try_debit` call was rejected, in the order §4.1 specifies they are
/// checked.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("quota exceeded: requested {requested}, max {max}")]
    QuotaExceeded { requested: u64, max: u64 },
    #[error("unknown item: {0}")]
    UnknownItem(String),
    #[error("insufficient stock for {item}: requested {requested}, remaining {remaining}")]
    InsufficientStock {
        item: String,
        requested: u32,
        remaining: u32,
    },
}

/// A checked, not-yet-committed debit: indices into the ledger's item
/// vector paired with the quantity that will be subtracted from each.
pub struct DebitPlan {
    decrements: Vec<(usize, u32)>,
}

/// The process-wide authoritative inventory. Item identities are fixed at
/// construction time; only the remaining quantities are mutable, and only
/// under `remaining`'s lock.
pub struct Ledger {
    items: Vec<Item>,
    remaining: Mutex<Vec<u32>>,
}

impl Ledger {
    /// Builds a ledger from a startup inventory. Duplicate items are a
    /// startup-fatal configuration error and are rejected by
    /// [`Inventory::push`] before this is ever called, so this constructor
    /// trusts its input is already deduplicated.
    pub fn new(initial: Inventory) -> Self {
        let (items, quantities): (Vec<_>, Vec<_>) = initial.entries.into_iter().unzip();
        Self {
            items,
            remaining: Mutex::new(quantities),
        }
    }

    /// Acquires the ledger's exclusive lock, returning a guard that can
    /// check a request and commit it without releasing the lock in
    /// between. Admission uses this to make the debit and the room-slot
    /// reservation joint-atomic (§4.4, §5).
    pub async fn lock(&self) -> LedgerGuard<'_> {
        LedgerGuard {
            items: &self.items,
            remaining: self.remaining.lock().await,
        }
    }

    /// Attempts an isolated debit with no other joint operation. Used by
    /// tests and by the non-room-coupled property checks of §8.
    pub async fn try_debit(&self, request: &Inventory, max_quota: u32) -> Result<(), RejectReason> {
        let mut guard = self.lock().await;
        let plan = guard.check(request, max_quota)?;
        guard.commit(plan);
        Ok(())
    }

    /// Restores previously debited quantities. Used only for the
    /// pre-start keep-alive departure case (§4.5): a player who disconnects
    /// while the room is still Forming gets their debit refunded, since no
    /// game has begun yet.
    pub async fn refund(&self, items: &[(Item, u32)]) {
        let mut remaining = self.remaining.lock().await;
        for (item, qty) in items {
            if let Some(idx) = self.items.iter().position(|i| i == item) {
                remaining[idx] += qty;
            }
        }
    }

    /// Read-only copy of the current state, for diagnostics and tests.
    pub async fn snapshot(&self) -> Inventory {
        let remaining = self.remaining.lock().await;
        let mut inv = Inventory::new();
        for (item, qty) in self.items.iter().zip(remaining.iter()) {
            inv.push(item.clone(), *qty).expect("ledger items are unique");
        }
        inv
    }

    pub fn item_names(&self) -> &[Item] {
        &self.items
    }
}

/// A held lock over the ledger's remaining quantities.
pub struct LedgerGuard<'a> {
    items: &'a [Item],
    remaining: tokio::sync::MutexGuard<'a, Vec<u32>>,
}

impl LedgerGuard<'_> {
    /// Runs the quota / unknown-item / insufficient-stock checks in that
    /// order (§4.1) without mutating anything. Returns a plan the caller
    /// can later pass to [`commit`](Self::commit), or drop.
    pub fn check(&self, request: &Inventory, max_quota: u32) -> Result<DebitPlan, RejectReason> {
        let requested_quota = request.quota();
        if requested_quota > u64::from(max_quota) {
            return Err(RejectReason::QuotaExceeded {
                requested: requested_quota,
                max: u64::from(max_quota),
            });
        }

        let mut decrements = Vec::with_capacity(request.len());
        for (item, qty) in request.iter() {
            let idx = self
                .items
                .iter()
                .position(|existing| existing == item)
                .ok_or_else(|| RejectReason::UnknownItem(item.clone()))?;
            decrements.push((idx, *qty));
        }

        for &(idx, qty) in &decrements {
            if self.remaining[idx] < qty {
                return Err(RejectReason::InsufficientStock {
                    item: self.items[idx].clone(),
                    requested: qty,
                    remaining: self.remaining[idx],
                });
            }
        }

        Ok(DebitPlan { decrements })
    }

    /// Applies a previously checked plan. Never fails: `check` already
    /// proved every decrement is valid under the lock still held here.
    pub fn commit(&mut self, plan: DebitPlan) {
        for (idx, qty) in plan.decrements {
            self.remaining[idx] -= qty;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(pairs: &[(&str, u32)]) -> Inventory {
        let mut inventory = Inventory::new();
        for (item, qty) in pairs {
            inventory.push(*item, *qty).unwrap();
        }
        inventory
    }

    #[test]
    fn rejects_duplicate_push() {
        let mut inventory = Inventory::new();
        inventory.push("gold", 5).unwrap();
        assert_eq!(
            inventory.push("gold", 1),
            Err(DuplicateItem("gold".to_string()))
        );
    }

    #[tokio::test]
    async fn debit_succeeds_within_quota_and_stock() {
        let ledger = Ledger::new(inv(&[("gold", 5), ("silver", 3)]));
        let request = inv(&[("gold", 3)]);
        ledger.try_debit(&request, 4).await.unwrap();
        let snapshot = ledger.snapshot().await;
        assert_eq!(snapshot.get("gold"), Some(2));
        assert_eq!(snapshot.get("silver"), Some(3));
    }

    #[tokio::test]
    async fn debit_rejects_quota_before_touching_stock() {
        let ledger = Ledger::new(inv(&[("gold", 5), ("silver", 3)]));
        let request = inv(&[("gold", 6)]);
        let err = ledger.try_debit(&request, 4).await.unwrap_err();
        assert!(matches!(err, RejectReason::QuotaExceeded { .. }));
        let snapshot = ledger.snapshot().await;
        assert_eq!(snapshot.get("gold"), Some(5));
    }

    #[tokio::test]
    async fn debit_rejects_unknown_item() {
        let ledger = Ledger::new(inv(&[("gold", 5)]));
        let request = inv(&[("platinum", 1)]);
        let err = ledger.try_debit(&request, 10).await.unwrap_err();
        assert_eq!(err, RejectReason::UnknownItem("platinum".to_string()));
    }

    #[tokio::test]
    async fn debit_rejects_insufficient_stock_and_leaves_state_unchanged() {
        let ledger = Ledger::new(inv(&[("gold", 2)]));
        let request = inv(&[("gold", 3)]);
        let err = ledger.try_debit(&request, 10).await.unwrap_err();
        assert!(matches!(err, RejectReason::InsufficientStock { .. }));
        assert_eq!(ledger.snapshot().await.get("gold"), Some(2));
    }

    #[tokio::test]
    async fn refund_restores_debited_quantities() {
        let ledger = Ledger::new(inv(&[("gold", 5)]));
        ledger.try_debit(&inv(&[("gold", 3)]), 10).await.unwrap();
        ledger.refund(&[("gold".to_string(), 3)]).await;
        assert_eq!(ledger.snapshot().await.get("gold"), Some(5));
    }

    #[tokio::test]
    async fn scenario_three_from_spec_section_8() {
        // Ledger {gold:2}, MaxQuota 5, P=2.
        let ledger = Ledger::new(inv(&[("gold", 2)]));
        ledger.try_debit(&inv(&[("gold", 2)]), 5).await.unwrap(); // A: OK
        let b = ledger.try_debit(&inv(&[("gold", 1)]), 5).await;
        assert!(matches!(b, Err(RejectReason::InsufficientStock { .. })));
        ledger.try_debit(&inv(&[("gold", 0)]), 5).await.unwrap(); // C: OK
        assert_eq!(ledger.snapshot().await.get("gold"), Some(0));
    }
}
