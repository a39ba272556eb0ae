//! Inventory Ledger
//!
//! Tracks consumed quantity against the optional maximum on each
//! sellable. Reservation happens before payment confirmation, at
//! checkout-session creation, so two concurrent buyers can never both
//! be handed a checkout page for the last unit; release-on-expiry
//! gives abandoned reservations back.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{CommerceError, Result};
use crate::model::{Sellable, SellableId};

/// Token returned by a successful reservation; held by the engine for
/// compensating release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    pub sellable_id: SellableId,
    pub quantity: u32,
}

/// Inventory storage trait.
///
/// `reserve` must be a single atomic check-and-increment: the bound
/// check and the counter write happen in one critical section (a write
/// lock here, a row-locking transaction in a database-backed
/// implementation). Read-then-check-then-write as separate steps would
/// allow overselling under concurrent load.
pub trait InventoryLedger: Send + Sync {
    /// Get a sellable by id
    fn get(&self, id: &SellableId) -> Result<Option<Sellable>>;

    /// Insert or replace a sellable (catalog seeding)
    fn put(&self, sellable: Sellable) -> Result<()>;

    /// Atomically reserve `quantity` units.
    ///
    /// Fails with `InsufficientInventory` if the bound would be
    /// exceeded; unlimited sellables always succeed.
    fn reserve(&self, id: &SellableId, quantity: u32) -> Result<Reservation>;

    /// Atomically give back `quantity` previously reserved units.
    ///
    /// A decrement below zero is reported as `InventoryUnderflow`:
    /// it means a reservation was released twice, which the sale
    /// status compare-and-swap upstream is supposed to prevent.
    fn release(&self, id: &SellableId, quantity: u32) -> Result<()>;
}

/// In-memory inventory ledger (for development and tests)
pub struct MemoryInventoryLedger {
    items: RwLock<HashMap<SellableId, Sellable>>,
}

impl Default for MemoryInventoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInventoryLedger {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    /// List the full catalog (admin/status surface)
    pub fn list(&self) -> Vec<Sellable> {
        let items = self.items.read().unwrap();
        items.values().cloned().collect()
    }
}

impl InventoryLedger for MemoryInventoryLedger {
    fn get(&self, id: &SellableId) -> Result<Option<Sellable>> {
        let items = self.items.read().unwrap();
        Ok(items.get(id).cloned())
    }

    fn put(&self, sellable: Sellable) -> Result<()> {
        let mut items = self.items.write().unwrap();
        items.insert(sellable.id, sellable);
        Ok(())
    }

    fn reserve(&self, id: &SellableId, quantity: u32) -> Result<Reservation> {
        let mut items = self.items.write().unwrap();
        let sellable = items
            .get_mut(id)
            .ok_or_else(|| CommerceError::SellableNotFound(id.to_string()))?;

        if let Some(max) = sellable.max_quantity {
            let available = max.saturating_sub(sellable.current_quantity);
            if quantity > available {
                return Err(CommerceError::InsufficientInventory {
                    sellable_id: id.to_string(),
                    requested: quantity,
                    available,
                });
            }
        }

        // Unlimited sellables skip the bound check, so the counter
        // add itself must not overflow
        sellable.current_quantity = sellable
            .current_quantity
            .checked_add(quantity)
            .ok_or_else(|| {
                CommerceError::InvalidAmount(format!(
                    "reservation of {quantity} overflows the counter for {id}"
                ))
            })?;

        tracing::debug!(
            sellable_id = %id,
            quantity,
            current = sellable.current_quantity,
            "Reserved inventory"
        );

        Ok(Reservation {
            sellable_id: *id,
            quantity,
        })
    }

    fn release(&self, id: &SellableId, quantity: u32) -> Result<()> {
        let mut items = self.items.write().unwrap();
        let sellable = items
            .get_mut(id)
            .ok_or_else(|| CommerceError::SellableNotFound(id.to_string()))?;

        if quantity > sellable.current_quantity {
            return Err(CommerceError::InventoryUnderflow {
                sellable_id: id.to_string(),
                requested: quantity,
                current: sellable.current_quantity,
            });
        }

        sellable.current_quantity -= quantity;

        tracing::debug!(
            sellable_id = %id,
            quantity,
            current = sellable.current_quantity,
            "Released inventory"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn seeded(max: Option<u32>) -> (MemoryInventoryLedger, SellableId) {
        let ledger = MemoryInventoryLedger::new();
        let sellable = Sellable::new("Team Registration", dec!(250.00), max);
        let id = sellable.id;
        ledger.put(sellable).unwrap();
        (ledger, id)
    }

    #[test]
    fn test_reserve_within_bound() {
        let (ledger, id) = seeded(Some(10));

        let reservation = ledger.reserve(&id, 3).unwrap();
        assert_eq!(reservation.quantity, 3);
        assert_eq!(ledger.get(&id).unwrap().unwrap().current_quantity, 3);
    }

    #[test]
    fn test_reserve_refused_past_bound() {
        let (ledger, id) = seeded(Some(2));

        ledger.reserve(&id, 2).unwrap();
        let err = ledger.reserve(&id, 1).unwrap_err();
        assert!(matches!(
            err,
            CommerceError::InsufficientInventory { available: 0, .. }
        ));

        // The failed attempt must not have consumed anything
        assert_eq!(ledger.get(&id).unwrap().unwrap().current_quantity, 2);
    }

    #[test]
    fn test_unlimited_always_reserves() {
        let (ledger, id) = seeded(None);
        ledger.reserve(&id, 10_000).unwrap();
        ledger.reserve(&id, 10_000).unwrap();
        assert_eq!(ledger.get(&id).unwrap().unwrap().current_quantity, 20_000);
    }

    #[test]
    fn test_release_gives_units_back() {
        let (ledger, id) = seeded(Some(10));
        ledger.reserve(&id, 10).unwrap();
        assert!(ledger.reserve(&id, 1).is_err());

        ledger.release(&id, 1).unwrap();
        assert!(ledger.reserve(&id, 1).is_ok());
    }

    #[test]
    fn test_release_below_zero_is_reported() {
        let (ledger, id) = seeded(Some(10));
        ledger.reserve(&id, 1).unwrap();

        let err = ledger.release(&id, 2).unwrap_err();
        assert!(matches!(err, CommerceError::InventoryUnderflow { .. }));
        // Counter untouched by the refused release
        assert_eq!(ledger.get(&id).unwrap().unwrap().current_quantity, 1);
    }

    #[test]
    fn test_unlimited_reserve_refuses_counter_overflow() {
        let (ledger, id) = seeded(None);
        ledger.reserve(&id, u32::MAX).unwrap();

        let err = ledger.reserve(&id, 1).unwrap_err();
        assert!(matches!(err, CommerceError::InvalidAmount(_)));
        // Counter untouched by the refused reservation
        assert_eq!(ledger.get(&id).unwrap().unwrap().current_quantity, u32::MAX);
    }

    #[test]
    fn test_unknown_sellable() {
        let ledger = MemoryInventoryLedger::new();
        let id = SellableId::generate();
        assert!(matches!(
            ledger.reserve(&id, 1),
            Err(CommerceError::SellableNotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_reserves_never_oversell() {
        let (ledger, id) = seeded(Some(10));
        let ledger = Arc::new(ledger);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.reserve(&id, 1).is_ok() }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, 10);
        assert_eq!(ledger.get(&id).unwrap().unwrap().current_quantity, 10);
    }
}
