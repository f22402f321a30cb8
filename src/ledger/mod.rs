//! The stock ledger: two independent non-negative counters per medication,
//! threshold-gated dispensing, and conserved transfers between locations.
//!
//! All mutations run under the per-medication lock, since the backing store
//! has no transactions and no row locking. Within one operation the ledger
//! checks every precondition before writing anything; across operations
//! there is no rollback.

pub mod types;

pub use types::{Medication, NewMedication, StockLocation};

use std::sync::Arc;

use crate::activity::{record_best_effort, ActivityLog, LogAction};
use crate::error::{DomainError, DomainResult};
use crate::lifecycle::policy::{authorize, PolicyAction, Relation};
use crate::lifecycle::Actor;
use crate::notify::{emit, DomainEvent, Notifier};
use crate::store::{KeyedLocks, MedicationStore};

pub struct StockLedger {
    store: Arc<dyn MedicationStore>,
    locks: Arc<KeyedLocks>,
    log: Arc<dyn ActivityLog>,
    notifier: Arc<dyn Notifier>,
}

impl StockLedger {
    pub fn new(
        store: Arc<dyn MedicationStore>,
        locks: Arc<KeyedLocks>,
        log: Arc<dyn ActivityLog>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            locks,
            log,
            notifier,
        }
    }

    pub async fn list(&self) -> DomainResult<Vec<Medication>> {
        Ok(self.store.list_medications().await?)
    }

    pub async fn get(&self, id: &str) -> DomainResult<Medication> {
        self.store
            .get_medication(id)
            .await?
            .ok_or_else(|| DomainError::not_found("medication", id))
    }

    /// Medications at or below their threshold at either location.
    pub async fn low_stock(&self) -> DomainResult<Vec<Medication>> {
        let mut meds = self.store.list_medications().await?;
        meds.retain(|m| m.is_low());
        Ok(meds)
    }

    /// Register a new medication. Ids are stable and unique; medications are
    /// never deleted afterwards, only zeroed.
    pub async fn add_medication(
        &self,
        actor: &Actor,
        new: NewMedication,
    ) -> DomainResult<Medication> {
        authorize(PolicyAction::ManageInventory, actor, Relation::Other)?;
        if new.id.trim().is_empty() || new.name.trim().is_empty() {
            return Err(DomainError::validation(
                "medication id and name are required",
            ));
        }

        let _guard = self.locks.acquire(&new.id).await;
        if self.store.get_medication(&new.id).await?.is_some() {
            return Err(DomainError::validation(format!(
                "medication {} already exists",
                new.id
            )));
        }

        let medication = Medication {
            id: new.id.trim().to_string(),
            name: new.name.trim().to_string(),
            unit: if new.unit.trim().is_empty() {
                "unit".to_string()
            } else {
                new.unit.trim().to_string()
            },
            stock_area_a: new.stock_area_a,
            stock_area_b: new.stock_area_b,
            min_threshold: new.min_threshold,
        };
        self.store.insert_medication(medication.clone()).await?;

        tracing::info!(
            medication = %medication.id,
            stock_a = medication.stock_area_a,
            stock_b = medication.stock_area_b,
            threshold = medication.min_threshold,
            "medication registered"
        );
        record_best_effort(
            self.log.as_ref(),
            &actor.email,
            LogAction::AddMedication,
            &format!(
                "{} ({}) added with A={} B={} threshold={}",
                medication.id,
                medication.name,
                medication.stock_area_a,
                medication.stock_area_b,
                medication.min_threshold
            ),
        )
        .await;
        Ok(medication)
    }

    /// Remove `quantity` units from `location`.
    ///
    /// Dispensing requires the pre-dispense stock to cover the quantity AND
    /// to sit strictly above the minimum threshold; once a location has
    /// drained to the threshold the gate closes regardless of the requested
    /// quantity. No mutation happens on failure.
    ///
    /// The caller (the lifecycle engine, during approval) owns activity
    /// logging; the ledger still emits the low-stock event itself.
    pub async fn dispense(
        &self,
        medication_id: &str,
        quantity: u32,
        location: StockLocation,
    ) -> DomainResult<u32> {
        if quantity == 0 {
            return Err(DomainError::validation(
                "dispense quantity must be at least 1",
            ));
        }

        let _guard = self.locks.acquire(medication_id).await;
        let medication = self.get(medication_id).await?;
        let available = medication.stock_at(location);

        if available <= medication.min_threshold {
            return Err(DomainError::StockAtThreshold {
                medication_id: medication_id.to_string(),
                location,
                available,
                threshold: medication.min_threshold,
            });
        }
        if quantity > available {
            return Err(DomainError::InsufficientStock {
                medication_id: medication_id.to_string(),
                location,
                requested: quantity,
                available,
            });
        }

        let remaining = available - quantity;
        self.store
            .update_stock(medication_id, location, remaining)
            .await?;

        tracing::info!(
            medication = %medication_id,
            location = %location,
            dispensed = quantity,
            remaining,
            "stock dispensed"
        );
        if remaining <= medication.min_threshold {
            emit(
                self.notifier.as_ref(),
                DomainEvent::StockBelowThreshold {
                    medication_id: medication_id.to_string(),
                    location,
                    remaining,
                    threshold: medication.min_threshold,
                },
            )
            .await;
        }
        Ok(remaining)
    }

    /// Move `amount` units between the two locations. Total stock for the
    /// medication is conserved. The two counter writes are sequential; a
    /// failure of the second surfaces as a store error with no rollback.
    pub async fn transfer(
        &self,
        actor: &Actor,
        medication_id: &str,
        amount: u32,
        from: StockLocation,
        to: StockLocation,
    ) -> DomainResult<()> {
        authorize(PolicyAction::ManageInventory, actor, Relation::Other)?;
        if amount == 0 {
            return Err(DomainError::validation(
                "transfer amount must be at least 1",
            ));
        }
        if from == to {
            return Err(DomainError::validation(format!(
                "invalid location pair: cannot transfer from {from} to itself"
            )));
        }

        let _guard = self.locks.acquire(medication_id).await;
        let medication = self.get(medication_id).await?;
        let source = medication.stock_at(from);
        if source < amount {
            return Err(DomainError::InsufficientStock {
                medication_id: medication_id.to_string(),
                location: from,
                requested: amount,
                available: source,
            });
        }

        let destination = medication.stock_at(to);
        self.store
            .update_stock(medication_id, from, source - amount)
            .await?;
        self.store
            .update_stock(medication_id, to, destination + amount)
            .await?;

        tracing::info!(
            medication = %medication_id,
            amount,
            from = %from,
            to = %to,
            "stock transferred"
        );
        record_best_effort(
            self.log.as_ref(),
            &actor.email,
            LogAction::TransferStock,
            &format!("{amount} x {medication_id} moved {from} -> {to}"),
        )
        .await;
        Ok(())
    }

    /// Set a location's stock to `new_quantity`. Restocking is monotone:
    /// decreases must go through dispense or transfer so they stay
    /// auditable, and are rejected here outright.
    pub async fn restock(
        &self,
        actor: &Actor,
        medication_id: &str,
        location: StockLocation,
        new_quantity: u32,
    ) -> DomainResult<()> {
        authorize(PolicyAction::ManageInventory, actor, Relation::Other)?;

        let _guard = self.locks.acquire(medication_id).await;
        let medication = self.get(medication_id).await?;
        let current = medication.stock_at(location);
        if new_quantity < current {
            return Err(DomainError::validation(format!(
                "restock cannot lower stock of {medication_id} at {location} from {current} to {new_quantity}; use dispense or transfer to decrease"
            )));
        }

        self.store
            .update_stock(medication_id, location, new_quantity)
            .await?;

        tracing::info!(
            medication = %medication_id,
            location = %location,
            from = current,
            to = new_quantity,
            "stock replenished"
        );
        record_best_effort(
            self.log.as_ref(),
            &actor.email,
            LogAction::Restock,
            &format!("{medication_id} at {location}: {current} -> {new_quantity}"),
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Role;
    use crate::notify::NoopNotifier;
    use crate::store::MemoryStore;

    async fn ledger_with(
        stock_a: u32,
        stock_b: u32,
        threshold: u32,
    ) -> (StockLedger, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = StockLedger::new(
            store.clone(),
            Arc::new(KeyedLocks::new()),
            store.clone(),
            Arc::new(NoopNotifier),
        );
        let staff = Actor::new("staff@pnt.edu.vn", Role::Staff);
        ledger
            .add_medication(
                &staff,
                NewMedication {
                    id: "PARA500".to_string(),
                    name: "Paracetamol 500mg".to_string(),
                    unit: "pill".to_string(),
                    stock_area_a: stock_a,
                    stock_area_b: stock_b,
                    min_threshold: threshold,
                },
            )
            .await
            .unwrap();
        (ledger, store)
    }

    #[tokio::test]
    async fn dispense_at_threshold_is_blocked() {
        let (ledger, _) = ledger_with(3, 0, 3).await;
        let err = ledger
            .dispense("PARA500", 1, StockLocation::AreaA)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::StockAtThreshold { .. }));
    }

    #[tokio::test]
    async fn dispense_below_threshold_is_blocked() {
        let (ledger, _) = ledger_with(2, 0, 3).await;
        let err = ledger
            .dispense("PARA500", 1, StockLocation::AreaA)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::StockAtThreshold { .. }));
    }

    #[tokio::test]
    async fn dispense_above_threshold_may_drain_to_zero() {
        let (ledger, _) = ledger_with(10, 5, 3).await;
        // Pre-dispense stock (10) is above the threshold, so the whole 10 go.
        let remaining = ledger
            .dispense("PARA500", 10, StockLocation::AreaA)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
        // The gate is now closed at A; B is untouched.
        let err = ledger
            .dispense("PARA500", 1, StockLocation::AreaA)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::StockAtThreshold { .. }));
        let med = ledger.get("PARA500").await.unwrap();
        assert_eq!(med.stock_area_b, 5);
    }

    #[tokio::test]
    async fn restock_may_not_decrease() {
        let (ledger, _) = ledger_with(10, 0, 2).await;
        let staff = Actor::new("staff@pnt.edu.vn", Role::Staff);
        let err = ledger
            .restock(&staff, "PARA500", StockLocation::AreaA, 9)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        // Equal is a no-op restock and allowed.
        ledger
            .restock(&staff, "PARA500", StockLocation::AreaA, 10)
            .await
            .unwrap();
        ledger
            .restock(&staff, "PARA500", StockLocation::AreaA, 25)
            .await
            .unwrap();
        assert_eq!(ledger.get("PARA500").await.unwrap().stock_area_a, 25);
    }
}
