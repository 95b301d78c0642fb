//! Waste catalog — declared lots and their perishability.
//!
//! Owns the lot store and the per-supplier index. Expiry is a derived,
//! continuously recomputed predicate (`now > expires_at`), not an event: an
//! unclaimed lot that passes its window simply stops being claimable and is
//! kept for audit, never deleted.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::info;

use crate::errors::{EngineError, Result};
use crate::policy::EnginePolicy;
use crate::types::{ActorId, LotId, LotStatus, WasteClass, WasteLot};

pub struct WasteCatalog {
    lots: DashMap<LotId, WasteLot>,
    lots_by_supplier: DashMap<ActorId, Vec<LotId>>,
    next_id: AtomicU64,
}

impl Default for WasteCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl WasteCatalog {
    pub fn new() -> Self {
        Self {
            lots: DashMap::new(),
            lots_by_supplier: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Record a newly declared lot.
    ///
    /// Rejects non-positive weight. `expires_at` is `declared_at` plus the
    /// policy window iff the class is organic food; carbon-rich lots never
    /// expire. The declaration bonus and the expiring-waste request are the
    /// caller's side effects, not the catalog's.
    pub fn declare(
        &self,
        supplier_id: ActorId,
        waste_class: WasteClass,
        items: Vec<String>,
        weight_kg: f64,
        storage_location: impl Into<String>,
        policy: &EnginePolicy,
        now: DateTime<Utc>,
    ) -> Result<WasteLot> {
        if weight_kg <= 0.0 {
            return Err(EngineError::Validation(format!(
                "lot weight must be positive, got {weight_kg} kg"
            )));
        }

        let expires_at = match waste_class {
            WasteClass::OrganicFood => Some(now + Duration::hours(policy.expiry_hours)),
            WasteClass::CarbonRich => None,
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let lot = WasteLot {
            id,
            supplier_id,
            waste_class,
            items,
            weight_kg,
            declared_at: now,
            expires_at,
            status: LotStatus::Pending,
            storage_location: storage_location.into(),
        };

        self.lots.insert(id, lot.clone());
        self.lots_by_supplier
            .entry(supplier_id)
            .or_default()
            .push(id);
        info!(lot_id = id, supplier_id, ?waste_class, weight_kg, "lot declared");
        Ok(lot)
    }

    pub fn get(&self, lot_id: LotId) -> Result<WasteLot> {
        self.lots
            .get(&lot_id)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::NotFound("waste lot", lot_id))
    }

    /// All lots a supplier has ever declared, declaration order.
    pub fn for_supplier(&self, supplier_id: ActorId) -> Vec<WasteLot> {
        let ids = self
            .lots_by_supplier
            .get(&supplier_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| self.lots.get(id).map(|entry| entry.value().clone()))
            .collect()
    }

    /// Pending → Claimed, when an accepted request covers the lot.
    pub fn mark_claimed(&self, lot_id: LotId) -> Result<()> {
        self.transition(lot_id, LotStatus::Pending, LotStatus::Claimed)
    }

    /// Claimed → Pending, when the covering request is cancelled and the lot
    /// goes back on the market.
    pub fn release(&self, lot_id: LotId) -> Result<()> {
        self.transition(lot_id, LotStatus::Claimed, LotStatus::Pending)
    }

    /// Terminal transition to Collected. Fails with `InvalidTransition` if the
    /// lot was already collected.
    pub fn mark_collected(&self, lot_id: LotId) -> Result<()> {
        let mut lot = self
            .lots
            .get_mut(&lot_id)
            .ok_or(EngineError::NotFound("waste lot", lot_id))?;
        if lot.status == LotStatus::Collected {
            return Err(EngineError::InvalidTransition(format!(
                "lot {lot_id} is already collected"
            )));
        }
        lot.status = LotStatus::Collected;
        Ok(())
    }

    fn transition(&self, lot_id: LotId, from: LotStatus, to: LotStatus) -> Result<()> {
        let mut lot = self
            .lots
            .get_mut(&lot_id)
            .ok_or(EngineError::NotFound("waste lot", lot_id))?;
        if lot.status != from {
            return Err(EngineError::InvalidTransition(format!(
                "lot {lot_id} is {:?}, expected {from:?}",
                lot.status
            )));
        }
        lot.status = to;
        Ok(())
    }
}
