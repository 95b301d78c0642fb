//! Marketplace — compost batches and farm-produce listings.
//!
//! A purchase runs entirely under the listing's `DashMap` entry lock: stock
//! check, point redemption, and decrement are one atomic step per item, so
//! two simultaneous purchases against the same low-stock listing can never
//! both succeed past the remaining quantity. A failed redemption leaves the
//! stock untouched; insufficient stock is detected before any points move.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::info;

use crate::errors::{EngineError, Result};
use crate::ledger::Ledger;
use crate::policy::EnginePolicy;
use crate::types::{
    ActorId, BatchId, CompostBatch, NpkProfile, ProduceId, ProduceItem, Receipt,
};

pub struct MarketplaceCatalog {
    batches: DashMap<BatchId, CompostBatch>,
    produce: DashMap<ProduceId, ProduceItem>,
    next_batch_id: AtomicU64,
    next_produce_id: AtomicU64,
}

impl Default for MarketplaceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketplaceCatalog {
    pub fn new() -> Self {
        Self {
            batches: DashMap::new(),
            produce: DashMap::new(),
            next_batch_id: AtomicU64::new(0),
            next_produce_id: AtomicU64::new(0),
        }
    }

    // ─────────────────────────────────────────────────────
    // Listings
    // ─────────────────────────────────────────────────────

    /// List a processed compost batch for sale.
    pub fn list_batch(
        &self,
        center_id: ActorId,
        type_label: impl Into<String>,
        npk: NpkProfile,
        quantity_kg: f64,
        unit_price: f64,
        certifications: impl IntoIterator<Item = String>,
        now: DateTime<Utc>,
    ) -> Result<CompostBatch> {
        if quantity_kg <= 0.0 {
            return Err(EngineError::Validation(format!(
                "batch quantity must be positive, got {quantity_kg} kg"
            )));
        }
        if unit_price <= 0.0 {
            return Err(EngineError::Validation(format!(
                "batch price must be positive, got {unit_price}"
            )));
        }
        if npk.nitrogen < 0.0 || npk.phosphorus < 0.0 || npk.potassium < 0.0 {
            return Err(EngineError::Validation(
                "NPK percentages must be non-negative".into(),
            ));
        }

        let id = self.next_batch_id.fetch_add(1, Ordering::SeqCst);
        let batch = CompostBatch {
            id,
            center_id,
            type_label: type_label.into(),
            npk,
            quantity_kg,
            unit_price,
            certifications: certifications.into_iter().collect(),
            listed_at: now,
        };
        self.batches.insert(id, batch.clone());
        info!(batch_id = id, center_id, quantity_kg, "compost batch listed");
        Ok(batch)
    }

    /// List farm produce for sale.
    pub fn list_produce(
        &self,
        owner_id: ActorId,
        name: impl Into<String>,
        price: f64,
        original_price: f64,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<ProduceItem> {
        if quantity == 0 {
            return Err(EngineError::Validation(
                "produce quantity must be positive".into(),
            ));
        }
        if price <= 0.0 || original_price <= 0.0 {
            return Err(EngineError::Validation(format!(
                "produce prices must be positive, got {price} / {original_price}"
            )));
        }

        let id = self.next_produce_id.fetch_add(1, Ordering::SeqCst);
        let item = ProduceItem {
            id,
            owner_id,
            name: name.into(),
            price,
            original_price,
            quantity,
            listed_at: now,
        };
        self.produce.insert(id, item.clone());
        info!(produce_id = id, owner_id, quantity, "produce listed");
        Ok(item)
    }

    pub fn batch(&self, id: BatchId) -> Result<CompostBatch> {
        self.batches
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::NotFound("compost batch", id))
    }

    pub fn produce_item(&self, id: ProduceId) -> Result<ProduceItem> {
        self.produce
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::NotFound("produce item", id))
    }

    /// All batches with stock remaining, listing order.
    pub fn batches(&self) -> Vec<CompostBatch> {
        let mut all: Vec<CompostBatch> = self
            .batches
            .iter()
            .filter(|entry| entry.quantity_kg > 0.0)
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|batch| batch.id);
        all
    }

    /// All produce with stock remaining, listing order.
    pub fn produce_items(&self) -> Vec<ProduceItem> {
        let mut all: Vec<ProduceItem> = self
            .produce
            .iter()
            .filter(|entry| entry.quantity > 0)
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|item| item.id);
        all
    }

    // ─────────────────────────────────────────────────────
    // Purchases
    // ─────────────────────────────────────────────────────

    /// Buy `quantity_kg` from a compost batch, optionally redeeming points
    /// for a discount.
    pub fn purchase_batch(
        &self,
        batch_id: BatchId,
        buyer_id: ActorId,
        quantity_kg: f64,
        points_to_apply: i64,
        ledger: &Ledger,
        policy: &EnginePolicy,
        now: DateTime<Utc>,
    ) -> Result<Receipt> {
        if quantity_kg <= 0.0 {
            return Err(EngineError::Validation(format!(
                "purchase quantity must be positive, got {quantity_kg} kg"
            )));
        }
        let mut batch = self
            .batches
            .get_mut(&batch_id)
            .ok_or(EngineError::NotFound("compost batch", batch_id))?;
        if quantity_kg > batch.quantity_kg {
            return Err(EngineError::InsufficientStock {
                available: batch.quantity_kg,
                requested: quantity_kg,
            });
        }

        let discount = redeem_discount(ledger, buyer_id, points_to_apply, policy, now)?;
        batch.quantity_kg -= quantity_kg;

        let receipt = build_receipt(buyer_id, batch_id, quantity_kg, batch.unit_price, discount, now);
        info!(batch_id, buyer_id, quantity_kg, discount, "batch purchased");
        Ok(receipt)
    }

    /// Buy `quantity` units of a produce listing, optionally redeeming points.
    pub fn purchase_produce(
        &self,
        produce_id: ProduceId,
        buyer_id: ActorId,
        quantity: u32,
        points_to_apply: i64,
        ledger: &Ledger,
        policy: &EnginePolicy,
        now: DateTime<Utc>,
    ) -> Result<Receipt> {
        if quantity == 0 {
            return Err(EngineError::Validation(
                "purchase quantity must be positive".into(),
            ));
        }
        let mut item = self
            .produce
            .get_mut(&produce_id)
            .ok_or(EngineError::NotFound("produce item", produce_id))?;
        if quantity > item.quantity {
            return Err(EngineError::InsufficientStock {
                available: f64::from(item.quantity),
                requested: f64::from(quantity),
            });
        }

        let discount = redeem_discount(ledger, buyer_id, points_to_apply, policy, now)?;
        item.quantity -= quantity;

        let receipt = build_receipt(
            buyer_id,
            produce_id,
            f64::from(quantity),
            item.price,
            discount,
            now,
        );
        info!(produce_id, buyer_id, quantity, discount, "produce purchased");
        Ok(receipt)
    }
}

/// Zero points means no ledger touch and no discount; otherwise the debit
/// happens first and the discount only exists if it succeeded.
fn redeem_discount(
    ledger: &Ledger,
    buyer_id: ActorId,
    points_to_apply: i64,
    policy: &EnginePolicy,
    now: DateTime<Utc>,
) -> Result<u32> {
    if points_to_apply == 0 {
        return Ok(0);
    }
    ledger.redeem(buyer_id, points_to_apply, policy, now)
}

fn build_receipt(
    buyer_id: ActorId,
    item_id: u64,
    quantity: f64,
    unit_price: f64,
    applied_discount_percent: u32,
    now: DateTime<Utc>,
) -> Receipt {
    let gross = unit_price * quantity;
    let total_price = gross * (1.0 - f64::from(applied_discount_percent) / 100.0);
    Receipt {
        buyer_id,
        item_id,
        quantity,
        unit_price,
        applied_discount_percent,
        total_price,
        purchased_at: now,
    }
}
