//! # WasteLoop Engine
//!
//! Workflow engine for a waste-to-compost circular-economy marketplace. It
//! takes a declared waste lot through the full loop — claim, delivery,
//! composting, sale — and keeps the rewards ledger honest along the way.
//!
//! | Phase       | Entry point(s)                                          |
//! |-------------|---------------------------------------------------------|
//! | Onboarding  | [`WasteLoop::register_actor`]                           |
//! | Declaration | [`WasteLoop::declare`], [`WasteLoop::list_own_waste`]   |
//! | Matching    | [`WasteLoop::create_center_request`], [`WasteLoop::list_open`], [`WasteLoop::claim`], [`WasteLoop::accept`], [`WasteLoop::reject`] |
//! | Delivery    | [`WasteLoop::complete`], [`WasteLoop::list_assigned`], [`WasteLoop::list_history`] |
//! | Rewards     | [`WasteLoop::balance`], [`WasteLoop::redeem`]           |
//! | Marketplace | [`WasteLoop::list_batch`], [`WasteLoop::list_produce`], [`WasteLoop::purchase_batch`], [`WasteLoop::purchase_produce`] |
//! | Audit       | [`WasteLoop::events`], [`WasteLoop::events_for`], [`WasteLoop::request`] |
//!
//! ## Architecture
//!
//! Each component owns one entity store; this facade owns the cross-component
//! choreography (a declaration credits the ledger and publishes a request, a
//! completion credits the ledger and archives the assignment) and the role
//! gates in front of every mutation. No business rule lives in the front
//! ends: they are pure callers.
//!
//! All public operations are safe to call from any thread. Per-entity
//! mutations serialize on sharded entry locks; the claim/complete state
//! machine additionally serializes on the tracker lock so request status,
//! live assignments, and delivery history can never disagree.

pub mod actors;
pub mod board;
pub mod catalog;
pub mod clock;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod market;
pub mod policy;
pub mod tracker;
pub mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_board;
#[cfg(test)]
mod test_concurrency;
#[cfg(test)]
mod test_marketplace;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use actors::ActorRegistry;
use board::RequestBoard;
use catalog::WasteCatalog;
use clock::Clock;
use events::EventLog;
use ledger::Ledger;
use market::MarketplaceCatalog;
use tracker::AssignmentTracker;

pub use clock::{ManualClock, SystemClock};
pub use errors::{EngineError, Result};
pub use events::{EventKind, WorkflowEvent};
pub use policy::EnginePolicy;
pub use types::{
    Actor, ActorId, Assignment, BatchId, CompostBatch, DeliveryRecord, GeoPoint, LedgerEntry,
    LedgerReason, LotId, LotStatus, NpkProfile, OpenListing, Priority, ProduceId, ProduceItem,
    Receipt, Request, RequestId, RequestOrigin, RequestStatus, Role, WasteClass, WasteLot,
};

/// The shared workflow engine. One instance is the authoritative store for
/// every entity type; front ends hold an `Arc<WasteLoop>` and call in.
pub struct WasteLoop {
    policy: EnginePolicy,
    clock: Arc<dyn Clock>,
    actors: ActorRegistry,
    ledger: Ledger,
    catalog: WasteCatalog,
    board: RequestBoard,
    tracker: AssignmentTracker,
    market: MarketplaceCatalog,
    events: EventLog,
}

impl Default for WasteLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl WasteLoop {
    /// Engine with default policy on the system clock.
    pub fn new() -> Self {
        Self::with_parts(EnginePolicy::default(), Arc::new(SystemClock))
    }

    pub fn with_policy(policy: EnginePolicy) -> Self {
        Self::with_parts(policy, Arc::new(SystemClock))
    }

    pub fn with_parts(policy: EnginePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            actors: ActorRegistry::new(),
            ledger: Ledger::new(),
            catalog: WasteCatalog::new(),
            board: RequestBoard::new(),
            tracker: AssignmentTracker::new(),
            market: MarketplaceCatalog::new(),
            events: EventLog::new(),
        }
    }

    pub fn policy(&self) -> &EnginePolicy {
        &self.policy
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ─────────────────────────────────────────────────────
    // Onboarding
    // ─────────────────────────────────────────────────────

    /// Register an actor with a fixed role and optional position.
    pub fn register_actor(
        &self,
        name: impl Into<String>,
        role: Role,
        location: Option<GeoPoint>,
    ) -> Actor {
        self.actors.register(name, role, location, self.now())
    }

    pub fn actor(&self, id: ActorId) -> Result<Actor> {
        self.actors.get(id)
    }

    // ─────────────────────────────────────────────────────
    // Declaration (Supplier surface)
    // ─────────────────────────────────────────────────────

    /// Declare a weighed waste lot.
    ///
    /// Rejects non-positive weight. Organic lots get an expiry of
    /// declaration time plus the policy window and are auto-published to the
    /// request board; the supplier is credited the declaration bonus either
    /// way.
    ///
    /// # Errors
    ///
    /// `RoleMismatch` unless `supplier_id` is a Supplier; `Validation` on
    /// non-positive weight.
    pub fn declare(
        &self,
        supplier_id: ActorId,
        waste_class: WasteClass,
        items: Vec<String>,
        weight_kg: f64,
        storage_location: impl Into<String>,
    ) -> Result<WasteLot> {
        self.actors.require_role(supplier_id, Role::Supplier)?;
        let now = self.now();
        let lot = self.catalog.declare(
            supplier_id,
            waste_class,
            items,
            weight_kg,
            storage_location,
            &self.policy,
            now,
        )?;
        self.events.append(
            EventKind::WasteDeclared,
            Some(lot.id),
            Some(supplier_id),
            format!("{} kg of {:?}", lot.weight_kg, lot.waste_class),
            now,
        );

        let entry = self.ledger.credit(
            supplier_id,
            self.policy.declaration_bonus,
            LedgerReason::DeclarationBonus,
            now,
        )?;
        self.events.append(
            EventKind::PointsCredited,
            Some(lot.id),
            Some(supplier_id),
            format!("+{} declaration bonus", entry.delta),
            now,
        );

        if waste_class == WasteClass::OrganicFood {
            let request = self.board.publish_expiring(&lot, now);
            self.events.append(
                EventKind::RequestOpened,
                Some(request.id),
                Some(supplier_id),
                "expiring-waste request auto-published",
                now,
            );
        }
        Ok(lot)
    }

    /// All lots the supplier has ever declared, declaration order.
    pub fn list_own_waste(&self, supplier_id: ActorId) -> Vec<WasteLot> {
        self.catalog.for_supplier(supplier_id)
    }

    pub fn lot(&self, lot_id: LotId) -> Result<WasteLot> {
        self.catalog.get(lot_id)
    }

    /// Mark a lot picked up. Fails with `NotFound` for unknown ids and
    /// `InvalidTransition` if it was already collected.
    pub fn mark_collected(&self, lot_id: LotId) -> Result<()> {
        self.catalog.mark_collected(lot_id)
    }

    // ─────────────────────────────────────────────────────
    // Matching (Collector / Composting Center surfaces)
    // ─────────────────────────────────────────────────────

    /// Open a center-initiated collection request.
    pub fn create_center_request(
        &self,
        center_id: ActorId,
        waste_class: WasteClass,
        quantity_kg: f64,
        deadline: Option<DateTime<Utc>>,
        priority: Option<Priority>,
    ) -> Result<Request> {
        self.actors.require_role(center_id, Role::CompostingCenter)?;
        let now = self.now();
        let request = self.board.create_center_request(
            center_id,
            waste_class,
            quantity_kg,
            deadline,
            priority,
            now,
        )?;
        self.events.append(
            EventKind::RequestOpened,
            Some(request.id),
            Some(center_id),
            format!("center request for {quantity_kg} kg"),
            now,
        );
        Ok(request)
    }

    /// The visible board, in its stable total order.
    pub fn list_open(&self, filter_by_class: Option<WasteClass>) -> Vec<OpenListing> {
        self.board.list_open(filter_by_class, &self.policy, self.now())
    }

    /// Any request by id, regardless of status — the audit read.
    pub fn request(&self, request_id: RequestId) -> Result<Request> {
        self.board.get(request_id)
    }

    /// Collector takes ownership of an open request. Exactly one concurrent
    /// caller wins; expiry is checked atomically with the claim.
    pub fn claim(&self, request_id: RequestId, collector_id: ActorId) -> Result<Assignment> {
        self.actors.require_role(collector_id, Role::Collector)?;
        let now = self.now();
        let assignment = self.tracker.claim(
            request_id,
            collector_id,
            &self.board,
            &self.catalog,
            &self.actors,
            now,
        )?;
        self.events.append(
            EventKind::RequestClaimed,
            Some(request_id),
            Some(collector_id),
            "claimed by collector",
            now,
        );
        Ok(assignment)
    }

    /// Composting center commits to receive an expiring-waste request that
    /// has no center attached yet. Same winner contract as [`Self::claim`].
    pub fn accept(&self, request_id: RequestId, center_id: ActorId) -> Result<Assignment> {
        self.actors.require_role(center_id, Role::CompostingCenter)?;
        let now = self.now();
        let assignment = self.tracker.accept(
            request_id,
            center_id,
            &self.board,
            &self.catalog,
            &self.actors,
            now,
        )?;
        self.events.append(
            EventKind::RequestClaimed,
            Some(request_id),
            Some(center_id),
            "accepted by composting center",
            now,
        );
        Ok(assignment)
    }

    /// Cancel a request. Rejecting an already-cancelled request is a no-op,
    /// not an error; a delivered request is immutable.
    pub fn reject(&self, request_id: RequestId) -> Result<()> {
        let (prev, _request) = self
            .tracker
            .reject(request_id, &self.board, &self.catalog)?;
        if prev != RequestStatus::Cancelled {
            self.events.append(
                EventKind::RequestRejected,
                Some(request_id),
                None,
                format!("rejected from {prev:?}"),
                self.now(),
            );
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────
    // Delivery
    // ─────────────────────────────────────────────────────

    /// Finish an accepted request: the live assignment moves to the delivery
    /// history, the assignee is credited the collection bonus, and the
    /// request reaches its terminal `Delivered` state — one atomic step to
    /// tracker readers.
    pub fn complete(&self, request_id: RequestId) -> Result<DeliveryRecord> {
        let now = self.now();
        let record = self.tracker.complete(
            request_id,
            &self.board,
            &self.catalog,
            &self.ledger,
            &self.policy,
            now,
        )?;
        self.events.append(
            EventKind::DeliveryCompleted,
            Some(request_id),
            Some(record.assignee_id),
            format!("{} kg delivered", record.quantity_kg),
            now,
        );
        self.events.append(
            EventKind::PointsCredited,
            Some(request_id),
            Some(record.assignee_id),
            format!("+{} collection bonus", self.policy.collection_bonus),
            now,
        );
        Ok(record)
    }

    /// Live assignments held by a collector (or accepting center).
    pub fn list_assigned(&self, assignee_id: ActorId) -> Vec<Assignment> {
        self.tracker.list_assigned(assignee_id)
    }

    /// Completed deliveries the actor took part in.
    pub fn list_history(&self, actor_id: ActorId) -> Vec<DeliveryRecord> {
        self.tracker.list_history(actor_id)
    }

    // ─────────────────────────────────────────────────────
    // Rewards
    // ─────────────────────────────────────────────────────

    pub fn balance(&self, actor_id: ActorId) -> i64 {
        self.ledger.balance(actor_id)
    }

    pub fn ledger_entries(&self, actor_id: ActorId) -> Vec<LedgerEntry> {
        self.ledger.entries(actor_id)
    }

    /// Spend points for a discount percent. Debits first; no discount exists
    /// unless the debit succeeded.
    pub fn redeem(&self, actor_id: ActorId, points: i64) -> Result<u32> {
        self.actors.get(actor_id)?;
        let now = self.now();
        let percent = self.ledger.redeem(actor_id, points, &self.policy, now)?;
        self.events.append(
            EventKind::PointsRedeemed,
            None,
            Some(actor_id),
            format!("-{points} points for {percent}% discount"),
            now,
        );
        Ok(percent)
    }

    // ─────────────────────────────────────────────────────
    // Marketplace (Composting Center / Farmer surfaces)
    // ─────────────────────────────────────────────────────

    /// List a compost batch for sale.
    pub fn list_batch(
        &self,
        center_id: ActorId,
        type_label: impl Into<String>,
        npk: NpkProfile,
        quantity_kg: f64,
        unit_price: f64,
        certifications: impl IntoIterator<Item = String>,
    ) -> Result<CompostBatch> {
        self.actors.require_role(center_id, Role::CompostingCenter)?;
        let now = self.now();
        let batch = self.market.list_batch(
            center_id,
            type_label,
            npk,
            quantity_kg,
            unit_price,
            certifications,
            now,
        )?;
        self.events.append(
            EventKind::BatchListed,
            Some(batch.id),
            Some(center_id),
            format!("{} kg {}", batch.quantity_kg, batch.type_label),
            now,
        );
        Ok(batch)
    }

    /// List farm produce for sale.
    pub fn list_produce(
        &self,
        farmer_id: ActorId,
        name: impl Into<String>,
        price: f64,
        original_price: f64,
        quantity: u32,
    ) -> Result<ProduceItem> {
        self.actors.require_role(farmer_id, Role::Farmer)?;
        let now = self.now();
        let item = self
            .market
            .list_produce(farmer_id, name, price, original_price, quantity, now)?;
        self.events.append(
            EventKind::ProduceListed,
            Some(item.id),
            Some(farmer_id),
            format!("{} x {}", item.quantity, item.name),
            now,
        );
        Ok(item)
    }

    /// In-stock compost batches.
    pub fn batches(&self) -> Vec<CompostBatch> {
        self.market.batches()
    }

    pub fn batch(&self, id: BatchId) -> Result<CompostBatch> {
        self.market.batch(id)
    }

    /// In-stock produce listings.
    pub fn produce_items(&self) -> Vec<ProduceItem> {
        self.market.produce_items()
    }

    pub fn produce_item(&self, id: ProduceId) -> Result<ProduceItem> {
        self.market.produce_item(id)
    }

    /// Buy from a compost batch, optionally redeeming points. Stock check,
    /// redemption, and decrement are atomic per batch.
    pub fn purchase_batch(
        &self,
        batch_id: BatchId,
        buyer_id: ActorId,
        quantity_kg: f64,
        points_to_apply: i64,
    ) -> Result<Receipt> {
        self.actors
            .require_any_role(buyer_id, &[Role::Farmer, Role::Supplier])?;
        let now = self.now();
        let receipt = self.market.purchase_batch(
            batch_id,
            buyer_id,
            quantity_kg,
            points_to_apply,
            &self.ledger,
            &self.policy,
            now,
        )?;
        self.record_purchase(&receipt, points_to_apply, now);
        Ok(receipt)
    }

    /// Buy produce units, optionally redeeming points.
    pub fn purchase_produce(
        &self,
        produce_id: ProduceId,
        buyer_id: ActorId,
        quantity: u32,
        points_to_apply: i64,
    ) -> Result<Receipt> {
        self.actors
            .require_any_role(buyer_id, &[Role::Farmer, Role::Supplier])?;
        let now = self.now();
        let receipt = self.market.purchase_produce(
            produce_id,
            buyer_id,
            quantity,
            points_to_apply,
            &self.ledger,
            &self.policy,
            now,
        )?;
        self.record_purchase(&receipt, points_to_apply, now);
        Ok(receipt)
    }

    fn record_purchase(&self, receipt: &Receipt, points_applied: i64, now: DateTime<Utc>) {
        if points_applied > 0 {
            self.events.append(
                EventKind::PointsRedeemed,
                Some(receipt.item_id),
                Some(receipt.buyer_id),
                format!(
                    "-{points_applied} points for {}% discount",
                    receipt.applied_discount_percent
                ),
                now,
            );
        }
        self.events.append(
            EventKind::PurchaseCompleted,
            Some(receipt.item_id),
            Some(receipt.buyer_id),
            format!("{} units at {}", receipt.quantity, receipt.total_price),
            now,
        );
    }

    // ─────────────────────────────────────────────────────
    // Audit & maintenance
    // ─────────────────────────────────────────────────────

    /// The full audit stream, sequence ascending.
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.all()
    }

    /// Audit events about one subject id.
    pub fn events_for(&self, subject_id: u64) -> Vec<WorkflowEvent> {
        self.events.for_subject(subject_id)
    }

    /// Demote expired open requests from the visible board. Optional
    /// maintenance — claims re-check expiry themselves — but keeps listings
    /// tidy. Returns the number of requests demoted.
    pub fn sweep_expired(&self) -> usize {
        let now = self.now();
        let demoted = self.board.sweep_expired(now);
        for request in &demoted {
            self.events.append(
                EventKind::RequestExpired,
                Some(request.id),
                None,
                "expired before any claim",
                now,
            );
        }
        demoted.len()
    }
}
