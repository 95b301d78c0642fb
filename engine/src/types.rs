//! # Types
//!
//! Shared data structures used across all components of the engine.
//!
//! ## Design decisions
//!
//! ### Status as a Finite-State Machine
//!
//! [`RequestStatus`] enforces a strict forward-only lifecycle:
//!
//! ```text
//! Open ──► Accepted ──► Delivered
//!   └──► Cancelled ◄──────┘ (from Accepted only via reject)
//! ```
//!
//! Backward transitions and transitions out of terminal states (`Delivered`,
//! `Cancelled`) are rejected by the tracker.
//!
//! ### Write-once descriptive fields
//!
//! Everything outside the status fields and quantities (`items`, `weight_kg`,
//! `expires_at`, `certifications`, ...) is written once at creation and never
//! mutated. Only the transitions named on each component may touch the rest.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifiers are auto-incremented per store, starting from 0.
pub type ActorId = u64;
pub type LotId = u64;
pub type RequestId = u64;
pub type BatchId = u64;
pub type ProduceId = u64;

// ─────────────────────────────────────────────────────────
// Actors
// ─────────────────────────────────────────────────────────

/// The four marketplace roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Declares waste lots (restaurants, hotels).
    Supplier,
    /// Claims open requests and performs deliveries (logistics, NGO drivers).
    Collector,
    /// Originates collection requests and lists compost batches.
    CompostingCenter,
    /// Buys compost and lists produce.
    Farmer,
}

/// Optional registered position, used to derive assignment distances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A registered marketplace participant. Role is fixed at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub role: Role,
    pub location: Option<GeoPoint>,
    pub registered_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────
// Waste lots
// ─────────────────────────────────────────────────────────

/// Classification of a declared lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasteClass {
    /// Perishable food waste; expires 48h after declaration by default.
    OrganicFood,
    /// Dry browns (cardboard, leaves); never expires.
    CarbonRich,
}

/// Lifecycle status of a waste lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    /// Declared, not yet part of an accepted request.
    Pending,
    /// An accepted request covers this lot.
    Claimed,
    /// Picked up and delivered.
    Collected,
}

/// A declared, weighed batch of waste from a Supplier.
///
/// Lots are archived, never deleted; an expired lot simply stops being
/// claimable (the expiry predicate is recomputed against "now", it is not an
/// event).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteLot {
    pub id: LotId,
    pub supplier_id: ActorId,
    pub waste_class: WasteClass,
    /// Ordered description of the lot contents.
    pub items: Vec<String>,
    /// Declared weight in kilograms; always > 0.
    pub weight_kg: f64,
    pub declared_at: DateTime<Utc>,
    /// Present only for [`WasteClass::OrganicFood`]; carbon-rich lots never expire.
    pub expires_at: Option<DateTime<Utc>>,
    pub status: LotStatus,
    /// Free-text storage location ("walk-in fridge, rear dock").
    pub storage_location: String,
}

impl WasteLot {
    /// Passive expiry predicate — recomputed against the supplied clock value.
    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }
}

// ─────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────

/// How the request came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOrigin {
    /// A Composting Center asked for material of a given class.
    CenterInitiated,
    /// Auto-published when an organic lot was declared (it will expire).
    ExpiringWaste,
}

/// Lifecycle status of a request. See the module doc for the FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Open,
    Accepted,
    Delivered,
    Cancelled,
}

impl RequestStatus {
    /// Terminal states absorb: no transition may leave them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// Derived urgency of an open request. Ordering is the board ordering:
/// `High` sorts before `Medium` sorts before `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Normal,
}

/// An open invitation to collect or supply material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub origin: RequestOrigin,
    /// The underlying lot for [`RequestOrigin::ExpiringWaste`] requests.
    pub lot_id: Option<LotId>,
    /// Requesting Composting Center. `None` for expiring-waste requests
    /// until a center accepts them.
    pub center_id: Option<ActorId>,
    pub waste_class: WasteClass,
    /// Target quantity in kilograms (the lot weight for expiring-waste).
    pub quantity_kg: f64,
    /// Explicit priority for center-initiated requests (default medium).
    /// Expiring-waste priority is derived from remaining time instead.
    pub explicit_priority: Option<Priority>,
    /// Collection deadline; equals the lot expiry for expiring-waste requests.
    pub deadline: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// A request as listed on the board, with its derived ordering keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenListing {
    pub priority: Priority,
    /// Seconds until the deadline/expiry, when one exists.
    pub remaining_secs: Option<i64>,
    pub request: Request,
}

// ─────────────────────────────────────────────────────────
// Assignments and delivery history
// ─────────────────────────────────────────────────────────

/// The live record of an accepted request, owned by the tracker until the
/// delivery completes or the request is cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Same id as the request it tracks.
    pub request_id: RequestId,
    /// The Collector for claimed requests; the accepting Center for
    /// center-accepted expiring lots.
    pub assignee_id: ActorId,
    /// The supplier or center on the other side of the delivery.
    pub counterpart_id: ActorId,
    pub quantity_kg: f64,
    /// Derived from the two actors' registered positions; `None` when either
    /// side has no position on file. Read-only.
    pub distance_km: Option<f64>,
    pub assigned_at: DateTime<Utc>,
}

/// Immutable record of a completed delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub request_id: RequestId,
    pub assignee_id: ActorId,
    pub counterpart_id: ActorId,
    pub quantity_kg: f64,
    pub distance_km: Option<f64>,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────
// Ledger
// ─────────────────────────────────────────────────────────

/// Why a ledger entry exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    /// +10 for declaring a waste lot.
    DeclarationBonus,
    /// +50 for completing a delivery.
    CollectionBonus,
    /// Points spent on a marketplace discount.
    Redemption,
}

/// One append-only ledger line. `balance_after` is denormalized for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub actor_id: ActorId,
    pub delta: i64,
    pub reason: LedgerReason,
    pub balance_after: i64,
    pub at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────
// Marketplace
// ─────────────────────────────────────────────────────────

/// Nutrient profile of a compost batch, in non-negative percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NpkProfile {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
}

/// A sellable unit of processed compost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompostBatch {
    pub id: BatchId,
    pub center_id: ActorId,
    /// Display label ("vermicompost", "thermophilic blend").
    pub type_label: String,
    pub npk: NpkProfile,
    /// Remaining stock in kilograms; decrements on purchase, never negative.
    pub quantity_kg: f64,
    /// Price per kilogram.
    pub unit_price: f64,
    pub certifications: BTreeSet<String>,
    pub listed_at: DateTime<Utc>,
}

/// A farmer-supplied produce listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduceItem {
    pub id: ProduceId,
    pub owner_id: ActorId,
    pub name: String,
    /// Current asking price per unit.
    pub price: f64,
    /// Pre-markdown price, kept for display.
    pub original_price: f64,
    /// Remaining units; decrements on purchase, never negative.
    pub quantity: u32,
    pub listed_at: DateTime<Utc>,
}

/// What was bought, for how much, and with what discount applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub buyer_id: ActorId,
    /// Batch or produce id, depending on which catalog was purchased from.
    pub item_id: u64,
    pub quantity: f64,
    pub unit_price: f64,
    /// Derived from redeemed points at purchase time; 0 when no points were applied.
    pub applied_discount_percent: u32,
    /// `unit_price * quantity * (1 - discount/100)`.
    pub total_price: f64,
    pub purchased_at: DateTime<Utc>,
}
