//! Request board — the matching surface.
//!
//! Holds every request ever opened (terminal requests stay queryable by id
//! for audit) and owns the two decisions with real contention:
//!
//! * the **at-most-one-winner** transition out of `Open`, done by mutating
//!   the request under its `DashMap` entry lock so concurrent claims
//!   serialize per id, and
//! * the **atomic expiry check** inside that same critical section — expiry
//!   is re-evaluated at claim time, never pre-filtered, so a request cannot
//!   be won after its lot has lapsed.
//!
//! Priority is derived here and only here; every caller sees the same rule.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info};

use crate::errors::{EngineError, Result};
use crate::policy::EnginePolicy;
use crate::types::{
    ActorId, OpenListing, Priority, Request, RequestId, RequestOrigin, RequestStatus, WasteClass,
    WasteLot,
};

pub struct RequestBoard {
    requests: DashMap<RequestId, Request>,
    next_id: AtomicU64,
}

impl Default for RequestBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBoard {
    pub fn new() -> Self {
        Self {
            requests: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Open a center-initiated request for material of a given class.
    pub fn create_center_request(
        &self,
        center_id: ActorId,
        waste_class: WasteClass,
        quantity_kg: f64,
        deadline: Option<DateTime<Utc>>,
        priority: Option<Priority>,
        now: DateTime<Utc>,
    ) -> Result<Request> {
        if quantity_kg <= 0.0 {
            return Err(EngineError::Validation(format!(
                "requested quantity must be positive, got {quantity_kg} kg"
            )));
        }
        if let Some(deadline) = deadline {
            if deadline <= now {
                return Err(EngineError::Validation(
                    "request deadline must be in the future".into(),
                ));
            }
        }

        let request = self.insert(Request {
            id: 0, // assigned below
            origin: RequestOrigin::CenterInitiated,
            lot_id: None,
            center_id: Some(center_id),
            waste_class,
            quantity_kg,
            explicit_priority: Some(priority.unwrap_or(Priority::Medium)),
            deadline,
            status: RequestStatus::Open,
            created_at: now,
        });
        info!(request_id = request.id, center_id, "center request opened");
        Ok(request)
    }

    /// Auto-publish an expiring-waste request for a freshly declared organic
    /// lot. The deadline is the lot expiry; no center is attached yet.
    pub fn publish_expiring(&self, lot: &WasteLot, now: DateTime<Utc>) -> Request {
        let request = self.insert(Request {
            id: 0,
            origin: RequestOrigin::ExpiringWaste,
            lot_id: Some(lot.id),
            center_id: None,
            waste_class: lot.waste_class,
            quantity_kg: lot.weight_kg,
            explicit_priority: None,
            deadline: lot.expires_at,
            status: RequestStatus::Open,
            created_at: now,
        });
        info!(request_id = request.id, lot_id = lot.id, "expiring-waste request opened");
        request
    }

    fn insert(&self, mut request: Request) -> Request {
        request.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.requests.insert(request.id, request.clone());
        request
    }

    /// Any request, regardless of status — the audit read path.
    pub fn get(&self, request_id: RequestId) -> Result<Request> {
        self.requests
            .get(&request_id)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::NotFound("request", request_id))
    }

    // ─────────────────────────────────────────────────────
    // Listing
    // ─────────────────────────────────────────────────────

    /// The visible board: open requests, expired expiring-waste excluded,
    /// in the stable total order (priority, remaining time, creation, id).
    pub fn list_open(
        &self,
        filter_by_class: Option<WasteClass>,
        policy: &EnginePolicy,
        now: DateTime<Utc>,
    ) -> Vec<OpenListing> {
        let mut listings: Vec<OpenListing> = self
            .requests
            .iter()
            .filter(|entry| entry.status == RequestStatus::Open)
            .filter(|entry| filter_by_class.is_none_or(|class| entry.waste_class == class))
            .filter(|entry| !is_expired(entry.value(), now))
            .map(|entry| {
                let request = entry.value().clone();
                OpenListing {
                    priority: derive_priority(&request, policy, now),
                    remaining_secs: request.deadline.map(|d| (d - now).num_seconds()),
                    request,
                }
            })
            .collect();

        listings.sort_by(compare_listings);
        listings
    }

    // ─────────────────────────────────────────────────────
    // Transitions out of Open (the contended path)
    // ─────────────────────────────────────────────────────

    /// `Open → Accepted` for a collector claim. Exactly one concurrent caller
    /// wins; losers see [`EngineError::AlreadyClaimed`]. Expiry is checked
    /// under the same entry lock.
    pub fn claim_open(&self, request_id: RequestId, now: DateTime<Utc>) -> Result<Request> {
        let mut request = self
            .requests
            .get_mut(&request_id)
            .ok_or(EngineError::NotFound("request", request_id))?;
        check_claimable(request.value(), now)?;
        request.status = RequestStatus::Accepted;
        debug!(request_id, "request accepted");
        Ok(request.clone())
    }

    /// `Open → Accepted` for a composting center accepting an expiring-waste
    /// request that has no receiving center yet. Fills `center_id`. Same
    /// at-most-one-winner contract as [`Self::claim_open`].
    pub fn accept_open(
        &self,
        request_id: RequestId,
        center_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<Request> {
        let mut request = self
            .requests
            .get_mut(&request_id)
            .ok_or(EngineError::NotFound("request", request_id))?;
        if request.origin != RequestOrigin::ExpiringWaste {
            return Err(EngineError::InvalidTransition(format!(
                "request {request_id} is center-initiated; collectors claim it instead"
            )));
        }
        check_claimable(request.value(), now)?;
        request.center_id = Some(center_id);
        request.status = RequestStatus::Accepted;
        debug!(request_id, center_id, "request accepted by center");
        Ok(request.clone())
    }

    /// `Accepted → Delivered | Cancelled`. Called with the tracker's write
    /// lock held so the request status and the assignment move stay one step.
    pub fn finish_accepted(
        &self,
        request_id: RequestId,
        to: RequestStatus,
    ) -> Result<Request> {
        debug_assert!(to.is_terminal());
        let mut request = self
            .requests
            .get_mut(&request_id)
            .ok_or(EngineError::NotFound("request", request_id))?;
        if request.status != RequestStatus::Accepted {
            return Err(EngineError::InvalidTransition(format!(
                "request {request_id} is {:?}, expected accepted",
                request.status
            )));
        }
        request.status = to;
        Ok(request.clone())
    }

    /// Compensating rollback: `Accepted → Open`, for when the second phase of
    /// a claim fails after the status flip.
    pub(crate) fn reopen(&self, request_id: RequestId) {
        if let Some(mut request) = self.requests.get_mut(&request_id) {
            if request.status == RequestStatus::Accepted {
                request.status = RequestStatus::Open;
                if request.origin == RequestOrigin::ExpiringWaste {
                    request.center_id = None;
                }
            }
        }
    }

    /// Cancel a request. Idempotent on already-cancelled requests.
    ///
    /// Returns the status the request held *before* this call so the caller
    /// can tear down a live assignment when an accepted request is rejected.
    pub fn reject(&self, request_id: RequestId) -> Result<(RequestStatus, Request)> {
        let mut request = self
            .requests
            .get_mut(&request_id)
            .ok_or(EngineError::NotFound("request", request_id))?;
        let prev = request.status;
        match prev {
            RequestStatus::Open | RequestStatus::Accepted => {
                request.status = RequestStatus::Cancelled;
                info!(request_id, ?prev, "request rejected");
            }
            RequestStatus::Cancelled => {}
            RequestStatus::Delivered => {
                return Err(EngineError::InvalidTransition(format!(
                    "request {request_id} is already delivered"
                )));
            }
        }
        Ok((prev, request.clone()))
    }

    /// Demote open expiring-waste requests whose lot has lapsed. Correctness
    /// never depends on this running; the check in [`Self::claim_open`] is
    /// the source of truth.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<Request> {
        let mut demoted = Vec::new();
        for mut entry in self.requests.iter_mut() {
            if entry.status == RequestStatus::Open && is_expired(entry.value(), now) {
                entry.status = RequestStatus::Cancelled;
                demoted.push(entry.value().clone());
            }
        }
        if !demoted.is_empty() {
            info!(count = demoted.len(), "swept expired requests off the board");
        }
        demoted
    }
}

/// Only expiring-waste requests expire; their deadline is the lot expiry.
fn is_expired(request: &Request, now: DateTime<Utc>) -> bool {
    request.origin == RequestOrigin::ExpiringWaste
        && request.deadline.is_some_and(|deadline| now > deadline)
}

fn check_claimable(request: &Request, now: DateTime<Utc>) -> Result<()> {
    match request.status {
        RequestStatus::Open => {}
        RequestStatus::Accepted | RequestStatus::Delivered => {
            return Err(EngineError::AlreadyClaimed(request.id));
        }
        RequestStatus::Cancelled => {
            return Err(EngineError::InvalidTransition(format!(
                "request {} is cancelled",
                request.id
            )));
        }
    }
    if is_expired(request, now) {
        return Err(EngineError::Expired(request.id));
    }
    Ok(())
}

/// The single priority-derivation rule: expiring-waste urgency comes from the
/// remaining time; center-initiated requests carry their explicit priority.
pub fn derive_priority(request: &Request, policy: &EnginePolicy, now: DateTime<Utc>) -> Priority {
    match request.origin {
        RequestOrigin::CenterInitiated => request.explicit_priority.unwrap_or(Priority::Medium),
        RequestOrigin::ExpiringWaste => {
            let Some(deadline) = request.deadline else {
                return Priority::Normal;
            };
            let remaining = deadline - now;
            if remaining < chrono::Duration::hours(policy.high_priority_within_hours) {
                Priority::High
            } else if remaining < chrono::Duration::hours(policy.medium_priority_within_hours) {
                Priority::Medium
            } else {
                Priority::Normal
            }
        }
    }
}

/// Stable total order: priority rank, then remaining time (undated requests
/// last), then creation time, ties broken by id.
fn compare_listings(a: &OpenListing, b: &OpenListing) -> CmpOrdering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| {
            a.remaining_secs
                .unwrap_or(i64::MAX)
                .cmp(&b.remaining_secs.unwrap_or(i64::MAX))
        })
        .then_with(|| a.request.created_at.cmp(&b.request.created_at))
        .then_with(|| a.request.id.cmp(&b.request.id))
}
