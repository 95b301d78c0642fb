//! Assignment tracker — the accepted half of a request's life.
//!
//! Owns the live-assignment table and the append-only delivery history
//! behind one `RwLock`, so the move from "assigned" to "in history" on
//! completion is a single atomic step: readers see a record on exactly one
//! side, never both, never neither. The ledger credit for a completed
//! delivery happens inside the same critical section, which keeps `complete`
//! all-or-nothing with respect to tracker readers.
//!
//! Every verb that moves a request out of `Open` runs under the tracker
//! write lock *and* the board's per-request entry lock, so the request
//! status and the assignment table can never disagree.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::actors::ActorRegistry;
use crate::board::RequestBoard;
use crate::catalog::WasteCatalog;
use crate::errors::{EngineError, Result};
use crate::ledger::Ledger;
use crate::policy::EnginePolicy;
use crate::types::{
    ActorId, Assignment, DeliveryRecord, LedgerReason, Request, RequestId, RequestOrigin,
    RequestStatus,
};

#[derive(Default)]
struct TrackerState {
    live: HashMap<RequestId, Assignment>,
    history: Vec<DeliveryRecord>,
}

pub struct AssignmentTracker {
    state: RwLock<TrackerState>,
}

impl Default for AssignmentTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AssignmentTracker {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TrackerState::default()),
        }
    }

    /// Collector claims an open request. At most one concurrent caller wins
    /// (the board's entry lock decides); the lot expiry is checked inside
    /// that same critical section.
    pub fn claim(
        &self,
        request_id: RequestId,
        collector_id: ActorId,
        board: &RequestBoard,
        catalog: &WasteCatalog,
        actors: &ActorRegistry,
        now: DateTime<Utc>,
    ) -> Result<Assignment> {
        let mut state = self.state.write().expect("tracker lock poisoned");
        let request = board.claim_open(request_id, now)?;
        self.install(&mut state, request, collector_id, board, catalog, actors, now)
    }

    /// Composting center accepts a center-less expiring-waste request. Same
    /// winner contract as [`Self::claim`].
    pub fn accept(
        &self,
        request_id: RequestId,
        center_id: ActorId,
        board: &RequestBoard,
        catalog: &WasteCatalog,
        actors: &ActorRegistry,
        now: DateTime<Utc>,
    ) -> Result<Assignment> {
        let mut state = self.state.write().expect("tracker lock poisoned");
        let request = board.accept_open(request_id, center_id, now)?;
        self.install(&mut state, request, center_id, board, catalog, actors, now)
    }

    /// Shared tail of claim/accept: mark the lot, derive the counterpart and
    /// distance, and record the live assignment. Rolls the request back to
    /// `Open` if the lot cannot be marked (two-phase update with a
    /// compensating step).
    #[allow(clippy::too_many_arguments)]
    fn install(
        &self,
        state: &mut TrackerState,
        request: Request,
        assignee_id: ActorId,
        board: &RequestBoard,
        catalog: &WasteCatalog,
        actors: &ActorRegistry,
        now: DateTime<Utc>,
    ) -> Result<Assignment> {
        let counterpart = match request.origin {
            RequestOrigin::ExpiringWaste => request
                .lot_id
                .ok_or_else(|| EngineError::NotFound("waste lot", request.id))
                .and_then(|lot_id| {
                    let lot = catalog.get(lot_id)?;
                    catalog.mark_claimed(lot_id)?;
                    Ok(lot.supplier_id)
                }),
            RequestOrigin::CenterInitiated => request
                .center_id
                .ok_or_else(|| EngineError::NotFound("request center", request.id)),
        };
        let counterpart_id = match counterpart {
            Ok(id) => id,
            Err(err) => {
                board.reopen(request.id);
                return Err(err);
            }
        };

        let assignment = Assignment {
            request_id: request.id,
            assignee_id,
            counterpart_id,
            quantity_kg: request.quantity_kg,
            distance_km: actors.distance_between(assignee_id, counterpart_id),
            assigned_at: now,
        };
        state.live.insert(request.id, assignment.clone());
        info!(request_id = request.id, assignee_id, "assignment recorded");
        Ok(assignment)
    }

    /// `Accepted → Delivered`. Moves the live assignment into the delivery
    /// history and credits the collection bonus, all inside the tracker
    /// write lock.
    pub fn complete(
        &self,
        request_id: RequestId,
        board: &RequestBoard,
        catalog: &WasteCatalog,
        ledger: &Ledger,
        policy: &EnginePolicy,
        now: DateTime<Utc>,
    ) -> Result<DeliveryRecord> {
        let mut state = self.state.write().expect("tracker lock poisoned");
        let request = board.finish_accepted(request_id, RequestStatus::Delivered)?;

        // An accepted request always has a live assignment: both are written
        // under this lock.
        let assignment = state
            .live
            .remove(&request_id)
            .expect("accepted request without live assignment");

        if let Some(lot_id) = request.lot_id {
            match catalog.mark_collected(lot_id) {
                Ok(()) | Err(EngineError::InvalidTransition(_)) => {}
                Err(err) => return Err(err),
            }
        }

        ledger.credit(
            assignment.assignee_id,
            policy.collection_bonus,
            LedgerReason::CollectionBonus,
            now,
        )?;

        let record = DeliveryRecord {
            request_id: assignment.request_id,
            assignee_id: assignment.assignee_id,
            counterpart_id: assignment.counterpart_id,
            quantity_kg: assignment.quantity_kg,
            distance_km: assignment.distance_km,
            assigned_at: assignment.assigned_at,
            completed_at: now,
        };
        state.history.push(record.clone());
        info!(request_id, assignee = record.assignee_id, "delivery completed");
        Ok(record)
    }

    /// Cancel a request. No-op when it is already cancelled; tears down the
    /// live assignment and releases the lot when an accepted request is
    /// rejected.
    pub fn reject(
        &self,
        request_id: RequestId,
        board: &RequestBoard,
        catalog: &WasteCatalog,
    ) -> Result<(RequestStatus, Request)> {
        let mut state = self.state.write().expect("tracker lock poisoned");
        let (prev, request) = board.reject(request_id)?;
        if prev == RequestStatus::Accepted {
            state.live.remove(&request_id);
            if let Some(lot_id) = request.lot_id {
                // Lot goes back on the market unless it was already collected.
                let _unused = catalog.release(lot_id);
            }
        }
        Ok((prev, request))
    }

    /// Live assignments held by one assignee, oldest first.
    pub fn list_assigned(&self, assignee_id: ActorId) -> Vec<Assignment> {
        let state = self.state.read().expect("tracker lock poisoned");
        let mut assigned: Vec<Assignment> = state
            .live
            .values()
            .filter(|a| a.assignee_id == assignee_id)
            .cloned()
            .collect();
        assigned.sort_by_key(|a| (a.assigned_at, a.request_id));
        assigned
    }

    /// Completed deliveries the actor took part in, completion order.
    pub fn list_history(&self, actor_id: ActorId) -> Vec<DeliveryRecord> {
        let state = self.state.read().expect("tracker lock poisoned");
        state
            .history
            .iter()
            .filter(|r| r.assignee_id == actor_id || r.counterpart_id == actor_id)
            .cloned()
            .collect()
    }

    /// The live assignment for a request, if one exists.
    pub fn assignment(&self, request_id: RequestId) -> Option<Assignment> {
        self.state
            .read()
            .expect("tracker lock poisoned")
            .live
            .get(&request_id)
            .cloned()
    }
}
