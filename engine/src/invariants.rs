#![allow(dead_code)]

//! Invariant assertion helpers shared by the scenario tests.

use chrono::Duration;

use crate::policy::EnginePolicy;
use crate::types::{
    CompostBatch, LedgerEntry, RequestStatus, WasteClass, WasteLot,
};

/// INV-1: a ledger balance is never negative, at any point in the history.
pub fn assert_balance_non_negative(entries: &[LedgerEntry]) {
    for entry in entries {
        assert!(
            entry.balance_after >= 0,
            "INV-1 violated: actor {} balance went to {}",
            entry.actor_id,
            entry.balance_after
        );
    }
}

/// INV-2: carbon-rich lots never expire; organic lots expire exactly one
/// policy window after declaration.
pub fn assert_expiry_rule(lot: &WasteLot, policy: &EnginePolicy) {
    match lot.waste_class {
        WasteClass::CarbonRich => assert!(
            lot.expires_at.is_none(),
            "INV-2 violated: carbon-rich lot {} has an expiry",
            lot.id
        ),
        WasteClass::OrganicFood => assert_eq!(
            lot.expires_at,
            Some(lot.declared_at + Duration::hours(policy.expiry_hours)),
            "INV-2 violated: lot {} expiry is not declaration + {}h",
            lot.id,
            policy.expiry_hours
        ),
    }
}

/// INV-3: declared weight is always positive.
pub fn assert_weight_positive(lot: &WasteLot) {
    assert!(
        lot.weight_kg > 0.0,
        "INV-3 violated: lot {} has weight {}",
        lot.id,
        lot.weight_kg
    );
}

/// INV-4: request status transition validity. Only forward transitions:
///   Open     -> Accepted | Cancelled
///   Accepted -> Delivered | Cancelled
///   Delivered, Cancelled -> (none)
pub fn assert_valid_request_transition(from: RequestStatus, to: RequestStatus) {
    let valid = matches!(
        (from, to),
        (RequestStatus::Open, RequestStatus::Accepted)
            | (RequestStatus::Open, RequestStatus::Cancelled)
            | (RequestStatus::Accepted, RequestStatus::Delivered)
            | (RequestStatus::Accepted, RequestStatus::Cancelled)
    );
    assert!(
        valid,
        "INV-4 violated: invalid request transition from {from:?} to {to:?}"
    );
}

/// INV-5: batch stock never goes below zero.
pub fn assert_stock_floor(batch: &CompostBatch) {
    assert!(
        batch.quantity_kg >= 0.0,
        "INV-5 violated: batch {} stock is {}",
        batch.id,
        batch.quantity_kg
    );
}

/// Run the stateless lot invariants together.
pub fn assert_all_lot_invariants(lot: &WasteLot, policy: &EnginePolicy) {
    assert_expiry_rule(lot, policy);
    assert_weight_positive(lot);
}
