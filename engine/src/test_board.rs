//! Board listing behavior: priority derivation, ordering, filtering, and
//! expiry demotion.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::clock::ManualClock;
use crate::errors::EngineError;
use crate::types::{ActorId, Priority, RequestStatus, Role, WasteClass};
use crate::{EnginePolicy, WasteLoop};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
}

fn setup() -> (WasteLoop, Arc<ManualClock>, ActorId, ActorId) {
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = WasteLoop::with_parts(EnginePolicy::default(), clock.clone());
    let supplier = engine.register_actor("Hotel Adler", Role::Supplier, None).id;
    let center = engine
        .register_actor("Kompostwerk Süd", Role::CompostingCenter, None)
        .id;
    (engine, clock, supplier, center)
}

#[test]
fn priority_climbs_as_the_expiry_window_closes() {
    // 50 kg organic declared at t0 expires at t0+48h: Normal at t0,
    // high at t0+37h (11h remaining).
    let (engine, clock, supplier, _center) = setup();
    engine
        .declare(supplier, WasteClass::OrganicFood, vec![], 50.0, "fridge")
        .unwrap();

    assert_eq!(engine.list_open(None)[0].priority, Priority::Normal);

    clock.set(t0() + Duration::hours(25)); // 23h remaining
    assert_eq!(engine.list_open(None)[0].priority, Priority::Medium);

    clock.set(t0() + Duration::hours(37)); // 11h remaining
    assert_eq!(engine.list_open(None)[0].priority, Priority::High);
}

#[test]
fn listing_orders_by_priority_then_remaining_time_then_creation() {
    let (engine, clock, supplier, center) = setup();

    // Oldest first: an organic lot declared now (48h window, Normal).
    engine
        .declare(supplier, WasteClass::OrganicFood, vec![], 10.0, "a")
        .unwrap();

    // A high-priority explicit center request, no deadline.
    clock.set(t0() + Duration::hours(1));
    let urgent = engine
        .create_center_request(center, WasteClass::CarbonRich, 40.0, None, Some(Priority::High))
        .unwrap();

    // A second organic lot declared later: same Normal priority, later
    // expiry, so it sorts after the first lot within Normal.
    clock.set(t0() + Duration::hours(2));
    engine
        .declare(supplier, WasteClass::OrganicFood, vec![], 20.0, "b")
        .unwrap();

    // A default-priority (Medium) center request.
    let medium = engine
        .create_center_request(center, WasteClass::OrganicFood, 15.0, None, None)
        .unwrap();

    let board = engine.list_open(None);
    let ids: Vec<u64> = board.iter().map(|l| l.request.id).collect();
    let priorities: Vec<Priority> = board.iter().map(|l| l.priority).collect();

    assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Normal, Priority::Normal]);
    assert_eq!(ids[0], urgent.id);
    assert_eq!(ids[1], medium.id);
    // Within Normal, the earlier expiry comes first.
    assert!(ids[2] < ids[3]);
}

#[test]
fn listing_is_stable_across_repeated_reads() {
    let (engine, _clock, supplier, center) = setup();
    for i in 0..5 {
        engine
            .declare(supplier, WasteClass::OrganicFood, vec![], 5.0 + f64::from(i), "bin")
            .unwrap();
    }
    engine
        .create_center_request(center, WasteClass::CarbonRich, 10.0, None, None)
        .unwrap();

    let first: Vec<u64> = engine.list_open(None).iter().map(|l| l.request.id).collect();
    for _ in 0..10 {
        let again: Vec<u64> = engine.list_open(None).iter().map(|l| l.request.id).collect();
        assert_eq!(first, again);
    }
}

#[test]
fn class_filter_narrows_the_board() {
    let (engine, _clock, supplier, center) = setup();
    engine
        .declare(supplier, WasteClass::OrganicFood, vec![], 5.0, "bin")
        .unwrap();
    engine
        .create_center_request(center, WasteClass::CarbonRich, 10.0, None, None)
        .unwrap();

    assert_eq!(engine.list_open(None).len(), 2);
    assert_eq!(engine.list_open(Some(WasteClass::OrganicFood)).len(), 1);
    assert_eq!(engine.list_open(Some(WasteClass::CarbonRich)).len(), 1);
}

#[test]
fn expired_requests_leave_the_board_but_stay_queryable() {
    let (engine, clock, supplier, _center) = setup();
    engine
        .declare(supplier, WasteClass::OrganicFood, vec![], 5.0, "bin")
        .unwrap();
    let request_id = engine.list_open(None)[0].request.id;

    clock.advance(Duration::hours(49));
    assert!(engine.list_open(None).is_empty());

    // Still there for audit, still Open until a sweep or failed claim.
    let request = engine.request(request_id).unwrap();
    assert_eq!(request.status, RequestStatus::Open);
}

#[test]
fn center_request_deadline_must_be_in_the_future() {
    let (engine, _clock, _supplier, center) = setup();
    let err = engine
        .create_center_request(
            center,
            WasteClass::OrganicFood,
            10.0,
            Some(t0() - Duration::hours(1)),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = engine
        .create_center_request(center, WasteClass::OrganicFood, 0.0, None, None)
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn sweep_demotes_expired_open_requests() {
    let (engine, clock, supplier, center) = setup();
    engine
        .declare(supplier, WasteClass::OrganicFood, vec![], 5.0, "bin")
        .unwrap();
    let expiring_id = engine.list_open(None)[0].request.id;
    // Center requests never expire off the board.
    let center_req = engine
        .create_center_request(center, WasteClass::CarbonRich, 10.0, None, None)
        .unwrap();

    clock.advance(Duration::hours(49));
    assert_eq!(engine.sweep_expired(), 1);
    assert_eq!(
        engine.request(expiring_id).unwrap().status,
        RequestStatus::Cancelled
    );
    assert_eq!(
        engine.request(center_req.id).unwrap().status,
        RequestStatus::Open
    );
    // Idempotent: nothing left to demote.
    assert_eq!(engine.sweep_expired(), 0);
}
