//! Marketplace scenarios: listings, stock, and point-discounted purchases.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::clock::ManualClock;
use crate::errors::EngineError;
use crate::invariants;
use crate::types::{ActorId, NpkProfile, Role, WasteClass};
use crate::{EnginePolicy, WasteLoop};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
}

fn npk() -> NpkProfile {
    NpkProfile {
        nitrogen: 2.1,
        phosphorus: 1.4,
        potassium: 0.9,
    }
}

fn setup() -> (WasteLoop, ActorId, ActorId) {
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = WasteLoop::with_parts(EnginePolicy::default(), clock);
    let center = engine
        .register_actor("Kompostwerk Süd", Role::CompostingCenter, None)
        .id;
    let farmer = engine.register_actor("Hof Brandt", Role::Farmer, None).id;
    (engine, center, farmer)
}

#[test]
fn listing_validation_rejects_non_positive_quantity_and_price() {
    let (engine, center, farmer) = setup();

    assert!(matches!(
        engine
            .list_batch(center, "vermicompost", npk(), 0.0, 4.5, [])
            .unwrap_err(),
        EngineError::Validation(_)
    ));
    assert!(matches!(
        engine
            .list_batch(center, "vermicompost", npk(), 10.0, 0.0, [])
            .unwrap_err(),
        EngineError::Validation(_)
    ));
    assert!(matches!(
        engine
            .list_produce(farmer, "kale", 2.0, 2.5, 0)
            .unwrap_err(),
        EngineError::Validation(_)
    ));

    let bad_npk = NpkProfile {
        nitrogen: -0.1,
        ..npk()
    };
    assert!(matches!(
        engine
            .list_batch(center, "vermicompost", bad_npk, 10.0, 4.5, [])
            .unwrap_err(),
        EngineError::Validation(_)
    ));
}

#[test]
fn purchase_decrements_stock_and_prices_the_receipt() {
    let (engine, center, farmer) = setup();
    let batch = engine
        .list_batch(
            center,
            "thermophilic blend",
            npk(),
            100.0,
            4.0,
            ["EU-organic".to_string()],
        )
        .unwrap();

    let receipt = engine.purchase_batch(batch.id, farmer, 25.0, 0).unwrap();
    assert_eq!(receipt.applied_discount_percent, 0);
    assert!((receipt.total_price - 100.0).abs() < 1e-9); // 25 kg * 4.0

    let remaining = engine.batch(batch.id).unwrap();
    assert!((remaining.quantity_kg - 75.0).abs() < 1e-9);
    invariants::assert_stock_floor(&remaining);
}

#[test]
fn purchase_rejects_overdraw_and_leaves_stock_untouched() {
    let (engine, center, farmer) = setup();
    let batch = engine
        .list_batch(center, "vermicompost", npk(), 10.0, 4.0, [])
        .unwrap();

    let err = engine.purchase_batch(batch.id, farmer, 11.0, 0).unwrap_err();
    assert!(matches!(err, EngineError::InsufficientStock { .. }));
    assert!((engine.batch(batch.id).unwrap().quantity_kg - 10.0).abs() < 1e-9);
}

#[test]
fn discount_applies_only_when_the_debit_succeeds() {
    let (engine, center, _farmer) = setup();
    // A supplier earns 10 per declaration; 10 declarations = 100 points.
    let supplier = engine.register_actor("Gasthaus", Role::Supplier, None).id;
    for _ in 0..10 {
        engine
            .declare(supplier, WasteClass::CarbonRich, vec![], 5.0, "dock")
            .unwrap();
    }
    assert_eq!(engine.balance(supplier), 100);

    let batch = engine
        .list_batch(center, "vermicompost", npk(), 50.0, 10.0, [])
        .unwrap();

    // 100 points ⇒ 10% off.
    let receipt = engine.purchase_batch(batch.id, supplier, 10.0, 100).unwrap();
    assert_eq!(receipt.applied_discount_percent, 10);
    assert!((receipt.total_price - 90.0).abs() < 1e-9);
    assert_eq!(engine.balance(supplier), 0);

    // Broke now: applying points fails, and the failed purchase neither
    // debits nor decrements.
    let before = engine.batch(batch.id).unwrap().quantity_kg;
    let err = engine.purchase_batch(batch.id, supplier, 10.0, 100).unwrap_err();
    assert!(matches!(err, EngineError::InsufficientBalance { .. }));
    assert!((engine.batch(batch.id).unwrap().quantity_kg - before).abs() < 1e-9);
}

#[test]
fn insufficient_stock_is_detected_before_points_move() {
    let (engine, center, _farmer) = setup();
    let supplier = engine.register_actor("Gasthaus", Role::Supplier, None).id;
    for _ in 0..10 {
        engine
            .declare(supplier, WasteClass::CarbonRich, vec![], 5.0, "dock")
            .unwrap();
    }

    let batch = engine
        .list_batch(center, "vermicompost", npk(), 5.0, 10.0, [])
        .unwrap();
    let err = engine.purchase_batch(batch.id, supplier, 6.0, 100).unwrap_err();
    assert!(matches!(err, EngineError::InsufficientStock { .. }));
    // No points were spent on the failed purchase.
    assert_eq!(engine.balance(supplier), 100);
}

#[test]
fn produce_purchases_work_the_same_way() {
    let (engine, _center, farmer) = setup();
    let seller = engine.register_actor("Hof Lemke", Role::Farmer, None).id;
    let item = engine
        .list_produce(seller, "compost-grown kale", 3.0, 3.5, 20)
        .unwrap();

    let receipt = engine.purchase_produce(item.id, farmer, 4, 0).unwrap();
    assert!((receipt.total_price - 12.0).abs() < 1e-9);
    assert_eq!(engine.produce_item(item.id).unwrap().quantity, 16);

    let err = engine.purchase_produce(item.id, farmer, 17, 0).unwrap_err();
    assert!(matches!(err, EngineError::InsufficientStock { .. }));
}

#[test]
fn sold_out_listings_drop_from_the_browse_views() {
    let (engine, center, farmer) = setup();
    let batch = engine
        .list_batch(center, "vermicompost", npk(), 10.0, 4.0, [])
        .unwrap();
    assert_eq!(engine.batches().len(), 1);

    engine.purchase_batch(batch.id, farmer, 10.0, 0).unwrap();
    assert!(engine.batches().is_empty());
    // Still queryable by id.
    assert!((engine.batch(batch.id).unwrap().quantity_kg).abs() < 1e-9);
}

#[test]
fn purchases_are_role_gated() {
    let (engine, center, _farmer) = setup();
    let collector = engine.register_actor("driver", Role::Collector, None).id;
    let batch = engine
        .list_batch(center, "vermicompost", npk(), 10.0, 4.0, [])
        .unwrap();
    assert!(matches!(
        engine.purchase_batch(batch.id, collector, 1.0, 0).unwrap_err(),
        EngineError::RoleMismatch { .. }
    ));
}
