//! Axum REST API handlers for the four role surfaces.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wasteloop_engine::{
    Actor, ActorId, Assignment, BatchId, CompostBatch, DeliveryRecord, GeoPoint, LedgerEntry,
    NpkProfile, OpenListing, Priority, ProduceId, ProduceItem, Receipt, Request, RequestId, Role,
    WasteClass, WasteLoop, WasteLot, WorkflowEvent,
};

use crate::errors::Result;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<WasteLoop>,
}

// ─────────────────────────────────────────────────────────
// Request bodies
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterActorBody {
    pub name: String,
    pub role: Role,
    pub location: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct DeclareBody {
    pub supplier_id: ActorId,
    pub waste_class: WasteClass,
    #[serde(default)]
    pub items: Vec<String>,
    pub weight_kg: f64,
    pub storage_location: String,
}

#[derive(Deserialize)]
pub struct CenterRequestBody {
    pub center_id: ActorId,
    pub waste_class: WasteClass,
    pub quantity_kg: f64,
    pub deadline: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
}

#[derive(Deserialize)]
pub struct ClaimBody {
    pub collector_id: ActorId,
}

#[derive(Deserialize)]
pub struct AcceptBody {
    pub center_id: ActorId,
}

#[derive(Deserialize)]
pub struct ListBatchBody {
    pub center_id: ActorId,
    pub type_label: String,
    pub npk: NpkProfile,
    pub quantity_kg: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub certifications: Vec<String>,
}

#[derive(Deserialize)]
pub struct ListProduceBody {
    pub farmer_id: ActorId,
    pub name: String,
    pub price: f64,
    pub original_price: f64,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct PurchaseBatchBody {
    pub batch_id: BatchId,
    pub buyer_id: ActorId,
    pub quantity_kg: f64,
    #[serde(default)]
    pub points_to_apply: i64,
}

#[derive(Deserialize)]
pub struct PurchaseProduceBody {
    pub produce_id: ProduceId,
    pub buyer_id: ActorId,
    pub quantity: u32,
    #[serde(default)]
    pub points_to_apply: i64,
}

#[derive(Deserialize)]
pub struct RedeemBody {
    pub points: i64,
}

#[derive(Deserialize)]
pub struct BoardQuery {
    pub class: Option<WasteClass>,
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct BoardResponse {
    pub count: usize,
    pub requests: Vec<OpenListing>,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub actor_id: ActorId,
    pub balance: i64,
}

#[derive(Serialize)]
pub struct RedeemResponse {
    pub actor_id: ActorId,
    pub discount_percent: u32,
    pub balance: i64,
}

#[derive(Serialize)]
pub struct SweepResponse {
    pub demoted: usize,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub count: usize,
    pub events: Vec<WorkflowEvent>,
}

// ─────────────────────────────────────────────────────────
// Handlers — shared
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /actors`
pub async fn register_actor(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<RegisterActorBody>,
) -> Json<Actor> {
    Json(state.engine.register_actor(body.name, body.role, body.location))
}

/// `GET /actors/:id`
pub async fn get_actor(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<ActorId>,
) -> Result<Json<Actor>> {
    Ok(Json(state.engine.actor(id)?))
}

// ─────────────────────────────────────────────────────────
// Handlers — supplier surface
// ─────────────────────────────────────────────────────────

/// `POST /waste`
pub async fn declare(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<DeclareBody>,
) -> Result<Json<WasteLot>> {
    let lot = state.engine.declare(
        body.supplier_id,
        body.waste_class,
        body.items,
        body.weight_kg,
        body.storage_location,
    )?;
    Ok(Json(lot))
}

/// `GET /suppliers/:id/waste`
pub async fn list_own_waste(
    State(state): State<Arc<ApiState>>,
    Path(supplier_id): Path<ActorId>,
) -> Json<Vec<WasteLot>> {
    Json(state.engine.list_own_waste(supplier_id))
}

/// `POST /waste/:id/collected`
pub async fn mark_collected(
    State(state): State<Arc<ApiState>>,
    Path(lot_id): Path<u64>,
) -> Result<Json<WasteLot>> {
    state.engine.mark_collected(lot_id)?;
    Ok(Json(state.engine.lot(lot_id)?))
}

// ─────────────────────────────────────────────────────────
// Handlers — request board & lifecycle
// ─────────────────────────────────────────────────────────

/// `GET /requests` — the visible board, stable total order.
pub async fn list_open(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<BoardQuery>,
) -> Json<BoardResponse> {
    let requests = state.engine.list_open(query.class);
    Json(BoardResponse {
        count: requests.len(),
        requests,
    })
}

/// `POST /requests`
pub async fn create_center_request(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<CenterRequestBody>,
) -> Result<Json<Request>> {
    let request = state.engine.create_center_request(
        body.center_id,
        body.waste_class,
        body.quantity_kg,
        body.deadline,
        body.priority,
    )?;
    Ok(Json(request))
}

/// `GET /requests/:id` — any status, the audit read.
pub async fn get_request(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<RequestId>,
) -> Result<Json<Request>> {
    Ok(Json(state.engine.request(id)?))
}

/// `POST /requests/:id/claim`
pub async fn claim(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<RequestId>,
    Json(body): Json<ClaimBody>,
) -> Result<Json<Assignment>> {
    Ok(Json(state.engine.claim(id, body.collector_id)?))
}

/// `POST /requests/:id/accept`
pub async fn accept(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<RequestId>,
    Json(body): Json<AcceptBody>,
) -> Result<Json<Assignment>> {
    Ok(Json(state.engine.accept(id, body.center_id)?))
}

/// `POST /requests/:id/reject`
pub async fn reject(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<RequestId>,
) -> Result<Json<Request>> {
    state.engine.reject(id)?;
    Ok(Json(state.engine.request(id)?))
}

/// `POST /requests/:id/complete`
pub async fn complete(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<RequestId>,
) -> Result<Json<DeliveryRecord>> {
    Ok(Json(state.engine.complete(id)?))
}

/// `GET /collectors/:id/assignments`
pub async fn assignments(
    State(state): State<Arc<ApiState>>,
    Path(assignee_id): Path<ActorId>,
) -> Json<Vec<Assignment>> {
    Json(state.engine.list_assigned(assignee_id))
}

/// `GET /actors/:id/history`
pub async fn history(
    State(state): State<Arc<ApiState>>,
    Path(actor_id): Path<ActorId>,
) -> Json<Vec<DeliveryRecord>> {
    Json(state.engine.list_history(actor_id))
}

// ─────────────────────────────────────────────────────────
// Handlers — rewards
// ─────────────────────────────────────────────────────────

/// `GET /actors/:id/balance`
pub async fn balance(
    State(state): State<Arc<ApiState>>,
    Path(actor_id): Path<ActorId>,
) -> Json<BalanceResponse> {
    Json(BalanceResponse {
        actor_id,
        balance: state.engine.balance(actor_id),
    })
}

/// `GET /actors/:id/ledger`
pub async fn ledger_entries(
    State(state): State<Arc<ApiState>>,
    Path(actor_id): Path<ActorId>,
) -> Json<Vec<LedgerEntry>> {
    Json(state.engine.ledger_entries(actor_id))
}

/// `POST /actors/:id/redeem`
pub async fn redeem(
    State(state): State<Arc<ApiState>>,
    Path(actor_id): Path<ActorId>,
    Json(body): Json<RedeemBody>,
) -> Result<Json<RedeemResponse>> {
    let discount_percent = state.engine.redeem(actor_id, body.points)?;
    Ok(Json(RedeemResponse {
        actor_id,
        discount_percent,
        balance: state.engine.balance(actor_id),
    }))
}

// ─────────────────────────────────────────────────────────
// Handlers — marketplace
// ─────────────────────────────────────────────────────────

/// `GET /batches`
pub async fn batches(State(state): State<Arc<ApiState>>) -> Json<Vec<CompostBatch>> {
    Json(state.engine.batches())
}

/// `POST /batches`
pub async fn list_batch(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<ListBatchBody>,
) -> Result<Json<CompostBatch>> {
    let batch = state.engine.list_batch(
        body.center_id,
        body.type_label,
        body.npk,
        body.quantity_kg,
        body.unit_price,
        body.certifications,
    )?;
    Ok(Json(batch))
}

/// `GET /produce`
pub async fn produce(State(state): State<Arc<ApiState>>) -> Json<Vec<ProduceItem>> {
    Json(state.engine.produce_items())
}

/// `POST /produce`
pub async fn list_produce(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<ListProduceBody>,
) -> Result<Json<ProduceItem>> {
    let item = state.engine.list_produce(
        body.farmer_id,
        body.name,
        body.price,
        body.original_price,
        body.quantity,
    )?;
    Ok(Json(item))
}

/// `POST /purchases/batch`
pub async fn purchase_batch(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<PurchaseBatchBody>,
) -> Result<Json<Receipt>> {
    let receipt = state.engine.purchase_batch(
        body.batch_id,
        body.buyer_id,
        body.quantity_kg,
        body.points_to_apply,
    )?;
    Ok(Json(receipt))
}

/// `POST /purchases/produce`
pub async fn purchase_produce(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<PurchaseProduceBody>,
) -> Result<Json<Receipt>> {
    let receipt = state.engine.purchase_produce(
        body.produce_id,
        body.buyer_id,
        body.quantity,
        body.points_to_apply,
    )?;
    Ok(Json(receipt))
}

// ─────────────────────────────────────────────────────────
// Handlers — audit
// ─────────────────────────────────────────────────────────

/// `GET /events`
pub async fn all_events(State(state): State<Arc<ApiState>>) -> Json<EventsResponse> {
    let events = state.engine.events();
    Json(EventsResponse {
        count: events.len(),
        events,
    })
}

/// `GET /requests/:id/events`
pub async fn request_events(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<u64>,
) -> Json<EventsResponse> {
    let events = state.engine.events_for(id);
    Json(EventsResponse {
        count: events.len(),
        events,
    })
}

/// `POST /sweep` — manual trigger for the expiry sweep.
pub async fn sweep(State(state): State<Arc<ApiState>>) -> Json<SweepResponse> {
    Json(SweepResponse {
        demoted: state.engine.sweep_expired(),
    })
}
