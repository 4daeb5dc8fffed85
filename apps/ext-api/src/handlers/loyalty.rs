//! Special customer and cashback routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};
use titan_ext_core::loyalty::{CashbackEntry, CashbackFilter, CashbackPreview, CashbackSummary};
use titan_ext_core::Customer;

use crate::error::ApiResult;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_special_customers))
        .route("/customers/{id}/special", put(set_special))
        .route("/customers/{id}/discount", get(special_discount))
        .route("/customers/{id}/purchases/{year}", get(yearly_purchases))
        .route(
            "/customers/{id}/cashback/{year}",
            get(preview_cashback).post(process_for_customer),
        )
        .route("/customers/{id}/cashback/{year}/pending", post(create_pending))
        .route("/cashback", get(history))
        .route("/cashback/generate/{year}", post(generate_pending))
        .route("/cashback/summary/{year}", get(summary))
        .route("/cashback/{id}/process", post(process))
        .route("/cashback/{id}/reverse", post(reverse))
}

// =============================================================================
// Special Customers
// =============================================================================

async fn list_special_customers(State(state): State<AppState>) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.db.loyalty().list_special_customers().await?))
}

#[derive(Debug, Deserialize)]
pub struct SetSpecialRequest {
    pub is_special: bool,
}

async fn set_special(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetSpecialRequest>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.db.loyalty().set_special(&id, req.is_special).await?))
}

#[derive(Debug, Deserialize)]
pub struct DiscountQuery {
    pub subtotal_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct DiscountResponse {
    pub customer_id: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
}

/// Discount for a special customer; zero for everyone else.
async fn special_discount(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DiscountQuery>,
) -> ApiResult<Json<DiscountResponse>> {
    let discount = state
        .db
        .loyalty()
        .special_discount(&id, query.subtotal_cents)
        .await?;

    Ok(Json(DiscountResponse {
        customer_id: id,
        subtotal_cents: query.subtotal_cents,
        discount_cents: discount.cents(),
    }))
}

#[derive(Debug, Serialize)]
pub struct PurchasesResponse {
    pub customer_id: String,
    pub year: i32,
    pub purchases_cents: i64,
}

async fn yearly_purchases(
    State(state): State<AppState>,
    Path((id, year)): Path<(String, i32)>,
) -> ApiResult<Json<PurchasesResponse>> {
    let purchases = state.db.loyalty().yearly_purchases(&id, year).await?;
    Ok(Json(PurchasesResponse {
        customer_id: id,
        year,
        purchases_cents: purchases.cents(),
    }))
}

// =============================================================================
// Cashback
// =============================================================================

async fn preview_cashback(
    State(state): State<AppState>,
    Path((id, year)): Path<(String, i32)>,
) -> ApiResult<Json<CashbackPreview>> {
    Ok(Json(state.db.loyalty().calculate_cashback(&id, year).await?))
}

/// Creates and processes the year's cashback in one step.
async fn process_for_customer(
    State(state): State<AppState>,
    Path((id, year)): Path<(String, i32)>,
) -> ApiResult<(StatusCode, Json<CashbackEntry>)> {
    let entry = state.db.loyalty().process_for_customer(&id, year).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn create_pending(
    State(state): State<AppState>,
    Path((id, year)): Path<(String, i32)>,
) -> ApiResult<(StatusCode, Json<CashbackEntry>)> {
    let entry = state.db.loyalty().create_pending(&id, year).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn generate_pending(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> ApiResult<Json<Vec<CashbackEntry>>> {
    Ok(Json(state.db.loyalty().generate_pending_for_year(year).await?))
}

async fn history(
    State(state): State<AppState>,
    Query(filter): Query<CashbackFilter>,
) -> ApiResult<Json<Vec<CashbackEntry>>> {
    Ok(Json(state.db.loyalty().history(&filter).await?))
}

async fn summary(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> ApiResult<Json<CashbackSummary>> {
    Ok(Json(state.db.loyalty().summary(year).await?))
}

async fn process(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CashbackEntry>> {
    Ok(Json(state.db.loyalty().process(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReverseRequest {
    pub reason: String,
}

async fn reverse(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReverseRequest>,
) -> ApiResult<Json<CashbackEntry>> {
    Ok(Json(state.db.loyalty().reverse(&id, &req.reason).await?))
}
