//! Container deposit ledger routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use titan_ext_core::containers::{
    ContainerBalance, ContainerInventory, ContainerMovement, ContainerType, ContainerTypePatch,
    CustomerMovementInput, MovementFilter, NewContainerType, OutstandingBalance, ProductContainer,
};

use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/types", get(list_types).post(create_type))
        .route(
            "/types/{id}",
            get(get_type).put(update_type).delete(delete_type),
        )
        .route("/types/{id}/inventory", get(inventory))
        .route("/types/{id}/adjust", post(adjust_inventory))
        .route(
            "/products/{product_id}",
            get(product_link).put(link_product).delete(unlink_product),
        )
        .route("/give", post(give))
        .route("/receive", post(receive))
        .route("/charge", post(charge))
        .route("/customers/{customer_id}/balances", get(customer_balances))
        .route(
            "/customers/{customer_id}/types/{type_id}/recalculate",
            post(recalculate_balance),
        )
        .route("/balances", get(outstanding_balances))
        .route("/movements", get(movements))
}

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListTypesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

async fn list_types(
    State(state): State<AppState>,
    Query(query): Query<ListTypesQuery>,
) -> ApiResult<Json<Vec<ContainerType>>> {
    let types = state
        .db
        .containers()
        .list_types(query.include_inactive)
        .await?;
    Ok(Json(types))
}

async fn create_type(
    State(state): State<AppState>,
    Json(input): Json<NewContainerType>,
) -> ApiResult<(StatusCode, Json<ContainerType>)> {
    let created = state.db.containers().create_type(&input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ContainerType>> {
    Ok(Json(state.db.containers().get_type(&id).await?))
}

async fn update_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ContainerTypePatch>,
) -> ApiResult<Json<ContainerType>> {
    Ok(Json(state.db.containers().update_type(&id, &patch).await?))
}

async fn delete_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.containers().delete_type(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn inventory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ContainerInventory>> {
    Ok(Json(state.db.containers().inventory(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta: i64,
    pub note: Option<String>,
}

async fn adjust_inventory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AdjustRequest>,
) -> ApiResult<(StatusCode, Json<ContainerMovement>)> {
    let movement = state
        .db
        .containers()
        .adjust_inventory(&id, req.delta, req.note.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

// =============================================================================
// Product Links
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub container_type_id: String,
    #[serde(default = "default_quantity_per_unit")]
    pub quantity_per_unit: i64,
}

fn default_quantity_per_unit() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct UnlinkResponse {
    pub removed: bool,
}

async fn product_link(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<ProductContainer>> {
    state
        .db
        .containers()
        .product_link(&product_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError::new(
                ErrorCode::NotFound,
                format!("Product {} has no container link", product_id),
            )
        })
}

async fn link_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(req): Json<LinkRequest>,
) -> ApiResult<Json<ProductContainer>> {
    let link = state
        .db
        .containers()
        .link_product(&product_id, &req.container_type_id, req.quantity_per_unit)
        .await?;
    Ok(Json(link))
}

async fn unlink_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<UnlinkResponse>> {
    let removed = state.db.containers().unlink_product(&product_id).await?;
    Ok(Json(UnlinkResponse { removed }))
}

// =============================================================================
// Customer Movements
// =============================================================================

async fn give(
    State(state): State<AppState>,
    Json(input): Json<CustomerMovementInput>,
) -> ApiResult<(StatusCode, Json<ContainerMovement>)> {
    let movement = state.db.containers().give(&input).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

async fn receive(
    State(state): State<AppState>,
    Json(input): Json<CustomerMovementInput>,
) -> ApiResult<(StatusCode, Json<ContainerMovement>)> {
    let movement = state.db.containers().receive(&input).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

async fn charge(
    State(state): State<AppState>,
    Json(input): Json<CustomerMovementInput>,
) -> ApiResult<(StatusCode, Json<ContainerMovement>)> {
    let movement = state.db.containers().charge(&input).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

// =============================================================================
// Balances & History
// =============================================================================

async fn customer_balances(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> ApiResult<Json<Vec<ContainerBalance>>> {
    Ok(Json(
        state.db.containers().customer_balances(&customer_id).await?,
    ))
}

async fn recalculate_balance(
    State(state): State<AppState>,
    Path((customer_id, type_id)): Path<(String, String)>,
) -> ApiResult<Json<ContainerBalance>> {
    let balance = state
        .db
        .containers()
        .recalculate_balance(&customer_id, &type_id)
        .await?;
    Ok(Json(balance))
}

async fn outstanding_balances(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<OutstandingBalance>>> {
    Ok(Json(state.db.containers().outstanding_balances().await?))
}

async fn movements(
    State(state): State<AppState>,
    Query(filter): Query<MovementFilter>,
) -> ApiResult<Json<Vec<ContainerMovement>>> {
    Ok(Json(state.db.containers().movements(&filter).await?))
}
