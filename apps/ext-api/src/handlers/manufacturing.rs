//! Bill of materials and manufacturing order routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};
use titan_ext_core::manufacturing::{
    Bom, BomCost, BomDetail, BomItemDetail, BomPatch, ComponentRequirement, ManufacturingOrder,
    ManufacturingStockMovement, NewBom, NewBomItem, NewManufacturingOrder, OrderStatus,
};
use titan_ext_core::Product;

use crate::error::ApiResult;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/boms", get(list_boms).post(create_bom))
        .route("/boms/{id}", get(get_bom).put(update_bom).delete(delete_bom))
        .route("/boms/{id}/items", post(add_item))
        .route(
            "/boms/{id}/items/{item_id}",
            put(update_item).delete(remove_item),
        )
        .route("/boms/{id}/cost", get(bom_cost))
        .route("/boms/{id}/sync-cost", post(sync_cost))
        .route("/boms/{id}/check-circular", get(check_circular))
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", get(get_order).delete(delete_order))
        .route("/orders/{id}/plan", post(plan_order))
        .route("/orders/{id}/start", post(start_order))
        .route("/orders/{id}/complete", post(complete_order))
        .route("/orders/{id}/cancel", post(cancel_order))
        .route("/orders/{id}/requirements", get(requirements))
        .route("/orders/{id}/movements", get(order_movements))
}

// =============================================================================
// BOMs
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListBomsQuery {
    pub product_id: Option<String>,
}

async fn list_boms(
    State(state): State<AppState>,
    Query(query): Query<ListBomsQuery>,
) -> ApiResult<Json<Vec<Bom>>> {
    let boms = state
        .db
        .boms()
        .list_boms(query.product_id.as_deref())
        .await?;
    Ok(Json(boms))
}

async fn create_bom(
    State(state): State<AppState>,
    Json(input): Json<NewBom>,
) -> ApiResult<(StatusCode, Json<BomDetail>)> {
    let detail = state.db.boms().create_bom(&input).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_bom(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BomDetail>> {
    Ok(Json(state.db.boms().get_bom(&id).await?))
}

async fn update_bom(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<BomPatch>,
) -> ApiResult<Json<Bom>> {
    Ok(Json(state.db.boms().update_bom(&id, &patch).await?))
}

async fn delete_bom(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.db.boms().delete_bom(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(item): Json<NewBomItem>,
) -> ApiResult<(StatusCode, Json<BomItemDetail>)> {
    let detail = state.db.boms().add_item(&id, &item).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

#[derive(Debug, Deserialize)]
pub struct ItemQuantityRequest {
    pub quantity: i64,
}

async fn update_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(String, String)>,
    Json(req): Json<ItemQuantityRequest>,
) -> ApiResult<Json<BomItemDetail>> {
    let detail = state
        .db
        .boms()
        .update_item_quantity(&id, &item_id, req.quantity)
        .await?;
    Ok(Json(detail))
}

async fn remove_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.db.boms().remove_item(&id, &item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn bom_cost(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<BomCost>> {
    Ok(Json(state.db.boms().bom_cost(&id).await?))
}

/// Writes the rolled-up BOM cost to the output product.
async fn sync_cost(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.boms().sync_product_cost(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CheckCircularQuery {
    pub component_product_id: String,
}

#[derive(Debug, Serialize)]
pub struct CheckCircularResponse {
    pub product_id: String,
    pub component_product_id: String,
    /// False when adding the component would close a cycle.
    pub safe: bool,
    pub would_create_cycle: bool,
}

async fn check_circular(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CheckCircularQuery>,
) -> ApiResult<Json<CheckCircularResponse>> {
    let boms = state.db.boms();
    let detail = boms.get_bom(&id).await?;
    let safe = boms
        .check_circular_dependency(&detail.bom.product_id, &query.component_product_id)
        .await?;

    Ok(Json(CheckCircularResponse {
        product_id: detail.bom.product_id,
        component_product_id: query.component_product_id,
        safe,
        would_create_cycle: !safe,
    }))
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> ApiResult<Json<Vec<ManufacturingOrder>>> {
    Ok(Json(state.db.manufacturing().list_orders(query.status).await?))
}

async fn create_order(
    State(state): State<AppState>,
    Json(input): Json<NewManufacturingOrder>,
) -> ApiResult<(StatusCode, Json<ManufacturingOrder>)> {
    let order = state.db.manufacturing().create_order(&input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ManufacturingOrder>> {
    Ok(Json(state.db.manufacturing().get_order(&id).await?))
}

async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.manufacturing().delete_order(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn plan_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ManufacturingOrder>> {
    Ok(Json(state.db.manufacturing().plan(&id).await?))
}

/// Consumes component stock.
async fn start_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ManufacturingOrder>> {
    Ok(Json(state.db.manufacturing().start(&id).await?))
}

/// Produces the finished goods.
async fn complete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ManufacturingOrder>> {
    Ok(Json(state.db.manufacturing().complete(&id).await?))
}

async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ManufacturingOrder>> {
    Ok(Json(state.db.manufacturing().cancel(&id).await?))
}

async fn requirements(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ComponentRequirement>>> {
    Ok(Json(state.db.manufacturing().requirements(&id).await?))
}

async fn order_movements(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ManufacturingStockMovement>>> {
    Ok(Json(state.db.manufacturing().movements(&id).await?))
}
