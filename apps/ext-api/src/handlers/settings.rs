//! Module option routes backing the host's options page.

use axum::extract::State;
use axum::routing::{get, put};
use axum::Router;
use serde::Deserialize;
use titan_ext_core::settings::ModuleSettings;

use crate::error::ApiResult;
use crate::extract::{Json, Path};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_settings))
        .route("/{key}", put(set_setting))
}

async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<ModuleSettings>> {
    Ok(Json(state.db.settings().load().await?))
}

#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub value: String,
}

async fn set_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SetSettingRequest>,
) -> ApiResult<Json<ModuleSettings>> {
    Ok(Json(state.db.settings().set(&key, &req.value).await?))
}
