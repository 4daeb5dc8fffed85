use axum::extract::State;
use axum::routing::post;
use axum::Router;
use titan_ext_core::hooks::{HookOutcome, HostEvent};

use crate::extract::Json;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(dispatch_event))
}

/// Always 200: module failures are listed in the outcome, not raised.
async fn dispatch_event(
    State(state): State<AppState>,
    Json(event): Json<HostEvent>,
) -> Json<HookOutcome> {
    Json(state.hooks().dispatch(&event).await)
}
