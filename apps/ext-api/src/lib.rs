//! # titan-ext-api: HTTP Surface of the Extension Modules
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Host POS / admin UI                                                    │
//! │        │  JSON over HTTP, Authorization: Bearer <jwt>                  │
//! │        ▼                                                                │
//! │  TraceLayer (request span)                                              │
//! │        │                                                                │
//! │        ├── /health ─────────────────────────────► health (no auth)      │
//! │        │                                                                │
//! │        └── /api/<module>/...                                            │
//! │               │                                                         │
//! │               ▼                                                         │
//! │         require_permission (401 / 403)                                  │
//! │               │                                                         │
//! │               ▼                                                         │
//! │         require_module (422 when switched off)                          │
//! │               │                                                         │
//! │               ▼                                                         │
//! │         handler ──► titan-ext-db repository ──► SQLite                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod hooks;
pub mod state;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use titan_ext_core::hooks::ExtModule;
use tower_http::trace::TraceLayer;

use crate::auth::{require_permission, PermissionGuard, HOOKS_DISPATCH, SETTINGS_MANAGE};
use crate::handlers::{require_module, ModuleGuard};

pub use crate::config::ExtConfig;
pub use crate::error::{ApiError, ApiResult, ErrorCode};
pub use crate::state::AppState;

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .nest(
            "/containers",
            module_routes(&state, ExtModule::Containers, handlers::containers::routes()),
        )
        .nest(
            "/manufacturing",
            module_routes(
                &state,
                ExtModule::Manufacturing,
                handlers::manufacturing::routes(),
            ),
        )
        .nest(
            "/loyalty",
            module_routes(&state, ExtModule::Loyalty, handlers::loyalty::routes()),
        )
        .nest(
            "/hooks",
            protected(&state, HOOKS_DISPATCH, handlers::hooks::routes()),
        )
        .nest(
            "/settings",
            protected(&state, SETTINGS_MANAGE, handlers::settings::routes()),
        );

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn protected(
    state: &AppState,
    permission: &'static str,
    routes: Router<AppState>,
) -> Router<AppState> {
    routes.route_layer(from_fn_with_state(
        PermissionGuard::new(state.jwt.clone(), permission),
        require_permission,
    ))
}

/// Module routes: permission first, then the module's enable switch.
fn module_routes(state: &AppState, module: ExtModule, routes: Router<AppState>) -> Router<AppState> {
    let routes = routes.route_layer(from_fn_with_state(
        ModuleGuard {
            db: state.db.clone(),
            module,
        },
        require_module,
    ));
    protected(state, module.permission(), routes)
}
