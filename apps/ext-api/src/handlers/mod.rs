//! HTTP handlers, one submodule per extension module.
//!
//! ```text
//! /health                      health      (no auth)
//! /api/containers/...          containers  containers.manage
//! /api/manufacturing/...       manufacturing manufacturing.manage
//! /api/loyalty/...             loyalty     loyalty.manage
//! /api/hooks/events            hooks       hooks.dispatch
//! /api/settings/...            settings    settings.manage
//! ```

pub mod containers;
pub mod health;
pub mod hooks;
pub mod loyalty;
pub mod manufacturing;
pub mod settings;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use titan_ext_core::hooks::ExtModule;
use titan_ext_db::Database;

use crate::error::{ApiError, ApiResult, ErrorCode};

/// Middleware state for [`require_module`].
#[derive(Clone)]
pub struct ModuleGuard {
    pub db: Database,
    pub module: ExtModule,
}

/// Rejects requests to a module switched off in the settings.
pub async fn require_module(
    State(guard): State<ModuleGuard>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let settings = guard.db.settings().load().await?;
    if !settings.is_enabled(guard.module) {
        tracing::debug!(module = %guard.module, "Request to disabled module");
        return Err(ApiError::new(
            ErrorCode::BusinessLogic,
            format!("The {} module is disabled", guard.module),
        ));
    }
    Ok(next.run(request).await)
}
