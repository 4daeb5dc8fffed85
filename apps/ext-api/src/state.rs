//! Shared application state.

use std::sync::Arc;

use titan_ext_db::Database;

use crate::auth::JwtManager;
use crate::hooks::HookDispatcher;

/// Cloned into every handler; `Database` wraps a pool and is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(db: Database, jwt: JwtManager) -> Self {
        AppState {
            db,
            jwt: Arc::new(jwt),
        }
    }

    pub fn hooks(&self) -> HookDispatcher {
        HookDispatcher::new(self.db.clone())
    }
}
