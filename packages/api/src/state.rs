// ABOUTME: Shared application state handed to every handler

use std::sync::Arc;

use botdock_auth::AuthConfig;
use botdock_lifecycle::LifecycleManager;
use botdock_storage::DbState;

#[derive(Clone)]
pub struct AppState {
    pub db: DbState,
    pub lifecycle: Arc<LifecycleManager>,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(db: DbState, lifecycle: Arc<LifecycleManager>, auth: Arc<AuthConfig>) -> Self {
        Self {
            db,
            lifecycle,
            auth,
        }
    }
}
