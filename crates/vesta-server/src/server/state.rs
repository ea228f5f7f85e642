// App state for Axum server
use std::sync::Arc;
use vesta_core::SyncService;

#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<SyncService>,
}

impl AppState {
    pub fn new(sync: SyncService) -> Self {
        Self {
            sync: Arc::new(sync),
        }
    }
}
