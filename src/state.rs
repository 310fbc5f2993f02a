use std::sync::Arc;

use crate::collab::CollabService;
use crate::config::Config;
use crate::websocket::Hub;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<CollabService>,
    pub hub: Arc<Hub>,
}

impl AppState {
    pub fn new(config: Config, service: Arc<CollabService>) -> Self {
        let hub = Arc::new(Hub::new(service.clone()));
        Self {
            config: Arc::new(config),
            service,
            hub,
        }
    }
}
