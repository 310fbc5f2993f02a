use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::{
    diagnostics, flush_operations, get_mentions, get_operations, get_session, health_check,
    mark_mention_read, ready_check, restore_operations,
};
use crate::routes::auth_middleware::auth_middleware;
use crate::state::AppState;

/// Create API routes
pub fn create_api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/v1/diagnostics", get(diagnostics))
        .route("/v1/collaboration/session/:document_id", get(get_session))
        .route("/v1/collaboration/operations/:document_id", get(get_operations))
        .route("/v1/collaboration/operations/:document_id/flush", post(flush_operations))
        .route("/v1/collaboration/operations/:document_id/restore", get(restore_operations))
        .route("/v1/collaboration/mentions/:id", get(get_mentions))
        .route("/v1/collaboration/mentions/:id/read", post(mark_mention_read))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware)); // Applies to all routes added above

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .merge(protected)
}
