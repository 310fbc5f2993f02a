use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use crate::services::auth_service::{authenticate, get_auth_token};
use crate::state::AppState;

/// Require a valid token when a JWT secret is configured.
///
/// The authenticated user is stored as [`AuthUser`](crate::services::auth_service::AuthUser)
/// in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(secret) = state.config.cloud_auth_jwt_secret.as_deref() else {
        return Ok(next.run(req).await);
    };

    // 1. Get the auth token from the request
    let token = match get_auth_token(&req) {
        Ok(token) => token,
        Err(e) => {
            debug!("Rejecting unauthenticated request: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // 2. Validate it and resolve the user
    let user = match authenticate(&token, secret) {
        Ok(user) => user,
        Err(e) => {
            error!("{}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
