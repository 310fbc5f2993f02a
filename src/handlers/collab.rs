use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{error, warn};

use crate::collab::SessionInfo;
use crate::models::{
    ErrorResponse, FlushResponse, HistoryQuery, MarkReadRequest, MarkReadResponse, MentionsQuery,
    MentionsResponse, OperationsResponse,
};
use crate::services::auth_service::AuthUser;
use crate::state::AppState;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;
pub const MAX_HISTORY_LIMIT: usize = 1000;
pub const DEFAULT_RESTORE_LIMIT: usize = 1000;

type ApiError = (StatusCode, Json<ErrorResponse>);

// An authenticated caller may only act on their own inbox
fn ensure_same_user(auth: &Option<Extension<AuthUser>>, user_id: &str) -> Result<(), ApiError> {
    match auth {
        Some(Extension(AuthUser(uid))) if uid != user_id => {
            warn!("User {} tried to access the mentions of {}", uid, user_id);
            Err(ErrorResponse::new(
                StatusCode::FORBIDDEN,
                format!("Not allowed to access the mentions of '{}'", user_id),
            ))
        }
        _ => Ok(()),
    }
}

/// Active users and locked sections of a document
pub async fn get_session(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Json<SessionInfo> {
    Json(state.service.session_info(&document_id))
}

/// Recent operations of a document, newest first
pub async fn get_operations(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<OperationsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(ErrorResponse::new(
            StatusCode::BAD_REQUEST,
            format!("limit must be between 1 and {}", MAX_HISTORY_LIMIT),
        ));
    }

    let data = state.service.history(&document_id, limit);
    Ok(Json(OperationsResponse {
        success: true,
        count: data.len(),
        data,
        error: None,
    }))
}

/// Checkpoint the document's operations to the store
pub async fn flush_operations(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> (StatusCode, Json<FlushResponse>) {
    match state.service.flush(&document_id).await {
        Ok(count) => (
            StatusCode::OK,
            Json(FlushResponse {
                success: true,
                count,
                error: None,
            }),
        ),
        Err(e) => {
            error!("Flush of document {} failed: {}", document_id, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(FlushResponse {
                    success: false,
                    count: 0,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Operations read back from the store, oldest first
pub async fn restore_operations(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> (StatusCode, Json<OperationsResponse>) {
    let limit = query.limit.unwrap_or(DEFAULT_RESTORE_LIMIT);
    match state.service.restore(&document_id, limit).await {
        Ok(data) => (
            StatusCode::OK,
            Json(OperationsResponse {
                success: true,
                count: data.len(),
                data,
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(OperationsResponse {
                success: false,
                count: 0,
                data: Vec::new(),
                error: Some(e.to_string()),
            }),
        ),
    }
}

pub async fn get_mentions(
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(user_id): Path<String>,
    Query(query): Query<MentionsQuery>,
) -> Result<Json<MentionsResponse>, ApiError> {
    ensure_same_user(&auth, &user_id)?;
    let data = state.service.mentions(&user_id, query.unread_only.unwrap_or(false));
    Ok(Json(MentionsResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

pub async fn mark_mention_read(
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(mention_id): Path<String>,
    Json(body): Json<MarkReadRequest>,
) -> Result<(StatusCode, Json<MarkReadResponse>), ApiError> {
    let Some(user_id) = body.user_id.filter(|u| !u.is_empty()) else {
        return Err(ErrorResponse::new(StatusCode::BAD_REQUEST, "userId is required"));
    };
    ensure_same_user(&auth, &user_id)?;

    if state.service.mark_mention_read(&mention_id, &user_id) {
        Ok((
            StatusCode::OK,
            Json(MarkReadResponse {
                success: true,
                message: "Mention marked as read".to_string(),
            }),
        ))
    } else {
        Ok((
            StatusCode::NOT_FOUND,
            Json(MarkReadResponse {
                success: false,
                message: "Mention not found".to_string(),
            }),
        ))
    }
}
