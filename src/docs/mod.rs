use utoipa::OpenApi;

use crate::collab::{LockedSection, Mention, Operation, SessionInfo};
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/ready",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Collaboration counters and host load", body = DiagnosticsResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

/// Active users and locked sections of a document
#[utoipa::path(
    get,
    path = "/api/v1/collaboration/session/{document_id}",
    params(("document_id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Session info", body = SessionInfo)
    )
)]
#[allow(dead_code)]
pub async fn get_session_doc() {}

/// Recent operations, newest first
#[utoipa::path(
    get,
    path = "/api/v1/collaboration/operations/{document_id}",
    params(("document_id" = String, Path, description = "Document id"), HistoryQuery),
    responses(
        (status = 200, description = "Operations", body = OperationsResponse),
        (status = 400, description = "Limit out of range", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn get_operations_doc() {}

/// Checkpoint a document's operations to the store
#[utoipa::path(
    post,
    path = "/api/v1/collaboration/operations/{document_id}/flush",
    params(("document_id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Operations persisted", body = FlushResponse),
        (status = 503, description = "Store unavailable", body = FlushResponse)
    )
)]
#[allow(dead_code)]
pub async fn flush_operations_doc() {}

/// Operations read back from the store, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/collaboration/operations/{document_id}/restore",
    params(("document_id" = String, Path, description = "Document id"), HistoryQuery),
    responses(
        (status = 200, description = "Restored operations", body = OperationsResponse),
        (status = 503, description = "Store unavailable", body = OperationsResponse)
    )
)]
#[allow(dead_code)]
pub async fn restore_operations_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/collaboration/mentions/{user_id}",
    params(("user_id" = String, Path, description = "Recipient"), MentionsQuery),
    responses(
        (status = 200, description = "Mentions of the user", body = MentionsResponse),
        (status = 403, description = "Not the authenticated user", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn get_mentions_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/collaboration/mentions/{mention_id}/read",
    params(("mention_id" = String, Path, description = "Mention id")),
    request_body = MarkReadRequest,
    responses(
        (status = 200, description = "Mention marked as read", body = MarkReadResponse),
        (status = 404, description = "No such mention for the user", body = MarkReadResponse)
    )
)]
#[allow(dead_code)]
pub async fn mark_mention_read_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        ready_check_doc,
        diagnostics_doc,
        get_session_doc,
        get_operations_doc,
        flush_operations_doc,
        restore_operations_doc,
        get_mentions_doc,
        mark_mention_read_doc,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            DiagnosticsResponse,
            ErrorResponse,
            SessionInfo,
            LockedSection,
            Operation,
            Mention,
            OperationsResponse,
            FlushResponse,
            MentionsResponse,
            MarkReadRequest,
            MarkReadResponse,
        )
    ),
    tags(
        (name = "collaboration", description = "Collaboration session endpoints")
    )
)]
pub struct ApiDoc;
