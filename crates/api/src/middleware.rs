//! Session enforcement.
//!
//! Every dispatch route passes through here: the opaque session cookie
//! resolves to a [`Principal`] through the injected `SessionManager`, the
//! principal rides the request as an extension, and the access log is
//! refreshed. Requests without a live session never reach a handler.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::warn;

use col_auth::SessionManager;
use col_storage::StorageGateway;

use crate::app::errors::json_error;

/// Cookie carrying the opaque session id.
pub const SESSION_COOKIE: &str = "COLSESSION";

#[derive(Clone)]
pub struct SessionState {
    pub sessions: Arc<dyn SessionManager>,
    pub gateway: Arc<dyn StorageGateway>,
}

pub async fn session_middleware(
    State(state): State<SessionState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let session_id = extract_session_id(req.headers()).ok_or_else(|| {
        json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "a valid session is required",
        )
    })?;

    let principal = state.sessions.principal(&session_id).map_err(|e| {
        json_error(StatusCode::UNAUTHORIZED, "unauthorized", e.to_string())
    })?;

    // Access-log refresh is best effort; an unreachable log must not block
    // an authenticated request.
    if let Err(e) = state
        .gateway
        .record_access(principal.username(), Utc::now())
        .await
    {
        warn!(user = principal.username(), error = %e, "access log update failed");
    }

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}
