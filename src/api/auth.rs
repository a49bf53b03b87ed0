use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, IdentityDto, MessageResponse};
use crate::domain;
use crate::models::Capability;
use crate::services::{AuthError, Identity, SessionToken};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Requires a valid session token from either:
/// 1. `Authorization: Bearer <token>` header
/// 2. the session cookie
///
/// The verified identity is attached to the request extensions. Nothing is
/// stored server-side.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers(), &state.config().auth.cookie_name)
        .ok_or_else(ApiError::not_authenticated)?;

    let identity = state.auth().verify(&token)?;
    tracing::Span::current().record("user_id", identity.username.as_str());

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Read-only routes. Anonymous access is allowed unless
/// `auth.read_requires_viewer` is set; a valid token is attached either way.
pub async fn read_access(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let required = state.config().auth.read_requires_viewer;
    let token = extract_token(request.headers(), &state.config().auth.cookie_name);

    let identity = match token {
        Some(token) => match state.auth().verify(&token) {
            Ok(identity) => Some(identity),
            Err(e) if required => return Err(e.into()),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid token on read-only route");
                None
            }
        },
        None if required => return Err(ApiError::not_authenticated()),
        None => None,
    };

    if let Some(identity) = identity {
        if required && !state.auth().authorize(&identity, Capability::ReadEntries) {
            return Err(AuthError::Forbidden("missing read capability".to_string()).into());
        }
        tracing::Span::current().record("user_id", identity.username.as_str());
        request.extensions_mut().insert(identity);
    }

    Ok(next.run(request).await)
}

/// Extract the session token from the Authorization header or the cookie.
pub(crate) fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && !token.trim().is_empty()
    {
        return Some(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
/// Authenticate with username and password, returns a session token and sets
/// the session cookie
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    if payload.username.trim().is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let session = state
        .auth()
        .authenticate(&payload.username, &payload.password)
        .await?;

    Ok(with_session_cookie(&state, session))
}

/// POST /auth/refresh
/// Exchange a still-valid token for a fresh one
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = extract_token(&headers, &state.config().auth.cookie_name)
        .ok_or_else(ApiError::not_authenticated)?;

    let session = state.auth().refresh(&token).await?;
    Ok(with_session_cookie(&state, session))
}

/// POST /auth/logout
/// Clear the session cookie. Tokens already handed out stay valid until
/// they expire.
pub async fn logout(State(state): State<Arc<AppState>>) -> Response {
    let cookie = session_cookie(&state, "", 0);
    let mut response = Json(ApiResponse::success(MessageResponse {
        message: "Logged out".to_string(),
    }))
    .into_response();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

/// GET /auth/me
/// Get the identity carried by the current token
pub async fn me(Extension(identity): Extension<Identity>) -> Json<ApiResponse<IdentityDto>> {
    Json(ApiResponse::success(IdentityDto {
        username: identity.username,
        display_name: identity.display_name,
        role: identity.role,
        expires_at: domain::format_timestamp(&identity.expires_at),
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn with_session_cookie(state: &AppState, session: SessionToken) -> Response {
    let max_age = (session.expires_at - session.issued_at).num_seconds().max(0);
    let cookie = session_cookie(state, &session.token, max_age);

    let mut response = Json(ApiResponse::success(session)).into_response();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

fn session_cookie(state: &AppState, value: &str, max_age: i64) -> String {
    let config = state.config();
    let mut cookie = format!(
        "{}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
        config.auth.cookie_name
    );
    if config.server.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}
