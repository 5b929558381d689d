//! Login, logout and session-token middleware

use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};

use super::{ApiState, TOKEN_HEADER};
use crate::session::Session;

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Login response body
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "access-token")]
    pub access_token: String,
}

/// Current user response body
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    #[serde(rename = "user-name")]
    pub user_name: String,
}

/// Extract the session token from the request headers
fn extract_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Middleware resolving the session token into an `Arc<Session>` extension
pub async fn require_session(
    State(state): State<Arc<ApiState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(token) = extract_token(&req) else {
        tracing::debug!("no session token provided");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let Some(session) = state.sessions.session_by_token(token) else {
        tracing::debug!("unknown or expired session token");
        return Err(StatusCode::UNAUTHORIZED);
    };

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// `POST /api/login`
///
/// A malformed body is treated like bad credentials.
pub async fn login(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<LoginResponse>, StatusCode> {
    let request: LoginRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "malformed login request");
        StatusCode::UNAUTHORIZED
    })?;

    let user_name = state
        .authenticator
        .authenticate(&request.login, &request.password)
        .map_err(|e| {
            tracing::warn!(login = %request.login, error = %e, "login rejected");
            StatusCode::UNAUTHORIZED
        })?;

    let session = state.sessions.new_session(user_name);
    Ok(Json(LoginResponse {
        access_token: session.token().to_string(),
    }))
}

/// `GET /api/user`
pub async fn current_user(Extension(session): Extension<Arc<Session>>) -> Json<UserResponse> {
    Json(UserResponse {
        user_name: session.user_name().to_string(),
    })
}

/// `DELETE /api/user`: end the session
pub async fn logout(
    State(state): State<Arc<ApiState>>,
    Extension(session): Extension<Arc<Session>>,
) -> StatusCode {
    state.sessions.end_session(session.token());
    StatusCode::NO_CONTENT
}
