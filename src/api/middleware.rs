//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The API error type and its JSON shape
//! - The auth gate (token validation for every route except login)

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::services::auth::{AuthService, AuthServiceError};
use crate::services::token::TokenService;

/// The one route the auth gate lets through without a token
pub const LOGIN_PATH: &str = "/login";

const MSG_INVALID_REQUEST: &str = "invalid request";
const MSG_LOGIN_REQUIRED: &str = "login required";
const MSG_SESSION_EXPIRED: &str = "session expired, login again";
const MSG_INVALID_CREDENTIALS: &str = "invalid username or password";
const MSG_INTERNAL: &str = "internal server error";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub tokens: Arc<TokenService>,
    pub auth_config: Arc<AuthConfig>,
}

/// Session id of a request that passed the auth gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedSession(pub Uuid);

/// Error response body: `{"code": <status>, "message": <text>}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
        }
    }

    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST, MSG_INVALID_REQUEST)
    }

    pub fn login_required() -> Self {
        Self::new(StatusCode::FORBIDDEN, MSG_LOGIN_REQUIRED)
    }

    pub fn session_expired() -> Self {
        Self::new(StatusCode::FORBIDDEN, MSG_SESSION_EXPIRED)
    }

    pub fn invalid_credentials() -> Self {
        Self::new(StatusCode::FORBIDDEN, MSG_INVALID_CREDENTIALS)
    }

    pub fn internal_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL)
    }

    /// Map a login failure. Which check failed is only logged.
    pub fn from_login_error(username: &str, err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::InputInvalid(reason) => {
                tracing::debug!("Rejected login input: {}", reason);
                Self::bad_request()
            }
            AuthServiceError::NotFound | AuthServiceError::Unauthorized => {
                tracing::warn!("Failed login for {}", username);
                Self::invalid_credentials()
            }
            AuthServiceError::Storage(e) => {
                tracing::error!("Login for {} failed: {:#}", username, e);
                Self::invalid_credentials()
            }
        }
    }

    /// Map a failure resolving an authenticated caller
    pub fn from_profile_error(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::InputInvalid(_) => Self::bad_request(),
            AuthServiceError::NotFound | AuthServiceError::Unauthorized => {
                Self::session_expired()
            }
            AuthServiceError::Storage(e) => {
                tracing::error!("Profile lookup failed: {:#}", e);
                Self::internal_error()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Extract the token from the named cookie, falling back to a bearer header
pub fn extract_token(request: &Request, cookie_name: &str) -> Option<String> {
    if let Some(cookie_header) = request.headers().get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some((name, value)) = cookie.trim().split_once('=') {
                    if name == cookie_name && !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }

    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Auth gate
///
/// Passes the login route through untouched. Everything else needs a valid
/// token; the embedded session id is attached as [`AuthenticatedSession`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.uri().path() == LOGIN_PATH {
        return Ok(next.run(request).await);
    }

    let token = extract_token(&request, &state.auth_config.cookie_name)
        .ok_or_else(ApiError::login_required)?;

    let session_id = state.tokens.validate(&token).map_err(|e| {
        tracing::debug!("Rejected token on {}: {}", request.uri().path(), e);
        ApiError::session_expired()
    })?;

    request.extensions_mut().insert(AuthenticatedSession(session_id));
    Ok(next.run(request).await)
}
