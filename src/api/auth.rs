//! Authentication API endpoints
//!
//! - POST /login - Verify credentials, rotate the session, set the token cookie
//! - GET /profile - Username of the authenticated caller

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedSession, LOGIN_PATH};
use crate::models::Profile;
use crate::services::auth::LoginInput;
use crate::services::token::IssuedToken;

/// Response for successful login
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Build the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(LOGIN_PATH, post(login))
        .route("/profile", get(profile))
}

/// POST /login
///
/// A token already carried by the request is ignored; login always rotates
/// the session id and reissues.
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = payload.map_err(|e| {
        tracing::debug!("Rejected login body: {}", e);
        ApiError::bad_request()
    })?;

    let username = input.username.clone();
    let issued = state
        .auth_service
        .login(input)
        .await
        .map_err(|e| ApiError::from_login_error(&username, e))?;

    let cookie = session_cookie(&state.auth_config.cookie_name, &issued, Utc::now());
    let cookie = HeaderValue::from_str(&cookie).map_err(|e| {
        tracing::error!("Failed to build session cookie: {}", e);
        ApiError::internal_error()
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie);

    tracing::info!("User {} logged in", username);
    Ok((headers, Json(LoginResponse { token: issued.token })))
}

/// GET /profile
async fn profile(
    State(state): State<AppState>,
    Extension(AuthenticatedSession(session_id)): Extension<AuthenticatedSession>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .auth_service
        .profile(session_id)
        .await
        .map_err(ApiError::from_profile_error)?;

    Ok(Json(profile))
}

/// `Set-Cookie` value carrying the token until it expires.
///
/// `Expires` and `Max-Age` both derive from `expires_at`.
fn session_cookie(name: &str, issued: &IssuedToken, now: DateTime<Utc>) -> String {
    let max_age = (issued.expires_at - now).num_seconds().max(0);
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Expires={}; Max-Age={}",
        name,
        issued.token,
        issued.expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
        max_age
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn issued_at(expires_at: DateTime<Utc>) -> IssuedToken {
        IssuedToken {
            token: "aaa.bbb.ccc".to_string(),
            expires_at,
        }
    }

    #[test]
    fn test_session_cookie_attributes() {
        let expires_at = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let now = expires_at - Duration::seconds(86400);

        let cookie = session_cookie("access_token", &issued_at(expires_at), now);
        assert_eq!(
            cookie,
            "access_token=aaa.bbb.ccc; Path=/; HttpOnly; SameSite=Lax; \
             Expires=Wed, 02 Jan 2030 03:04:05 GMT; Max-Age=86400"
        );
    }

    #[test]
    fn test_max_age_counts_down_to_expires() {
        let expires_at = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();

        // Sub-second remainder past the truncated expiry is dropped
        let now = expires_at - Duration::seconds(86400) + Duration::milliseconds(750);
        let cookie = session_cookie("access_token", &issued_at(expires_at), now);
        assert!(cookie.ends_with("Max-Age=86399"), "{}", cookie);

        let cookie = session_cookie("access_token", &issued_at(expires_at), expires_at);
        assert!(cookie.ends_with("Max-Age=0"), "{}", cookie);

        let later = expires_at + Duration::seconds(5);
        let cookie = session_cookie("access_token", &issued_at(expires_at), later);
        assert!(cookie.ends_with("Max-Age=0"), "{}", cookie);
    }
}
