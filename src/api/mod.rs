//! API layer - HTTP handlers and routing
//!
//! - `POST /login` (public)
//! - `GET /profile` (behind the auth gate)
//!
//! The auth gate wraps the whole router and exempts only the login route.

pub mod auth;
pub mod middleware;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedSession, LOGIN_PATH};

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: HeaderValue) -> Router {
    // Credentials are carried in a cookie, so CORS must allow them
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Router::new()
        .merge(auth::router())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
