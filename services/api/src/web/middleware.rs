//! services/api/src/web/middleware.rs
//!
//! Request filters: authentication for protected routes, security response
//! headers and the production deny-list for source paths.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use course_ratings_core::validation::is_institutional_email;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::HttpError;
use crate::web::state::AppState;

/// Cookie holding the provider access token.
pub const SESSION_COOKIE: &str = "session";

const INSTITUTIONAL_ONLY: &str =
    "Apenas estudantes com email @graduacao.uerj.br podem adicionar avaliações";

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
    script-src 'self' 'unsafe-inline' 'unsafe-eval' https://*.supabase.co; \
    style-src 'self' 'unsafe-inline' https://fonts.googleapis.com; \
    font-src 'self' https://fonts.gstatic.com; \
    img-src 'self' data: https:; \
    connect-src 'self' https://*.supabase.co wss://*.supabase.co; \
    frame-src 'none'; \
    object-src 'none'; \
    base-uri 'self'; \
    form-action 'self'";

const BASE_HEADERS: [(&str, &str); 4] = [
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("content-security-policy", CONTENT_SECURITY_POLICY),
];

const PRODUCTION_HEADERS: [(&str, &str); 4] = [
    (
        "strict-transport-security",
        "max-age=31536000; includeSubDomains; preload",
    ),
    (
        "permissions-policy",
        "camera=(), microphone=(), geolocation=(), payment=()",
    ),
    ("cross-origin-embedder-policy", "require-corp"),
    ("cross-origin-opener-policy", "same-origin"),
];

/// Reads one cookie from the `Cookie` header.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then_some(value)
        })
}

/// Middleware that resolves the session cookie to the provider's user.
///
/// If valid, inserts the `AuthUser` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized; accounts outside the
/// student domain get 403. A provider failure is a 500, not a sign-out.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let token = read_cookie(req.headers(), SESSION_COOKIE)
        .ok_or_else(HttpError::unauthorized)?
        .to_string();

    let user = state
        .session()
        .resolve(Some(&token))
        .await?
        .ok_or_else(HttpError::unauthorized)?;
    if !user.email.as_deref().is_some_and(is_institutional_email) {
        warn!(user_id = %user.id, "Write attempted by a non-institutional account");
        return Err(HttpError::new(StatusCode::FORBIDDEN, INSTITUTIONAL_ONLY));
    }
    debug!(user_id = %user.id, "Request authenticated");

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Whether a path must not be served in production.
pub fn is_denied_source_path(path: &str) -> bool {
    path.ends_with(".map")
        || path.contains("_next/static/chunks/")
        || path.contains(".ts")
        || path.contains(".tsx")
}

/// Attaches the security headers; in production also hides source paths.
pub async fn security_headers(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let production = state.config.is_production();
    if production && is_denied_source_path(req.uri().path()) {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    let extra: &[(&'static str, &'static str)] = if production {
        &PRODUCTION_HEADERS
    } else {
        &[]
    };
    for &(name, value) in BASE_HEADERS.iter().chain(extra) {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    response
}
