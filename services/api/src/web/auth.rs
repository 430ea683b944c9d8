//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: magic-link sign-in, the link callback, session
//! establishment from a token fragment, logout and the current user.
//!
//! The provider access token travels in an HttpOnly `session` cookie. While a
//! magic link is pending, the PKCE verifier is kept in a short-lived cookie
//! scoped to `/auth`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect},
    Json,
};
use course_ratings_core::{AuthTokens, AuthUser, CallbackParams};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::HttpError;
use crate::web::extract::AppJson;
use crate::web::middleware::{read_cookie, SESSION_COOKIE};
use crate::web::state::AppState;

/// Cookie holding the PKCE verifier between sign-in and callback.
pub const VERIFIER_COOKIE: &str = "pkce_verifier";
const VERIFIER_MAX_AGE_SECONDS: i64 = 60 * 60;
const DEFAULT_SESSION_SECONDS: i64 = 60 * 60;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct MagicLinkRequest {
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// The token set the provider appends as a URL fragment in implicit mode.
#[derive(Deserialize, ToSchema)]
pub struct SessionRequest {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: Option<String>,
}

impl From<AuthUser> for UserResponse {
    fn from(user: AuthUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: Option<UserResponse>,
    pub is_authenticated: bool,
}

#[derive(Serialize, ToSchema)]
pub struct DeprecatedResponse {
    pub message: String,
    pub success: bool,
    pub deprecated: bool,
}

//=========================================================================================
// Cookies
//=========================================================================================

/// `Secure` is only set in production; local development runs over plain HTTP.
fn cookie(name: &str, value: &str, path: &str, max_age: i64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{name}={value}; HttpOnly{secure}; SameSite=Lax; Path={path}; Max-Age={max_age}")
}

fn session_cookie(tokens: &AuthTokens, secure: bool) -> String {
    cookie(
        SESSION_COOKIE,
        &tokens.access_token,
        "/",
        tokens.expires_in.unwrap_or(DEFAULT_SESSION_SECONDS),
        secure,
    )
}

fn clear_session_cookie(secure: bool) -> String {
    cookie(SESSION_COOKIE, "", "/", 0, secure)
}

fn clear_verifier_cookie(secure: bool) -> String {
    cookie(VERIFIER_COOKIE, "", "/auth", 0, secure)
}

/// Only same-site absolute paths are followed after sign-in.
fn safe_next(next: Option<&String>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.as_str()
        }
        _ => "/",
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/magic-link - Email a sign-in link to an institutional address
#[utoipa::path(
    post,
    path = "/auth/magic-link",
    request_body = MagicLinkRequest,
    responses(
        (status = 200, description = "Link sent", body = MessageResponse),
        (status = 400, description = "Not an institutional email"),
        (status = 500, description = "Auth provider failure")
    )
)]
pub async fn magic_link_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<MagicLinkRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let pending = state.session().sign_in_with_email(&req.email).await?;
    let verifier = cookie(
        VERIFIER_COOKIE,
        &pending.code_verifier,
        "/auth",
        VERIFIER_MAX_AGE_SECONDS,
        state.config.is_production(),
    );
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, verifier)],
        Json(MessageResponse {
            message: "Link de acesso enviado! Verifique seu email.".to_string(),
        }),
    ))
}

/// GET /auth/callback - Target of the emailed link
///
/// Accepts `code` (PKCE) or `token_hash` with `type`, establishes the session
/// and redirects to `next`. Without either parameter it only redirects.
#[utoipa::path(
    get,
    path = "/auth/callback",
    params(
        ("code" = Option<String>, Query, description = "One-time code in PKCE mode"),
        ("token_hash" = Option<String>, Query, description = "Token hash in OTP mode"),
        ("type" = Option<String>, Query, description = "OTP type, e.g. magiclink"),
        ("next" = Option<String>, Query, description = "Path to continue to")
    ),
    responses(
        (status = 303, description = "Session established, redirecting"),
        (status = 400, description = "Invalid or expired link")
    )
)]
pub async fn callback_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, HttpError> {
    let next = safe_next(query.get("next")).to_string();
    let Some(params) = CallbackParams::from_query(&query) else {
        info!("Callback without link parameters, redirecting");
        return Ok((AppendHeaders(Vec::new()), Redirect::to(&next)));
    };

    let verifier = read_cookie(&headers, VERIFIER_COOKIE);
    let tokens = state.session().complete_sign_in(params, verifier).await?;
    info!(user_id = %tokens.user.id, "Session established from link");
    let secure = state.config.is_production();
    Ok((
        AppendHeaders(vec![
            (header::SET_COOKIE, session_cookie(&tokens, secure)),
            (header::SET_COOKIE, clear_verifier_cookie(secure)),
        ]),
        Redirect::to(&next),
    ))
}

/// POST /auth/session - Establish a session from a fragment token set
#[utoipa::path(
    post,
    path = "/auth/session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Session established", body = UserResponse),
        (status = 400, description = "Invalid or expired tokens")
    )
)]
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<SessionRequest>,
) -> Result<impl IntoResponse, HttpError> {
    if req.token_type.is_empty() {
        return Err(HttpError::bad_request("Link de acesso inválido ou expirado"));
    }
    let params = CallbackParams::TokenSet {
        access_token: req.access_token,
        refresh_token: req.refresh_token,
    };
    let tokens = state.session().complete_sign_in(params, None).await?;
    let cookie = session_cookie(&tokens, state.config.is_production());
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse::from(tokens.user)),
    ))
}

/// POST /auth/logout - End the session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let token = read_cookie(&headers, SESSION_COOKIE);
    state.session().sign_out(token).await?;
    let cleared = clear_session_cookie(state.config.is_production());
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cleared)],
        Json(MessageResponse {
            message: "Sessão encerrada".to_string(),
        }),
    ))
}

/// GET /auth/me - The current user, if any
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current session state", body = MeResponse)
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<MeResponse> {
    let session = state.session();
    let current = session
        .initialize(read_cookie(&headers, SESSION_COOKIE))
        .await;
    Json(MeResponse {
        is_authenticated: current.is_authenticated(),
        user: current.user.map(UserResponse::from),
    })
}

/// POST /api/send-verification - Retired; sign-in goes through the magic link
#[utoipa::path(
    post,
    path = "/api/send-verification",
    responses(
        (status = 200, description = "Always reports the endpoint as deprecated", body = DeprecatedResponse)
    )
)]
pub async fn send_verification_handler() -> Json<DeprecatedResponse> {
    Json(DeprecatedResponse {
        message: "Esta API foi substituída pelo login por link mágico. Use POST /auth/magic-link."
            .to_string(),
        success: false,
        deprecated: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_must_be_a_local_path() {
        let local = "/professor/1".to_string();
        let external = "https://evil.example".to_string();
        let protocol_relative = "//evil.example".to_string();
        assert_eq!(safe_next(Some(&local)), "/professor/1");
        assert_eq!(safe_next(Some(&external)), "/");
        assert_eq!(safe_next(Some(&protocol_relative)), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn session_cookie_uses_provider_expiry() {
        let tokens = AuthTokens {
            access_token: "jwt".into(),
            refresh_token: "r".into(),
            expires_in: Some(120),
            user: AuthUser {
                id: Uuid::nil(),
                email: None,
            },
        };
        let cookie = session_cookie(&tokens, true);
        assert!(cookie.starts_with("session=jwt;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("; Secure;"));
        assert!(cookie.contains("Max-Age=120"));
    }

    #[test]
    fn development_cookies_are_not_secure_only() {
        let cookie = clear_verifier_cookie(false);
        assert_eq!(
            cookie,
            "pkce_verifier=; HttpOnly; SameSite=Lax; Path=/auth; Max-Age=0"
        );
    }
}
