//! services/api/src/adapters/supabase_auth.rs
//!
//! Reqwest-backed adapter for the hosted auth provider's REST API (GoTrue).
//! It implements the `AuthProvider` port: magic links with a PKCE challenge,
//! code exchange, token-hash verification, user lookup and logout.

use std::time::Duration;

use async_trait::async_trait;
use course_ratings_core::domain::{AuthTokens, AuthUser};
use course_ratings_core::ports::{AuthProvider, PortError, PortResult};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for `{SUPABASE_URL}/auth/v1`.
#[derive(Clone)]
pub struct SupabaseAuthAdapter {
    client: Client,
    base: Url,
    anon_key: String,
}

impl SupabaseAuthAdapter {
    /// # Errors
    ///
    /// Fails when `base_url` is not a URL or the HTTP client cannot be built.
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> PortResult<Self> {
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| PortError::Unexpected(format!("invalid auth base URL: {e}")))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self {
            client,
            base,
            anon_key: anon_key.into(),
        })
    }

    fn endpoint(&self, path: &str) -> PortResult<Url> {
        self.base
            .join(&format!("auth/v1/{path}"))
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    /// Adds the project key and a bearer token (the key itself when anonymous).
    fn authorize(&self, request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        request
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(bearer.unwrap_or(self.anon_key.as_str()))
    }

    async fn send(&self, request: RequestBuilder, credential_check: bool) -> PortResult<Vec<u8>> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref(), credential_check));
        }
        Ok(body.to_vec())
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct OtpRequest<'a> {
    email: &'a str,
    create_user: bool,
    code_challenge: &'a str,
    code_challenge_method: &'static str,
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    token_hash: &'a str,
}

#[derive(Deserialize)]
struct UserDto {
    id: Uuid,
    email: Option<String>,
}

impl UserDto {
    fn into_domain(self) -> AuthUser {
        AuthUser {
            id: self.id,
            email: self.email.filter(|e| !e.is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct SessionDto {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    user: UserDto,
}

impl SessionDto {
    fn into_domain(self) -> AuthTokens {
        AuthTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
            user: self.user.into_domain(),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> PortResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| PortError::Unexpected(format!("invalid auth provider payload: {e}")))
}

fn map_transport_error(error: reqwest::Error) -> PortError {
    if error.is_timeout() {
        PortError::Unexpected("auth provider timed out".to_string())
    } else {
        PortError::Unexpected(format!("auth provider unreachable: {error}"))
    }
}

/// `credential_check` marks calls whose client errors mean a bad or expired
/// credential rather than a malformed request.
fn map_status_error(status: StatusCode, body: &[u8], credential_check: bool) -> PortError {
    let detail = String::from_utf8_lossy(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized,
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY
            if credential_check =>
        {
            PortError::Unauthorized
        }
        _ => PortError::Unexpected(format!("auth provider returned {status}: {detail}")),
    }
}

//=========================================================================================
// `AuthProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthProvider for SupabaseAuthAdapter {
    async fn send_magic_link(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> PortResult<()> {
        let mut url = self.endpoint("otp")?;
        url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        let request = self.authorize(self.client.post(url), None).json(&OtpRequest {
            email,
            create_user: true,
            code_challenge,
            code_challenge_method: "s256",
        });
        self.send(request, false).await?;
        debug!("Magic link requested");
        Ok(())
    }

    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> PortResult<AuthTokens> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "pkce");
        let request = self.authorize(self.client.post(url), None).json(&PkceGrant {
            auth_code,
            code_verifier,
        });
        let body = self.send(request, true).await?;
        Ok(decode::<SessionDto>(&body)?.into_domain())
    }

    async fn verify_token_hash(&self, token_hash: &str, kind: &str) -> PortResult<AuthTokens> {
        let url = self.endpoint("verify")?;
        let request = self
            .authorize(self.client.post(url), None)
            .json(&VerifyRequest { kind, token_hash });
        let body = self.send(request, true).await?;
        Ok(decode::<SessionDto>(&body)?.into_domain())
    }

    async fn get_user(&self, access_token: &str) -> PortResult<AuthUser> {
        let url = self.endpoint("user")?;
        let request = self.authorize(self.client.get(url), Some(access_token));
        let body = self.send(request, true).await?;
        Ok(decode::<UserDto>(&body)?.into_domain())
    }

    async fn sign_out(&self, access_token: &str) -> PortResult<()> {
        let url = self.endpoint("logout")?;
        let request = self.authorize(self.client.post(url), Some(access_token));
        self.send(request, true).await?;
        Ok(())
    }
}
