//! crates/course_ratings_core/src/session.rs
//!
//! Session context over the hosted passwordless auth provider.
//!
//! A `SessionContext` mirrors the provider's view of the current user into a
//! watch channel. Consumers call [`SessionContext::subscribe`] for change
//! notifications and unsubscribe by dropping the receiver. Signing in only
//! dispatches the magic link; the session becomes active when the callback
//! parameters from the emailed link are handed to
//! [`SessionContext::complete_sign_in`].

use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{AuthTokens, AuthUser};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{AuthProvider, PortError};
use crate::service::LogMode;
use crate::validation::is_institutional_email;

/// Path the provider redirects to after the magic link is followed.
pub const CALLBACK_PATH: &str = "/auth/callback";

const INSTITUTIONAL_EMAIL_REQUIRED: &str = "Use seu email institucional @graduacao.uerj.br";
const INVALID_LINK: &str = "Link de acesso inválido ou expirado";

/// What subscribers observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<AuthUser>,
    /// True until the first session lookup finished.
    pub loading: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// The ways an emailed link can come back to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackParams {
    /// `?code=` from the PKCE code-exchange mode.
    Code { code: String },
    /// `?token_hash=&type=` from the OTP verification mode.
    TokenHash { token_hash: String, kind: String },
    /// `#access_token=&refresh_token=&token_type=` from the implicit mode. The
    /// fragment never reaches the server, so the browser posts it.
    TokenSet {
        access_token: String,
        refresh_token: String,
    },
}

impl CallbackParams {
    /// Reads the callback query. `token_hash` with `type` wins over `code`.
    pub fn from_query(query: &HashMap<String, String>) -> Option<Self> {
        let non_empty = |key: &str| query.get(key).filter(|v| !v.is_empty()).cloned();
        if let (Some(token_hash), Some(kind)) = (non_empty("token_hash"), non_empty("type")) {
            return Some(Self::TokenHash { token_hash, kind });
        }
        non_empty("code").map(|code| Self::Code { code })
    }

    /// Reads a URL fragment such as `#access_token=..&refresh_token=..&token_type=bearer`.
    pub fn from_fragment(fragment: &str) -> Option<Self> {
        let pairs: HashMap<&str, &str> = fragment
            .trim_start_matches('#')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .filter(|(_, value)| !value.is_empty())
            .collect();
        let access_token = pairs.get("access_token")?;
        let refresh_token = pairs.get("refresh_token")?;
        pairs.get("token_type")?;
        Some(Self::TokenSet {
            access_token: (*access_token).to_string(),
            refresh_token: (*refresh_token).to_string(),
        })
    }
}

/// A PKCE verifier and its S256 challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> Self {
        let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let challenge = challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// `BASE64URL(SHA256(verifier))` without padding.
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Returned by a successful sign-in request. The verifier must be kept by the
/// requester until the code comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSignIn {
    pub code_verifier: String,
}

pub struct SessionContext {
    provider: Arc<dyn AuthProvider>,
    redirect_url: String,
    log_mode: LogMode,
    state: watch::Sender<SessionState>,
}

impl SessionContext {
    /// Creates a context in the loading state. `app_url` is the application's
    /// base URL; the callback path is appended to it.
    pub fn new(provider: Arc<dyn AuthProvider>, app_url: &str, log_mode: LogMode) -> Self {
        let (state, _) = watch::channel(SessionState {
            user: None,
            loading: true,
        });
        Self {
            provider,
            redirect_url: format!("{}{CALLBACK_PATH}", app_url.trim_end_matches('/')),
            log_mode,
            state,
        }
    }

    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Change notifications; drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Looks the current session up once. A token the provider rejects, or a
    /// provider that cannot be reached, leaves the context signed out.
    pub async fn initialize(&self, access_token: Option<&str>) -> SessionState {
        if self.resolve(access_token).await.is_err() {
            self.publish(None);
        }
        self.state()
    }

    /// Resolves an access token to its user and publishes the result.
    ///
    /// A token the provider rejects is `Ok(None)`; any other provider failure
    /// is returned as a backend error.
    pub async fn resolve(&self, access_token: Option<&str>) -> ServiceResult<Option<AuthUser>> {
        let user = match access_token {
            None => None,
            Some(token) => match self.provider.get_user(token).await {
                Ok(user) => Some(user),
                Err(PortError::Unauthorized | PortError::NotFound(_)) => None,
                Err(e) => {
                    self.log_failure("Failed to fetch session", &e);
                    return Err(ServiceError::Backend(e));
                }
            },
        };
        if self.log_mode == LogMode::Development {
            info!(has_user = user.is_some(), "Session checked");
        }
        self.publish(user.clone());
        Ok(user)
    }

    /// Requests a magic link for an institutional address. Other domains are
    /// rejected before the provider is contacted.
    pub async fn sign_in_with_email(&self, email: &str) -> ServiceResult<PendingSignIn> {
        if !is_institutional_email(email) {
            return Err(ServiceError::validation(INSTITUTIONAL_EMAIL_REQUIRED));
        }
        if self.log_mode == LogMode::Development {
            info!(email, "Sending magic link");
        }
        let pkce = PkcePair::generate();
        self.provider
            .send_magic_link(email, &self.redirect_url, &pkce.challenge)
            .await
            .map_err(|e| {
                self.log_failure("Provider rejected magic link request", &e);
                ServiceError::from(e)
            })?;
        info!("Magic link sent");
        Ok(PendingSignIn {
            code_verifier: pkce.verifier,
        })
    }

    /// Turns the parameters of a followed magic link into a session.
    pub async fn complete_sign_in(
        &self,
        params: CallbackParams,
        code_verifier: Option<&str>,
    ) -> ServiceResult<AuthTokens> {
        let result = match params {
            CallbackParams::Code { code } => {
                let verifier =
                    code_verifier.ok_or_else(|| ServiceError::validation(INVALID_LINK))?;
                self.provider.exchange_code(&code, verifier).await
            }
            CallbackParams::TokenHash { token_hash, kind } => {
                self.provider.verify_token_hash(&token_hash, &kind).await
            }
            CallbackParams::TokenSet {
                access_token,
                refresh_token,
            } => self
                .provider
                .get_user(&access_token)
                .await
                .map(|user| AuthTokens {
                    access_token,
                    refresh_token,
                    expires_in: None,
                    user,
                }),
        };

        let tokens = result.map_err(|e| {
            self.log_failure("Failed to establish session", &e);
            match e {
                PortError::Unauthorized | PortError::NotFound(_) => {
                    ServiceError::validation(INVALID_LINK)
                }
                other => ServiceError::from(other),
            }
        })?;
        self.publish(Some(tokens.user.clone()));
        Ok(tokens)
    }

    /// Ends the provider session, if any, and clears the local state.
    pub async fn sign_out(&self, access_token: Option<&str>) -> ServiceResult<()> {
        if let Some(token) = access_token {
            match self.provider.sign_out(token).await {
                Ok(()) | Err(PortError::Unauthorized) => {}
                Err(e) => {
                    self.log_failure("Failed to sign out", &e);
                    return Err(ServiceError::from(e));
                }
            }
        }
        self.publish(None);
        Ok(())
    }

    fn publish(&self, user: Option<AuthUser>) {
        self.state.send_replace(SessionState {
            user,
            loading: false,
        });
    }

    fn log_failure(&self, message: &str, error: &PortError) {
        match self.log_mode {
            LogMode::Development => error!(error = ?error, "{message}"),
            LogMode::Production => warn!("{message}"),
        }
    }
}
