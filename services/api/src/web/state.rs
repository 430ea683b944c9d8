//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-request session context.

use crate::config::Config;
use course_ratings_core::ports::AuthProvider;
use course_ratings_core::{RatingsService, SessionContext};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RatingsService>,
    pub auth: Arc<dyn AuthProvider>,
    pub config: Arc<Config>,
}

impl AppState {
    /// A fresh session context for one request.
    pub fn session(&self) -> SessionContext {
        SessionContext::new(self.auth.clone(), &self.config.app_url, self.config.log_mode)
    }
}
