//! Shared application state
//!
//! One [`AppState`] is built in `main` and cloned into every handler through
//! axum's `State` extractor. Clones share the same store and signing key.

use std::sync::Arc;

use crate::config::Config;
use crate::database::DocumentStore;
use crate::token::TokenService;

/// Application state shared across all request handlers
///
/// Built once at startup; every field is read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub tokens: Arc<TokenService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wraps the opened store and loaded config, deriving the token service
    /// from the configured secret.
    pub fn new(store: DocumentStore, config: Config) -> Self {
        let tokens = TokenService::new(&config.token_secret);
        Self {
            store: Arc::new(store),
            tokens: Arc::new(tokens),
            config: Arc::new(config),
        }
    }
}
