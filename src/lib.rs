//! Panelgate - GitHub OAuth sign-in gate for a CMS admin panel
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                      │
//! │  - /auth/github (initiation + callback, one path)           │
//! │  - /login, /logout, /health                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Flow Layer                             │
//! │  - CSRF state nonce (signed cookie)                         │
//! │  - AuthOutcome rendering                                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Provider Layer                         │
//! │  - GitHub token exchange + profile fetch (reqwest)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `auth`: the OAuth flow state machine and its pieces
//! - `config`: configuration management
//! - `error`: error types

pub mod auth;
pub mod config;
pub mod error;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned per request; holds no mutable state between invocations.
/// The only flow state (the CSRF nonce) lives in a client-held cookie.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// GitHub API client
    pub provider: Arc<auth::GitHubProvider>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let provider = auth::GitHubProvider::new(&config.github)?;

        Ok(Self {
            config: Arc::new(config),
            provider: Arc::new(provider),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
