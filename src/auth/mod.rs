//! GitHub OAuth authentication
//!
//! Handles:
//! - GitHub OAuth flow (single-path initiation + callback)
//! - CSRF state nonce issuance and verification
//! - Outcome rendering (the one place terminal responses are built)

mod oauth;
pub mod outcome;
pub mod provider;
pub mod state;

pub use oauth::auth_router;
pub use outcome::{AuthOutcome, FailureKind, SESSION_COOKIE, render_outcome};
pub use provider::{GitHubProvider, TokenExchange, UserProfile};
pub use state::{STATE_COOKIE, StateNonce, create_state_token, verify_state_token};
