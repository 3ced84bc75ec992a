//! Terminal outcome of an authentication attempt
//!
//! Every path through the flow ends in exactly one [`AuthOutcome`],
//! and exactly one function maps an outcome to HTTP status, headers,
//! and cookies. Handlers never build their own terminal responses.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use super::provider::UserProfile;
use super::state::STATE_COOKIE;
use crate::config::AppConfig;

/// Name of the cookie carrying the access token after sign-in
pub const SESSION_COOKIE: &str = "session";

/// Auth responses must never be cached by the browser or proxies
pub(crate) const NO_STORE: &str = "no-cache, no-store, must-revalidate";

/// Why an authentication attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// `code` parameter present but empty (misconfigured routing)
    MissingCode,
    /// CSRF nonce absent, expired, or not matching the echoed `state`
    StateMismatch,
    /// Token endpoint returned an error field
    ProviderError,
    /// Token endpoint returned success without an access token
    NoAccessToken,
    /// Profile fetch rejected the freshly issued token
    TokenValidationFailed,
    /// Outbound call failed or timed out
    NetworkFailure,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MissingCode => "missing_code",
            FailureKind::StateMismatch => "state_mismatch",
            FailureKind::ProviderError => "provider_error",
            FailureKind::NoAccessToken => "no_access_token",
            FailureKind::TokenValidationFailed => "token_validation_failed",
            FailureKind::NetworkFailure => "network_failure",
        }
    }
}

/// Terminal result of one pass through the state machine
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Success { token: String, user: UserProfile },
    Failure { kind: FailureKind, message: String },
}

impl AuthOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        AuthOutcome::Failure {
            kind,
            message: message.into(),
        }
    }
}

/// Plain 302 Found redirect
///
/// `axum::response::Redirect` only offers 303/307/308; the OAuth dance
/// uses 302 throughout.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Removal cookie for the state nonce
///
/// Issued on every terminal response so no nonce dangles past the
/// flow, success or failure.
fn clear_state_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((STATE_COOKIE, "")).path("/").build())
}

fn failure_redirect_url(error_redirect_uri: &str, kind: FailureKind, message: &str) -> String {
    let separator = if error_redirect_uri.contains('?') {
        '&'
    } else {
        '?'
    };
    format!(
        "{}{}error={}&message={}",
        error_redirect_uri,
        separator,
        kind.as_str(),
        urlencoding::encode(message),
    )
}

/// Render an outcome as the terminal HTTP response
///
/// Success: clear the nonce cookie, set the session cookie, 302 to the
/// success URL. Failure: clear the nonce cookie, 302 to the error URL
/// with `error` and `message` query parameters. Both carry
/// `Cache-Control: no-store`.
pub fn render_outcome(outcome: AuthOutcome, jar: CookieJar, config: &AppConfig) -> Response {
    let jar = clear_state_cookie(jar);

    match outcome {
        AuthOutcome::Success { token, user } => {
            tracing::info!(login = %user.login, "GitHub authentication successful");

            let session = Cookie::build((SESSION_COOKIE, token))
                .path("/")
                .max_age(time::Duration::seconds(config.auth.session_max_age))
                .http_only(true)
                .secure(config.should_use_secure_cookies())
                .same_site(SameSite::Lax)
                .build();

            (
                [(header::CACHE_CONTROL, NO_STORE)],
                jar.add(session),
                found(&config.auth.success_redirect_uri),
            )
                .into_response()
        }
        AuthOutcome::Failure { kind, message } => {
            tracing::warn!(
                kind = kind.as_str(),
                message = %message,
                "GitHub authentication failed"
            );

            let location = failure_redirect_url(&config.auth.error_redirect_uri, kind, &message);
            (
                [(header::CACHE_CONTROL, NO_STORE)],
                jar,
                found(&location),
            )
                .into_response()
        }
    }
}
