//! GitHub OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with GitHub on a
//! single path: a request without a `code` parameter starts the flow
//! (authorize redirect), a request with one is the callback.

use axum::{
    Router,
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use super::outcome::{AuthOutcome, FailureKind, NO_STORE, SESSION_COOKIE, found, render_outcome};
use super::state::{STATE_COOKIE, StateNonce, create_state_token, verify_state_token};
use crate::AppState;
use crate::error::AppError;

/// Create authentication router
///
/// Routes:
/// - GET /login - Login page
/// - GET /auth/github - OAuth initiation and callback (shared path)
/// - POST /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page))
        .route("/auth/github", get(github_auth))
        .route("/logout", axum::routing::post(logout))
}

// =============================================================================
// Login Page
// =============================================================================

/// GET /login
///
/// Renders a simple login page with GitHub sign-in button.
async fn login_page() -> impl IntoResponse {
    Html(
        r#"
        <!DOCTYPE html>
        <html>
        <head><title>Login - Panelgate</title></head>
        <body>
            <h1>Panelgate</h1>
            <p>Please sign in with GitHub</p>
            <a href="/auth/github">Sign in with GitHub</a>
        </body>
        </html>
    "#,
    )
}

// =============================================================================
// GitHub OAuth
// =============================================================================

/// Query parameters on /auth/github
///
/// Both are absent on initiation; GitHub supplies both on callback.
#[derive(Debug, Deserialize)]
struct AuthQuery {
    /// Authorization code
    code: Option<String>,
    /// CSRF state token echo
    state: Option<String>,
}

/// GET /auth/github
///
/// Drives the flow state machine for one request:
/// no `code` means START, a `code` means callback.
async fn github_auth(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    match query.code {
        None => begin_authorization(&state, jar),
        Some(code) => Ok(complete_authorization(&state, jar, &code, query.state.as_deref()).await),
    }
}

/// START: issue a nonce and redirect to GitHub's authorize endpoint
///
/// # Steps
/// 1. Generate CSRF state nonce (OS CSPRNG)
/// 2. Store the signed nonce in a short-lived cookie
/// 3. Redirect to GitHub with client_id, redirect_uri, scope, state
fn begin_authorization(state: &AppState, jar: CookieJar) -> Result<Response, AppError> {
    let auth = &state.config.auth;

    let nonce = StateNonce::generate();
    let token = create_state_token(&nonce, &auth.state_secret)?;

    let cookie = Cookie::build((STATE_COOKIE, token))
        .path("/")
        .max_age(time::Duration::seconds(auth.state_max_age))
        .http_only(true)
        .secure(state.config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .build();

    let authorize_url = format!(
        "{}?client_id={}&redirect_uri={}&scope={}&state={}",
        state.config.github.authorize_url,
        urlencoding::encode(&auth.client_id),
        urlencoding::encode(&auth.redirect_uri),
        urlencoding::encode(&auth.scopes),
        urlencoding::encode(&nonce.nonce),
    );

    tracing::info!("Redirecting to GitHub authorize endpoint");

    Ok((
        [(header::CACHE_CONTROL, NO_STORE)],
        jar.add(cookie),
        found(&authorize_url),
    )
        .into_response())
}

/// Callback: verify the nonce, exchange the code, validate the token
///
/// Every path ends in a rendered [`AuthOutcome`]; nothing escapes as
/// an unhandled fault.
async fn complete_authorization(
    state: &AppState,
    jar: CookieJar,
    code: &str,
    echoed_state: Option<&str>,
) -> Response {
    let outcome = run_callback(state, &jar, code, echoed_state).await;
    render_outcome(outcome, jar, &state.config)
}

/// The AWAITING_CALLBACK → EXCHANGING_TOKEN → {SUCCESS | FAILED} leg
async fn run_callback(
    state: &AppState,
    jar: &CookieJar,
    code: &str,
    echoed_state: Option<&str>,
) -> AuthOutcome {
    let auth = &state.config.auth;

    if code.trim().is_empty() {
        return AuthOutcome::failure(FailureKind::MissingCode, "empty authorization code");
    }

    // CSRF check: both sides of the nonce must exist and match before
    // any provider call goes out.
    let Some(echoed) = echoed_state else {
        return AuthOutcome::failure(FailureKind::StateMismatch, "missing state parameter");
    };

    let Some(state_cookie) = jar.get(STATE_COOKIE) else {
        return AuthOutcome::failure(FailureKind::StateMismatch, "missing state cookie");
    };

    let verified =
        verify_state_token(state_cookie.value(), &auth.state_secret, auth.state_max_age);
    let nonce = match verified {
        Ok(nonce) => nonce,
        Err(_) => {
            return AuthOutcome::failure(
                FailureKind::StateMismatch,
                "state cookie invalid or expired",
            );
        }
    };

    if nonce.nonce != echoed {
        return AuthOutcome::failure(FailureKind::StateMismatch, "state parameter mismatch");
    }

    // EXCHANGING_TOKEN: code -> access token
    let exchange = match state.provider.exchange_code(auth, code).await {
        Ok(exchange) => exchange,
        Err(e) if e.is_decode() => {
            return AuthOutcome::failure(FailureKind::NoAccessToken, "malformed token response");
        }
        Err(e) => {
            tracing::error!(error = %e, "Token exchange request failed");
            return AuthOutcome::failure(FailureKind::NetworkFailure, "token endpoint unreachable");
        }
    };

    if let Some(message) = exchange.error_message() {
        return AuthOutcome::failure(FailureKind::ProviderError, message);
    }

    let Some(token) = exchange.access_token.filter(|t| !t.is_empty()) else {
        return AuthOutcome::failure(
            FailureKind::NoAccessToken,
            "token response carried no access token",
        );
    };

    // Token validation: one profile fetch with the fresh token.
    let user = match state.provider.fetch_user(&token).await {
        Ok(user) => user,
        Err(e) if e.is_connect() || e.is_timeout() => {
            tracing::error!(error = %e, "Profile fetch request failed");
            return AuthOutcome::failure(FailureKind::NetworkFailure, "user endpoint unreachable");
        }
        Err(_) => {
            return AuthOutcome::failure(
                FailureKind::TokenValidationFailed,
                "provider rejected the issued token",
            );
        }
    };

    AuthOutcome::Success { token, user }
}

// =============================================================================
// Logout
// =============================================================================

/// POST /logout
///
/// Clears session cookie and redirects to login.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    (
        [(header::CACHE_CONTROL, NO_STORE)],
        jar,
        found("/login"),
    )
        .into_response()
}
