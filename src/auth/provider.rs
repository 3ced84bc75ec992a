//! GitHub API client
//!
//! The two outbound calls of the authorization-code flow: exchanging a
//! code for an access token, and fetching the authenticated user's
//! profile to validate the token.

use serde::{Deserialize, Serialize};

use crate::config::{AuthConfig, GitHubConfig};
use crate::error::AppError;

/// Per-call timeout for outbound provider requests
const PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Response from GitHub's token endpoint
///
/// GitHub reports failures as a 200 with an `error` field, so every
/// field is optional and the caller inspects what actually arrived.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchange {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl TokenExchange {
    /// Short provider-reported error message, if any
    pub fn error_message(&self) -> Option<String> {
        let code = self.error.as_deref()?;
        match self.error_description.as_deref() {
            Some(description) => Some(format!("{}: {}", code, description)),
            None => Some(code.to_string()),
        }
    }
}

/// GitHub user profile fields used for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: String,
}

/// Client for GitHub's OAuth and REST endpoints
#[derive(Debug, Clone)]
pub struct GitHubProvider {
    http: reqwest::Client,
    token_url: String,
    user_api_url: String,
}

impl GitHubProvider {
    /// Build a provider client from endpoint configuration
    pub fn new(github: &GitHubConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("Panelgate/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            http,
            token_url: github.token_url.clone(),
            user_api_url: github.user_api_url.clone(),
        })
    }

    /// Exchange an authorization code for an access token
    ///
    /// `POST {token_url}` with the client credentials and code,
    /// form-encoded, asking for a JSON response.
    pub async fn exchange_code(
        &self,
        auth: &AuthConfig,
        code: &str,
    ) -> Result<TokenExchange, reqwest::Error> {
        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", auth.client_id.as_str()),
                ("client_secret", auth.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", auth.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        response.json::<TokenExchange>().await
    }

    /// Fetch the authenticated user's profile
    ///
    /// `GET {user_api_url}` with the token as a bearer credential. A
    /// non-success status means the provider rejected the token.
    pub async fn fetch_user(&self, access_token: &str) -> Result<UserProfile, reqwest::Error> {
        let response = self
            .http
            .get(&self.user_api_url)
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?;

        response.json::<UserProfile>().await
    }
}
