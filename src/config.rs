//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)
//!
//! The four variables recognized by the embedding platform
//! (`OAUTH_CLIENT_ID`, `OAUTH_CLIENT_SECRET`, `REDIRECT_URI`,
//! `SUCCESS_REDIRECT_URI`) take precedence over everything else.

use serde::Deserialize;
use std::net::IpAddr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub github: GitHubConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// OAuth application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// GitHub OAuth app client id
    pub client_id: String,
    /// GitHub OAuth app client secret
    pub client_secret: String,
    /// Callback URI, must exactly match the URI registered with GitHub
    pub redirect_uri: String,
    /// Where the browser lands after a successful sign-in
    pub success_redirect_uri: String,
    /// Where the browser lands after a failed sign-in
    pub error_redirect_uri: String,
    /// Space-separated OAuth scopes requested on the authorize redirect
    pub scopes: String,
    /// HMAC key for the signed state cookie (32+ bytes)
    pub state_secret: String,
    /// State nonce lifetime in seconds (default: 300 = 5 minutes)
    pub state_max_age: i64,
    /// Session cookie lifetime in seconds (default: 3600 = 1 hour)
    pub session_max_age: i64,
}

/// GitHub endpoint configuration
///
/// Defaults to the public GitHub endpoints; tests point these at an
/// in-process stub provider.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub user_api_url: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (PANELGATE_*)
    /// 5. Platform variables (OAUTH_CLIENT_ID, OAUTH_CLIENT_SECRET,
    ///    REDIRECT_URI, SUCCESS_REDIRECT_URI)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("auth.success_redirect_uri", "/admin/")?
            .set_default("auth.error_redirect_uri", "/login")?
            .set_default("auth.scopes", "read:user")?
            .set_default("auth.state_max_age", 300)?
            .set_default("auth.session_max_age", 3600)?
            .set_default(
                "github.authorize_url",
                "https://github.com/login/oauth/authorize",
            )?
            .set_default(
                "github.token_url",
                "https://github.com/login/oauth/access_token",
            )?
            .set_default("github.user_api_url", "https://api.github.com/user")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (PANELGATE_*)
            .add_source(
                Environment::with_prefix("PANELGATE")
                    .separator("__")
                    .try_parsing(true),
            );

        // The platform-recognized variables win over all other sources.
        for (var, key) in [
            ("OAUTH_CLIENT_ID", "auth.client_id"),
            ("OAUTH_CLIENT_SECRET", "auth.client_secret"),
            ("REDIRECT_URI", "auth.redirect_uri"),
            ("SUCCESS_REDIRECT_URI", "auth.success_redirect_uri"),
        ] {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        let config = builder
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Whether cookies should carry the `Secure` attribute
    ///
    /// Secure unless the registered redirect URI points at a
    /// localhost/loopback host (local development).
    pub fn should_use_secure_cookies(&self) -> bool {
        !is_local_redirect_host(&self.auth.redirect_uri)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_STATE_SECRET_BYTES: usize = 32;

        if self.auth.client_id.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "auth.client_id must not be empty".to_string(),
            ));
        }

        if self.auth.client_secret.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "auth.client_secret must not be empty".to_string(),
            ));
        }

        if url::Url::parse(&self.auth.redirect_uri).is_err() {
            return Err(crate::error::AppError::Config(
                "auth.redirect_uri must be an absolute URL matching the registered callback"
                    .to_string(),
            ));
        }

        if self.auth.state_secret.as_bytes().len() < MIN_STATE_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.state_secret must be at least {} bytes",
                MIN_STATE_SECRET_BYTES
            )));
        }

        if self.auth.state_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.state_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if !self.should_use_secure_cookies() {
            tracing::warn!(
                redirect_uri = %self.auth.redirect_uri,
                "Using insecure cookies for local development"
            );
        }

        Ok(())
    }
}

fn is_local_redirect_host(redirect_uri: &str) -> bool {
    let Some(host) = url::Url::parse(redirect_uri)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()))
    else {
        return false;
    };

    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
