//! Common test utilities for E2E tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use panelgate::{AppState, config};
use tokio::net::TcpListener;

/// Access token the stub hands out when no override is configured
pub const STUB_TOKEN: &str = "gho_e2e_token";

#[derive(Default)]
struct StubState {
    /// Fixed token-endpoint response, overriding normal behavior
    token_response: Option<serde_json::Value>,
    /// Codes already exchanged once (single-use, like the real provider)
    used_codes: HashSet<String>,
    /// Tokens the stub has issued and will accept on /user
    issued_tokens: HashSet<String>,
    /// When set, /user rejects every token
    reject_user_fetch: bool,
    /// Number of requests the token endpoint has seen
    token_hits: usize,
}

/// In-process stand-in for GitHub's OAuth and user endpoints
#[derive(Clone)]
pub struct StubGitHub {
    pub base_url: String,
    state: Arc<Mutex<StubState>>,
}

impl StubGitHub {
    pub async fn spawn() -> Self {
        let state = Arc::new(Mutex::new(StubState::default()));

        let app = Router::new()
            .route("/login/oauth/access_token", post(stub_token_endpoint))
            .route("/user", get(stub_user_endpoint))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Replace the token endpoint's response with a fixed payload
    pub fn set_token_response(&self, response: serde_json::Value) {
        let mut state = self.state.lock().unwrap();
        if let Some(token) = response.get("access_token").and_then(|v| v.as_str()) {
            state.issued_tokens.insert(token.to_string());
        }
        state.token_response = Some(response);
    }

    /// Make the user endpoint reject every token
    pub fn reject_user_fetch(&self) {
        self.state.lock().unwrap().reject_user_fetch = true;
    }

    /// How many times the token endpoint has been called
    pub fn token_hits(&self) -> usize {
        self.state.lock().unwrap().token_hits
    }
}

async fn stub_token_endpoint(
    State(state): State<Arc<Mutex<StubState>>>,
    Form(params): Form<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let mut state = state.lock().unwrap();
    state.token_hits += 1;

    if let Some(response) = state.token_response.clone() {
        return Json(response);
    }

    let code = params.get("code").cloned().unwrap_or_default();
    if !state.used_codes.insert(code) {
        // Authorization codes are single-use.
        return Json(serde_json::json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        }));
    }

    state.issued_tokens.insert(STUB_TOKEN.to_string());
    Json(serde_json::json!({
        "access_token": STUB_TOKEN,
        "token_type": "bearer",
        "scope": "read:user"
    }))
}

async fn stub_user_endpoint(
    State(state): State<Arc<Mutex<StubState>>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let state = state.lock().unwrap();

    let token = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .unwrap_or_default();

    if state.reject_user_fetch || !state.issued_tokens.contains(token) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"message": "Bad credentials"})),
        )
            .into_response();
    }

    Json(serde_json::json!({
        "login": "octocat",
        "name": "The Octocat",
        "avatar_url": "https://avatars.example.com/octocat"
    }))
    .into_response()
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub client: reqwest::Client,
    pub github: StubGitHub,
}

impl TestServer {
    /// Create a new test server instance backed by a stub provider
    pub async fn new() -> Self {
        let github = StubGitHub::spawn().await;

        // Bind first so the redirect URI can carry the real port.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: addr.port(),
            },
            auth: config::AuthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                redirect_uri: format!("{}/auth/github", addr_str),
                success_redirect_uri: "/admin/".to_string(),
                error_redirect_uri: "/login".to_string(),
                scopes: "read:user".to_string(),
                state_secret: "test-state-secret-32-bytes-long!".to_string(),
                state_max_age: 300,
                session_max_age: 3600,
            },
            github: config::GitHubConfig {
                authorize_url: format!("{}/login/oauth/authorize", github.base_url),
                token_url: format!("{}/login/oauth/access_token", github.base_url),
                user_api_url: format!("{}/user", github.base_url),
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(config).unwrap();

        // No redirect following: the tests inspect 302s directly.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        let app = panelgate::build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            client,
            github,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Run the START leg of the flow
    ///
    /// Returns the `state` query parameter from the authorize redirect
    /// and the raw `oauth_state` cookie value.
    pub async fn begin_flow(&self) -> (String, String) {
        let response = self
            .client
            .get(self.url("/auth/github"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::FOUND);

        let location = location_header(&response);
        let authorize_url = url::Url::parse(&location).unwrap();
        let state_param = authorize_url
            .query_pairs()
            .find(|(name, _)| name == "state")
            .map(|(_, value)| value.into_owned())
            .expect("authorize redirect must carry a state parameter");

        let state_cookie = cookie_value(&response, "oauth_state")
            .expect("initiation must set an oauth_state cookie");

        (state_param, state_cookie)
    }
}

/// The `Location` header of a redirect response
pub fn location_header(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// All raw `Set-Cookie` header values of a response
pub fn set_cookie_headers(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// Value of a named cookie set by the response, if any
pub fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    set_cookie_headers(response).iter().find_map(|raw| {
        let pair = raw.split(';').next()?;
        let (cookie_name, value) = pair.split_once('=')?;
        (cookie_name == name).then(|| value.to_string())
    })
}
