//! CSRF state nonce
//!
//! The nonce round-trips through GitHub's authorize redirect as the
//! `state` parameter and comes back to us in the `oauth_state` cookie.
//! The cookie payload is HMAC-signed so the client cannot forge the
//! issuance time, and verification rejects nonces older than the
//! configured lifetime.
//!
//! Token format: base64(payload).base64(hmac_sha256(payload))

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Name of the cookie carrying the signed state nonce
pub const STATE_COOKIE: &str = "oauth_state";

/// State nonce data
///
/// Stored in a signed cookie; the bare `nonce` field is what gets
/// echoed back as the `state` query parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateNonce {
    /// Random token, base64url-encoded
    pub nonce: String,
    /// When the nonce was issued
    pub issued_at: DateTime<Utc>,
}

impl StateNonce {
    /// Create a fresh nonce from the OS CSPRNG
    pub fn generate() -> Self {
        use base64::{Engine as _, engine::general_purpose};
        use rand::RngCore;

        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);

        Self {
            nonce: general_purpose::URL_SAFE_NO_PAD.encode(bytes),
            issued_at: Utc::now(),
        }
    }

    /// Check if the nonce has outlived its allowed window
    pub fn is_expired(&self, max_age_seconds: i64) -> bool {
        self.issued_at + Duration::seconds(max_age_seconds) < Utc::now()
    }
}

/// Create a signed state token for the `oauth_state` cookie
///
/// # Arguments
/// * `state` - Nonce data to encode
/// * `secret` - HMAC secret key
///
/// # Returns
/// Signed token string
pub fn create_state_token(state: &StateNonce, secret: &str) -> Result<String, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // 1. Serialize nonce to JSON
    let payload = serde_json::to_string(state).map_err(|e| AppError::Internal(e.into()))?;

    // 2. Base64 encode the payload
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    // 3. Create HMAC-SHA256 signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Signing(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    // 4. Return "{payload}.{signature}"
    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a state token from the `oauth_state` cookie
///
/// # Arguments
/// * `token` - Token string to verify
/// * `secret` - HMAC secret key
/// * `max_age_seconds` - Nonce lifetime
///
/// # Returns
/// Decoded nonce if the signature is valid and the nonce is fresh
///
/// # Errors
/// Returns `Unauthorized` if the token is malformed, forged, or expired
pub fn verify_state_token(
    token: &str,
    secret: &str,
    max_age_seconds: i64,
) -> Result<StateNonce, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // 1. Split token into payload and signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 2 {
        return Err(AppError::Unauthorized);
    }

    let payload_b64 = parts[0];
    let signature_b64 = parts[1];

    // 2. Verify HMAC signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Signing(e.to_string()))?;
    mac.update(payload_b64.as_bytes());

    let expected_signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;

    mac.verify_slice(&expected_signature)
        .map_err(|_| AppError::Unauthorized)?;

    // 3. Decode and deserialize payload
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized)?;

    let payload_str = String::from_utf8(payload_bytes).map_err(|_| AppError::Unauthorized)?;

    let state: StateNonce =
        serde_json::from_str(&payload_str).map_err(|_| AppError::Unauthorized)?;

    // 4. Reject nonces beyond the allowed window even if untampered
    if state.is_expired(max_age_seconds) {
        return Err(AppError::Unauthorized);
    }

    Ok(state)
}
