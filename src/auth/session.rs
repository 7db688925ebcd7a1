//! Session and token types for the identity gateway

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::Result;

/// The authenticated user as GoTrue returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// An authenticated session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// The access token
    pub access_token: String,

    /// The refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// The token type, normally "bearer"
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: i64,

    /// Unix timestamp the access token expires at
    #[serde(default)]
    pub expires_at: Option<i64>,

    /// The owning user, when the server included it
    #[serde(default)]
    pub user: Option<AuthUser>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs() as i64
}

impl Session {
    /// Create a new session, computing `expires_at` from now
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: default_token_type(),
            expires_in,
            expires_at: Some(unix_now() + expires_in),
            user: None,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => unix_now() >= expires_at,
            None => false,
        }
    }

    /// The session's email, from the user object or the token claims
    pub fn email(&self) -> Option<String> {
        if let Some(user) = &self.user {
            if user.email.is_some() {
                return user.email.clone();
            }
        }
        decode_claims(&self.access_token).ok().and_then(|c| c.email)
    }

    /// The owning user id, from the user object or the token claims
    pub fn user_id(&self) -> Option<String> {
        if let Some(user) = &self.user {
            return Some(user.id.clone());
        }
        decode_claims(&self.access_token).ok().and_then(|c| c.sub)
    }
}

/// Claims this client reads out of an access token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Decode token claims without verifying the signature. Verification is
/// the server's job; this is only for reading email/expiry client-side.
pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    let data =
        jsonwebtoken::decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}
