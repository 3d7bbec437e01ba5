//! JWT access tokens
//!
//! HMAC-SHA256 signed, stateless tokens carrying the user's id and email.
//! Every verification failure is reported as [`JwtError::InvalidToken`] so
//! callers cannot tell an expired token from a forged or malformed one.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use notekeep_core::AuthConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims embedded in an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    pub user_id: i64,
    pub email: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds, inclusive)
    pub exp: i64,
}

/// JWT generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Access token expiry out of range")]
    ExpiryOutOfRange,
}

/// Signing settings for access tokens
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing
    pub secret: String,
    /// Access token lifetime in seconds
    pub access_expiration_secs: i64,
    /// Token issuer identifier
    pub issuer: String,
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            access_expiration_secs: i64::try_from(config.access_token_ttl_secs)
                .unwrap_or(i64::MAX),
            issuer: config.jwt_issuer.clone(),
        }
    }
}

/// Issue an access token valid from `now` until `now + TTL`
pub fn generate_access_token(
    config: &JwtConfig,
    user_id: i64,
    email: &str,
    now: DateTime<Utc>,
) -> Result<String, JwtError> {
    let iat = now.timestamp();
    let exp = iat
        .checked_add(config.access_expiration_secs)
        .ok_or(JwtError::ExpiryOutOfRange)?;
    let claims = Claims {
        iss: config.issuer.clone(),
        user_id,
        email: email.to_string(),
        iat,
        exp,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify signature, issuer and expiry and return the claims
///
/// Expiry is checked against the supplied `now` (valid while `now <= exp`)
/// with no leeway.
pub fn validate_access_token(
    config: &JwtConfig,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.validate_exp = false;
    validation.leeway = 0;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|_| JwtError::InvalidToken)?
    .claims;

    if now.timestamp() > claims.exp {
        return Err(JwtError::InvalidToken);
    }

    Ok(claims)
}
