//! Refresh token sessions
//!
//! Refresh tokens are opaque random strings handed to the client. Only their
//! SHA-256 hex digest reaches the store, so a leaked database does not leak
//! usable tokens. Each successful refresh revokes the presented token and
//! issues a new one; replaying an already-used token therefore fails.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use notekeep_core::{CredentialStore, NewRefreshToken, NotekeepError, RefreshTokenRecord};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

/// Random bytes per refresh token
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// Refresh token errors
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Refresh token not found")]
    NotFound,

    #[error("Refresh token expired or revoked")]
    ExpiredOrRevoked,

    #[error("Refresh token expiry out of range")]
    ExpiryOutOfRange,

    #[error("Refresh token store error: {0}")]
    Store(#[from] NotekeepError),
}

/// A freshly issued token together with its persisted record
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    /// Raw value for the client; never stored or logged
    pub token: String,
    pub record: RefreshTokenRecord,
}

/// Generate a new raw refresh token (URL-safe base64, no padding)
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex digest of a raw token
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Issues, validates, rotates and revokes refresh tokens
#[derive(Clone)]
pub struct RefreshTokenManager {
    store: Arc<dyn CredentialStore>,
    ttl_secs: i64,
}

impl RefreshTokenManager {
    pub fn new(store: Arc<dyn CredentialStore>, ttl_secs: u64) -> Self {
        Self {
            store,
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Token lifetime in seconds
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    fn new_record(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(String, NewRefreshToken), RefreshError> {
        let expires_at = Duration::try_seconds(self.ttl_secs)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(RefreshError::ExpiryOutOfRange)?;

        let token = generate_refresh_token();
        let record = NewRefreshToken {
            token_hash: hash_token(&token),
            user_id,
            expires_at,
        };
        Ok((token, record))
    }

    /// Create and persist a new token for `user_id`
    pub async fn issue(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<IssuedRefreshToken, RefreshError> {
        let (token, new_record) = self.new_record(user_id, now)?;
        let record = self.store.create_refresh_token(new_record).await?;

        tracing::debug!(user_id, token_id = record.id, "Refresh token issued");
        Ok(IssuedRefreshToken { token, record })
    }

    /// Look up a raw token and check that it is still usable at `now`
    pub async fn validate(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, RefreshError> {
        let record = self
            .store
            .find_refresh_token_by_hash(&hash_token(token))
            .await?
            .ok_or(RefreshError::NotFound)?;

        if !record.is_usable_at(now) {
            return Err(RefreshError::ExpiredOrRevoked);
        }

        Ok(record)
    }

    /// Exchange a valid token for a new one
    ///
    /// Returns the consumed record and the replacement. The store revokes the
    /// old record with a compare-and-set, so when two requests race with the
    /// same token only one gets a replacement; the other sees
    /// [`RefreshError::ExpiredOrRevoked`].
    pub async fn rotate(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(RefreshTokenRecord, IssuedRefreshToken), RefreshError> {
        let old = self.validate(token, now).await?;

        let (token, new_record) = self.new_record(old.user_id, now)?;
        let record = self
            .store
            .rotate_refresh_token(old.id, new_record)
            .await?
            .ok_or(RefreshError::ExpiredOrRevoked)?;

        tracing::debug!(
            user_id = old.user_id,
            old_token_id = old.id,
            new_token_id = record.id,
            "Refresh token rotated"
        );
        Ok((old, IssuedRefreshToken { token, record }))
    }

    /// Best-effort revocation
    ///
    /// Unknown tokens and store failures are logged and reported as `None`;
    /// they never fail the caller. Returns the owner when a live record was
    /// revoked by this call.
    pub async fn revoke(&self, token: &str) -> Option<i64> {
        let record = match self.store.find_refresh_token_by_hash(&hash_token(token)).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to look up refresh token for revocation");
                return None;
            }
        };

        match self.store.revoke_refresh_token(record.id).await {
            Ok(true) => Some(record.user_id),
            Ok(false) => None,
            Err(e) => {
                tracing::warn!(error = %e, token_id = record.id, "Failed to revoke refresh token");
                None
            }
        }
    }
}
