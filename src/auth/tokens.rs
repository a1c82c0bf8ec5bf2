// Strongbox — Token service
//
// Two token kinds share one claim layout:
//   - access:  `{user, exp}`; short-lived and never stored anywhere.
//   - refresh: `{user, exp, jti}`; longer-lived, revocable by `jti`.
//
// Revocation is a denylist of `exp/<jti>` markers, each expiring exactly when
// the token it revokes would have expired. Verification of an access token
// therefore never touches the engine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::enclave::TokenSigner;
use crate::store::{keyspace, Database};

/// Signed claim set carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user: String,
    /// Expiry, unix seconds.
    pub exp: i64,
    /// Present on refresh tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// A freshly minted access + refresh pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

pub struct TokenService<'a> {
    db: &'a Database,
    signer: &'a TokenSigner,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl<'a> TokenService<'a> {
    pub fn new(
        db: &'a Database,
        signer: &'a TokenSigner,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            db,
            signer,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Sign a new access + refresh pair for `user`.
    pub fn issue(&self, user: &str) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access_expires_at = now
            .checked_add_signed(self.access_ttl)
            .ok_or(AuthError::ExpiryOutOfRange)?;
        let refresh_expires_at = now
            .checked_add_signed(self.refresh_ttl)
            .ok_or(AuthError::ExpiryOutOfRange)?;

        let access = Claims {
            user: user.to_string(),
            exp: access_expires_at.timestamp(),
            jti: None,
        };
        let refresh = Claims {
            user: user.to_string(),
            exp: refresh_expires_at.timestamp(),
            jti: Some(uuid::Uuid::new_v4().to_string()),
        };

        Ok(TokenPair {
            access_token: self.signer.sign(&access)?,
            refresh_token: self.signer.sign(&refresh)?,
            refresh_expires_at,
        })
    }

    /// Verify signature and expiry. Revocation is not checked here.
    pub fn parse(&self, token: &str) -> Result<Claims, AuthError> {
        let claims: Claims = self
            .signer
            .verify(token)
            .map_err(|_| AuthError::InvalidToken)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    /// Absence of a marker means not revoked.
    pub fn is_revoked(&self, token_id: &str) -> Result<bool, AuthError> {
        let key = keyspace::revocation_key(token_id)?;
        let txn = self.db.read()?;
        Ok(txn.contains(&key)?)
    }

    /// Store a marker for `token_id` that lives for `remaining`. A token with
    /// no validity left needs no marker.
    pub fn revoke(&self, token_id: &str, remaining: Duration) -> Result<(), AuthError> {
        if remaining <= Duration::zero() {
            return Ok(());
        }

        let key = keyspace::revocation_key(token_id)?;
        let txn = self.db.write()?;
        let expires_at = Utc::now()
            .checked_add_signed(remaining)
            .ok_or(AuthError::ExpiryOutOfRange)?;
        txn.put_expiring(&key, &[], expires_at)?;
        txn.commit()?;
        self.db.purge_expired()?;

        tracing::debug!(token_id = %token_id, "Token revoked");
        Ok(())
    }

    /// Revoke the token `claims` came from, until its own expiry.
    /// Access tokens carry no identifier and cannot be revoked.
    pub fn revoke_token(&self, claims: &Claims) -> Result<(), AuthError> {
        let Some(token_id) = &claims.jti else {
            return Err(AuthError::InvalidToken);
        };
        let expires_at = claims.expires_at().ok_or(AuthError::InvalidToken)?;
        self.revoke(token_id, expires_at - Utc::now())
    }

    /// Retire a refresh token and issue its successor.
    ///
    /// The marker is written with a conditional put, so of two concurrent
    /// rotations of the same token exactly one succeeds; the other, like any
    /// later replay, fails with `Revoked`.
    pub fn rotate(&self, claims: &Claims) -> Result<TokenPair, AuthError> {
        let Some(token_id) = &claims.jti else {
            return Err(AuthError::InvalidToken);
        };
        let expires_at = claims.expires_at().ok_or(AuthError::InvalidToken)?;
        let key = keyspace::revocation_key(token_id)?;

        let txn = self.db.write()?;
        if !txn.insert_if_absent(&key, &[], Some(expires_at))? {
            tracing::warn!(user = %claims.user, "Refresh token replayed after rotation");
            return Err(AuthError::Revoked);
        }
        txn.commit()?;
        self.db.purge_expired()?;

        let pair = self.issue(&claims.user)?;
        tracing::info!(user = %claims.user, "Session rotated");
        Ok(pair)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
