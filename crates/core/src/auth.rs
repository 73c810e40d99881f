//! Bearer tokens for the recommendation API.
//!
//! Token layout: `<user_id>.<expires_at_unix>.<hex hmac-sha256>`, signed over
//! `<user_id>.<expires_at_unix>`. The user id may itself contain dots; the
//! token is split from the right.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

use crate::domain::analytics::UserId;

type HmacSha256 = Hmac<Sha256>;

/// One year. Longer lifetimes are rejected by config validation and clamped here.
pub const MAX_TOKEN_TTL_SECS: u64 = 31_536_000;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("malformed bearer token")]
    Malformed,
    #[error("bearer token signature mismatch")]
    BadSignature,
    #[error("bearer token expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("token subject `{token_user}` does not match requested user `{requested_user}`")]
    SubjectMismatch { token_user: String, requested_user: String },
    #[error("signing key rejected: {0}")]
    InvalidKey(String),
    #[error("token expiry is out of range")]
    ExpiryOutOfRange,
}

#[derive(Clone, Debug)]
pub struct TokenSigner {
    secret: SecretString,
    ttl: TimeDelta,
}

impl TokenSigner {
    pub fn new(secret: SecretString, ttl_secs: u64) -> Self {
        let secs = i64::try_from(ttl_secs.min(MAX_TOKEN_TTL_SECS)).unwrap_or_default();
        let ttl = TimeDelta::try_seconds(secs).unwrap_or_default();
        Self { secret, ttl }
    }

    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, AuthError> {
        now.checked_add_signed(self.ttl).ok_or(AuthError::ExpiryOutOfRange)
    }

    pub fn issue(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<String, AuthError> {
        let expires_at = self.expires_at(now)?;
        let claims = format!("{}.{}", user_id.as_str(), expires_at.timestamp());
        let signature = self.sign(claims.as_bytes())?;
        Ok(format!("{claims}.{signature}"))
    }

    /// Verifies the token and returns the user it was issued for.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, AuthError> {
        let mut parts = token.trim().rsplitn(3, '.');
        let (Some(signature), Some(expires_raw), Some(user)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed);
        };
        if user.is_empty() || signature.is_empty() {
            return Err(AuthError::Malformed);
        }

        let claims = format!("{user}.{expires_raw}");
        let expected = self.sign(claims.as_bytes())?;
        if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
            return Err(AuthError::BadSignature);
        }

        let expires_unix = expires_raw.parse::<i64>().map_err(|_| AuthError::Malformed)?;
        let expires_at = Utc.timestamp_opt(expires_unix, 0).single().ok_or(AuthError::Malformed)?;
        if expires_at <= now {
            return Err(AuthError::Expired(expires_at));
        }

        Ok(UserId(user.to_string()))
    }

    /// Verifies an `Authorization` header value for the requested user.
    pub fn authorize(
        &self,
        authorization: Option<&str>,
        requested_user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<UserId, AuthError> {
        let header = authorization.map(str::trim).filter(|value| !value.is_empty());
        let Some(header) = header else {
            return Err(AuthError::MissingToken);
        };
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(AuthError::Malformed)?;

        let user = self.verify(token, now)?;
        if &user != requested_user {
            return Err(AuthError::SubjectMismatch {
                token_user: user.0,
                requested_user: requested_user.0.clone(),
            });
        }
        Ok(user)
    }

    fn sign(&self, payload: &[u8]) -> Result<String, AuthError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|error| AuthError::InvalidKey(error.to_string()))?;
        mac.update(payload);
        Ok(encode_hex(mac.finalize().into_bytes().as_slice()))
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}
