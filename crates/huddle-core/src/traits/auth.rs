//! Token provider trait for backend authentication.
//!
//! Token issuance is external. The session core only asks a provider for a
//! token at connect time and hands the provider to the backend so it can
//! re-fetch on expiry.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::result::AppResult;

/// A bearer token for the realtime backend.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    /// Opaque token value.
    pub token: String,
    /// When the token stops being accepted, if known.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthToken {
    /// Creates a token with no known expiry.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Whether the token has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of backend tokens for a client.
#[async_trait]
pub trait TokenProvider: Send + Sync + fmt::Debug + 'static {
    /// Fetch a fresh token for `client_id`.
    async fn fetch_token(&self, client_id: &str) -> AppResult<AuthToken>;
}

/// Provider that always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AuthToken,
}

impl StaticTokenProvider {
    /// Creates a provider for a fixed token value.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AuthToken::new(token),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch_token(&self, _client_id: &str) -> AppResult<AuthToken> {
        Ok(self.token.clone())
    }
}
