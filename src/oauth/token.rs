use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Persisted credential of one user. `expires_at` is always absolute.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub user_identity: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Expired at or after the exact expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.is_expired_at(now) {
            TokenState::Expired
        } else {
            TokenState::Valid
        }
    }
}

/// Read-time classification of whatever is stored for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Unauthorized,
    Valid,
    Expired,
}

impl TokenState {
    pub fn classify(record: Option<&TokenRecord>, now: DateTime<Utc>) -> Self {
        match record {
            Some(record) => record.state_at(now),
            None => TokenState::Unauthorized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenState::Unauthorized => "unauthorized",
            TokenState::Valid => "valid",
            TokenState::Expired => "expired",
        }
    }
}

/// Raw token endpoint response, before it is attached to a user.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_token_type() -> String {
    "Bearer".into()
}

// Providers that omit `expires_in` get the common one-hour lifetime.
fn default_expires_in() -> i64 {
    3600
}

/// Why a token endpoint response cannot become a [`TokenRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrantDefect {
    #[error("provider response carried no refresh token")]
    MissingRefreshToken,

    #[error("provider response has an out-of-range expires_in of {0} seconds")]
    LifetimeOutOfRange(i64),
}

impl TokenGrant {
    /// Turn a grant into a full record issued at `now`.
    ///
    /// `refresh_token` is the grant's own refresh token when it carries one,
    /// otherwise `fallback_refresh` (the token the grant was obtained with).
    /// Negative lifetimes count as already expired.
    pub fn into_record(
        self,
        user_identity: &str,
        fallback_refresh: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TokenRecord, GrantDefect> {
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| fallback_refresh.map(str::to_string))
            .ok_or(GrantDefect::MissingRefreshToken)?;

        let expires_at = Duration::try_seconds(self.expires_in.max(0))
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(GrantDefect::LifetimeOutOfRange(self.expires_in))?;

        Ok(TokenRecord {
            user_identity: user_identity.to_string(),
            access_token: self.access_token,
            refresh_token,
            token_type: self.token_type,
            scope: self.scope,
            expires_at,
        })
    }
}
