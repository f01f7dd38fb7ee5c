use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum NpauthError {
    #[error("No token stored for '{0}'. The user has not authorized the bot yet.")]
    TokenNotFound(String),

    #[error("Refreshing the token of '{user}' failed: {reason}")]
    RefreshFailed { user: String, reason: String },

    #[error("Authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Token store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Error in config {}: {detail}", path.display())]
    ConfigError { path: PathBuf, detail: String },

    #[error("Streaming API error: {0}")]
    StreamingApi(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl NpauthError {
    /// Error code string for structured JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            NpauthError::TokenNotFound(_) => "token_not_found",
            NpauthError::RefreshFailed { .. } => "refresh_failed",
            NpauthError::ExchangeFailed(_) => "exchange_failed",
            NpauthError::StoreUnavailable(_) => "store_unavailable",
            NpauthError::ConfigError { .. } => "config_error",
            NpauthError::StreamingApi(_) => "streaming_api_error",
            NpauthError::IoError(_) => "io_error",
        }
    }

    /// True when the user has to go through the authorization redirect again.
    pub fn requires_authorization(&self) -> bool {
        matches!(
            self,
            NpauthError::TokenNotFound(_) | NpauthError::RefreshFailed { .. }
        )
    }

    pub fn user_identity(&self) -> Option<&str> {
        match self {
            NpauthError::TokenNotFound(user) => Some(user),
            NpauthError::RefreshFailed { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        if let Some(user) = self.user_identity() {
            obj.insert("user".into(), serde_json::Value::String(user.to_string()));
        }
        obj.insert("message".into(), serde_json::Value::String(self.to_string()));
        obj.insert("code".into(), serde_json::Value::String(self.code().to_string()));
        serde_json::json!({ "error": obj })
    }
}
