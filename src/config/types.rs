use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::NpauthError;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NpauthConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bot: BotConfig,
}

/// OAuth2 client registration and endpoints of the streaming provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_client_secret")]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_client_id() -> String {
    "${SPOTIFY_CLIENT_ID:-}".into()
}

fn default_client_secret() -> String {
    "${SPOTIFY_CLIENT_SECRET:-}".into()
}

fn default_redirect_uri() -> String {
    "${OAUTH2_CALLBACK_URL:-http://localhost:8080/callback}".into()
}

fn default_authorize_url() -> String {
    DEFAULT_AUTHORIZE_URL.into()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.into()
}

fn default_scopes() -> Vec<String> {
    vec!["user-read-currently-playing".into()]
}

fn default_provider_timeout_ms() -> u64 {
    10_000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            client_secret: default_client_secret(),
            redirect_uri: default_redirect_uri(),
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            scopes: default_scopes(),
            timeout_ms: default_provider_timeout_ms(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject registrations that cannot produce a working authorization URL.
    pub fn validate(&self) -> Result<(), NpauthError> {
        if self.client_id.trim().is_empty() {
            return Err(provider_error(
                "provider.clientId is empty (set SPOTIFY_CLIENT_ID or provider.clientId)",
            ));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(provider_error("provider.redirectUri is empty"));
        }
        for (field, value) in [
            ("authorizeUrl", &self.authorize_url),
            ("tokenUrl", &self.token_url),
            ("redirectUri", &self.redirect_uri),
        ] {
            reqwest::Url::parse(value).map_err(|e| {
                provider_error(&format!("provider.{field} '{value}' is not a valid URL: {e}"))
            })?;
        }
        Ok(())
    }
}

fn provider_error(detail: &str) -> NpauthError {
    NpauthError::ConfigError {
        path: PathBuf::from("<provider>"),
        detail: detail.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKind {
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default = "default_store_kind")]
    pub kind: StoreKind,
    #[serde(default = "default_store_directory")]
    pub directory: String,
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_store_kind() -> StoreKind {
    StoreKind::File
}

fn default_store_directory() -> String {
    "~/.npauth/tokens".into()
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            directory: default_store_directory(),
            timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Store directory with a leading `~/` resolved against the home directory.
    pub fn resolved_directory(&self) -> PathBuf {
        match self.directory.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(rest),
            None => PathBuf::from(&self.directory),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_home_url")]
    pub home_url: String,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8080".into()
}

fn default_home_url() -> String {
    "/".into()
}

fn default_read_timeout_ms() -> u64 {
    10_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            home_url: default_home_url(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_prefix() -> String {
    ".".into()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            api_base: default_api_base(),
        }
    }
}
