pub mod http_mock;

use std::path::{Path, PathBuf};

use npauth::config::{NpauthConfig, ProviderConfig, StoreKind};

/// Provider registration pointing at a mock token endpoint.
#[allow(dead_code)]
pub fn provider_config(base_url: &str) -> ProviderConfig {
    ProviderConfig {
        client_id: "test-client".into(),
        client_secret: "test-secret".into(),
        redirect_uri: "http://localhost:8080/callback".into(),
        authorize_url: format!("{base_url}/authorize"),
        token_url: format!("{base_url}/api/token"),
        scopes: vec!["user-read-currently-playing".into()],
        timeout_ms: 2_000,
    }
}

/// Full config with a file store under `store_dir`.
#[allow(dead_code)]
pub fn file_config(base_url: &str, store_dir: &Path) -> NpauthConfig {
    let mut config = NpauthConfig {
        provider: provider_config(base_url),
        ..NpauthConfig::default()
    };
    config.store.kind = StoreKind::File;
    config.store.directory = store_dir.to_string_lossy().into_owned();
    config.bot.api_base = base_url.to_string();
    config
}

/// Write `config` as npauth.json into `dir` and return its path.
#[allow(dead_code)]
pub fn write_config(dir: &Path, config: &NpauthConfig) -> PathBuf {
    let config_path = dir.join("npauth.json");
    let json = serde_json::to_string_pretty(config).unwrap();
    std::fs::write(&config_path, json).unwrap();
    config_path
}

/// A token endpoint response as the provider sends it.
#[allow(dead_code)]
pub fn grant_body(access: &str, refresh: Option<&str>, expires_in: u64) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": access,
        "token_type": "Bearer",
        "scope": "user-read-currently-playing",
        "expires_in": expires_in,
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = serde_json::Value::String(refresh.to_string());
    }
    body
}
