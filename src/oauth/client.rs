use async_trait::async_trait;
use reqwest::Url;

use crate::config::ProviderConfig;
use crate::error::NpauthError;
use crate::oauth::token::TokenGrant;

/// The two token endpoint grants plus authorization URL construction.
#[async_trait]
pub trait AuthServerClient: Send + Sync {
    /// Authorization-code grant. Failures are `ExchangeFailed`.
    async fn exchange(&self, code: &str) -> Result<TokenGrant, NpauthError>;

    /// Refresh-token grant. Failures are `RefreshFailed` for `user`.
    async fn refresh(&self, user: &str, refresh_token: &str) -> Result<TokenGrant, NpauthError>;

    /// Pure: the provider authorization URL carrying `state`.
    fn authorization_uri(&self, state: &str) -> String;
}

/// OAuth2 client speaking RFC 6749 form posts to the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct HttpAuthServerClient {
    client: reqwest::Client,
    config: ProviderConfig,
    authorize_url: Url,
}

impl HttpAuthServerClient {
    /// Validates the registration up front so URL building cannot fail later.
    pub fn new(config: ProviderConfig) -> Result<Self, NpauthError> {
        config.validate()?;
        let authorize_url = Url::parse(&config.authorize_url).map_err(|e| {
            NpauthError::ConfigError {
                path: std::path::PathBuf::from("<provider>"),
                detail: format!("Invalid authorizeUrl '{}': {e}", config.authorize_url),
            }
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            config,
            authorize_url,
        })
    }

    async fn post_grant(&self, form: &[(&str, &str)]) -> Result<TokenGrant, String> {
        let resp = self
            .client
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| format!("request to token endpoint failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("token endpoint returned status {status}: {body}"));
        }

        resp.json::<TokenGrant>()
            .await
            .map_err(|e| format!("failed to parse token response: {e}"))
    }
}

#[async_trait]
impl AuthServerClient for HttpAuthServerClient {
    async fn exchange(&self, code: &str) -> Result<TokenGrant, NpauthError> {
        tracing::debug!("Exchanging authorization code at {}", self.config.token_url);
        self.post_grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.config.redirect_uri),
        ])
        .await
        .map_err(NpauthError::ExchangeFailed)
    }

    async fn refresh(&self, user: &str, refresh_token: &str) -> Result<TokenGrant, NpauthError> {
        tracing::debug!("Refreshing access token of {user} at {}", self.config.token_url);
        self.post_grant(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
        .map_err(|reason| NpauthError::RefreshFailed {
            user: user.to_string(),
            reason,
        })
    }

    fn authorization_uri(&self, state: &str) -> String {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state);
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ProviderConfig {
        ProviderConfig {
            client_id: "client-123".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:8080/callback".into(),
            scopes: vec!["user-read-currently-playing".into(), "user-read-playback-state".into()],
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn new_rejects_invalid_registration() {
        let err = HttpAuthServerClient::new(ProviderConfig {
            client_id: String::new(),
            ..provider()
        })
        .unwrap_err();
        assert_eq!(err.code(), "config_error");
    }

    #[test]
    fn authorization_uri_carries_all_parameters() {
        let client = HttpAuthServerClient::new(provider()).unwrap();
        let uri = client.authorization_uri("alice#0001");
        let url = Url::parse(&uri).unwrap();

        assert_eq!(url.host_str(), Some("accounts.spotify.com"));
        assert_eq!(url.path(), "/authorize");
        let pairs: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["redirect_uri"], "http://localhost:8080/callback");
        assert_eq!(
            pairs["scope"],
            "user-read-currently-playing user-read-playback-state"
        );
        assert_eq!(pairs["state"], "alice#0001");
    }

    #[test]
    fn authorization_uri_escapes_state() {
        let client = HttpAuthServerClient::new(provider()).unwrap();
        let uri = client.authorization_uri("bob & co#0042");
        assert!(uri.contains("state=bob+%26+co%230042"));
    }

    #[test]
    fn authorization_uri_is_stable() {
        let client = HttpAuthServerClient::new(provider()).unwrap();
        assert_eq!(
            client.authorization_uri("alice#0001"),
            client.authorization_uri("alice#0001")
        );
    }
}
