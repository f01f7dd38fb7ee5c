use std::time::Duration;

use wiremock::matchers::{body_string_contains, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Start a mock provider with no routes mounted.
#[allow(dead_code)]
pub async fn start_token_endpoint() -> MockServer {
    MockServer::start().await
}

/// Answer the authorization-code grant for `code`.
#[allow(dead_code)]
pub async fn mount_exchange(server: &MockServer, code: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(header_exists("authorization"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains(format!("code={code}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Reject every authorization-code grant the way a provider rejects a bad code.
#[allow(dead_code)]
pub async fn mount_exchange_rejected(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid authorization code"
        })))
        .mount(server)
        .await;
}

/// Answer the refresh grant for `refresh_token`, optionally after `delay`.
#[allow(dead_code)]
pub async fn mount_refresh(
    server: &MockServer,
    refresh_token: &str,
    body: serde_json::Value,
    delay: Option<Duration>,
    expected_calls: u64,
) {
    let mut response = ResponseTemplate::new(200).set_body_json(body);
    if let Some(delay) = delay {
        response = response.set_delay(delay);
    }
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains(format!("refresh_token={refresh_token}")))
        .respond_with(response)
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Serve `GET /me/player/currently-playing` for `access_token`.
#[allow(dead_code)]
pub async fn mount_currently_playing(server: &MockServer, access_token: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/me/player/currently-playing"))
        .and(wiremock::matchers::header(
            "authorization",
            format!("Bearer {access_token}").as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
