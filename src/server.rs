//! HTTP front for the OAuth redirect and the status page.
//!
//! Routes:
//! - `GET /callback?code=..&state=..[&error=..]` completes an authorization
//! - `POST /` with form field `username` reports whether the user is authorized
//! - `DELETE /` with form field `username` revokes the user's token

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Form, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::NpauthError;
use crate::oauth::{TokenLifecycleManager, TokenState};

/// Redirect parameters delivered by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsernameForm {
    #[serde(default)]
    pub username: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub struct CallbackServer {
    manager: Arc<TokenLifecycleManager>,
    home_url: String,
    read_timeout: Duration,
}

impl CallbackServer {
    pub fn new(manager: Arc<TokenLifecycleManager>, home_url: &str, read_timeout: Duration) -> Self {
        Self {
            manager,
            home_url: home_url.to_string(),
            read_timeout,
        }
    }

    pub fn router(self: Arc<Self>) -> Router {
        let read_timeout = self.read_timeout;
        Router::new()
            .route("/callback", get(oauth_callback).fallback(not_found))
            .route("/", post(token_status).delete(token_revoke).fallback(not_found))
            .fallback(not_found)
            .layer(TimeoutLayer::new(read_timeout))
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), NpauthError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("HTTP server listening on {addr}");
        }
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }

    pub async fn handle_callback(&self, params: &CallbackParams) -> Response {
        if let Some(error) = present(&params.error) {
            tracing::error!("OAuth2 authorization was declined by the provider: {error}");
            return found(&self.home_url);
        }
        let (Some(code), Some(state)) = (present(&params.code), present(&params.state)) else {
            return error_response(StatusCode::BAD_REQUEST, "Missing 'code' or 'state' parameter");
        };

        match self.manager.complete_authorization(code, state).await {
            Ok(_) => found(&self.home_url),
            Err(e) => {
                tracing::error!("Completing authorization for {state} failed: {e}");
                found(&self.failed_home_url())
            }
        }
    }

    pub async fn handle_status(&self, user: Option<&str>) -> Response {
        let Some(user) = user else {
            return error_response(StatusCode::BAD_REQUEST, "No username specified");
        };
        match self.manager.status(user).await {
            Ok(TokenState::Unauthorized) => {
                tracing::info!("Token not found for user {user}, returning authorization URL");
                Json(json!({
                    "status": "ok",
                    "authorized": false,
                    "authorizationUri": self.manager.build_authorization_uri(user),
                }))
                .into_response()
            }
            Ok(state) => {
                tracing::debug!("Token found for user {user} ({})", state.as_str());
                Json(json!({
                    "status": "ok",
                    "authorized": true,
                    "state": state.as_str(),
                    "message": "You are already authorized with the bot!",
                }))
                .into_response()
            }
            Err(e) => {
                tracing::error!("Reading token status of {user} failed: {e}");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An error occurred while reading token status",
                )
            }
        }
    }

    pub async fn handle_revoke(&self, user: Option<&str>) -> Response {
        let Some(user) = user else {
            return error_response(StatusCode::BAD_REQUEST, "No username specified");
        };
        match self.manager.revoke(user).await {
            Ok(()) => Json(json!({ "status": "ok" })).into_response(),
            Err(e) => {
                tracing::error!("Deleting token of {user} failed: {e}");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An error occurred while deleting a token",
                )
            }
        }
    }

    fn failed_home_url(&self) -> String {
        let sep = if self.home_url.contains('?') { '&' } else { '?' };
        format!("{}{sep}authorization=failed", self.home_url)
    }
}

/// GET /callback
async fn oauth_callback(
    State(server): State<Arc<CallbackServer>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    server.handle_callback(&params).await
}

/// POST /
async fn token_status(
    State(server): State<Arc<CallbackServer>>,
    form: Option<Form<UsernameForm>>,
) -> Response {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    server.handle_status(present(&form.username)).await
}

/// DELETE /
async fn token_revoke(
    State(server): State<Arc<CallbackServer>>,
    form: Option<Form<UsernameForm>>,
) -> Response {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    server.handle_revoke(present(&form.username)).await
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

// Plain 302; `Redirect::to` answers 303.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "status": "error", "message": message }))).into_response()
}
