use std::sync::Arc;

use crate::config::NpauthConfig;
use crate::dispatch::{Author, CommandDispatcher, MessageEvent};
use crate::error::NpauthError;
use crate::oauth::TokenLifecycleManager;
use crate::player::HttpNowPlaying;
use crate::server::CallbackServer;

use super::output::{
    is_stdout_tty, print_message, print_status, print_stored, print_token,
};

pub async fn run_url(
    config: &NpauthConfig,
    user: &str,
    open: bool,
    json: bool,
) -> Result<(), NpauthError> {
    let manager = TokenLifecycleManager::from_config(config)?;
    let uri = manager.build_authorization_uri(user);
    print_message("authorizationUri", &uri, json);

    if open && webbrowser::open(&uri).is_err() {
        eprintln!("Could not open a browser. Please visit the URL above manually.");
    }
    Ok(())
}

pub async fn run_status(config: &NpauthConfig, user: &str, json: bool) -> Result<(), NpauthError> {
    let manager = TokenLifecycleManager::from_config(config)?;
    let state = manager.status(user).await?;
    print_status(user, state, json, is_stdout_tty());
    Ok(())
}

pub async fn run_token(config: &NpauthConfig, user: &str, json: bool) -> Result<(), NpauthError> {
    let manager = TokenLifecycleManager::from_config(config)?;
    let record = manager.get_valid_token(user).await?;
    print_token(&record, json);
    Ok(())
}

pub async fn run_exchange(
    config: &NpauthConfig,
    code: &str,
    user: &str,
    json: bool,
) -> Result<(), NpauthError> {
    let manager = TokenLifecycleManager::from_config(config)?;
    let record = manager.complete_authorization(code, user).await?;
    print_stored(&record, json);
    Ok(())
}

pub async fn run_revoke(config: &NpauthConfig, user: &str, json: bool) -> Result<(), NpauthError> {
    let manager = TokenLifecycleManager::from_config(config)?;
    manager.revoke(user).await?;
    if json {
        print_message("status", "ok", true);
    } else {
        println!("Revoked token of {user}");
    }
    Ok(())
}

/// Run one chat message through the dispatcher as if `user` had sent it.
pub async fn run_dispatch(
    config: &NpauthConfig,
    user: &str,
    message: &str,
    json: bool,
) -> Result<(), NpauthError> {
    let manager = Arc::new(TokenLifecycleManager::from_config(config)?);
    let player = Arc::new(HttpNowPlaying::new(
        &config.bot.api_base,
        config.provider.timeout(),
    ));
    let dispatcher = CommandDispatcher::new(manager, player, &config.bot.prefix);

    let event = MessageEvent {
        author: Author::from_identity(user),
        content: message.to_string(),
    };
    match dispatcher.handle(&event).await {
        Some(reply) => print_message("reply", &reply, json),
        None if json => println!("{}", serde_json::json!({ "reply": null })),
        None => {}
    }
    Ok(())
}

pub async fn run_serve(config: &NpauthConfig, bind: Option<&str>) -> Result<(), NpauthError> {
    let manager = Arc::new(TokenLifecycleManager::from_config(config)?);
    let addr = bind.unwrap_or(&config.server.bind);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = Arc::new(CallbackServer::new(
        manager,
        &config.server.home_url,
        config.server.read_timeout(),
    ));

    eprintln!("Listening on http://{}", listener.local_addr()?);
    server
        .serve(listener, async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl-C, shutting down");
            }
        })
        .await
}
