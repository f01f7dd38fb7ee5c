pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod oauth;
pub mod player;
pub mod server;

pub use config::{load_config, NpauthConfig};
pub use dispatch::{Author, CommandDispatcher, MessageEvent};
pub use error::NpauthError;
pub use oauth::{
    AuthServerClient, FileTokenStore, HttpAuthServerClient, MemoryTokenStore, TokenLifecycleManager,
    TokenRecord, TokenState, TokenStore,
};
pub use player::{HttpNowPlaying, NowPlayingSource, Track};
pub use server::CallbackServer;
