//! Chat command dispatch, decoupled from the chat transport.
//!
//! [`CommandDispatcher::handle`] maps one incoming message to at most one
//! reply. Delivering messages and replies is the caller's business.

use std::sync::Arc;

use crate::error::NpauthError;
use crate::oauth::TokenLifecycleManager;
use crate::player::NowPlayingSource;

const KNOWN_COMMANDS: &[&str] = &["np"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub username: String,
    pub discriminator: String,
    pub bot: bool,
}

impl Author {
    pub fn identity(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }

    /// Parse a `name#discriminator` identity back into a human author.
    pub fn from_identity(identity: &str) -> Self {
        let (username, discriminator) = identity
            .rsplit_once('#')
            .unwrap_or((identity, "0"));
        Self {
            username: username.to_string(),
            discriminator: discriminator.to_string(),
            bot: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub author: Author,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub name: &'a str,
    pub args: Vec<&'a str>,
}

/// Split a prefixed message into command name and arguments.
pub fn parse_command<'a>(content: &'a str, prefix: &str) -> Option<ParsedCommand<'a>> {
    let rest = content.strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let name = words.next()?;
    Some(ParsedCommand {
        name,
        args: words.collect(),
    })
}

/// Closest known command within one edit, if unambiguous.
pub fn suggest_command(input: &str) -> Option<&'static str> {
    let mut best: Option<(&'static str, usize)> = None;
    let mut ambiguous = false;
    for &known in KNOWN_COMMANDS {
        let dist = strsim::levenshtein(input, known);
        match best {
            Some((_, d)) if dist == d => ambiguous = true,
            Some((_, d)) if dist > d => {}
            _ => {
                best = Some((known, dist));
                ambiguous = false;
            }
        }
    }
    match best {
        Some((known, 1)) if !ambiguous => Some(known),
        _ => None,
    }
}

pub fn unauthorized_reply(authorization_uri: &str) -> String {
    format!("You are not authorized to use this command. Please authorize the bot: {authorization_uri}")
}

pub const FAILURE_REPLY: &str = "An error occurred while fetching status";
pub const NOTHING_PLAYING_REPLY: &str = "Nothing is playing right now.";

pub struct CommandDispatcher {
    manager: Arc<TokenLifecycleManager>,
    player: Arc<dyn NowPlayingSource>,
    prefix: String,
}

impl CommandDispatcher {
    pub fn new(
        manager: Arc<TokenLifecycleManager>,
        player: Arc<dyn NowPlayingSource>,
        prefix: &str,
    ) -> Self {
        Self {
            manager,
            player,
            prefix: prefix.to_string(),
        }
    }

    /// The reply to send for `event`, or `None` when the bot stays silent.
    pub async fn handle(&self, event: &MessageEvent) -> Option<String> {
        // Never answer bots, including ourselves.
        if event.author.bot {
            return None;
        }
        let command = parse_command(&event.content, &self.prefix)?;
        let user = event.author.identity();

        match command.name {
            "np" => Some(self.now_playing(&user).await),
            other => suggest_command(other).map(|known| {
                format!(
                    "Unknown command `{}{other}`. Did you mean `{}{known}`?",
                    self.prefix, self.prefix
                )
            }),
        }
    }

    async fn now_playing(&self, user: &str) -> String {
        match self.fetch_now_playing(user).await {
            Ok(Some(track)) => track.to_string(),
            Ok(None) => NOTHING_PLAYING_REPLY.to_string(),
            Err(err) if err.requires_authorization() => {
                tracing::info!("User {user} is not authorized to use now playing: {err}");
                unauthorized_reply(&self.manager.build_authorization_uri(user))
            }
            Err(err) => {
                tracing::error!("An error occurred while fetching now playing status of {user}: {err}");
                FAILURE_REPLY.to_string()
            }
        }
    }

    async fn fetch_now_playing(
        &self,
        user: &str,
    ) -> Result<Option<crate::player::Track>, NpauthError> {
        let record = self.manager.get_valid_token(user).await?;
        self.player.currently_playing(&record.access_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use crate::oauth::{
        AuthServerClient, ManualClock, MemoryTokenStore, Timeouts, TokenGrant, TokenRecord,
        TokenStore,
    };
    use crate::player::Track;

    struct NoProvider;

    #[async_trait]
    impl AuthServerClient for NoProvider {
        async fn exchange(&self, _code: &str) -> Result<TokenGrant, NpauthError> {
            Err(NpauthError::ExchangeFailed("offline".into()))
        }

        async fn refresh(&self, user: &str, _refresh_token: &str) -> Result<TokenGrant, NpauthError> {
            Err(NpauthError::RefreshFailed {
                user: user.into(),
                reason: "offline".into(),
            })
        }

        fn authorization_uri(&self, state: &str) -> String {
            format!("https://auth.example.com/authorize?state={state}")
        }
    }

    struct FixedPlayer(Result<Option<Track>, String>);

    #[async_trait]
    impl NowPlayingSource for FixedPlayer {
        async fn currently_playing(&self, access_token: &str) -> Result<Option<Track>, NpauthError> {
            assert_eq!(access_token, "AT1");
            self.0.clone().map_err(NpauthError::StreamingApi)
        }
    }

    fn alice() -> Author {
        Author {
            username: "alice".into(),
            discriminator: "0001".into(),
            bot: false,
        }
    }

    fn message(content: &str) -> MessageEvent {
        MessageEvent {
            author: alice(),
            content: content.into(),
        }
    }

    async fn dispatcher(player: FixedPlayer, expires_in: Duration) -> CommandDispatcher {
        let store = Arc::new(MemoryTokenStore::new());
        let now = Utc::now();
        store
            .put(&TokenRecord {
                user_identity: "alice#0001".into(),
                access_token: "AT1".into(),
                refresh_token: "RT1".into(),
                token_type: "Bearer".into(),
                scope: "user-read-currently-playing".into(),
                expires_at: now + expires_in,
            })
            .await
            .unwrap();
        let manager = TokenLifecycleManager::new(
            store,
            Arc::new(NoProvider),
            Arc::new(ManualClock::new(now)),
            Timeouts::default(),
        );
        CommandDispatcher::new(Arc::new(manager), Arc::new(player), ".")
    }

    fn playing() -> FixedPlayer {
        FixedPlayer(Ok(Some(Track {
            artist: "Aphex Twin".into(),
            name: "Xtal".into(),
            album: "Selected Ambient Works 85-92".into(),
            is_playing: true,
        })))
    }

    #[test]
    fn parse_command_splits_name_and_args() {
        let cmd = parse_command(".np  now please", ".").unwrap();
        assert_eq!(cmd.name, "np");
        assert_eq!(cmd.args, vec!["now", "please"]);
        assert!(parse_command("np", ".").is_none());
        assert!(parse_command(".", ".").is_none());
    }

    #[test]
    fn suggest_command_within_one_edit() {
        assert_eq!(suggest_command("nq"), Some("np"));
        assert_eq!(suggest_command("np"), None);
        assert_eq!(suggest_command("help"), None);
    }

    #[test]
    fn author_identity_roundtrip() {
        assert_eq!(alice().identity(), "alice#0001");
        assert_eq!(Author::from_identity("alice#0001"), alice());
        assert_eq!(Author::from_identity("we#ird#42").username, "we#ird");
    }

    #[tokio::test]
    async fn now_playing_replies_with_track() {
        let d = dispatcher(playing(), Duration::hours(1)).await;
        let reply = d.handle(&message(".np")).await.unwrap();
        assert_eq!(reply, "Aphex Twin - Xtal [Selected Ambient Works 85-92]");
    }

    #[tokio::test]
    async fn nothing_playing_reply() {
        let d = dispatcher(FixedPlayer(Ok(None)), Duration::hours(1)).await;
        assert_eq!(d.handle(&message(".np")).await.unwrap(), NOTHING_PLAYING_REPLY);
    }

    #[tokio::test]
    async fn unknown_user_gets_authorization_prompt() {
        let d = dispatcher(playing(), Duration::hours(1)).await;
        let event = MessageEvent {
            author: Author {
                username: "bob".into(),
                discriminator: "0002".into(),
                bot: false,
            },
            content: ".np".into(),
        };
        let reply = d.handle(&event).await.unwrap();
        assert_eq!(
            reply,
            unauthorized_reply("https://auth.example.com/authorize?state=bob#0002")
        );
    }

    #[tokio::test]
    async fn failed_refresh_gets_authorization_prompt() {
        let d = dispatcher(playing(), Duration::seconds(-1)).await;
        let reply = d.handle(&message(".np")).await.unwrap();
        assert!(reply.starts_with("You are not authorized"));
        assert!(reply.contains("state=alice#0001"));
    }

    #[tokio::test]
    async fn player_failure_gets_generic_reply() {
        let d = dispatcher(FixedPlayer(Err("503".into())), Duration::hours(1)).await;
        assert_eq!(d.handle(&message(".np")).await.unwrap(), FAILURE_REPLY);
    }

    #[tokio::test]
    async fn bots_and_plain_messages_are_ignored() {
        let d = dispatcher(playing(), Duration::hours(1)).await;
        let from_bot = MessageEvent {
            author: Author {
                bot: true,
                ..alice()
            },
            content: ".np".into(),
        };
        assert!(d.handle(&from_bot).await.is_none());
        assert!(d.handle(&message("what are you listening to?")).await.is_none());
        assert!(d.handle(&message(".dance")).await.is_none());
    }

    #[tokio::test]
    async fn near_miss_command_gets_suggestion() {
        let d = dispatcher(playing(), Duration::hours(1)).await;
        let reply = d.handle(&message(".nq")).await.unwrap();
        assert_eq!(reply, "Unknown command `.nq`. Did you mean `.np`?");
    }
}
