use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::NpauthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub artist: String,
    pub name: String,
    pub album: String,
    pub is_playing: bool,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} [{}]", self.artist, self.name, self.album)?;
        if !self.is_playing {
            write!(f, " (paused)")?;
        }
        Ok(())
    }
}

/// Streaming API collaborator that consumes a user's access token.
#[async_trait]
pub trait NowPlayingSource: Send + Sync {
    /// `None` when nothing is playing.
    async fn currently_playing(&self, access_token: &str) -> Result<Option<Track>, NpauthError>;
}

#[derive(Debug, Deserialize)]
struct CurrentlyPlaying {
    is_playing: bool,
    item: Option<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    name: String,
    #[serde(default)]
    artists: Vec<Named>,
    album: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

impl CurrentlyPlaying {
    fn into_track(self) -> Option<Track> {
        let item = self.item?;
        Some(Track {
            artist: item
                .artists
                .into_iter()
                .next()
                .map(|a| a.name)
                .unwrap_or_default(),
            name: item.name,
            album: item.album.map(|a| a.name).unwrap_or_default(),
            is_playing: self.is_playing,
        })
    }
}

/// `GET {api_base}/me/player/currently-playing` with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpNowPlaying {
    client: reqwest::Client,
    api_base: String,
    timeout: Duration,
}

impl HttpNowPlaying {
    pub fn new(api_base: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl NowPlayingSource for HttpNowPlaying {
    async fn currently_playing(&self, access_token: &str) -> Result<Option<Track>, NpauthError> {
        let url = format!("{}/me/player/currently-playing", self.api_base);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| NpauthError::StreamingApi(format!("request to {url} failed: {e}")))?;

        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(NpauthError::StreamingApi(format!(
                "{url} returned status {status}: {body}"
            )));
        }

        let playing: CurrentlyPlaying = resp.json().await.map_err(|e| {
            NpauthError::StreamingApi(format!("failed to parse currently playing response: {e}"))
        })?;
        Ok(playing.into_track())
    }
}
