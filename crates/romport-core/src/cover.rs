//! Best-effort cover art lookup for newly imported games.
//!
//! Lookups never block or fail an import: the game is stored with
//! `pending_cover_lookup` set, a background task asks the provider under a
//! timeout, and the record is updated with whatever came back (possibly
//! nothing).

use crate::config::{AppConfig, NetworkConfig};
use crate::error::{Result, RomportError};
use crate::store::{GameRecord, RecordStore};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Source of cover art URLs.
#[async_trait]
pub trait CoverArtProvider: Send + Sync {
    /// URL of a cover for `game`, `None` when the provider has none.
    async fn find_cover(&self, game: &GameRecord) -> Result<Option<String>>;
}

/// Cover provider backed by the libretro thumbnail server.
pub struct LibretroThumbnails {
    client: Client,
    base_url: String,
}

impl LibretroThumbnails {
    pub fn new() -> Result<Self> {
        Self::with_base_url(NetworkConfig::THUMBNAIL_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(NetworkConfig::COVER_LOOKUP_TIMEOUT)
            .user_agent(AppConfig::USER_AGENT)
            .build()
            .map_err(|e| RomportError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Boxart URL for a game, `None` for platforms the server does not index.
    pub fn boxart_url(&self, game: &GameRecord) -> Option<String> {
        let system = game.platform.thumbnail_system()?;
        Some(format!(
            "{}/{}/Named_Boxarts/{}.png",
            self.base_url,
            urlencoding::encode(system),
            urlencoding::encode(&thumbnail_name(&game.name))
        ))
    }
}

#[async_trait]
impl CoverArtProvider for LibretroThumbnails {
    async fn find_cover(&self, game: &GameRecord) -> Result<Option<String>> {
        let Some(url) = self.boxart_url(game) else {
            return Ok(None);
        };

        let response = self.client.head(&url).send().await?;
        if response.status().is_success() {
            Ok(Some(url))
        } else {
            debug!("No cover for {} ({})", game.name, response.status());
            Ok(None)
        }
    }
}

/// Thumbnail file names replace characters that are invalid on common
/// filesystems with `_`.
fn thumbnail_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '&' | '*' | '/' | ':' | '`' | '<' | '>' | '?' | '\\' | '|' | '"' => '_',
            other => other,
        })
        .collect()
}

/// Look up a cover for `game` and persist the outcome.
///
/// The lookup is bounded by `timeout`; timeouts and provider errors count as
/// "no cover". `pending_cover_lookup` is cleared either way.
pub async fn match_cover(
    store: Arc<dyn RecordStore>,
    provider: Arc<dyn CoverArtProvider>,
    mut game: GameRecord,
    timeout: Duration,
) -> Result<GameRecord> {
    let cover = match tokio::time::timeout(timeout, provider.find_cover(&game)).await {
        Ok(Ok(cover)) => cover,
        Ok(Err(e)) => {
            warn!("Cover lookup for {} failed: {}", game.name, e);
            None
        }
        Err(_) => {
            warn!("Cover lookup for {} timed out after {:?}", game.name, timeout);
            None
        }
    };

    game.pending_cover_lookup = false;
    if cover.is_some() {
        game.cover_url = cover;
    }

    let updated = game.clone();
    tokio::task::spawn_blocking(move || store.update_game(&updated))
        .await
        .map_err(|e| RomportError::Other(format!("Cover update task failed: {}", e)))??;

    Ok(game)
}

/// Run [`match_cover`] in the background. Failures are logged.
pub fn spawn_cover_lookup(
    store: Arc<dyn RecordStore>,
    provider: Arc<dyn CoverArtProvider>,
    game: GameRecord,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let name = game.name.clone();
        if let Err(e) = match_cover(store, provider, game, NetworkConfig::COVER_LOOKUP_TIMEOUT).await
        {
            warn!("Failed to record cover for {}: {}", name, e);
        }
    })
}
