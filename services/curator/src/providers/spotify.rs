//! Spotify Web API catalog search with client-credentials auth

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::{CatalogProvider, CatalogQuery, ProviderError, ProviderResult};
use crate::config::CatalogConfig;
use crate::models::CandidateTrack;

/// Spotify caps `limit` per search page
const MAX_PAGE: u32 = 50;
/// Refresh tokens this long before they actually expire
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Deserialize)]
struct TrackPage {
    items: Vec<SpotifyTrack>,
}

#[derive(Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Deserialize)]
struct SpotifyAlbum {
    name: String,
    #[serde(default)]
    release_date: Option<String>,
}

#[derive(Deserialize)]
struct SpotifyTrack {
    id: Option<String>,
    name: String,
    #[serde(default)]
    popularity: u8,
    #[serde(default)]
    explicit: bool,
    artists: Vec<SpotifyArtist>,
    album: SpotifyAlbum,
}

impl SpotifyTrack {
    fn into_candidate(self) -> Option<CandidateTrack> {
        // Local files and unavailable tracks come back without an id
        let id = self.id?;
        let artist = self
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let release_year = self
            .album
            .release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok());

        Some(CandidateTrack {
            id,
            title: self.name,
            artist,
            album: self.album.name,
            popularity: self.popularity.min(100),
            genres: vec![],
            explicit: self.explicit,
            release_year,
            relevance: 0.0,
        })
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Spotify search client
pub struct SpotifyCatalog {
    client: Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    market: Option<String>,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyCatalog {
    pub fn new(config: &CatalogConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!("Spotify catalog configured at {}", config.base_url);
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            market: config.market.clone(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> ProviderResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting Spotify client-credentials token");
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: "spotify-auth".to_string(),
                status,
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }
}

#[async_trait]
impl CatalogProvider for SpotifyCatalog {
    fn name(&self) -> &str {
        "spotify"
    }

    #[instrument(skip(self), fields(provider = "spotify"))]
    async fn search(&self, query: &CatalogQuery) -> ProviderResult<Vec<CandidateTrack>> {
        let token = self.access_token().await?;

        let mut params = vec![
            ("q", query.text.clone()),
            ("type", "track".to_string()),
            ("limit", query.limit.clamp(1, MAX_PAGE).to_string()),
            ("offset", query.offset.to_string()),
        ];
        if let Some(market) = &self.market {
            params.push(("market", market.clone()));
        }

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: "spotify".to_string(),
                status,
                body,
            });
        }

        let result: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(result
            .tracks
            .items
            .into_iter()
            .filter_map(SpotifyTrack::into_candidate)
            .collect())
    }
}
