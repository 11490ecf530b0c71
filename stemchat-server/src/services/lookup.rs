//! VocaDB song lookup client
//!
//! Used by the "Finding Info" menu option. Connectivity failures and all
//! other failures are reported as distinct [`LookupError`] variants so the
//! session can word them differently.

use serde::{Deserialize, Serialize};
use stemchat_common::config::LookupConfig;
use thiserror::Error;

const USER_AGENT: &str = concat!("stemchat/", env!("CARGO_PKG_VERSION"));

/// Lookup client errors
#[derive(Debug, Error)]
pub enum LookupError {
    /// Remote endpoint unreachable (connect failure or timeout)
    #[error("{0}")]
    Connectivity(String),

    /// Any other failure: HTTP status, malformed body, ...
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            LookupError::Connectivity(err.to_string())
        } else {
            LookupError::Other(err.to_string())
        }
    }
}

/// One song in a search result
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SongMatch {
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistCredit>,
}

/// Artist credit on a song
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArtistCredit {
    pub name: String,
}

/// `GET /api/songs/` response body (only the fields we use)
#[derive(Debug, Deserialize)]
struct SongSearchResponse {
    items: Vec<SongMatch>,
}

/// Song metadata search
///
/// An empty result is a valid outcome, distinct from failure.
#[async_trait::async_trait]
pub trait SongLookup: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SongMatch>, LookupError>;
}

/// VocaDB REST client
pub struct VocaDbClient {
    http_client: reqwest::Client,
    songs_url: String,
}

impl VocaDbClient {
    pub fn new(config: &LookupConfig) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()
            .map_err(|e| LookupError::Other(e.to_string()))?;

        Ok(Self {
            http_client,
            songs_url: format!("{}/api/songs/", config.base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait::async_trait]
impl SongLookup for VocaDbClient {
    async fn search(&self, query: &str) -> Result<Vec<SongMatch>, LookupError> {
        tracing::debug!(query = %query, url = %self.songs_url, "Querying VocaDB");

        let response = self
            .http_client
            .get(&self.songs_url)
            .query(&[("query", query), ("fields", "Artists"), ("lang", "English")])
            .send()
            .await?
            .error_for_status()?;

        let body: SongSearchResponse = response.json().await?;

        tracing::info!(query = %query, matches = body.items.len(), "VocaDB search complete");
        Ok(body.items)
    }
}
