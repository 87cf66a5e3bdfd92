use std::future::Future;

use log::{debug, warn};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use thiserror::Error;

use super::{display_title, download_url, fallback_speech_tracks, is_audio_file, metadata_url, Track};

const CLIENT_USER_AGENT: &str = "FocusFlow v0.1.0";

/// Reasons a remote resolution falls back to the bundled list.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("catalog responded with HTTP {0}")]
    Status(u16),

    #[error("catalog metadata is malformed: {0}")]
    Malformed(String),

    #[error("catalog has no playable entries")]
    EmptyAfterFilter,
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CatalogError::Malformed(err.to_string())
        } else {
            CatalogError::Request(err)
        }
    }
}

/// Remote metadata document. Only `files` matters; entries are kept raw so
/// one odd entry does not sink the whole listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataDocument {
    #[serde(default)]
    pub files: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MetadataFile {
    name: String,
    #[serde(default)]
    title: Option<String>,
}

pub trait MetadataSource: Send + Sync + 'static {
    fn fetch_metadata(
        &self,
        catalog_id: &str,
    ) -> impl Future<Output = Result<MetadataDocument, CatalogError>> + Send;
}

pub struct HttpMetadataSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMetadataSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl MetadataSource for HttpMetadataSource {
    async fn fetch_metadata(&self, catalog_id: &str) -> Result<MetadataDocument, CatalogError> {
        let endpoint = metadata_url(&self.base_url, catalog_id);
        debug!("Fetching catalog metadata from {endpoint}");

        let response = self
            .client
            .get(&endpoint)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }

        Ok(response.json::<MetadataDocument>().await?)
    }
}

/// Maps a metadata document to playable tracks: `.mp3` entries only, sorted
/// by title ignoring case.
pub fn tracks_from_metadata(doc: &MetadataDocument, base_url: &str, catalog_id: &str) -> Vec<Track> {
    let mut tracks: Vec<Track> = doc
        .files
        .iter()
        .filter_map(|entry| serde_json::from_value::<MetadataFile>(entry.clone()).ok())
        .filter(|file| is_audio_file(&file.name))
        .map(|file| {
            let label = file
                .title
                .as_deref()
                .filter(|title| !title.trim().is_empty())
                .unwrap_or(&file.name);
            Track::new(display_title(label), download_url(base_url, catalog_id, &file.name))
        })
        .collect();

    tracks.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
    tracks
}

pub struct CatalogResolver<S: MetadataSource> {
    source: S,
    base_url: String,
    catalog_id: String,
}

impl<S: MetadataSource> CatalogResolver<S> {
    pub fn new(source: S, base_url: impl Into<String>, catalog_id: impl Into<String>) -> Self {
        Self {
            source,
            base_url: base_url.into(),
            catalog_id: catalog_id.into(),
        }
    }

    pub fn catalog_id(&self) -> &str {
        &self.catalog_id
    }

    /// The remote listing, or why it cannot be used.
    pub async fn fetch_remote(&self) -> Result<Vec<Track>, CatalogError> {
        let doc = self.source.fetch_metadata(&self.catalog_id).await?;
        let tracks = tracks_from_metadata(&doc, &self.base_url, &self.catalog_id);
        if tracks.is_empty() {
            return Err(CatalogError::EmptyAfterFilter);
        }
        Ok(tracks)
    }

    /// Never empty: the remote listing when usable, the bundled list otherwise.
    /// Background refreshes use `fetch_remote` so a failure keeps the list
    /// already shown instead of resetting it.
    pub async fn resolve(&self) -> Vec<Track> {
        match self.fetch_remote().await {
            Ok(tracks) => tracks,
            Err(err) => {
                warn!("Using fallback speech list ({err})");
                fallback_speech_tracks()
            }
        }
    }
}
