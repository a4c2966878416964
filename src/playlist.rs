//! YouTube playlist listing.
//!
//! [`PlaylistClient`] pages through the YouTube Data API `playlistItems`
//! endpoint and collects the raw item records into a [`Playlist`]. Items are
//! kept as JSON values so a saved playlist carries everything the API
//! returned. The HTTP client needs the `playlist` feature; [`Playlist`]
//! itself is always available for reading saved files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::OcrvidError,
    store::{to_json_pretty, write_atomic},
};

/// The API accepts at most this many items per page.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Items of one playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub playlist_id: String,
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistPage {
    #[serde(default)]
    items: Vec<Value>,
    next_page_token: Option<String>,
}

fn video_id(item: &Value) -> Option<&str> {
    item.get("contentDetails")?.get("videoId")?.as_str()
}

impl Playlist {
    /// An empty playlist for `playlist_id`.
    pub fn new(playlist_id: impl Into<String>) -> Self {
        Self {
            playlist_id: playlist_id.into(),
            items: Vec::new(),
        }
    }

    /// Video ids in playlist order. Items without one are skipped.
    pub fn video_ids(&self) -> Vec<&str> {
        self.items.iter().filter_map(video_id).collect()
    }

    /// The first item for `id`.
    pub fn item_for_video(&self, id: &str) -> Option<&Value> {
        self.items.iter().find(|item| video_id(item) == Some(id))
    }

    /// Append the items of one API response page and return its
    /// continuation token.
    pub(crate) fn extend_from_page(&mut self, body: &str) -> Result<Option<String>, OcrvidError> {
        let page: PlaylistPage = serde_json::from_str(body)?;
        self.items.extend(page.items);
        Ok(page.next_page_token.filter(|token| !token.is_empty()))
    }

    /// Write the playlist as 4-space indented JSON.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::WriteFailed`] if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf, OcrvidError> {
        write_atomic(path.as_ref(), &to_json_pretty(self)?)
    }

    /// Read a playlist written by [`save`](Playlist::save).
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::IoError`] or [`OcrvidError::JsonError`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, OcrvidError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Extract the API's error message from an error response body.
#[cfg_attr(not(feature = "playlist"), allow(dead_code))]
fn api_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[cfg(feature = "playlist")]
pub use client::PlaylistClient;

#[cfg(feature = "playlist")]
mod client {
    use reqwest::blocking::Client;

    use super::{MAX_PAGE_SIZE, Playlist, api_error_message};
    use crate::error::OcrvidError;

    const PLAYLIST_ITEMS_URL: &str = "https://www.googleapis.com/youtube/v3/playlistItems";

    /// Blocking client for the `playlistItems` endpoint.
    pub struct PlaylistClient {
        client: Client,
        api_key: String,
        endpoint: String,
    }

    impl PlaylistClient {
        /// # Errors
        ///
        /// Returns [`OcrvidError::PlaylistError`] if the HTTP client cannot
        /// be built.
        pub fn new(api_key: impl Into<String>) -> Result<Self, OcrvidError> {
            let client = Client::builder()
                .user_agent(concat!("ocrvid/", env!("CARGO_PKG_VERSION")))
                .build()?;
            Ok(Self {
                client,
                api_key: api_key.into(),
                endpoint: PLAYLIST_ITEMS_URL.to_string(),
            })
        }

        /// Point the client at another endpoint, e.g. a local mirror.
        #[must_use]
        pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
            self.endpoint = endpoint.into();
            self
        }

        /// Fetch every item of `playlist_id`, following page tokens.
        ///
        /// `page_size` is clamped to `1..=50`.
        ///
        /// # Errors
        ///
        /// Returns [`OcrvidError::PlaylistError`] for transport failures,
        /// non-success responses, and unexpected payloads.
        pub fn fetch(&self, playlist_id: &str, page_size: u32) -> Result<Playlist, OcrvidError> {
            let page_size = page_size.clamp(1, MAX_PAGE_SIZE).to_string();
            let mut playlist = Playlist::new(playlist_id);
            let mut page_token: Option<String> = None;

            loop {
                log::info!("Requesting playlist items for {playlist_id}");
                let mut query = vec![
                    ("part", "snippet,contentDetails"),
                    ("playlistId", playlist_id),
                    ("maxResults", page_size.as_str()),
                    ("key", self.api_key.as_str()),
                ];
                if let Some(token) = page_token.as_deref() {
                    query.push(("pageToken", token));
                }

                let response = self.client.get(&self.endpoint).query(&query).send()?;
                let status = response.status();
                let body = response.text()?;
                if !status.is_success() {
                    let message = api_error_message(&body).unwrap_or(body);
                    return Err(OcrvidError::PlaylistError(format!("HTTP {status}: {message}")));
                }

                page_token = playlist
                    .extend_from_page(&body)
                    .map_err(|error| OcrvidError::PlaylistError(error.to_string()))?;
                if page_token.is_none() {
                    break;
                }
            }

            log::info!(
                "Fetched {} item(s) for playlist {playlist_id}",
                playlist.items.len()
            );
            Ok(playlist)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST_PAGE: &str = r#"{
        "kind": "youtube#playlistItemListResponse",
        "nextPageToken": "CAUQAA",
        "items": [
            {"id": "a", "snippet": {"title": "Intro"}, "contentDetails": {"videoId": "vid-1"}},
            {"id": "b", "snippet": {"title": "Deleted video"}}
        ]
    }"#;

    const LAST_PAGE: &str = r#"{
        "items": [
            {"id": "c", "snippet": {"title": "Outro"}, "contentDetails": {"videoId": "vid-2"}}
        ]
    }"#;

    #[test]
    fn follows_pages_until_no_token() {
        let mut playlist = Playlist::new("PL123");
        assert_eq!(
            playlist.extend_from_page(FIRST_PAGE).unwrap().as_deref(),
            Some("CAUQAA")
        );
        assert_eq!(playlist.extend_from_page(LAST_PAGE).unwrap(), None);

        assert_eq!(playlist.items.len(), 3);
        assert_eq!(playlist.video_ids(), vec!["vid-1", "vid-2"]);
        assert_eq!(
            playlist.item_for_video("vid-2").unwrap()["snippet"]["title"],
            "Outro"
        );
        assert!(playlist.item_for_video("vid-3").is_none());
    }

    #[test]
    fn saves_and_loads() {
        let directory = tempfile::tempdir().unwrap();
        let mut playlist = Playlist::new("PL123");
        playlist.extend_from_page(LAST_PAGE).unwrap();

        let path = playlist.save(directory.path().join("lists/PL123.json")).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n    \"playlist_id\": \"PL123\""));
        assert_eq!(Playlist::load(&path).unwrap(), playlist);
    }

    #[test]
    fn reads_api_error_message() {
        let body = r#"{"error": {"code": 403, "message": "API key not valid"}}"#;
        assert_eq!(api_error_message(body).as_deref(), Some("API key not valid"));
        assert_eq!(api_error_message("<html>"), None);
    }
}
