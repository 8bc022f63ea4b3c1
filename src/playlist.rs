use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::api::SpotifyApi;
use crate::error::GuesserError;
use crate::models::{PlaylistPage, Track};

lazy_static! {
    // Tried in priority order; first match group wins.
    static ref URL_RE: Regex = Regex::new(r"playlist/([A-Za-z0-9]+)").unwrap();
    static ref URI_RE: Regex = Regex::new(r":playlist:([A-Za-z0-9]+)").unwrap();
    static ref BARE_RE: Regex = Regex::new(r"^([A-Za-z0-9]{22})$").unwrap();
}

/// Normalize a user-supplied playlist reference (web URL, URI-scheme form,
/// or bare id) to the playlist id. Pure function, no network.
pub fn extract_playlist_id(reference: &str) -> Result<String, GuesserError> {
    let reference = reference.trim();
    for pattern in [&*URL_RE, &*URI_RE, &*BARE_RE] {
        if let Some(captures) = pattern.captures(reference) {
            if let Some(id) = captures.get(1) {
                return Ok(id.as_str().to_string());
            }
        }
    }
    Err(GuesserError::InvalidReference(reference.to_string()))
}

/// Result of a playlist load: the playable tracks plus enough information
/// to report truncation instead of silently masking it.
#[derive(Debug, Clone)]
pub struct LoadedPlaylist {
    pub playlist_id: String,
    pub tracks: Vec<Track>,
    pub total: u32,
    pub truncated: bool,
}

/// Fetches a playlist's track collection and filters it down to playable
/// tracks.
pub struct PlaylistLoader {
    api: Arc<SpotifyApi>,
}

impl PlaylistLoader {
    pub fn new(api: Arc<SpotifyApi>) -> Self {
        Self { api }
    }

    /// Load the playlist behind `reference`. Fails with `InvalidReference`
    /// before any network I/O, with the classified remote error on a
    /// non-success status, and with `EmptyPlaylist` when no playable track
    /// survives filtering.
    pub async fn load(&self, token: &str, reference: &str) -> Result<LoadedPlaylist, GuesserError> {
        let playlist_id = extract_playlist_id(reference)?;
        let page = self.api.playlist_tracks(token, &playlist_id).await?;

        let total = page.total;
        // Only the first page is fetched; the remote may truncate large
        // playlists. Reported to the caller, see `LoadedPlaylist::truncated`.
        let truncated = page.next.is_some();
        if truncated {
            warn!(total, "Playlist truncated to first page by remote API");
        }

        let tracks = filter_playable(page);
        if tracks.is_empty() {
            debug!(playlist_id, "No playable tracks after filtering");
            return Err(GuesserError::EmptyPlaylist);
        }
        info!(playlist_id, count = tracks.len(), "Playlist loaded");

        Ok(LoadedPlaylist {
            playlist_id,
            tracks,
            total,
            truncated,
        })
    }
}

/// Discard null entries and tracks that cannot be targeted by a play
/// command (local files, episodes without an id).
pub fn filter_playable(page: PlaylistPage) -> Vec<Track> {
    page.items
        .into_iter()
        .filter_map(|item| item.track)
        .filter_map(Track::from_raw)
        .collect()
}
