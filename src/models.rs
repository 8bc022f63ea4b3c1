use serde::Deserialize;

/// A single credited artist on a track.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Artist {
    pub name: String,
}

/// Album metadata; only the release date is needed for the reveal
/// projection.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Album {
    #[serde(default)]
    pub release_date: String,
}

/// Raw track entry as the catalog API returns it. Local files and podcast
/// episodes come back without an id; `Track::from_raw` filters those out.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrack {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Album,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub is_local: bool,
}

/// A playable track. Immutable once fetched; sourced verbatim from the
/// catalog API, never locally mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<Artist>,
    pub album: Album,
    pub duration_ms: u64,
    pub popularity: u32,
}

impl Track {
    /// Promote a raw catalog entry to a playable track. Returns None for
    /// entries that cannot be targeted by a play command (missing id,
    /// local-only files).
    pub fn from_raw(raw: RawTrack) -> Option<Self> {
        if raw.is_local {
            return None;
        }
        let id = raw.id.filter(|id| !id.is_empty())?;
        Some(Track {
            id,
            name: raw.name,
            artists: raw.artists,
            album: raw.album,
            duration_ms: raw.duration_ms,
            popularity: raw.popularity,
        })
    }

    /// URI-scheme form used by the player-control API.
    pub fn uri(&self) -> String {
        format!("spotify:track:{}", self.id)
    }
}

/// One entry of the playlist-tracks endpoint. `track` is null for entries
/// the catalog cannot resolve.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<RawTrack>,
}

/// First page of the playlist-tracks endpoint. A non-null `next` cursor
/// means the remote truncated the listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistPage {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub total: u32,
}

/// Error body the remote API attaches to non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorPayload {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub message: String,
}

/// The track collection of the most recently loaded playlist. Replaced
/// wholesale on each successful load, never partially updated.
#[derive(Debug, Clone, Default)]
pub struct PlaylistState {
    pub playlist_id: Option<String>,
    pub tracks: Vec<Track>,
}

impl PlaylistState {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }
}
