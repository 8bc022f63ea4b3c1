use rand::Rng;
use tracing::debug;

use crate::models::{PlaylistState, Track};

/// Display-ready projection of a track's metadata. Derived, never fetched;
/// revealing requires no network I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealedTrack {
    pub name: String,
    pub artists: String,
    pub year: String,
    pub duration_ms: u64,
    pub popularity: u32,
}

impl RevealedTrack {
    pub fn from_track(track: &Track) -> Self {
        let artists = track
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let year = track
            .album
            .release_date
            .split('-')
            .next()
            .unwrap_or("")
            .to_string();
        Self {
            name: track.name.clone(),
            artists,
            year,
            duration_ms: track.duration_ms,
            popularity: track.popularity,
        }
    }
}

/// Per-round state: Hidden until revealed, reset to a fresh Hidden round by
/// every selection.
#[derive(Debug, Clone, Default)]
pub struct RoundState {
    pub current_track: Option<Track>,
    pub revealed: bool,
}

/// Owns the playlist and the current round. The playlist is replaced
/// wholesale on each load and the round replaced on each selection, so the
/// reveal can never expose a previously selected track's data.
#[derive(Debug, Default)]
pub struct GameRound {
    playlist: PlaylistState,
    round: RoundState,
}

impl GameRound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly loaded playlist, dropping any in-flight round.
    pub fn replace_playlist(&mut self, playlist_id: String, tracks: Vec<Track>) {
        debug!(playlist_id, count = tracks.len(), "Replacing playlist");
        self.playlist = PlaylistState {
            playlist_id: Some(playlist_id),
            tracks,
        };
        self.round = RoundState::default();
    }

    pub fn clear(&mut self) {
        self.playlist = PlaylistState::default();
        self.round = RoundState::default();
    }

    /// Uniformly select the next round's track. Returns None (and changes
    /// nothing) when the playlist is empty.
    pub fn select_random(&mut self) -> Option<Track> {
        if self.playlist.is_empty() {
            debug!("No tracks to select from");
            return None;
        }
        let index = rand::rng().random_range(0..self.playlist.len());
        let track = self.playlist.tracks[index].clone();
        self.round = RoundState {
            current_track: Some(track.clone()),
            revealed: false,
        };
        Some(track)
    }

    /// Transition the round to Revealed and return the projection. No-op
    /// (None) when no track is selected.
    pub fn reveal(&mut self) -> Option<RevealedTrack> {
        let track = self.round.current_track.as_ref()?;
        let revealed = RevealedTrack::from_track(track);
        self.round.revealed = true;
        Some(revealed)
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.round.current_track.as_ref()
    }

    pub fn is_revealed(&self) -> bool {
        self.round.revealed
    }

    pub fn playlist_id(&self) -> Option<&str> {
        self.playlist.playlist_id.as_deref()
    }

    pub fn track_count(&self) -> usize {
        self.playlist.len()
    }
}
