use crate::game::RevealedTrack;
use crate::state::TokenSource;

/// Status vocabulary delivered to the UI sink. The core never renders;
/// every user-visible transition is announced here and the sink decides how
/// to show it.
#[derive(Debug, Clone)]
pub enum GuesserEvent {
    /// No usable token; the host page should navigate to this URL.
    AuthenticationRequired { authorize_url: String },
    Authenticated { source: TokenSource },
    /// Token and device state were cleared (401 cascade or explicit reset).
    SessionCleared,
    SdkReady,
    SdkUnavailable { message: String },
    /// Player handshake succeeded. A device is not necessarily bound yet.
    Connected,
    Disconnected,
    DeviceReady { device_id: String },
    DeviceOffline { device_id: String },
    InitializationError { message: String },
    AuthenticationError { message: String },
    AccountError { message: String },
    PlaybackError { message: String },
    StateChanged { paused: bool },
    /// Transfer-playback failed; non-fatal, the round continues.
    PlaybackTransferFailed { message: String },
    DeviceNotReady,
    PlaylistLoaded { playlist_id: String, track_count: usize },
    /// The remote returned only the first page of a larger playlist.
    PlaylistTruncated { fetched: usize, total: u32 },
    RoundStarted { track_id: String },
    RoundRevealed(RevealedTrack),
}

impl GuesserEvent {
    // Get the name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            GuesserEvent::AuthenticationRequired { .. } => "authentication_required",
            GuesserEvent::Authenticated { .. } => "authenticated",
            GuesserEvent::SessionCleared => "session_cleared",
            GuesserEvent::SdkReady => "sdk_ready",
            GuesserEvent::SdkUnavailable { .. } => "sdk_unavailable",
            GuesserEvent::Connected => "connected",
            GuesserEvent::Disconnected => "disconnected",
            GuesserEvent::DeviceReady { .. } => "ready",
            GuesserEvent::DeviceOffline { .. } => "not_ready",
            GuesserEvent::InitializationError { .. } => "initialization_error",
            GuesserEvent::AuthenticationError { .. } => "authentication_error",
            GuesserEvent::AccountError { .. } => "account_error",
            GuesserEvent::PlaybackError { .. } => "playback_error",
            GuesserEvent::StateChanged { .. } => "player_state_changed",
            GuesserEvent::PlaybackTransferFailed { .. } => "playback_transfer_failed",
            GuesserEvent::DeviceNotReady => "device_not_ready",
            GuesserEvent::PlaylistLoaded { .. } => "playlist_loaded",
            GuesserEvent::PlaylistTruncated { .. } => "playlist_truncated",
            GuesserEvent::RoundStarted { .. } => "round_started",
            GuesserEvent::RoundRevealed(_) => "round_revealed",
        }
    }

    /// True for the error events a sink should surface prominently.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            GuesserEvent::SdkUnavailable { .. }
                | GuesserEvent::InitializationError { .. }
                | GuesserEvent::AuthenticationError { .. }
                | GuesserEvent::AccountError { .. }
                | GuesserEvent::PlaybackError { .. }
                | GuesserEvent::PlaybackTransferFailed { .. }
        )
    }
}
