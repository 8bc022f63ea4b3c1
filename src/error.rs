use thiserror::Error;

// Basic error handling with thiserror
#[derive(Error, Debug)]
pub enum GuesserError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseFailed(#[from] serde_json::Error),

    #[error("URL encoding failed: {0}")]
    UrlEncodingFailed(#[from] serde_urlencoded::ser::Error),

    #[error("Not authenticated: no access token available")]
    NotAuthenticated,

    #[error("Access token expired or revoked (HTTP 401)")]
    AuthExpired, // Indicates a 401 was received

    #[error("Access forbidden (HTTP 403): {0}")]
    Forbidden(String),

    #[error("Resource not found (HTTP 404): {0}")]
    NotFound(String),

    #[error("Not a recognizable playlist reference: {0}")]
    InvalidReference(String),

    #[error("Playlist has no playable tracks")]
    EmptyPlaylist,

    #[error("Request timed out")]
    Timeout,

    #[error("Playback SDK unavailable: {0}")]
    SdkUnavailable(String),

    #[error("Playback transfer failed: {0}")]
    PlaybackTransferFailed(String),

    #[error("Playback device not ready")]
    DeviceNotReady,

    #[error("No track selected for this round")]
    NoTrackSelected,

    #[error("Player command failed: {0}")]
    PlayerCommandFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GuesserError {
    /// Classify an HTTP status at the point the failure is first detected.
    /// The kind is carried alongside the message; callers never sniff
    /// message text afterwards.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => GuesserError::AuthExpired,
            403 => {
                let message = if message.is_empty() {
                    // Historically either a private playlist or the platform
                    // blocking third-party cookies; the user action differs
                    // from a credential failure, so say so.
                    "playlist is private, or the browser blocked third-party cookies".to_string()
                } else {
                    message
                };
                GuesserError::Forbidden(message)
            }
            404 => {
                let message = if message.is_empty() {
                    "no active device".to_string()
                } else {
                    message
                };
                GuesserError::NotFound(message)
            }
            _ => GuesserError::InvalidResponse(format!("HTTP {}: {}", status, message)),
        }
    }

    /// Map a transport-level reqwest error, splitting timeouts out into
    /// their own kind.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GuesserError::Timeout
        } else {
            GuesserError::RequestFailed(err)
        }
    }

    /// True if this error must cascade into a session reset (cleared token,
    /// re-authorization required).
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, GuesserError::AuthExpired)
    }
}
