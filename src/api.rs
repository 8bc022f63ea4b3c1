use std::sync::Arc;

use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::error::GuesserError;
use crate::models::{ApiErrorBody, PlaylistPage};
use crate::settings::SETTINGS;

/// Commands against the remote player-control API. Both are single
/// idempotent PUTs; `TransferPlayback` activates the device and may start
/// playback, `PlayTrack` starts a specific track on it.
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    TransferPlayback { play: bool },
    PlayTrack { track_id: String, position_ms: Option<u64> },
}

impl PlayerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerCommand::TransferPlayback { .. } => "transferPlayback",
            PlayerCommand::PlayTrack { .. } => "playTrack",
        }
    }
}

/// Thin reqwest wrapper around the catalog and player-control endpoints.
/// Every failure is classified into a structured kind at this boundary, at
/// the point it is first detected.
pub struct SpotifyApi {
    client: Arc<Client>,
    base_url: String,
}

impl SpotifyApi {
    pub fn new(client: Arc<Client>) -> Self {
        Self {
            client,
            base_url: SETTINGS.api_base_url.clone(),
        }
    }

    /// Fetch the first page of a playlist's tracks. This is the only
    /// operation with its own bounded timeout; hitting it aborts the
    /// request and reports `Timeout`.
    pub async fn playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
    ) -> Result<PlaylistPage, GuesserError> {
        let url = format!("{}/playlists/{}/tracks", self.base_url, playlist_id);
        debug!(%url, "Fetching playlist tracks");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .timeout(SETTINGS.playlist_timeout)
            .send()
            .await
            .map_err(GuesserError::from_transport)?;

        let response = Self::check_status(response).await?;
        let page = response.json::<PlaylistPage>().await?;
        Ok(page)
    }

    /// Send a player-control command targeting a device.
    pub async fn send_command(
        &self,
        token: &str,
        device_id: &str,
        command: PlayerCommand,
    ) -> Result<(), GuesserError> {
        let command_name = command.name();
        debug!(command = command_name, device_id, "Sending player command");

        let request = match &command {
            PlayerCommand::TransferPlayback { play } => self
                .client
                .put(format!("{}/me/player", self.base_url))
                .json(&json!({ "device_ids": [device_id], "play": play })),
            PlayerCommand::PlayTrack { track_id, position_ms } => {
                let mut body = json!({ "uris": [format!("spotify:track:{}", track_id)] });
                if let Some(position_ms) = position_ms {
                    body["position_ms"] = json!(position_ms);
                }
                self.client
                    .put(format!("{}/me/player/play", self.base_url))
                    .query(&[("device_id", device_id)])
                    .json(&body)
            }
        };

        let response = request
            .bearer_auth(token)
            .timeout(SETTINGS.request_timeout)
            .send()
            .await
            .map_err(GuesserError::from_transport)?;

        match Self::check_status(response).await {
            Ok(_) => {
                debug!(command = command_name, "Player command accepted");
                Ok(())
            }
            Err(e) => {
                warn!(command = command_name, error = %e, "Player command failed");
                Err(e)
            }
        }
    }

    /// Classify non-success statuses, extracting the message from the
    /// error body when one is present.
    async fn check_status(response: Response) -> Result<Response, GuesserError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            warn!("Remote returned 401, session expired");
            return Err(GuesserError::AuthExpired);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .map(|b| b.error.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(body);
        let err = GuesserError::from_status(status.as_u16(), message);
        error!(%status, error = %err, "Remote API error");
        Err(err)
    }
}
