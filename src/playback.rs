use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{PlayerCommand, SpotifyApi};
use crate::error::GuesserError;
use crate::events::GuesserEvent;
use crate::state::{SessionCore, SessionPhase};

/// Token provider handed to the SDK player. Called by the SDK whenever it
/// needs a token, so it must read the *current* token at call time; a
/// provider that captures the token at construction breaks silently once
/// the session re-authenticates.
pub type TokenProvider = Arc<dyn Fn() -> Option<String> + Send + Sync + 'static>;

/// Lifecycle events of the external player, in the SDK's own vocabulary.
#[derive(Debug, Clone)]
pub enum SdkEvent {
    Ready { device_id: String },
    NotReady { device_id: String },
    InitializationError { message: String },
    AuthenticationError { message: String },
    AccountError { message: String },
    PlaybackError { message: String },
    StateChanged { paused: bool },
}

/// Construction options mirroring the SDK player constructor.
#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub name: String,
    pub volume: f32,
}

/// The external player object, behind a seam so the core never touches the
/// SDK types directly.
pub trait PlayerSdk: Send + Sync {
    /// Asynchronous handshake; resolves to a success flag.
    fn connect(&self) -> BoxFuture<'static, bool>;
    fn disconnect(&self);
    fn set_volume(&self, volume: f32) -> BoxFuture<'static, Result<(), String>>;
    fn toggle_play(&self) -> BoxFuture<'static, Result<(), String>>;
}

/// Builds a player wired to a token provider and an event channel. The
/// host installs the SDK listeners and forwards them as `SdkEvent`s.
pub trait PlayerFactory: Send + Sync {
    fn create(
        &self,
        options: PlayerOptions,
        get_token: TokenProvider,
    ) -> (Box<dyn PlayerSdk>, mpsc::UnboundedReceiver<SdkEvent>);
}

/// Owns the player instance: handshake, event subscription, device-id
/// capture and the transfer-playback call. Translates SDK events into the
/// session's status vocabulary and applies the one mutation they are
/// allowed to make (the authentication-error cascade).
pub struct PlaybackSession {
    player: Arc<dyn PlayerSdk>,
    core: Arc<SessionCore>,
    pump: RwLock<Option<JoinHandle<()>>>,
    shutdown: Arc<Notify>,
}

impl PlaybackSession {
    /// Wrap a freshly created player and start consuming its events.
    pub(crate) fn start(
        core: Arc<SessionCore>,
        api: Arc<SpotifyApi>,
        player: Box<dyn PlayerSdk>,
        events: mpsc::UnboundedReceiver<SdkEvent>,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let pump = tokio::spawn(run_event_pump(
            core.clone(),
            api,
            events,
            shutdown.clone(),
        ));
        Self {
            player: Arc::from(player),
            core,
            pump: RwLock::new(Some(pump)),
            shutdown,
        }
    }

    /// Player handshake. On failure emits `Disconnected` and leaves the
    /// device unbound; retry is left to the caller, never looped here.
    pub async fn connect(&self) -> Result<bool, GuesserError> {
        self.core.set_phase(SessionPhase::Connecting);
        if self.player.connect().await {
            info!("Player handshake succeeded, waiting for device");
            self.core.emit(GuesserEvent::Connected);
            Ok(true)
        } else {
            warn!("Player handshake failed");
            self.core.emit(GuesserEvent::Disconnected);
            self.core.set_phase(SessionPhase::Authenticated);
            Ok(false)
        }
    }

    /// Thin pass-through. Failures are reported but never mutate session
    /// state.
    pub async fn set_volume(&self, volume: f32) -> Result<(), GuesserError> {
        let volume = volume.clamp(0.0, 1.0);
        match self.player.set_volume(volume).await {
            Ok(()) => Ok(()),
            Err(message) => {
                warn!(message, "set_volume failed");
                self.core.emit(GuesserEvent::PlaybackError {
                    message: message.clone(),
                });
                Err(GuesserError::PlayerCommandFailed(message))
            }
        }
    }

    /// Thin pass-through, same failure policy as `set_volume`.
    pub async fn toggle_play(&self) -> Result<(), GuesserError> {
        match self.player.toggle_play().await {
            Ok(()) => Ok(()),
            Err(message) => {
                warn!(message, "toggle_play failed");
                self.core.emit(GuesserEvent::PlaybackError {
                    message: message.clone(),
                });
                Err(GuesserError::PlayerCommandFailed(message))
            }
        }
    }

    /// Stop the event pump and disconnect the player.
    pub async fn stop(&self) {
        self.shutdown.notify_waiters();
        self.player.disconnect();
        let handle = self.pump.write().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        debug!("Dropping PlaybackSession, signaling event pump to stop");
        self.shutdown.notify_waiters();
        self.player.disconnect();
    }
}

/// Consume SDK events until the channel closes or shutdown is signaled.
async fn run_event_pump(
    core: Arc<SessionCore>,
    api: Arc<SpotifyApi>,
    mut events: mpsc::UnboundedReceiver<SdkEvent>,
    shutdown: Arc<Notify>,
) {
    debug!("Player event pump started");
    loop {
        tokio::select! {
            biased;

            _ = shutdown.notified() => {
                debug!("Event pump received shutdown notification");
                break;
            }

            event = events.recv() => {
                match event {
                    Some(event) => handle_sdk_event(&core, &api, event).await,
                    None => {
                        debug!("SDK event channel closed");
                        break;
                    }
                }
            }
        }
    }
    debug!("Player event pump finished");
}

async fn handle_sdk_event(core: &Arc<SessionCore>, api: &Arc<SpotifyApi>, event: SdkEvent) {
    match event {
        SdkEvent::Ready { device_id } => {
            info!(device_id, "Playback device ready");
            // Persist first: a play command racing in right after the event
            // must find the device id in the store.
            core.bind_device(device_id.clone()).await;
            core.emit(GuesserEvent::DeviceReady {
                device_id: device_id.clone(),
            });
            spawn_transfer_playback(core.clone(), api.clone(), device_id);
        }
        SdkEvent::NotReady { device_id } => {
            warn!(device_id, "Playback device went offline");
            core.mark_offline().await;
            core.emit(GuesserEvent::DeviceOffline { device_id });
        }
        SdkEvent::AuthenticationError { message } => {
            // The only SDK error that cascades: the token is invalid, so
            // the session goes back through the authorize flow.
            warn!(message, "Player authentication error, clearing session");
            core.emit(GuesserEvent::AuthenticationError {
                message: message.clone(),
            });
            core.clear_auth().await;
        }
        SdkEvent::InitializationError { message } => {
            warn!(message, "Player initialization error");
            core.emit(GuesserEvent::InitializationError { message });
        }
        SdkEvent::AccountError { message } => {
            warn!(message, "Player account error");
            core.emit(GuesserEvent::AccountError { message });
        }
        SdkEvent::PlaybackError { message } => {
            warn!(message, "Player playback error");
            core.emit(GuesserEvent::PlaybackError { message });
        }
        SdkEvent::StateChanged { paused } => {
            debug!(paused, "Player state changed");
            core.emit(GuesserEvent::StateChanged { paused });
        }
    }
}

/// Fire-and-forget transfer of playback to the freshly bound device. A
/// failure here (network, 404 "no active device") is non-fatal: the device
/// stays bound and later explicit play commands retry activation as part
/// of their own request.
fn spawn_transfer_playback(core: Arc<SessionCore>, api: Arc<SpotifyApi>, device_id: String) {
    tokio::spawn(async move {
        let Some(token) = core.token() else {
            warn!("No token available for playback transfer");
            return;
        };
        match api
            .send_command(&token, &device_id, PlayerCommand::TransferPlayback { play: true })
            .await
        {
            Ok(()) => debug!(device_id, "Playback transferred"),
            Err(e) if e.is_auth_expired() => {
                core.clear_auth().await;
            }
            Err(e) => {
                warn!(error = %e, "Playback transfer failed (non-fatal)");
                core.emit(GuesserEvent::PlaybackTransferFailed {
                    message: e.to_string(),
                });
            }
        }
    });
}
