mod api;
pub use api::{PlayerCommand, SpotifyApi};
mod auth;
pub use auth::{strip_fragment, AuthFlow, AuthOutcome, SessionConfig, REQUIRED_SCOPES};
mod error;
pub use error::GuesserError;
mod events;
pub use events::GuesserEvent;
mod game;
pub use game::{GameRound, RevealedTrack, RoundState};
mod models;
pub use models::{Album, Artist, PlaylistPage, PlaylistState, RawTrack, Track};
mod playback;
pub use playback::{
    PlaybackSession, PlayerFactory, PlayerOptions, PlayerSdk, SdkEvent, TokenProvider,
};
mod playlist;
pub use playlist::{extract_playlist_id, filter_playable, LoadedPlaylist, PlaylistLoader};
mod sdk;
pub use sdk::{ScriptHost, SdkLoader, SdkReadyHook, SdkState};
mod settings;
pub use settings::SETTINGS;
mod state;
pub use state::{SessionPhase, SessionState, TokenSource};
mod store;
pub use store::{MemoryBackend, StorageBackend, TokenStore, DEVICE_KEY, TOKEN_KEY};

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info, warn};

use crate::state::SessionCore;

/// Main client for a song-guessing session against the Spotify Web API.
/// It owns the token lifecycle (implicit-grant redirect, persistence,
/// expiry cascade), the playback SDK bootstrap, the device binding, and the
/// per-round game state; the host environment supplies the seams (storage
/// backends, script host, player factory) and renders the status events.
///
/// # Logging
///
/// This library uses the `tracing` crate for logging. To enable logs,
/// initialize a tracing subscriber in your application.
///
/// Example using `tracing_subscriber`:
/// ```no_run
/// use tracing::Level;
/// use tracing_subscriber::FmtSubscriber;
///
/// let subscriber = FmtSubscriber::builder()
///     .with_max_level(Level::DEBUG)
///     .finish();
///
/// tracing::subscriber::set_global_default(subscriber)
///     .expect("Failed to set tracing subscriber");
/// ```
pub struct GuesserClient {
    client: Arc<Client>,
    config: SessionConfig,
    core: Arc<SessionCore>,
    auth: AuthFlow,
    sdk: SdkLoader,
    api: Arc<SpotifyApi>,
    loader: PlaylistLoader,
    playback: RwLock<Option<PlaybackSession>>,
    game: RwLock<GameRound>,
    event_sender: broadcast::Sender<GuesserEvent>,
    phase_rx: watch::Receiver<SessionPhase>,
}

impl GuesserClient {
    /// Create a client with a single in-process storage backend. Hosts
    /// with page-persistent stores should use [`GuesserClient::with_store`].
    pub fn new(config: SessionConfig) -> Self {
        Self::with_store(config, TokenStore::in_memory())
    }

    /// Create a client on top of an explicit, priority-ordered set of
    /// storage backends.
    pub fn with_store(config: SessionConfig, store: TokenStore) -> Self {
        let client = Arc::new(
            Client::builder()
                .timeout(SETTINGS.request_timeout)
                .connect_timeout(SETTINGS.request_timeout)
                .build()
                .unwrap(),
        );
        let store = Arc::new(store);
        let (event_tx, _) = broadcast::channel(SETTINGS.event_buffer_capacity);
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Unauthenticated);
        let core = Arc::new(SessionCore::new(
            store.clone(),
            phase_tx,
            event_tx.clone(),
        ));
        let api = Arc::new(SpotifyApi::new(client.clone()));

        Self {
            client,
            auth: AuthFlow::new(config.clone(), store),
            config,
            core,
            sdk: SdkLoader::new(),
            loader: PlaylistLoader::new(api.clone()),
            api,
            playback: RwLock::new(None),
            game: RwLock::new(GameRound::new()),
            event_sender: event_tx,
            phase_rx,
        }
    }

    pub fn event_receiver(&self) -> broadcast::Receiver<GuesserEvent> {
        self.event_sender.subscribe()
    }

    /// Observe lifecycle phase transitions.
    pub fn phase_receiver(&self) -> watch::Receiver<SessionPhase> {
        self.phase_rx.clone()
    }

    pub fn current_phase(&self) -> SessionPhase {
        self.phase_rx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.core.token().is_some()
    }

    /// Startup check, run once per page load with the page's current URL.
    /// Synchronous by design: when a fragment token is consumed it is in
    /// the store before this returns, so the SDK token provider can never
    /// read a not-yet-written token.
    pub fn startup(&self, current_url: &str) -> Result<AuthOutcome, GuesserError> {
        let outcome = self.auth.resume(current_url)?;
        match &outcome {
            AuthOutcome::Authenticated { source, .. } => {
                self.core.set_phase(SessionPhase::Authenticated);
                self.core.emit(GuesserEvent::Authenticated { source: *source });
            }
            AuthOutcome::RedirectRequired { authorize_url } => {
                self.core.set_phase(SessionPhase::Unauthenticated);
                self.core.emit(GuesserEvent::AuthenticationRequired {
                    authorize_url: authorize_url.clone(),
                });
            }
        }
        Ok(outcome)
    }

    /// Bootstrap the playback SDK and connect a player. Waits for the
    /// SDK's external readiness signal, builds the player with a token
    /// provider that reads the store at call time, and performs the
    /// connect handshake. Returns the handshake's success flag.
    pub async fn start_player(
        &self,
        host: &dyn ScriptHost,
        factory: &dyn PlayerFactory,
    ) -> Result<bool, GuesserError> {
        if !self.is_authenticated() {
            return Err(GuesserError::NotAuthenticated);
        }
        if self.playback.read().await.is_some() {
            warn!("start_player called with a player already running, replacing it");
        }

        self.core.set_phase(SessionPhase::SdkLoading);
        self.sdk.ensure_ready(host);
        if let Err(e) = self.sdk.wait_ready().await {
            self.core.emit(GuesserEvent::SdkUnavailable {
                message: e.to_string(),
            });
            self.core.set_phase(SessionPhase::Authenticated);
            return Err(e);
        }
        self.core.emit(GuesserEvent::SdkReady);

        let store = self.core.store.clone();
        let get_token: TokenProvider = Arc::new(move || store.load());
        let options = PlayerOptions {
            name: self.config.player_name.clone(),
            volume: self.config.initial_volume.clamp(0.0, 1.0),
        };
        let (player, events) = factory.create(options, get_token);

        let session = PlaybackSession::start(self.core.clone(), self.api.clone(), player, events);
        let connected = session.connect().await?;

        let previous = self.playback.write().await.replace(session);
        if let Some(previous) = previous {
            previous.stop().await;
        }
        Ok(connected)
    }

    /// Load a playlist from a user-supplied reference. On success the
    /// previous playlist and round are replaced wholesale; on failure they
    /// are left intact.
    pub async fn load_playlist(&self, reference: &str) -> Result<usize, GuesserError> {
        let token = self.core.token().ok_or(GuesserError::NotAuthenticated)?;

        match self.loader.load(&token, reference).await {
            Ok(loaded) => {
                let count = loaded.tracks.len();
                if loaded.truncated {
                    self.core.emit(GuesserEvent::PlaylistTruncated {
                        fetched: count,
                        total: loaded.total,
                    });
                }
                self.core.emit(GuesserEvent::PlaylistLoaded {
                    playlist_id: loaded.playlist_id.clone(),
                    track_count: count,
                });
                self.game
                    .write()
                    .await
                    .replace_playlist(loaded.playlist_id, loaded.tracks);
                Ok(count)
            }
            Err(e) => {
                if e.is_auth_expired() {
                    self.core.clear_auth().await;
                }
                Err(e)
            }
        }
    }

    /// Start a new round: select a random track and issue the device
    /// activation + play command pair. Both calls are best-effort; their
    /// failures are reported as status events and never block the reveal.
    pub async fn play_random(&self) -> Result<Track, GuesserError> {
        let track = self
            .game
            .write()
            .await
            .select_random()
            .ok_or(GuesserError::EmptyPlaylist)?;
        self.core.emit(GuesserEvent::RoundStarted {
            track_id: track.id.clone(),
        });

        let Some(device_id) = self.core.device_id().await else {
            debug!("No playback device bound, round continues without audio");
            self.core.emit(GuesserEvent::DeviceNotReady);
            return Ok(track);
        };
        let Some(token) = self.core.token() else {
            self.core.emit(GuesserEvent::DeviceNotReady);
            return Ok(track);
        };

        let commands = [
            PlayerCommand::TransferPlayback { play: true },
            PlayerCommand::PlayTrack {
                track_id: track.id.clone(),
                position_ms: None,
            },
        ];
        for command in commands {
            if let Err(e) = self.api.send_command(&token, &device_id, command).await {
                if e.is_auth_expired() {
                    self.core.clear_auth().await;
                } else {
                    self.core.emit(GuesserEvent::PlaybackError {
                        message: e.to_string(),
                    });
                }
                break;
            }
        }

        Ok(track)
    }

    /// Reveal the current round's track metadata. Pure projection; no-op
    /// error when no track is selected.
    pub async fn reveal(&self) -> Result<RevealedTrack, GuesserError> {
        let revealed = self
            .game
            .write()
            .await
            .reveal()
            .ok_or(GuesserError::NoTrackSelected)?;
        self.core.emit(GuesserEvent::RoundRevealed(revealed.clone()));
        Ok(revealed)
    }

    pub async fn set_volume(&self, volume: f32) -> Result<(), GuesserError> {
        match &*self.playback.read().await {
            Some(session) => session.set_volume(volume).await,
            None => Err(GuesserError::DeviceNotReady),
        }
    }

    pub async fn toggle_play(&self) -> Result<(), GuesserError> {
        match &*self.playback.read().await {
            Some(session) => session.toggle_play().await,
            None => Err(GuesserError::DeviceNotReady),
        }
    }

    pub async fn device_id(&self) -> Option<String> {
        self.core.device_id().await
    }

    pub async fn current_track(&self) -> Option<Track> {
        self.game.read().await.current_track().cloned()
    }

    pub async fn track_count(&self) -> usize {
        self.game.read().await.track_count()
    }

    /// Explicit teardown: stop the player, drop the round and playlist,
    /// clear every token store. The next `startup` re-issues the authorize
    /// redirect.
    pub async fn reset(&self) {
        info!("Resetting session");
        if let Some(session) = self.playback.write().await.take() {
            session.stop().await;
        }
        self.game.write().await.clear();
        self.core.clear_auth().await;
    }

    /// Shared HTTP client, for hosts that want connection reuse.
    pub fn http_client(&self) -> Arc<Client> {
        self.client.clone()
    }
}

impl std::fmt::Debug for GuesserClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuesserClient")
            .field("client_id", &self.config.client_id)
            .field("redirect_uri", &self.config.redirect_uri)
            .field("phase", &self.current_phase())
            .finish()
    }
}
