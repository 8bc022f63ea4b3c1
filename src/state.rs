use std::sync::Arc;

use tokio::sync::{broadcast, watch, RwLock};
use tracing::debug;

use crate::events::GuesserEvent;
use crate::store::TokenStore;

/// Where the current token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Parsed out of the redirect fragment this startup.
    UrlFragment,
    /// Restored from a storage backend.
    PersistedStore,
}

/// Coarse lifecycle phase, observable through a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Authenticated,
    SdkLoading,
    Connecting,
    Connected,
    Offline,
}

/// Mutable device/connection state. `connected == true` always implies
/// `device_id` is present; the setters below are the only mutation paths.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub device_id: Option<String>,
    pub connected: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_device(&mut self, device_id: String) {
        self.device_id = Some(device_id);
        self.connected = true;
    }

    pub fn mark_offline(&mut self) {
        self.connected = false;
    }

    pub fn reset(&mut self) {
        self.device_id = None;
        self.connected = false;
    }
}

/// Shared core of a session: token store, device state, phase channel and
/// the event channel feeding the UI sink. The token and device id are owned
/// here exclusively; other components go through these methods instead of
/// mutating shared state directly.
pub(crate) struct SessionCore {
    pub(crate) store: Arc<TokenStore>,
    pub(crate) session: RwLock<SessionState>,
    pub(crate) phase_tx: watch::Sender<SessionPhase>,
    pub(crate) event_sender: broadcast::Sender<GuesserEvent>,
}

impl SessionCore {
    pub(crate) fn new(
        store: Arc<TokenStore>,
        phase_tx: watch::Sender<SessionPhase>,
        event_sender: broadcast::Sender<GuesserEvent>,
    ) -> Self {
        Self {
            store,
            session: RwLock::new(SessionState::new()),
            phase_tx,
            event_sender,
        }
    }

    pub(crate) fn emit(&self, event: GuesserEvent) {
        // A send error only means no UI sink is currently subscribed.
        let _ = self.event_sender.send(event);
    }

    pub(crate) fn set_phase(&self, phase: SessionPhase) {
        let _ = self.phase_tx.send_if_modified(|prev| {
            if *prev != phase {
                *prev = phase.clone();
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.store.load()
    }

    pub(crate) async fn device_id(&self) -> Option<String> {
        self.session.read().await.device_id.clone()
    }

    /// Persist the device id, then bind it to the session. Persistence
    /// completes before any caller issues the transfer-playback call.
    pub(crate) async fn bind_device(&self, device_id: String) {
        self.store.save_device_id(&device_id);
        self.session.write().await.bind_device(device_id);
        self.set_phase(SessionPhase::Connected);
    }

    pub(crate) async fn mark_offline(&self) {
        self.session.write().await.mark_offline();
        self.set_phase(SessionPhase::Offline);
    }

    /// The auth-expiry cascade: clear every backing store, drop device
    /// state and fall back to Unauthenticated. The next startup check will
    /// re-issue the authorize redirect.
    pub(crate) async fn clear_auth(&self) {
        debug!("Auth expired or reset, clearing session");
        self.store.clear();
        self.session.write().await.reset();
        self.set_phase(SessionPhase::Unauthenticated);
        self.emit(GuesserEvent::SessionCleared);
    }
}
