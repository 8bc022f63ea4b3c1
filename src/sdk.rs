use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::GuesserError;
use crate::settings::SETTINGS;

/// Lifecycle of the external playback SDK script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkState {
    NotLoaded,
    Loading,
    Ready,
    Unavailable(String),
}

/// Host-environment seam for script loading. The host reports whether the
/// SDK global is already present and performs the actual script injection;
/// it later fires the hook from the SDK's documented global readiness
/// callback (or reports a load failure).
pub trait ScriptHost: Send + Sync {
    fn sdk_present(&self) -> bool;
    fn inject_script(&self, url: &str, hook: SdkReadyHook);
}

/// Handle the host fires when the SDK runtime announces readiness. The hook
/// must be installed before the script finishes loading; `SdkLoader` hands
/// it to the host together with the injection request.
#[derive(Clone)]
pub struct SdkReadyHook {
    state_tx: Arc<watch::Sender<SdkState>>,
}

impl SdkReadyHook {
    /// The SDK's readiness callback. Effective at most once per process
    /// lifetime; later invocations are ignored.
    pub fn notify_ready(&self) {
        let changed = self.state_tx.send_if_modified(|state| match state {
            SdkState::Ready | SdkState::Unavailable(_) => false,
            _ => {
                *state = SdkState::Ready;
                true
            }
        });
        if changed {
            info!("Playback SDK ready");
        } else {
            debug!("Duplicate SDK readiness notification ignored");
        }
    }

    /// Script load failure. Surfaces as a distinct status instead of
    /// hanging waiters forever.
    pub fn notify_failed(&self, message: &str) {
        let changed = self.state_tx.send_if_modified(|state| match state {
            SdkState::Ready | SdkState::Unavailable(_) => false,
            _ => {
                *state = SdkState::Unavailable(message.to_string());
                true
            }
        });
        if changed {
            warn!(message, "Playback SDK failed to load");
        }
    }
}

/// Ensures the SDK script is requested exactly once and exposes readiness
/// as a single-shot, observable transition. Readiness is controlled by the
/// external SDK and may arrive an arbitrary time after injection, or never.
pub struct SdkLoader {
    state_tx: Arc<watch::Sender<SdkState>>,
    injected: AtomicBool,
}

impl Default for SdkLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SdkLoader {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SdkState::NotLoaded);
        Self {
            state_tx: Arc::new(state_tx),
            injected: AtomicBool::new(false),
        }
    }

    pub fn hook(&self) -> SdkReadyHook {
        SdkReadyHook {
            state_tx: self.state_tx.clone(),
        }
    }

    pub fn state(&self) -> SdkState {
        self.state_tx.borrow().clone()
    }

    /// Idempotent load request. If the SDK global is already present the
    /// state flips to Ready synchronously, in the same turn; otherwise the
    /// script is injected at most once no matter how many callers race
    /// here. A second call while the first load is pending injects nothing.
    pub fn ensure_ready(&self, host: &dyn ScriptHost) {
        if host.sdk_present() {
            debug!("SDK global already present, skipping script injection");
            self.hook().notify_ready();
            return;
        }

        if self.injected.swap(true, Ordering::SeqCst) {
            debug!("SDK script already requested, not injecting again");
            return;
        }

        let _ = self.state_tx.send_if_modified(|state| {
            if *state == SdkState::NotLoaded {
                *state = SdkState::Loading;
                true
            } else {
                false
            }
        });
        info!(url = %SETTINGS.sdk_script_url, "Injecting playback SDK script");
        host.inject_script(&SETTINGS.sdk_script_url, self.hook());
    }

    /// Wait for the single-shot readiness transition. Any number of
    /// components may await this; none of them re-registers its own hook.
    pub async fn wait_ready(&self) -> Result<(), GuesserError> {
        let mut rx = self.state_tx.subscribe();
        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                SdkState::Ready => return Ok(()),
                SdkState::Unavailable(message) => {
                    return Err(GuesserError::SdkUnavailable(message))
                }
                SdkState::NotLoaded | SdkState::Loading => {}
            }
            if rx.changed().await.is_err() {
                return Err(GuesserError::SdkUnavailable(
                    "SDK loader dropped before readiness".to_string(),
                ));
            }
        }
    }
}
