use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::GuesserError;
use crate::settings::SETTINGS;
use crate::state::TokenSource;
use crate::store::TokenStore;

/// Scopes the session needs: playlist read, streaming, playback state
/// read/modify.
pub const REQUIRED_SCOPES: &str =
    "playlist-read-private streaming user-read-playback-state user-modify-playback-state";

/// Application identity for the implicit-grant flow. `redirect_uri` must
/// match the identity provider's registered value byte-for-byte, trailing
/// slash included.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub player_name: String,
    pub initial_volume: f32,
}

impl SessionConfig {
    pub fn new(client_id: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            player_name: "Song Guesser".to_string(),
            initial_volume: 0.5,
        }
    }
}

/// What startup decided.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Authenticated {
        token: String,
        source: TokenSource,
        /// Present when a token was consumed from the fragment: the URL the
        /// host should put in the address bar (history replace, no
        /// navigation).
        cleaned_url: Option<String>,
    },
    /// No token anywhere; the host must navigate the page to this URL.
    RedirectRequired { authorize_url: String },
}

/// Startup decision logic: consume a redirect fragment, resume from the
/// store, or demand a redirect to the authorize endpoint.
pub struct AuthFlow {
    config: SessionConfig,
    store: Arc<TokenStore>,
    last_redirect: Mutex<Option<Instant>>,
}

impl AuthFlow {
    pub fn new(config: SessionConfig, store: Arc<TokenStore>) -> Self {
        Self {
            config,
            store,
            last_redirect: Mutex::new(None),
        }
    }

    /// Entry algorithm, run once per page load. Synchronous: the token is
    /// written to the store before this returns, so a later SDK token
    /// provider can never observe a half-initialized session.
    pub fn resume(&self, current_url: &str) -> Result<AuthOutcome, GuesserError> {
        if let Some(token) = self.consume_fragment_token(current_url) {
            info!("Access token consumed from redirect fragment");
            self.store.save(&token, None);
            return Ok(AuthOutcome::Authenticated {
                token,
                source: TokenSource::UrlFragment,
                cleaned_url: Some(strip_fragment(current_url)),
            });
        }

        if let Some(token) = self.store.load() {
            debug!("Resuming session with persisted token");
            return Ok(AuthOutcome::Authenticated {
                token,
                source: TokenSource::PersistedStore,
                cleaned_url: None,
            });
        }

        self.guard_redirect_rate();
        let authorize_url = self.authorize_url()?;
        info!("No token available, authorize redirect required");
        Ok(AuthOutcome::RedirectRequired { authorize_url })
    }

    /// Parse the redirect fragment and verify the state nonce when one was
    /// persisted. A denied or cancelled authorization redirects back with no
    /// fragment, which lands in the no-token branch of `resume`.
    fn consume_fragment_token(&self, current_url: &str) -> Option<String> {
        let fragment = current_url.split_once('#')?.1;
        let params: HashMap<String, String> = serde_urlencoded::from_str(fragment).ok()?;
        let token = params.get("access_token")?.clone();
        if token.is_empty() {
            return None;
        }

        if let Some(expected) = self.store.take_auth_state() {
            match params.get("state") {
                Some(got) if *got == expected => {}
                got => {
                    warn!(?got, "Authorize state nonce mismatch, discarding fragment token");
                    return None;
                }
            }
        } else {
            // Storage may have been cleared between redirect and return;
            // tolerate a missing nonce rather than locking the user out.
            debug!("No persisted authorize state nonce to verify");
        }

        Some(token)
    }

    /// Build the authorize endpoint URL with a fresh state nonce.
    pub fn authorize_url(&self) -> Result<String, GuesserError> {
        let nonce = Uuid::new_v4().to_string();
        self.store.save_auth_state(&nonce);

        let query = serde_urlencoded::to_string([
            ("client_id", self.config.client_id.as_str()),
            ("response_type", "token"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", REQUIRED_SCOPES),
            ("state", nonce.as_str()),
        ])?;
        Ok(format!("{}/authorize?{}", SETTINGS.accounts_base_url, query))
    }

    /// Repeated redirects in quick succession usually mean the provider is
    /// denying us in a loop. Preventing the loop is out of scope; flagging
    /// it loudly is not.
    fn guard_redirect_rate(&self) {
        if let Ok(mut last) = self.last_redirect.lock() {
            let now = Instant::now();
            if let Some(prev) = *last {
                if now.duration_since(prev) < SETTINGS.redirect_guard_window {
                    warn!(
                        "Authorize redirect requested twice within {:?}; possible redirect loop",
                        SETTINGS.redirect_guard_window
                    );
                }
            }
            *last = Some(now);
        }
    }
}

/// Drop the fragment from a URL, keeping path and query.
pub fn strip_fragment(url: &str) -> String {
    url.split('#').next().unwrap_or(url).to_string()
}
