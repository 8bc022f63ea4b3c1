use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, warn};

/// Storage key for the bearer access token.
pub const TOKEN_KEY: &str = "sg_access_token";
/// Storage key for the last-known playback device id.
pub const DEVICE_KEY: &str = "sg_device_id";
/// Storage key for the authorize-state nonce, removed once consumed.
pub const AUTH_STATE_KEY: &str = "sg_auth_state";

/// A single key-value backend (e.g. a bridge to a page-persistent store).
///
/// `set` returns false when the backend is unavailable; the store treats
/// that as a no-op rather than an error, since a restrictive environment
/// clearing one backend must not take the whole session down.
pub trait StorageBackend: Send + Sync {
    fn label(&self) -> &'static str;
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> bool;
    fn remove(&self, key: &str);
}

/// In-process backend. Used as a stand-in for session-scoped page storage
/// and as the default backend in tests.
#[derive(Default)]
pub struct MemoryBackend {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn label(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.map.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        match self.map.lock() {
            Ok(mut map) => {
                map.insert(key.to_string(), value.to_string());
                true
            }
            Err(_) => false,
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut map) = self.map.lock() {
            map.remove(key);
        }
    }
}

/// Single source of truth for the token and device id.
///
/// Writes go to every configured backend so that an environment clearing
/// one store still finds the value in another; reads fall back through the
/// backends in priority order and finally to an in-process copy held since
/// the last redirect. All failures are no-ops: callers may only assume
/// persistence within a single process lifetime.
pub struct TokenStore {
    backends: Vec<Box<dyn StorageBackend>>,
    // In-process fallback, keyed like the backends.
    fallback: Mutex<HashMap<String, String>>,
}

impl TokenStore {
    pub fn new(backends: Vec<Box<dyn StorageBackend>>) -> Self {
        Self {
            backends,
            fallback: Mutex::new(HashMap::new()),
        }
    }

    /// Store with a single in-process backend. Suitable for tests and
    /// headless use.
    pub fn in_memory() -> Self {
        Self::new(vec![Box::new(MemoryBackend::new())])
    }

    /// Persist the token, and optionally the device id, to every backend.
    pub fn save(&self, token: &str, device_id: Option<&str>) {
        self.put(TOKEN_KEY, token);
        if let Some(device_id) = device_id {
            self.put(DEVICE_KEY, device_id);
        }
    }

    /// Read the token, trying backends in priority order, then the
    /// in-process fallback.
    pub fn load(&self) -> Option<String> {
        self.get(TOKEN_KEY)
    }

    pub fn save_device_id(&self, device_id: &str) {
        self.put(DEVICE_KEY, device_id);
    }

    pub fn device_id(&self) -> Option<String> {
        self.get(DEVICE_KEY)
    }

    pub fn save_auth_state(&self, nonce: &str) {
        self.put(AUTH_STATE_KEY, nonce);
    }

    /// Read and remove the authorize-state nonce.
    pub fn take_auth_state(&self) -> Option<String> {
        let nonce = self.get(AUTH_STATE_KEY);
        self.delete(AUTH_STATE_KEY);
        nonce
    }

    /// Remove token and device id from every backend. Called on detected
    /// session expiry or explicit reset.
    pub fn clear(&self) {
        debug!("Clearing token store");
        self.delete(TOKEN_KEY);
        self.delete(DEVICE_KEY);
        self.delete(AUTH_STATE_KEY);
    }

    fn put(&self, key: &str, value: &str) {
        for backend in &self.backends {
            if !backend.set(key, value) {
                warn!(backend = backend.label(), key, "Storage write failed, continuing");
            }
        }
        if let Ok(mut fallback) = self.fallback.lock() {
            fallback.insert(key.to_string(), value.to_string());
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        for backend in &self.backends {
            if let Some(value) = backend.get(key) {
                return Some(value);
            }
        }
        self.fallback.lock().ok()?.get(key).cloned()
    }

    fn delete(&self, key: &str) {
        for backend in &self.backends {
            backend.remove(key);
        }
        if let Ok(mut fallback) = self.fallback.lock() {
            fallback.remove(key);
        }
    }
}
