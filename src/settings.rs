use once_cell::sync::Lazy;
use std::{env, time::Duration};

/// Holds all tunables, read-once from ENV with fallbacks.
pub struct Settings {
    pub api_base_url: String,
    pub accounts_base_url: String,
    pub sdk_script_url: String,
    pub request_timeout: Duration,
    pub playlist_timeout: Duration,
    pub event_buffer_capacity: usize,
    pub redirect_guard_window: Duration,
}

impl Settings {
    fn from_env() -> Self {
        // optionally load .env
        let _ = dotenvy::dotenv();

        // helper to parse usize
        fn parse_usize(var: &str, default: usize) -> usize {
            env::var(var)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        // helper to parse seconds into Duration
        fn parse_secs(var: &str, default_secs: u64) -> Duration {
            env::var(var)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_secs(default_secs))
        }

        fn parse_string(var: &str, default: &str) -> String {
            env::var(var).unwrap_or_else(|_| default.to_string())
        }

        Settings {
            api_base_url: parse_string("API_BASE_URL", "https://api.spotify.com/v1"),
            accounts_base_url: parse_string("ACCOUNTS_BASE_URL", "https://accounts.spotify.com"),
            sdk_script_url: parse_string("SDK_SCRIPT_URL", "https://sdk.scdn.co/spotify-player.js"),
            request_timeout: parse_secs("REQUEST_TIMEOUT_SECS", 10),
            playlist_timeout: parse_secs("PLAYLIST_TIMEOUT_SECS", 12),
            event_buffer_capacity: parse_usize("EVENT_BUFFER_CAPACITY", 100),
            redirect_guard_window: parse_secs("REDIRECT_GUARD_WINDOW_SECS", 5),
        }
    }
}

/// Global settings instance
pub static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);
