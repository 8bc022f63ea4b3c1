use song_guesser_rs::{MemoryBackend, StorageBackend, TokenStore, DEVICE_KEY, TOKEN_KEY};

/// Backend that always refuses writes and holds nothing, standing in for a
/// storage API blocked by a restrictive environment.
struct UnavailableBackend;

impl StorageBackend for UnavailableBackend {
    fn label(&self) -> &'static str {
        "unavailable"
    }
    fn get(&self, _key: &str) -> Option<String> {
        None
    }
    fn set(&self, _key: &str, _value: &str) -> bool {
        false
    }
    fn remove(&self, _key: &str) {}
}

#[test]
fn test_save_writes_to_every_backend() {
    let primary = MemoryBackend::new();
    let secondary = MemoryBackend::new();
    // TokenStore takes ownership, so probe through fresh handles below.
    let store = TokenStore::new(vec![Box::new(primary), Box::new(secondary)]);

    store.save("tok_abc", Some("dev_1"));
    assert_eq!(store.load().as_deref(), Some("tok_abc"));
    assert_eq!(store.device_id().as_deref(), Some("dev_1"));
}

#[test]
fn test_load_falls_back_to_secondary_backend() {
    let primary = MemoryBackend::new();
    let secondary = MemoryBackend::new();
    secondary.set(TOKEN_KEY, "tok_from_secondary");
    secondary.set(DEVICE_KEY, "dev_from_secondary");

    // Primary has nothing (as if the environment cleared it).
    let store = TokenStore::new(vec![Box::new(primary), Box::new(secondary)]);
    assert_eq!(store.load().as_deref(), Some("tok_from_secondary"));
    assert_eq!(store.device_id().as_deref(), Some("dev_from_secondary"));
}

#[test]
fn test_primary_backend_takes_priority() {
    let primary = MemoryBackend::new();
    let secondary = MemoryBackend::new();
    primary.set(TOKEN_KEY, "tok_primary");
    secondary.set(TOKEN_KEY, "tok_secondary");

    let store = TokenStore::new(vec![Box::new(primary), Box::new(secondary)]);
    assert_eq!(store.load().as_deref(), Some("tok_primary"));
}

#[test]
fn test_unavailable_backend_falls_back_to_process_memory() {
    // All durable stores refuse writes; the token must still survive
    // within this process lifetime.
    let store = TokenStore::new(vec![Box::new(UnavailableBackend)]);
    store.save("tok_memory_only", None);
    assert_eq!(store.load().as_deref(), Some("tok_memory_only"));
}

#[test]
fn test_clear_removes_from_every_backend() {
    let store = TokenStore::new(vec![
        Box::new(MemoryBackend::new()),
        Box::new(MemoryBackend::new()),
    ]);
    store.save("tok_abc", Some("dev_1"));
    store.clear();

    assert!(store.load().is_none());
    assert!(store.device_id().is_none());
}

#[test]
fn test_load_on_empty_store_is_none() {
    let store = TokenStore::in_memory();
    assert!(store.load().is_none());
    assert!(store.device_id().is_none());
}

#[test]
fn test_auth_state_nonce_is_single_use() {
    let store = TokenStore::in_memory();
    store.save_auth_state("nonce-1");
    assert_eq!(store.take_auth_state().as_deref(), Some("nonce-1"));
    assert!(store.take_auth_state().is_none());
}
