use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use song_guesser_rs::{
    GuesserClient, GuesserError, GuesserEvent, PlayerFactory, PlayerOptions, PlayerSdk,
    ScriptHost, SdkEvent, SdkReadyHook, SessionConfig, SessionPhase, TokenProvider,
};

/// Point the remote API at an unroutable local port so player-control
/// calls fail fast instead of leaving the process.
fn isolate_remote_api() {
    std::env::set_var("API_BASE_URL", "http://127.0.0.1:9/v1");
}

fn config() -> SessionConfig {
    SessionConfig::new("test_client_id", "https://example.com/guesser/")
}

struct PresentHost;

impl ScriptHost for PresentHost {
    fn sdk_present(&self) -> bool {
        true
    }
    fn inject_script(&self, _url: &str, _hook: SdkReadyHook) {
        panic!("SDK already present, injection must not happen");
    }
}

struct FakePlayer {
    connect_result: bool,
}

impl PlayerSdk for FakePlayer {
    fn connect(&self) -> BoxFuture<'static, bool> {
        let result = self.connect_result;
        Box::pin(async move { result })
    }

    fn disconnect(&self) {}

    fn set_volume(&self, _volume: f32) -> BoxFuture<'static, Result<(), String>> {
        Box::pin(async { Ok(()) })
    }

    fn toggle_play(&self) -> BoxFuture<'static, Result<(), String>> {
        Box::pin(async { Err("no audio output".to_string()) })
    }
}

/// Factory that hands the test the SDK event sender and the captured token
/// provider.
struct FakeFactory {
    connect_result: bool,
    events_tx: Mutex<Option<mpsc::UnboundedSender<SdkEvent>>>,
    provider: Mutex<Option<TokenProvider>>,
}

impl FakeFactory {
    fn new(connect_result: bool) -> Self {
        Self {
            connect_result,
            events_tx: Mutex::new(None),
            provider: Mutex::new(None),
        }
    }

    fn send(&self, event: SdkEvent) {
        self.events_tx
            .lock()
            .unwrap()
            .as_ref()
            .expect("player not created yet")
            .send(event)
            .unwrap();
    }

    fn provider(&self) -> TokenProvider {
        self.provider
            .lock()
            .unwrap()
            .as_ref()
            .expect("player not created yet")
            .clone()
    }
}

impl PlayerFactory for FakeFactory {
    fn create(
        &self,
        _options: PlayerOptions,
        get_token: TokenProvider,
    ) -> (Box<dyn PlayerSdk>, mpsc::UnboundedReceiver<SdkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events_tx.lock().unwrap() = Some(tx);
        *self.provider.lock().unwrap() = Some(get_token);
        (
            Box::new(FakePlayer {
                connect_result: self.connect_result,
            }),
            rx,
        )
    }
}

async fn wait_for_event<F>(
    receiver: &mut broadcast::Receiver<GuesserEvent>,
    mut predicate: F,
) -> GuesserEvent
where
    F: FnMut(&GuesserEvent) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = receiver.recv().await.expect("event channel closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn connected_client(factory: &FakeFactory) -> GuesserClient {
    let client = GuesserClient::new(config());
    client
        .startup("https://example.com/guesser/#access_token=tok_1")
        .unwrap();
    let connected = client.start_player(&PresentHost, factory).await.unwrap();
    assert!(connected);
    client
}

#[tokio::test]
async fn test_connect_success_emits_connected() {
    isolate_remote_api();
    let factory = FakeFactory::new(true);
    let client = GuesserClient::new(config());
    client
        .startup("https://example.com/guesser/#access_token=tok_1")
        .unwrap();
    let mut events = client.event_receiver();

    let connected = client.start_player(&PresentHost, &factory).await.unwrap();
    assert!(connected);
    wait_for_event(&mut events, |e| matches!(e, GuesserEvent::Connected)).await;
    // No device bound yet: the handshake alone does not bind.
    assert!(client.device_id().await.is_none());
}

#[tokio::test]
async fn test_connect_failure_emits_disconnected_without_device() {
    isolate_remote_api();
    let factory = FakeFactory::new(false);
    let client = GuesserClient::new(config());
    client
        .startup("https://example.com/guesser/#access_token=tok_1")
        .unwrap();
    let mut events = client.event_receiver();

    let connected = client.start_player(&PresentHost, &factory).await.unwrap();
    assert!(!connected);
    wait_for_event(&mut events, |e| matches!(e, GuesserEvent::Disconnected)).await;
    assert!(client.device_id().await.is_none());
}

#[tokio::test]
async fn test_device_ready_persists_device_then_transfers() {
    isolate_remote_api();
    let factory = FakeFactory::new(true);
    let client = connected_client(&factory).await;
    let mut events = client.event_receiver();

    factory.send(SdkEvent::Ready {
        device_id: "dev_42".to_string(),
    });

    wait_for_event(&mut events, |e| {
        matches!(e, GuesserEvent::DeviceReady { device_id } if device_id == "dev_42")
    })
    .await;
    assert_eq!(client.device_id().await.as_deref(), Some("dev_42"));
    assert_eq!(client.current_phase(), SessionPhase::Connected);

    // The transfer call targets the isolated API and fails; that failure
    // is reported and must not unbind the device.
    wait_for_event(&mut events, |e| {
        matches!(e, GuesserEvent::PlaybackTransferFailed { .. })
    })
    .await;
    assert_eq!(client.device_id().await.as_deref(), Some("dev_42"));
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn test_device_offline_is_reported() {
    isolate_remote_api();
    let factory = FakeFactory::new(true);
    let client = connected_client(&factory).await;
    let mut events = client.event_receiver();

    factory.send(SdkEvent::Ready {
        device_id: "dev_42".to_string(),
    });
    wait_for_event(&mut events, |e| matches!(e, GuesserEvent::DeviceReady { .. })).await;

    factory.send(SdkEvent::NotReady {
        device_id: "dev_42".to_string(),
    });
    wait_for_event(&mut events, |e| {
        matches!(e, GuesserEvent::DeviceOffline { .. })
    })
    .await;
    assert_eq!(client.current_phase(), SessionPhase::Offline);
    // Token untouched; only auth errors cascade.
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn test_authentication_error_cascades_to_reauthorization() {
    isolate_remote_api();
    let factory = FakeFactory::new(true);
    let client = connected_client(&factory).await;
    let mut events = client.event_receiver();

    factory.send(SdkEvent::AuthenticationError {
        message: "invalid token".to_string(),
    });

    wait_for_event(&mut events, |e| matches!(e, GuesserEvent::SessionCleared)).await;
    assert!(!client.is_authenticated());
    assert_eq!(client.current_phase(), SessionPhase::Unauthenticated);
    assert!(client.device_id().await.is_none());
}

#[tokio::test]
async fn test_non_auth_errors_do_not_mutate_session() {
    isolate_remote_api();
    let factory = FakeFactory::new(true);
    let client = connected_client(&factory).await;
    let mut events = client.event_receiver();

    factory.send(SdkEvent::InitializationError {
        message: "EME not supported".to_string(),
    });
    factory.send(SdkEvent::AccountError {
        message: "premium required".to_string(),
    });
    factory.send(SdkEvent::PlaybackError {
        message: "track unavailable".to_string(),
    });

    wait_for_event(&mut events, |e| {
        matches!(e, GuesserEvent::PlaybackError { .. })
    })
    .await;
    assert!(client.is_authenticated());
    assert_eq!(client.current_phase(), SessionPhase::Connecting);
}

#[tokio::test]
async fn test_token_provider_reads_current_token() {
    isolate_remote_api();
    let factory = FakeFactory::new(true);
    let client = connected_client(&factory).await;

    let provider = factory.provider();
    assert_eq!(provider().as_deref(), Some("tok_1"));

    // Re-authentication replaces the token; the provider must observe the
    // new one without being rebuilt.
    client
        .startup("https://example.com/guesser/#access_token=tok_2")
        .unwrap();
    assert_eq!(provider().as_deref(), Some("tok_2"));
}

#[tokio::test]
async fn test_state_changes_pass_through() {
    isolate_remote_api();
    let factory = FakeFactory::new(true);
    let client = connected_client(&factory).await;
    let mut events = client.event_receiver();

    factory.send(SdkEvent::StateChanged { paused: true });
    let event = wait_for_event(&mut events, |e| {
        matches!(e, GuesserEvent::StateChanged { .. })
    })
    .await;
    match event {
        GuesserEvent::StateChanged { paused } => assert!(paused),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_play_random_without_playlist_is_reported() {
    isolate_remote_api();
    let client = GuesserClient::new(config());
    client
        .startup("https://example.com/guesser/#access_token=tok_1")
        .unwrap();

    match client.play_random().await {
        Err(GuesserError::EmptyPlaylist) => {}
        other => panic!("Expected EmptyPlaylist, got {:?}", other),
    }
}

#[tokio::test]
async fn test_reveal_without_selection_is_reported() {
    isolate_remote_api();
    let client = GuesserClient::new(config());
    match client.reveal().await {
        Err(GuesserError::NoTrackSelected) => {}
        other => panic!("Expected NoTrackSelected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_player_commands_without_player_fail_cleanly() {
    isolate_remote_api();
    let client = GuesserClient::new(config());
    assert!(matches!(
        client.set_volume(0.5).await,
        Err(GuesserError::DeviceNotReady)
    ));
    assert!(matches!(
        client.toggle_play().await,
        Err(GuesserError::DeviceNotReady)
    ));
}

#[tokio::test]
async fn test_toggle_play_failure_is_reported_not_fatal() {
    isolate_remote_api();
    let factory = FakeFactory::new(true);
    let client = connected_client(&factory).await;
    let mut events = client.event_receiver();

    // FakePlayer::toggle_play always fails.
    match client.toggle_play().await {
        Err(GuesserError::PlayerCommandFailed(message)) => {
            assert!(message.contains("no audio output"));
        }
        other => panic!("Expected PlayerCommandFailed, got {:?}", other),
    }
    wait_for_event(&mut events, |e| {
        matches!(e, GuesserEvent::PlaybackError { .. })
    })
    .await;
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn test_start_player_requires_authentication() {
    isolate_remote_api();
    let factory = FakeFactory::new(true);
    let client = GuesserClient::new(config());

    match client.start_player(&PresentHost, &factory).await {
        Err(GuesserError::NotAuthenticated) => {}
        other => panic!("Expected NotAuthenticated, got {:?}", other),
    }
}
