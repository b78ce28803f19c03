use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use polly_session::dispatch::{ANALYZING, CONNECTION_LOST, PROCESSING_AUDIO};
use polly_session::{
    AudioCapture, CaptureError, ChatRole, Config, ConnectionState, FrameSource, MediaScheduler,
    Session, SessionError, SessionHandle, SessionState,
};

type Server = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    (listener, url)
}

fn config(url: &str) -> Config {
    Config::builder()
        .with_ws_url(url)
        .with_reconnect_delay(Duration::from_millis(100))
        .with_frame_interval(Duration::from_millis(50))
        .build()
}

/// Accepts one client and returns the socket with the request path it used.
async fn accept(listener: &TcpListener) -> (Server, String) {
    let (stream, _) = timeout(WAIT, listener.accept())
        .await
        .expect("no client connected")
        .unwrap();
    let mut path = String::new();
    let socket = tokio_tungstenite::accept_hdr_async(
        stream,
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            path = request.uri().path().to_string();
            Ok(response)
        },
    )
    .await
    .unwrap();
    (socket, path)
}

async fn wait_for<F>(session: &SessionHandle, predicate: F) -> SessionState
where
    F: Fn(&SessionState) -> bool,
{
    let mut state = session.state();
    let snapshot = timeout(WAIT, state.wait_for(|s| predicate(s)))
        .await
        .expect("state never matched")
        .expect("session dropped");
    snapshot.clone()
}

async fn next_json(server: &mut Server) -> Value {
    loop {
        let message = timeout(WAIT, server.next())
            .await
            .expect("no message from client")
            .expect("client went away")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_json(server: &mut Server, value: Value) {
    server.send(Message::Text(value.to_string())).await.unwrap();
}

async fn open(media: MediaScheduler) -> (TcpListener, SessionHandle, Server, String) {
    let (listener, url) = listen().await;
    let session = polly_session::connect_with_config(config(&url), media)
        .await
        .unwrap();
    let (server, path) = accept(&listener).await;
    wait_for(&session, |s| s.connected).await;
    (listener, session, server, path)
}

struct FakeCamera {
    captures: Arc<AtomicUsize>,
}

impl FrameSource for FakeCamera {
    fn capture(&mut self) -> Option<String> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        Some("data:image/jpeg;base64,/9j/4AAQ".to_string())
    }

    fn release(&mut self) {}
}

struct FakeMicrophone {
    muted: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
}

impl AudioCapture for FakeMicrophone {
    fn start(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<String, CaptureError> {
        Ok("data:audio/wav;base64,UklGRg==".to_string())
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

struct DeniedMicrophone;

impl AudioCapture for DeniedMicrophone {
    fn start(&mut self) -> Result<(), CaptureError> {
        Err(CaptureError::Denied)
    }

    fn stop(&mut self) -> Result<String, CaptureError> {
        Err(CaptureError::Denied)
    }

    fn set_muted(&mut self, _muted: bool) {}

    fn release(&mut self) {}
}

#[tokio::test]
async fn test_connect_welcome_and_topic() {
    let (_listener, session, mut server, path) = open(MediaScheduler::disabled()).await;

    assert_eq!(path, format!("/ws/{}", session.identity()));
    assert!(session.identity().as_str().starts_with("user-"));
    assert_eq!(session.connection_state(), ConnectionState::Connected);

    let state = session.snapshot();
    assert!(state.error.is_none());
    assert_eq!(state.chat.len(), 1);
    assert_eq!(state.chat[0].role, ChatRole::System);

    send_json(
        &mut server,
        json!({
            "type": "topic_assigned",
            "topic": {"id": 3, "topic": "Describe your favourite place", "category": "descriptive", "difficulty": "easy"}
        }),
    )
    .await;

    let state = wait_for(&session, |s| s.topic.is_some()).await;
    assert_eq!(state.topic.unwrap().text(), "Describe your favourite place");
    let last = state.chat.last().unwrap();
    assert_eq!(last.role, ChatRole::System);
    assert_eq!(last.content, "New topic: Describe your favourite place (descriptive, easy)");
}

#[tokio::test]
async fn test_chat_round_trip() {
    let (_listener, session, mut server, _) = open(MediaScheduler::disabled()).await;

    session.send_chat("  How did I do?  ").await.unwrap();
    assert_eq!(next_json(&mut server).await, json!({"type": "chat", "message": "How did I do?"}));

    let state = session.snapshot();
    let last = state.last_entry().unwrap();
    assert_eq!(last.role, ChatRole::User);
    assert_eq!(last.content, "How did I do?");

    send_json(&mut server, json!({"type": "chat_response", "message": "Slow down a little."})).await;
    send_json(&mut server, json!({"type": "gpt_response", "message": "And smile more."})).await;

    let state = wait_for(&session, |s| s.chat.len() == 4).await;
    assert_eq!(state.chat[2].role, ChatRole::Assistant);
    assert_eq!(state.chat[2].content, "Slow down a little.");
    assert_eq!(state.chat[3].content, "And smile more.");

    assert!(matches!(session.send_chat("   ").await, Err(SessionError::EmptyMessage)));
    assert_eq!(session.stats().commands_sent(), 1);
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let (_listener, session, mut server, _) = open(MediaScheduler::disabled()).await;

    server.send(Message::Text("not json".to_string())).await.unwrap();
    send_json(&mut server, json!({"no": "type"})).await;
    send_json(&mut server, json!({"type": "mystery"})).await;
    send_json(
        &mut server,
        json!({
            "type": "emotion_update",
            "data": {"dominant_emotion": "happy", "confidence": 0.92, "face_detected": true},
            "frame_number": 4
        }),
    )
    .await;

    let state = wait_for(&session, |s| s.emotion.is_some()).await;
    assert!(state.connected);
    assert!(state.error.is_none());
    assert_eq!(state.emotion.unwrap().dominant_emotion(), Some("happy"));
    assert_eq!(session.stats().dropped_inbound(), 3);
}

#[tokio::test]
async fn test_server_error_is_surfaced() {
    let (_listener, session, mut server, _) = open(MediaScheduler::disabled()).await;

    send_json(&mut server, json!({"type": "error", "message": "Emotion model unavailable"})).await;

    let state = wait_for(&session, |s| s.error.is_some()).await;
    assert_eq!(state.error.as_deref(), Some("Emotion model unavailable"));
    assert!(state.connected);
}

#[tokio::test]
async fn test_abnormal_drop_reconnects() {
    let (listener, session, server, first_path) = open(MediaScheduler::disabled()).await;

    drop(server);

    let state = wait_for(&session, |s| !s.connected).await;
    assert_eq!(state.error.as_deref(), Some(CONNECTION_LOST));

    let (_server, second_path) = accept(&listener).await;
    assert_eq!(second_path, first_path);

    let state = wait_for(&session, |s| s.connected).await;
    assert!(state.error.is_none());
    assert_eq!(session.stats().reconnects(), 1);
}

#[tokio::test]
async fn test_abnormal_close_code_reconnects() {
    let (listener, session, mut server, _) = open(MediaScheduler::disabled()).await;

    server
        .close(Some(CloseFrame {
            code: CloseCode::Error,
            reason: "backend crashed".into(),
        }))
        .await
        .unwrap();

    let state = wait_for(&session, |s| !s.connected).await;
    assert_eq!(state.error.as_deref(), Some(CONNECTION_LOST));

    let _server = accept(&listener).await;
    wait_for(&session, |s| s.connected).await;
}

#[tokio::test]
async fn test_normal_close_does_not_reconnect() {
    let (listener, session, mut server, _) = open(MediaScheduler::disabled()).await;

    server
        .close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "session over".into(),
        }))
        .await
        .unwrap();

    let state = wait_for(&session, |s| !s.connected).await;
    assert!(state.error.is_none());

    // The client answers the close handshake before hanging up.
    let reply = timeout(WAIT, server.next()).await.unwrap();
    assert!(matches!(reply, Some(Ok(Message::Close(_)))));

    assert!(timeout(Duration::from_millis(500), listener.accept()).await.is_err());
    assert_eq!(session.stats().reconnects(), 0);
}

#[tokio::test]
async fn test_shutdown_closes_cleanly() {
    let released = Arc::new(AtomicBool::new(false));
    let microphone = FakeMicrophone {
        muted: Arc::new(AtomicBool::new(false)),
        released: released.clone(),
    };
    let media = MediaScheduler::new(polly_session::NoCamera, microphone);
    let (listener, session, mut server, _) = open(media).await;

    session.shutdown().await.unwrap();

    let message = timeout(WAIT, server.next()).await.unwrap().unwrap().unwrap();
    match message {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Normal),
        other => panic!("expected a close frame, got {:?}", other),
    }

    assert!(released.load(Ordering::SeqCst));
    let state = session.snapshot();
    assert!(!state.connected);
    assert!(state.error.is_none());
    assert!(timeout(Duration::from_millis(500), listener.accept()).await.is_err());
    assert!(matches!(session.send_chat("hello").await, Err(SessionError::Closed)));
}

#[tokio::test]
async fn test_unreachable_server_is_not_retried() {
    let (listener, url) = listen().await;
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let session = polly_session::connect_with_config(config(&url), MediaScheduler::disabled())
        .await
        .unwrap();
    let state = wait_for(&session, |s| s.error.is_some()).await;
    assert!(!state.connected);
    assert!(state.error.unwrap().starts_with("Unable to reach the coaching server"));

    let listener = TcpListener::bind(addr).await.unwrap();
    assert!(timeout(Duration::from_millis(600), listener.accept()).await.is_err());
    assert_eq!(session.stats().reconnects(), 0);
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);

    // An explicit connect dials again.
    session.connect().await.unwrap();
    let _server = accept(&listener).await;
    wait_for(&session, |s| s.connected).await;
}

#[tokio::test]
async fn test_failed_reconnect_keeps_retrying() {
    let (listener, session, server, _) = open(MediaScheduler::disabled()).await;
    let addr = listener.local_addr().unwrap();
    drop(listener);
    drop(server);

    wait_for(&session, |s| {
        s.error
            .as_deref()
            .is_some_and(|error| error.starts_with("Unable to reach the coaching server"))
    })
    .await;

    let listener = TcpListener::bind(addr).await.unwrap();
    let _server = accept(&listener).await;
    let state = wait_for(&session, |s| s.connected).await;
    assert!(state.error.is_none());
    assert!(session.stats().reconnects() >= 2);
}

#[tokio::test]
async fn test_shutdown_cancels_pending_reconnect() {
    let (listener, url) = listen().await;
    let config = Config::builder()
        .with_ws_url(&url)
        .with_reconnect_delay(Duration::from_millis(300))
        .build();
    let session = polly_session::connect_with_config(config, MediaScheduler::disabled())
        .await
        .unwrap();
    let (server, _) = accept(&listener).await;
    wait_for(&session, |s| s.connected).await;

    drop(server);
    wait_for(&session, |s| !s.connected).await;
    session.shutdown().await.unwrap();

    assert!(timeout(Duration::from_millis(800), listener.accept()).await.is_err());
    assert_eq!(session.stats().reconnects(), 0);
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let (listener, url) = listen().await;
    let session = Session::spawn(config(&url), MediaScheduler::disabled());

    // Second call lands while the first dial is still in flight.
    session.connect().await.unwrap();
    session.connect().await.unwrap();
    let (_server, _) = accept(&listener).await;
    wait_for(&session, |s| s.connected).await;

    session.connect().await.unwrap();
    assert!(timeout(Duration::from_millis(300), listener.accept()).await.is_err());
    assert_eq!(session.connection_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_connection_lost_mid_recording_discards_clip() {
    let microphone = FakeMicrophone {
        muted: Arc::new(AtomicBool::new(false)),
        released: Arc::new(AtomicBool::new(false)),
    };
    let media = MediaScheduler::new(polly_session::NoCamera, microphone);
    let (listener, session, mut server, _) = open(media).await;

    session.start_recording().await.unwrap();
    assert_eq!(next_json(&mut server).await, json!({"type": "start_recording"}));
    drop(server);

    let state = wait_for(&session, |s| !s.connected).await;
    assert!(!state.recording);
    assert!(matches!(session.stop_recording().await, Err(SessionError::NotRecording)));

    let (mut server, _) = accept(&listener).await;
    wait_for(&session, |s| s.connected).await;
    session.send_chat("still there?").await.unwrap();
    // Nothing from the lost clip reaches the new connection.
    assert_eq!(next_json(&mut server).await, json!({"type": "chat", "message": "still there?"}));
}

#[tokio::test]
async fn test_invalid_endpoint_is_not_retried() {
    let config = Config::builder().with_origin("file:///tmp/index.html").build();
    let result = polly_session::connect_with_config(config, MediaScheduler::disabled()).await;
    assert!(matches!(result, Err(SessionError::InvalidEndpoint(_))));
}

#[tokio::test]
async fn test_recording_flow() {
    let muted = Arc::new(AtomicBool::new(false));
    let microphone = FakeMicrophone {
        muted: muted.clone(),
        released: Arc::new(AtomicBool::new(false)),
    };
    let media = MediaScheduler::new(polly_session::NoCamera, microphone);
    let (_listener, session, mut server, _) = open(media).await;

    assert!(matches!(session.stop_recording().await, Err(SessionError::NotRecording)));

    session.start_recording().await.unwrap();
    assert_eq!(next_json(&mut server).await, json!({"type": "start_recording"}));
    assert!(session.snapshot().recording);
    assert!(matches!(session.start_recording().await, Err(SessionError::AlreadyRecording)));

    session.set_muted(true).await.unwrap();
    wait_for(&session, |s| s.muted).await;
    assert!(muted.load(Ordering::SeqCst));

    session.stop_recording().await.unwrap();
    assert_eq!(next_json(&mut server).await, json!({"type": "stop_recording"}));
    assert_eq!(
        next_json(&mut server).await,
        json!({"type": "audio_complete", "data": "data:audio/wav;base64,UklGRg=="})
    );

    let state = session.snapshot();
    assert!(!state.recording);
    assert_eq!(state.last_entry().unwrap().content, PROCESSING_AUDIO);

    send_json(&mut server, json!({"type": "recording_stopped"})).await;
    let state = wait_for(&session, |s| s.processing).await;
    assert_eq!(state.last_entry().unwrap().content, ANALYZING);

    send_json(&mut server, json!({"type": "transcription_complete", "transcript": "I love the sea"})).await;
    send_json(
        &mut server,
        json!({"type": "analysis_complete", "results": {"feedback": "Great pace.", "wpm": 140}}),
    )
    .await;

    let state = wait_for(&session, |s| !s.processing).await;
    assert!(state.chat.iter().all(|entry| entry.content != PROCESSING_AUDIO));
    assert!(state
        .chat
        .iter()
        .any(|entry| entry.role == ChatRole::User && entry.content == "I love the sea"));
    let last = state.last_entry().unwrap();
    assert_eq!(last.role, ChatRole::Assistant);
    assert_eq!(last.content, "Great pace.");
}

#[tokio::test]
async fn test_recording_requires_connection_and_device() {
    let handle = Session::spawn(Config::new(), MediaScheduler::disabled());
    assert!(matches!(handle.start_recording().await, Err(SessionError::NotConnected)));
    assert!(matches!(handle.request_new_topic().await, Err(SessionError::NotConnected)));

    let media = MediaScheduler::new(polly_session::NoCamera, DeniedMicrophone);
    let (_listener, session, _server, _) = open(media).await;

    assert!(matches!(
        session.start_recording().await,
        Err(SessionError::Capture(CaptureError::Denied))
    ));
    let state = session.snapshot();
    assert!(!state.recording);
    assert!(state.capture_error.is_some());
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_frames_only_while_connected() {
    let captures = Arc::new(AtomicUsize::new(0));
    let camera = FakeCamera {
        captures: captures.clone(),
    };
    let media = MediaScheduler::new(camera, polly_session::NoMicrophone);

    let (listener, url) = listen().await;
    let session = Session::spawn(config(&url), media);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(captures.load(Ordering::SeqCst), 0);
    assert_eq!(session.stats().frames_sent(), 0);
    assert!(session.stats().frames_skipped() > 0);

    session.connect().await.unwrap();
    let (mut server, _) = accept(&listener).await;

    let frame = next_json(&mut server).await;
    assert_eq!(frame["type"], "frame");
    assert_eq!(frame["data"], "data:image/jpeg;base64,/9j/4AAQ");
    assert!(frame["timestamp"].as_f64().unwrap() > 0.0);
    assert!(session.stats().frames_sent() >= 1);

    session.set_capture_enabled(false).await.unwrap();
    wait_for(&session, |s| !s.capture_enabled).await;
    let before = captures.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(captures.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn test_new_topic_request() {
    let (_listener, session, mut server, _) = open(MediaScheduler::disabled()).await;

    session.request_new_topic().await.unwrap();
    assert_eq!(next_json(&mut server).await, json!({"type": "request_new_topic"}));
}
