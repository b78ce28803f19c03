use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{MissedTickBehavior, Sleep};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::dispatch;
use crate::error::SessionError;
use crate::identity::SessionIdentity;
use crate::media::{MediaScheduler, Tick};
use crate::state::{SessionState, StateStore};
use crate::types::{self, ClientEvent};

pub mod config;
mod consts;
mod stats;
mod utils;

pub use config::{Config, ConfigBuilder, ConfigError};
pub use stats::Stats;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ConnectResult = Result<Socket, tungstenite::Error>;
type Reply = oneshot::Sender<Result<(), SessionError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

enum Intent {
    Request(Request),
    Shutdown { reply: oneshot::Sender<()> },
}

enum Request {
    Connect { reply: Reply },
    SendChat { text: String, reply: Reply },
    StartRecording { reply: Reply },
    StopRecording { reply: Reply },
    RequestNewTopic { reply: Reply },
    SetCaptureEnabled(bool),
    SetMuted(bool),
}

/// Who started the dial in flight. Only timer dials are retried on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dial {
    Consumer,
    Reconnect,
}

struct Link {
    writer: mpsc::Sender<Message>,
    reader: SplitStream<Socket>,
    write_handle: JoinHandle<()>,
}

/// One coaching session: owns the socket, the reconnect timer, the frame
/// tick and the capture devices. Driven from a single tokio task.
pub struct Session {
    config: Config,
    identity: SessionIdentity,
    store: StateStore,
    media: MediaScheduler,
    stats: Arc<Mutex<Stats>>,
    connection: watch::Sender<ConnectionState>,
    link: Option<Link>,
    pending: Option<JoinHandle<ConnectResult>>,
    dial: Dial,
    reconnect: Option<Pin<Box<Sleep>>>,
}

impl Session {
    /// Starts the session task. Nothing is dialled until [`SessionHandle::connect`].
    pub fn spawn(config: Config, media: MediaScheduler) -> SessionHandle {
        let identity = SessionIdentity::generate();
        let store = StateStore::new(SessionState {
            capture_enabled: media.capture_enabled(),
            ..SessionState::default()
        });
        let state = store.subscribe();
        let (connection, connection_rx) = watch::channel(ConnectionState::Disconnected);
        let stats = Arc::new(Mutex::new(Stats::default()));
        let (intents, intents_rx) = mpsc::channel(config.capacity());

        let session = Session {
            config,
            identity: identity.clone(),
            store,
            media,
            stats: stats.clone(),
            connection,
            link: None,
            pending: None,
            dial: Dial::Consumer,
            reconnect: None,
        };
        tokio::spawn(session.run(intents_rx));

        SessionHandle {
            identity,
            intents,
            state,
            connection: connection_rx,
            stats,
        }
    }

    async fn run(mut self, mut intents: mpsc::Receiver<Intent>) {
        let mut ticker = tokio::time::interval(self.config.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(Intent::Shutdown { reply }) => {
                        self.teardown().await;
                        let _ = reply.send(());
                        return;
                    }
                    Some(Intent::Request(request)) => self.on_request(request),
                    None => {
                        tracing::debug!("all session handles dropped");
                        self.teardown().await;
                        return;
                    }
                },
                result = wait_pending(&mut self.pending) => {
                    self.pending = None;
                    self.on_connect_result(result);
                }
                message = next_message(&mut self.link) => self.on_message(message),
                _ = wait_reconnect(&mut self.reconnect) => {
                    self.reconnect = None;
                    self.record(Stats::reconnect_attempted);
                    tracing::info!("reconnecting as {}", self.identity);
                    if self.connect(Dial::Reconnect).is_err() {
                        tracing::warn!("reconnect abandoned");
                    }
                }
                _ = ticker.tick() => self.on_tick(),
            }
        }
    }

    fn on_request(&mut self, request: Request) {
        match request {
            Request::Connect { reply } => {
                let _ = reply.send(self.connect(Dial::Consumer));
            }
            Request::SendChat { text, reply } => {
                let _ = reply.send(self.send_chat(&text));
            }
            Request::StartRecording { reply } => {
                let _ = reply.send(self.start_recording());
            }
            Request::StopRecording { reply } => {
                let _ = reply.send(self.stop_recording());
            }
            Request::RequestNewTopic { reply } => {
                let _ = reply.send(self.send_command(&ClientEvent::RequestNewTopic));
            }
            Request::SetCaptureEnabled(enabled) => {
                self.media.set_capture_enabled(enabled);
                self.store.update(|state| {
                    let changed = state.capture_enabled != enabled;
                    state.capture_enabled = enabled;
                    changed
                });
            }
            Request::SetMuted(muted) => {
                self.media.set_muted(muted);
                self.store.update(|state| {
                    let changed = state.muted != muted;
                    state.muted = muted;
                    changed
                });
            }
        }
    }

    fn connection(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    fn set_connection(&self, connection: ConnectionState) {
        self.connection.send_if_modified(|current| {
            let changed = *current != connection;
            *current = connection;
            changed
        });
    }

    fn record(&self, update: impl FnOnce(&mut Stats)) {
        match self.stats.lock() {
            Ok(mut stats) => update(&mut stats),
            Err(poisoned) => update(&mut poisoned.into_inner()),
        }
    }

    fn connect(&mut self, dial: Dial) -> Result<(), SessionError> {
        if self.connection() != ConnectionState::Disconnected {
            return Ok(());
        }
        self.reconnect = None;
        self.dial = dial;

        let request = match utils::build_request(&self.config, &self.identity) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("failed to build request: {}", e);
                let reason = e.to_string();
                self.store.update(|state| {
                    dispatch::on_connect_failed(state, &reason);
                    true
                });
                return Err(e);
            }
        };

        tracing::info!("connecting to {}", request.uri());
        self.set_connection(ConnectionState::Connecting);
        self.pending = Some(tokio::spawn(async move {
            tokio_tungstenite::connect_async(request)
                .await
                .map(|(socket, _)| socket)
        }));
        Ok(())
    }

    fn on_connect_result(&mut self, result: Result<ConnectResult, JoinError>) {
        let reason = match result {
            Ok(Ok(socket)) => return self.on_open(socket),
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };
        tracing::error!("failed to connect: {}", reason);
        self.set_connection(ConnectionState::Disconnected);
        self.store.update(|state| {
            dispatch::on_connect_failed(state, &reason);
            true
        });
        // A consumer dial that cannot reach the server is reported, not retried.
        if self.dial == Dial::Reconnect {
            self.schedule_reconnect();
        }
    }

    fn on_open(&mut self, socket: Socket) {
        let (mut write, reader) = socket.split();
        // Room for the stop_recording / audio_complete pair.
        let (writer, mut outbound) = mpsc::channel::<Message>(self.config.capacity().max(2));

        let write_handle = tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = write.send(message).await {
                    tracing::error!("failed to send message: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            // Flushes a close reply queued by the reader, if any.
            if let Err(e) = write.close().await {
                tracing::debug!("writer closed: {}", e);
            }
        });

        self.link = Some(Link {
            writer,
            reader,
            write_handle,
        });
        self.set_connection(ConnectionState::Connected);
        tracing::info!("connected as {}", self.identity);
        self.store.update(|state| {
            dispatch::on_open(state, self.config.welcome_message());
            true
        });
    }

    fn on_message(&mut self, message: Option<Result<Message, tungstenite::Error>>) {
        match message {
            Some(Ok(Message::Text(text))) => self.on_text(&text),
            Some(Ok(Message::Binary(bin))) => {
                tracing::warn!("unexpected binary message: {} bytes", bin.len());
                self.record(Stats::inbound_dropped);
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!("connection closed: {:?}", frame);
                let clean = matches!(&frame, Some(frame) if frame.code == CloseCode::Normal);
                self.on_closed(clean);
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::error!("failed to read message: {}", e);
                self.store.update(|state| {
                    dispatch::on_transport_error(state);
                    true
                });
                self.on_closed(false);
            }
            None => {
                tracing::warn!("connection ended without a close frame");
                self.on_closed(false);
            }
        }
    }

    fn on_text(&mut self, text: &str) {
        match types::decode(text) {
            Ok(event) => {
                tracing::debug!("received message: {}", event.kind());
                self.store
                    .update(|state| dispatch::dispatch(state, event).changed());
            }
            Err(e) => {
                tracing::warn!("dropping inbound message: {}", e);
                self.record(Stats::inbound_dropped);
            }
        }
    }

    fn on_closed(&mut self, clean: bool) {
        if let Some(link) = self.link.take() {
            let Link {
                writer,
                mut write_handle,
                ..
            } = link;
            drop(writer);
            tokio::spawn(async move {
                let timeout = Duration::from_millis(consts::CLOSE_TIMEOUT_MS);
                if tokio::time::timeout(timeout, &mut write_handle).await.is_err() {
                    write_handle.abort();
                }
            });
        }
        self.set_connection(ConnectionState::Disconnected);
        let abandoned = self.media.is_recording();
        if abandoned {
            tracing::warn!("connection closed mid-recording, discarding audio");
            let _ = self.media.stop_recording();
        }
        self.store.update(|state| {
            dispatch::on_close(state, clean);
            if abandoned {
                dispatch::on_recording(state, false);
            }
            true
        });
        if !clean {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        let delay = self.config.reconnect_delay();
        tracing::info!("reconnecting in {:?}", delay);
        self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
    }

    fn on_tick(&mut self) {
        let connected = self.connection() == ConnectionState::Connected;
        match self.media.on_tick(connected) {
            Tick::Frame(event) => self.send_frame(&event),
            Tick::Skipped => self.record(Stats::frame_skipped),
            Tick::NotReady => {}
        }
    }

    /// Frames are never queued behind a full channel; the next tick brings a fresher one.
    fn send_frame(&self, event: &ClientEvent) {
        let Some(link) = &self.link else {
            return;
        };
        let text = match types::encode(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("failed to encode frame: {}", e);
                return;
            }
        };
        match link.writer.try_send(Message::Text(text)) {
            Ok(()) => self.record(Stats::frame_sent),
            Err(e) => {
                tracing::warn!("dropping frame: {}", e);
                self.record(Stats::frame_skipped);
            }
        }
    }

    fn send_command(&self, event: &ClientEvent) -> Result<(), SessionError> {
        let Some(link) = &self.link else {
            return Err(SessionError::NotConnected);
        };
        let text = types::encode(event)?;
        link.writer
            .try_send(Message::Text(text))
            .map_err(send_error)?;
        tracing::debug!("sent {}", event.kind());
        self.record(Stats::command_sent);
        Ok(())
    }

    fn send_chat(&mut self, text: &str) -> Result<(), SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        self.send_command(&ClientEvent::chat(text))?;
        self.store.update(|state| {
            dispatch::on_user_chat(state, text);
            true
        });
        Ok(())
    }

    fn start_recording(&mut self) -> Result<(), SessionError> {
        if self.link.is_none() {
            return Err(SessionError::NotConnected);
        }
        if let Err(e) = self.media.start_recording() {
            self.report_capture(&e);
            return Err(e);
        }
        if let Err(e) = self.send_command(&ClientEvent::StartRecording) {
            let _ = self.media.stop_recording();
            return Err(e);
        }
        self.store.update(|state| {
            dispatch::on_recording(state, true);
            state.capture_error = None;
            true
        });
        Ok(())
    }

    /// Sends `stop_recording` followed by the single `audio_complete` payload.
    fn stop_recording(&mut self) -> Result<(), SessionError> {
        if !self.media.is_recording() {
            return Err(SessionError::NotRecording);
        }
        let Some(link) = &self.link else {
            return Err(SessionError::NotConnected);
        };
        let result = finish_recording(&mut self.media, &link.writer);
        if !self.media.is_recording() {
            self.store.update(|state| {
                dispatch::on_recording(state, false);
                true
            });
        }

        match result {
            Ok(()) => {
                self.record(Stats::command_sent);
                self.record(Stats::command_sent);
                self.store.update(|state| {
                    dispatch::on_audio_sent(state);
                    true
                });
                Ok(())
            }
            Err(e) => {
                if let SessionError::Capture(_) = e {
                    // stop_recording went out without a clip
                    self.record(Stats::command_sent);
                }
                self.report_capture(&e);
                Err(e)
            }
        }
    }

    fn report_capture(&self, error: &SessionError) {
        if let SessionError::Capture(e) = error {
            tracing::warn!("capture failed: {}", e);
            let message = e.to_string();
            self.store.update(|state| {
                dispatch::on_capture_error(state, &message);
                true
            });
        }
    }

    async fn teardown(&mut self) {
        self.reconnect = None;
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }

        if let Some(link) = self.link.take() {
            let Link {
                writer,
                mut reader,
                mut write_handle,
            } = link;
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "Session closed".into(),
            };
            if let Err(e) = writer.try_send(Message::Close(Some(frame))) {
                tracing::warn!("failed to queue close frame: {}", e);
            }
            drop(writer);

            let close = async {
                let _ = (&mut write_handle).await;
                while let Some(Ok(_)) = reader.next().await {}
            };
            let timeout = Duration::from_millis(consts::CLOSE_TIMEOUT_MS);
            if tokio::time::timeout(timeout, close).await.is_err() {
                tracing::warn!("close handshake timed out");
                write_handle.abort();
            }
        }

        self.media.release();
        self.set_connection(ConnectionState::Disconnected);
        self.store.update(|state| {
            dispatch::on_close(state, true);
            dispatch::on_recording(state, false);
            true
        });
        tracing::info!("session {} closed", self.identity);
    }
}

/// Finalizes the active recording into `stop_recording` plus `audio_complete`.
///
/// Both writer slots are reserved before the device is stopped. When they are
/// not available the recording stays active and the caller may try again.
/// A device failure still sends `stop_recording` so the backend leaves
/// recording mode.
fn finish_recording(media: &mut MediaScheduler, writer: &mpsc::Sender<Message>) -> Result<(), SessionError> {
    let stop = writer.try_reserve().map_err(send_error)?;
    let complete = writer.try_reserve().map_err(send_error)?;
    let stop_text = types::encode(&ClientEvent::StopRecording)?;

    let audio = media.stop_recording();
    stop.send(Message::Text(stop_text));
    let audio_text = types::encode(&audio?)?;
    complete.send(Message::Text(audio_text));
    tracing::debug!("sent stop_recording and audio_complete");
    Ok(())
}

fn send_error<T>(e: mpsc::error::TrySendError<T>) -> SessionError {
    match e {
        mpsc::error::TrySendError::Full(_) => SessionError::Backpressure,
        mpsc::error::TrySendError::Closed(_) => SessionError::NotConnected,
    }
}

async fn wait_pending(pending: &mut Option<JoinHandle<ConnectResult>>) -> Result<ConnectResult, JoinError> {
    match pending {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn next_message(link: &mut Option<Link>) -> Option<Result<Message, tungstenite::Error>> {
    match link {
        Some(link) => link.reader.next().await,
        None => std::future::pending().await,
    }
}

async fn wait_reconnect(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Cheap to clone. The session shuts down once every handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    identity: SessionIdentity,
    intents: mpsc::Sender<Intent>,
    state: watch::Receiver<SessionState>,
    connection: watch::Receiver<ConnectionState>,
    stats: Arc<Mutex<Stats>>,
}

impl SessionHandle {
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Read-only view of the State Store.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn stats(&self) -> Stats {
        match self.stats.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Dials the backend unless a connection is already open or in flight.
    /// Also cancels a pending reconnect and dials immediately.
    pub async fn connect(&self) -> Result<(), SessionError> {
        self.request(|reply| Request::Connect { reply }).await
    }

    pub async fn send_chat(&self, text: &str) -> Result<(), SessionError> {
        let text = text.to_string();
        self.request(|reply| Request::SendChat { text, reply }).await
    }

    pub async fn start_recording(&self) -> Result<(), SessionError> {
        self.request(|reply| Request::StartRecording { reply }).await
    }

    pub async fn stop_recording(&self) -> Result<(), SessionError> {
        self.request(|reply| Request::StopRecording { reply }).await
    }

    pub async fn request_new_topic(&self) -> Result<(), SessionError> {
        self.request(|reply| Request::RequestNewTopic { reply }).await
    }

    pub async fn set_capture_enabled(&self, enabled: bool) -> Result<(), SessionError> {
        self.intents
            .send(Intent::Request(Request::SetCaptureEnabled(enabled)))
            .await
            .map_err(|_| SessionError::Closed)
    }

    pub async fn set_muted(&self, muted: bool) -> Result<(), SessionError> {
        self.intents
            .send(Intent::Request(Request::SetMuted(muted)))
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Closes the socket with a normal close code, cancels any pending
    /// reconnect and releases the capture devices.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let (reply, done) = oneshot::channel();
        self.intents
            .send(Intent::Shutdown { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        done.await.map_err(|_| SessionError::Closed)
    }

    async fn request<F>(&self, request: F) -> Result<(), SessionError>
    where
        F: FnOnce(Reply) -> Request,
    {
        let (reply, response) = oneshot::channel();
        self.intents
            .send(Intent::Request(request(reply)))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)?
    }
}

pub async fn connect_with_config(
    config: Config,
    media: MediaScheduler,
) -> Result<SessionHandle, SessionError> {
    let handle = Session::spawn(config, media);
    handle.connect().await?;
    Ok(handle)
}

/// Connects with configuration from the environment and no capture devices.
pub async fn connect() -> Result<SessionHandle, SessionError> {
    let config = Config::from_env()?;
    connect_with_config(config, MediaScheduler::disabled()).await
}
