//! Session controller — drives one conversation at a time against the
//! realtime endpoint.
//!
//! [`SessionController`] owns the connection, the microphone capture and the
//! [`SharedAssistant`] state.  It responds to [`SessionCommand`]s received
//! over a `tokio::sync::mpsc` channel and, while a session is open, to
//! inbound frames, captured audio frames and a liveness deadline.
//!
//! # Session flow
//!
//! ```text
//! Open / SendText (idle)
//!   └─▶ handshake task {endpoint}?key=…  ──▶ send setup    [Connecting]
//!         └─▶ setupComplete
//!               └─▶ send greeting, flush queued text,
//!                   start microphone                       [Active]
//!
//! inbound toolCall(recordOrder) ─▶ normalize → store.add_order
//!                                 → chat notice → toolResponse
//! inbound audio                 ─▶ playback.enqueue
//! inbound transcript            ─▶ chat (merged per turn)
//! inbound interrupted           ─▶ playback.flush
//! inbound closed                ─▶ stop mic, flush playback   [Idle]
//!
//! Close / liveness timeout      ─▶ close sink, stop mic       [Closing → Idle]
//! Close while connecting        ─▶ abort handshake task       [Idle]
//! ```
//!
//! A failed open is logged and leaves the controller `Idle`; nothing is
//! retried automatically.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use crate::audio::{AudioFrame, AudioInput, CaptureHandle, PlaybackOutput};
use crate::chat::ChatEvent;
use crate::config::LiveConfig;
use crate::live::protocol::{
    realtime_audio_message, realtime_text_message, setup_message, tool_response_message,
};
use crate::live::tools::tool_declarations;
use crate::live::{
    parse_server_message, FunctionCall, Inbound, LiveConnection, LiveConnector, LiveError,
    LiveSink, ServerEvent, RECORD_ORDER, RECORD_ORDER_RESULT,
};
use crate::order::normalize;
use crate::store::SharedStore;

use super::state::{SessionState, SharedAssistant};

/// Prefix of the greeting stimulus sent when no initial utterance is given.
pub const GREETING_PREFIX: &str = "ابدأ بالتحية: ";

/// Chat notice appended after an order is stored.
pub const ORDER_CONFIRMED_NOTICE: &str = "تم تسجيل الطلبية بنجاح ✅";

/// Chat notice shown (once per run) when the microphone cannot be opened
/// for a session started from the call button.
pub const MIC_UNAVAILABLE_NOTICE: &str =
    "⚠️ لم نتمكن من الوصول للميكروفون. يمكنك الاستمرار عبر الكتابة.";

const CONNECT_FAILED_NOTICE: &str = "تعذر الاتصال بالمساعد، حاول مرة أخرى.";
const TIMEOUT_NOTICE: &str = "انتهت المحادثة لعدم الاستجابة.";

// ---------------------------------------------------------------------------
// SessionCommand
// ---------------------------------------------------------------------------

/// Requests from the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Open a session.  `initial_text` replaces the default greeting.
    Open { initial_text: Option<String> },
    /// A typed or tapped utterance.  Opens a session when idle.
    SendText(String),
    /// End the current session; a no-op when idle.
    Close,
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Drives the conversation session.
///
/// Create with [`SessionController::new`], then call [`run`](Self::run)
/// inside a tokio task.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use zamzami_assistant::audio::{CpalInput, PlaybackHandle};
/// use zamzami_assistant::config::AppConfig;
/// use zamzami_assistant::live::WsConnector;
/// use zamzami_assistant::session::{new_shared_assistant, SessionCommand, SessionController};
/// use zamzami_assistant::store::SettingsStore;
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let store = SettingsStore::open("zamzami_settings.json").unwrap().shared();
/// let state = new_shared_assistant();
///
/// let controller = SessionController::new(
///     config.live.clone(),
///     state,
///     store,
///     Arc::new(WsConnector),
///     Arc::new(CpalInput::new(&config.audio)),
///     Arc::new(PlaybackHandle::detached(24_000, 48_000)),
///     config.audio.frame_queue,
/// );
///
/// let (tx, rx) = tokio::sync::mpsc::channel(16);
/// tokio::spawn(controller.run(rx));
/// tx.send(SessionCommand::Open { initial_text: None }).await.unwrap();
/// # }
/// ```
pub struct SessionController {
    config: LiveConfig,
    state: SharedAssistant,
    store: SharedStore,
    connector: Arc<dyn LiveConnector>,
    input: Arc<dyn AudioInput>,
    playback: Arc<dyn PlaybackOutput>,
    frame_queue: usize,

    /// Handshake in flight while `Connecting`.
    pending: Option<JoinHandle<Result<LiveConnection, LiveError>>>,
    /// System instruction captured when the open was requested.
    setup_instruction: String,
    sink: Option<Box<dyn LiveSink>>,
    inbound: Option<mpsc::Receiver<Inbound>>,
    capture: Option<CaptureHandle>,
    frames: Option<mpsc::Receiver<AudioFrame>>,
    /// Stimulus to send once setup completes.
    greeting: Option<String>,
    /// Utterances typed while connecting.
    queued_text: Vec<String>,
    deadline: Option<Instant>,
    /// The session was opened by a typed or tapped utterance.
    opened_with_text: bool,
    mic_notice_shown: bool,
}

impl SessionController {
    /// Create a new controller.
    ///
    /// # Arguments
    ///
    /// * `config`      — endpoint, model, key and timeouts.
    /// * `state`       — shared assistant state (also read by the UI).
    /// * `store`       — settings/order store.
    /// * `connector`   — transport (e.g. `WsConnector`).
    /// * `input`       — microphone (e.g. `CpalInput`).
    /// * `playback`    — speech output (e.g. `PlaybackHandle`).
    /// * `frame_queue` — capacity of the captured-frame channel.
    pub fn new(
        config: LiveConfig,
        state: SharedAssistant,
        store: SharedStore,
        connector: Arc<dyn LiveConnector>,
        input: Arc<dyn AudioInput>,
        playback: Arc<dyn PlaybackOutput>,
        frame_queue: usize,
    ) -> Self {
        Self {
            config,
            state,
            store,
            connector,
            input,
            playback,
            frame_queue: frame_queue.max(1),
            pending: None,
            setup_instruction: String::new(),
            sink: None,
            inbound: None,
            capture: None,
            frames: None,
            greeting: None,
            queued_text: Vec::new(),
            deadline: None,
            opened_with_text: false,
            mic_notice_shown: false,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `commands` is closed, then close any open session.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                connected = join_opt(&mut self.pending) => {
                    self.pending = None;
                    self.finish_open(connected).await;
                }
                inbound = recv_opt(&mut self.inbound) => {
                    self.handle_inbound(inbound).await;
                }
                frame = recv_opt(&mut self.frames) => match frame {
                    Some(frame) => self.send_audio(frame).await,
                    None => {
                        log::debug!("session: capture channel closed");
                        self.frames = None;
                        self.state.lock().unwrap().capturing = false;
                    }
                },
                _ = sleep_until_opt(deadline) => {
                    self.handle_liveness_timeout().await;
                }
            }
        }

        self.close().await;
        log::info!("session: command channel closed, controller shutting down");
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Open { initial_text } => self.open(initial_text).await,
            SessionCommand::SendText(text) => self.send_text(text).await,
            SessionCommand::Close => self.close().await,
        }
    }

    async fn send_text(&mut self, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        self.chat(ChatEvent::UserUtterance(text.clone()));

        match self.session() {
            SessionState::Idle => self.open(Some(text)).await,
            SessionState::Connecting => self.queued_text.push(text),
            SessionState::Active => self.send_realtime_text(&text).await,
            SessionState::Closing => {
                log::debug!("session: dropping text sent while closing");
            }
        }
    }

    async fn open(&mut self, initial_text: Option<String>) {
        match self.session() {
            SessionState::Idle => {}
            SessionState::Connecting => {
                self.queued_text.extend(initial_text);
                return;
            }
            SessionState::Active => {
                if let Some(text) = initial_text {
                    self.send_realtime_text(&text).await;
                }
                return;
            }
            SessionState::Closing => return,
        }

        {
            let mut st = self.state.lock().unwrap();
            st.session = SessionState::Connecting;
            st.last_order = None;
            st.notice = None;
        }
        log::info!("session: Idle → Connecting");

        let Some(api_key) = self.config.resolve_api_key() else {
            self.fail_open(LiveError::MissingApiKey(self.config.api_key_env.clone()));
            return;
        };
        let url = self.config.connection_url(&api_key);
        let timeout = Duration::from_secs(self.config.connect_timeout_secs.max(1));

        let welcome_message = {
            let store = self.store.lock().unwrap();
            let settings = store.settings();
            self.setup_instruction = settings.system_instruction.clone();
            settings.welcome_message.clone()
        };
        self.opened_with_text = initial_text.is_some();
        self.greeting =
            Some(initial_text.unwrap_or_else(|| format!("{GREETING_PREFIX}{welcome_message}")));

        // The handshake runs as its own task so `Close` can abort it.
        let connector = Arc::clone(&self.connector);
        self.pending = Some(tokio::spawn(async move {
            match tokio::time::timeout(timeout, connector.connect(&url)).await {
                Ok(result) => result,
                Err(_) => Err(LiveError::Timeout),
            }
        }));
    }

    /// Second half of `open`, once the handshake task has finished.
    async fn finish_open(&mut self, connected: Result<Result<LiveConnection, LiveError>, JoinError>) {
        let connection = match connected {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => return self.fail_open(e),
            Err(e) => return self.fail_open(LiveError::Connect(e.to_string())),
        };
        if self.session() != SessionState::Connecting {
            log::debug!("session: handshake finished after close, discarding");
            return;
        }
        let mut sink = connection.sink;

        let setup = setup_message(&self.config.model, &self.setup_instruction, tool_declarations());
        if let Err(e) = sink.send(setup).await {
            let _ = sink.close().await;
            return self.fail_open(e);
        }

        self.sink = Some(sink);
        self.inbound = Some(connection.inbound);
        self.touch();
    }

    /// Close the current session.  Idempotent; a no-op when idle.
    async fn close(&mut self) {
        if self.session() == SessionState::Idle {
            return;
        }
        self.state.lock().unwrap().session = SessionState::Closing;
        log::info!("session: → Closing");

        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close().await {
                log::debug!("session: close failed: {e}");
            }
        }
        self.teardown();
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    async fn handle_inbound(&mut self, inbound: Option<Inbound>) {
        match inbound {
            Some(Inbound::Message(text)) => {
                self.touch();
                for event in parse_server_message(&text) {
                    self.handle_event(event).await;
                }
            }
            Some(Inbound::Error(e)) => {
                log::warn!("session: channel error: {e}");
            }
            Some(Inbound::Closed(reason)) => {
                log::info!(
                    "session: channel closed by remote ({})",
                    reason.as_deref().unwrap_or("no reason")
                );
                self.teardown();
            }
            None => {
                log::info!("session: channel closed");
                self.teardown();
            }
        }
    }

    async fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::SetupComplete => self.handle_setup_complete().await,
            ServerEvent::ToolCall(calls) => {
                for call in calls {
                    self.handle_function_call(call).await;
                }
            }
            ServerEvent::Audio { data, .. } => self.playback.enqueue(&data),
            ServerEvent::Transcript(text) => self.chat(ChatEvent::ModelTranscript(text)),
            ServerEvent::Interrupted => {
                log::debug!("session: interrupted, flushing playback");
                self.playback.flush();
            }
            ServerEvent::TurnComplete => self.chat(ChatEvent::TurnComplete),
            ServerEvent::GoAway { time_left } => {
                log::warn!(
                    "session: server going away (time left: {})",
                    time_left.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    async fn handle_setup_complete(&mut self) {
        if self.session() != SessionState::Connecting {
            log::debug!("session: ignoring setupComplete outside Connecting");
            return;
        }
        self.state.lock().unwrap().session = SessionState::Active;
        log::info!("session: Connecting → Active");

        if let Some(greeting) = self.greeting.take() {
            self.send_realtime_text(&greeting).await;
        }
        for text in std::mem::take(&mut self.queued_text) {
            self.send_realtime_text(&text).await;
        }

        self.start_capture();
    }

    async fn handle_function_call(&mut self, call: FunctionCall) {
        let response = if call.name == RECORD_ORDER {
            let new_order = normalize(&call.args);
            let added = self.store.lock().unwrap().add_order(new_order);
            match added {
                Ok(order) => {
                    log::info!("session: order {} recorded", order.id);
                    self.state.lock().unwrap().last_order = Some(order);
                    self.chat(ChatEvent::Notice(ORDER_CONFIRMED_NOTICE.into()));
                    json!({ "result": RECORD_ORDER_RESULT })
                }
                Err(e) => {
                    log::error!("session: failed to persist order: {e}");
                    json!({ "error": e.to_string() })
                }
            }
        } else {
            log::warn!("session: model called unknown function {:?}", call.name);
            json!({ "error": format!("unknown function: {}", call.name) })
        };

        let message = tool_response_message(&call.id, &call.name, response);
        if let Err(e) = self.send(message).await {
            log::warn!("session: failed to send tool response: {e}");
        }
    }

    async fn handle_liveness_timeout(&mut self) {
        log::warn!(
            "session: no message for {}s, closing",
            self.config.liveness_timeout_secs
        );
        self.state.lock().unwrap().notice = Some(TIMEOUT_NOTICE.into());
        self.close().await;
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    async fn send_realtime_text(&mut self, text: &str) {
        if let Err(e) = self.send(realtime_text_message(text)).await {
            log::warn!("session: failed to send text: {e}");
        }
    }

    async fn send_audio(&mut self, frame: AudioFrame) {
        if self.session() != SessionState::Active {
            return;
        }
        if let Err(e) = self.send(realtime_audio_message(&frame)).await {
            log::warn!("session: failed to send audio frame: {e}");
        }
    }

    async fn send(&mut self, message: serde_json::Value) -> Result<(), LiveError> {
        match self.sink.as_mut() {
            Some(sink) => sink.send(message).await,
            None => Err(LiveError::Closed),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn start_capture(&mut self) {
        let (tx, rx) = mpsc::channel(self.frame_queue);
        match self.input.start(tx) {
            Ok(handle) => {
                self.capture = Some(handle);
                self.frames = Some(rx);
                self.state.lock().unwrap().capturing = true;
                log::info!("session: microphone streaming");
            }
            Err(e) => {
                log::warn!("session: microphone unavailable, continuing text-only: {e}");
                if !self.mic_notice_shown && !self.opened_with_text {
                    self.mic_notice_shown = true;
                    self.chat(ChatEvent::Notice(MIC_UNAVAILABLE_NOTICE.into()));
                }
            }
        }
    }

    /// Release everything tied to the current session and return to Idle.
    fn teardown(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
            log::info!("session: handshake abandoned");
        }
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        self.frames = None;
        self.sink = None;
        self.inbound = None;
        self.greeting = None;
        self.queued_text.clear();
        self.deadline = None;
        self.playback.flush();

        let mut st = self.state.lock().unwrap();
        st.session = SessionState::Idle;
        st.capturing = false;
        st.chat.apply(ChatEvent::TurnComplete);
        log::info!("session: → Idle");
    }

    fn fail_open(&mut self, error: LiveError) {
        log::error!("session: failed to open: {error}");
        self.pending = None;
        self.sink = None;
        self.inbound = None;
        self.greeting = None;
        self.queued_text.clear();
        self.deadline = None;

        let mut st = self.state.lock().unwrap();
        st.session = SessionState::Idle;
        st.notice = Some(CONNECT_FAILED_NOTICE.into());
    }

    /// Push the liveness deadline forward.
    fn touch(&mut self) {
        self.deadline = Some(
            Instant::now() + Duration::from_secs(self.config.liveness_timeout_secs.max(1)),
        );
    }

    fn session(&self) -> SessionState {
        self.state.lock().unwrap().session
    }

    fn chat(&self, event: ChatEvent) {
        self.state.lock().unwrap().chat.apply(event);
    }
}

async fn recv_opt<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn join_opt<T>(handle: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::audio::CaptureError;
    use crate::chat::Role;
    use crate::order::ADDRESS_PLACEHOLDER;
    use crate::session::state::new_shared_assistant;
    use crate::store::{OrderStatus, Profile, SettingsStore};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    #[derive(Clone, Default)]
    struct Wire {
        sent: Arc<Mutex<Vec<Value>>>,
        closed: Arc<AtomicBool>,
    }

    impl Wire {
        fn sent(&self) -> Vec<Value> {
            self.sent.lock().unwrap().clone()
        }

        fn texts(&self) -> Vec<String> {
            self.sent()
                .iter()
                .filter_map(|m| m.pointer("/realtimeInput/text").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        }
    }

    struct MockSink(Wire);

    #[async_trait]
    impl LiveSink for MockSink {
        async fn send(&mut self, message: Value) -> Result<(), LiveError> {
            self.0.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), LiveError> {
            self.0.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Hands out one pre-built connection per `connect` call.
    #[derive(Default)]
    struct MockConnector {
        links: Mutex<Vec<Result<LiveConnection, LiveError>>>,
        urls: Mutex<Vec<String>>,
        /// Never finish the handshake.
        hang: AtomicBool,
    }

    impl MockConnector {
        /// Queue a connection; returns the wire and the "server" sender.
        fn push_link(&self) -> (Wire, mpsc::Sender<Inbound>) {
            let wire = Wire::default();
            let (tx, rx) = mpsc::channel(32);
            self.links.lock().unwrap().push(Ok(LiveConnection {
                sink: Box::new(MockSink(wire.clone())),
                inbound: rx,
            }));
            (wire, tx)
        }

        fn push_failure(&self) {
            self.links
                .lock()
                .unwrap()
                .push(Err(LiveError::Connect("refused".into())));
        }

        fn calls(&self) -> usize {
            self.urls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LiveConnector for MockConnector {
        async fn connect(&self, url: &str) -> Result<LiveConnection, LiveError> {
            self.urls.lock().unwrap().push(url.to_string());
            if self.hang.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            let mut links = self.links.lock().unwrap();
            if links.is_empty() {
                return Err(LiveError::Connect("no link queued".into()));
            }
            links.remove(0)
        }
    }

    #[derive(Default)]
    struct MockInput {
        fail: bool,
        frames: Mutex<Option<mpsc::Sender<AudioFrame>>>,
        stop: Arc<AtomicBool>,
        starts: AtomicUsize,
    }

    impl AudioInput for MockInput {
        fn start(&self, frames: mpsc::Sender<AudioFrame>) -> Result<CaptureHandle, CaptureError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CaptureError::NoDevice);
            }
            self.stop.store(false, Ordering::SeqCst);
            *self.frames.lock().unwrap() = Some(frames);
            Ok(CaptureHandle::new(Arc::clone(&self.stop), None))
        }
    }

    #[derive(Default)]
    struct MockPlayback {
        chunks: Mutex<Vec<String>>,
        flushes: AtomicUsize,
    }

    impl PlaybackOutput for MockPlayback {
        fn enqueue(&self, encoded: &str) {
            self.chunks.lock().unwrap().push(encoded.to_string());
        }

        fn flush(&self) {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            self.chunks.lock().unwrap().clear();
        }
    }

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    struct Harness {
        _dir: tempfile::TempDir,
        state: SharedAssistant,
        store: SharedStore,
        connector: Arc<MockConnector>,
        input: Arc<MockInput>,
        playback: Arc<MockPlayback>,
        commands: mpsc::Sender<SessionCommand>,
    }

    fn live_config() -> LiveConfig {
        LiveConfig {
            endpoint: "wss://live.test/ws".into(),
            api_key: Some("test-key".into()),
            ..LiveConfig::default()
        }
    }

    fn harness_with(config: LiveConfig, input: MockInput) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("zamzami_settings.json")).unwrap();
        harness_on(dir, store, config, input)
    }

    fn harness_on(
        dir: tempfile::TempDir,
        store: SettingsStore,
        config: LiveConfig,
        input: MockInput,
    ) -> Harness {
        let store = store.shared();
        let state = new_shared_assistant();
        let connector = Arc::new(MockConnector::default());
        let input = Arc::new(input);
        let playback = Arc::new(MockPlayback::default());

        let controller = SessionController::new(
            config,
            Arc::clone(&state),
            Arc::clone(&store),
            connector.clone(),
            input.clone(),
            playback.clone(),
            8,
        );
        let (commands, rx) = mpsc::channel(16);
        tokio::spawn(controller.run(rx));

        Harness {
            _dir: dir,
            state,
            store,
            connector,
            input,
            playback,
            commands,
        }
    }

    fn harness() -> Harness {
        harness_with(live_config(), MockInput::default())
    }

    /// Poll `cond` until it holds (or fail after two seconds).
    async fn wait_for(what: &str, cond: impl Fn() -> bool) {
        for _ in 0..400 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for: {what}");
    }

    impl Harness {
        fn session(&self) -> SessionState {
            self.state.lock().unwrap().session
        }

        async fn command(&self, command: SessionCommand) {
            self.commands.send(command).await.unwrap();
        }

        /// Open a session and complete setup.
        async fn open_active(&self, initial_text: Option<&str>) -> (Wire, mpsc::Sender<Inbound>) {
            let (wire, server) = self.connector.push_link();
            self.command(SessionCommand::Open {
                initial_text: initial_text.map(str::to_string),
            })
            .await;
            wait_for("setup sent", || !wire.sent().is_empty()).await;
            server
                .send(Inbound::Message(r#"{"setupComplete":{}}"#.into()))
                .await
                .unwrap();
            wait_for("active", || self.session() == SessionState::Active).await;
            (wire, server)
        }
    }

    fn record_order_frame(id: &str, args: Value) -> Inbound {
        Inbound::Message(
            json!({
                "toolCall": { "functionCalls": [{ "id": id, "name": "recordOrder", "args": args }] }
            })
            .to_string(),
        )
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn open_sends_setup_then_default_greeting() {
        let h = harness();
        let (wire, _server) = h.open_active(None).await;

        let sent = wire.sent();
        let setup = &sent[0]["setup"];
        assert_eq!(setup["model"], LiveConfig::default().model);
        assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");
        assert!(setup["outputAudioTranscription"].is_object());
        assert_eq!(
            setup["tools"][0]["functionDeclarations"][0]["name"],
            "recordOrder"
        );
        let instruction = h.store.lock().unwrap().settings().system_instruction.clone();
        assert_eq!(setup["systemInstruction"]["parts"][0]["text"], instruction);

        wait_for("greeting", || wire.texts().len() == 1).await;
        let welcome = h.store.lock().unwrap().settings().welcome_message.clone();
        assert_eq!(wire.texts(), vec![format!("{GREETING_PREFIX}{welcome}")]);

        assert_eq!(h.connector.urls.lock().unwrap()[0], "wss://live.test/ws?key=test-key");
        assert!(h.state.lock().unwrap().capturing);
    }

    #[tokio::test]
    async fn initial_text_replaces_greeting() {
        let h = harness();
        let (wire, _server) = h.open_active(Some("كم سعر الجوانتي؟")).await;
        wait_for("stimulus", || !wire.texts().is_empty()).await;
        assert_eq!(wire.texts(), vec!["كم سعر الجوانتي؟".to_string()]);
    }

    #[tokio::test]
    async fn text_while_idle_opens_session_with_that_text() {
        let h = harness();
        let (wire, server) = h.connector.push_link();

        h.command(SessionCommand::SendText("  عايز أطلب  ".into())).await;
        wait_for("setup sent", || !wire.sent().is_empty()).await;
        server
            .send(Inbound::Message(r#"{"setupComplete":{}}"#.into()))
            .await
            .unwrap();

        wait_for("text sent", || !wire.texts().is_empty()).await;
        assert_eq!(wire.texts(), vec!["عايز أطلب".to_string()]);

        let st = h.state.lock().unwrap();
        assert_eq!(st.chat.messages()[0].role, Role::User);
        assert_eq!(st.chat.messages()[0].text, "عايز أطلب");
    }

    #[tokio::test]
    async fn text_while_connecting_is_sent_after_greeting() {
        let h = harness();
        let (wire, server) = h.connector.push_link();

        h.command(SessionCommand::Open { initial_text: None }).await;
        wait_for("setup sent", || !wire.sent().is_empty()).await;
        h.command(SessionCommand::SendText("first".into())).await;
        h.command(SessionCommand::SendText("second".into())).await;
        wait_for("queued in chat", || h.state.lock().unwrap().chat.messages().len() == 2).await;
        assert!(wire.texts().is_empty());

        server
            .send(Inbound::Message(r#"{"setupComplete":{}}"#.into()))
            .await
            .unwrap();
        wait_for("all sent", || wire.texts().len() == 3).await;

        let texts = wire.texts();
        assert!(texts[0].starts_with(GREETING_PREFIX));
        assert_eq!(&texts[1..], &["first".to_string(), "second".to_string()]);
    }

    #[tokio::test]
    async fn text_while_active_is_sent_immediately() {
        let h = harness();
        let (wire, _server) = h.open_active(None).await;
        h.command(SessionCommand::SendText("hello".into())).await;
        wait_for("text", || wire.texts().len() == 2).await;
        assert_eq!(wire.texts()[1], "hello");
    }

    #[tokio::test]
    async fn record_order_is_stored_confirmed_and_acknowledged() {
        let h = harness();
        {
            let mut store = h.store.lock().unwrap();
            let mut profile = Profile::from(store.settings());
            profile.contact_number = "0912345678".into();
            store.save_profile(profile).unwrap();
        }
        let (wire, server) = h.open_active(None).await;

        server
            .send(record_order_frame(
                "call-1",
                json!({
                    "customerName": "Ahmed",
                    "phone": "0911111111",
                    "branch": "Khartoum",
                    "items": "2x oxygen mask"
                }),
            ))
            .await
            .unwrap();

        wait_for("tool response", || {
            wire.sent().iter().any(|m| m.get("toolResponse").is_some())
        })
        .await;

        let store = h.store.lock().unwrap();
        let order = &store.orders()[0];
        assert_eq!(order.customer_name, "Ahmed");
        assert_eq!(order.address, ADDRESS_PLACEHOLDER);
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(store.settings().contact_number, "0912345678");

        let st = h.state.lock().unwrap();
        assert_eq!(st.last_order.as_ref().map(|o| &o.id), Some(&order.id));
        let last = st.chat.messages().last().unwrap();
        assert_eq!(last.text, ORDER_CONFIRMED_NOTICE);

        let sent = wire.sent();
        let response = sent
            .iter()
            .find_map(|m| m.pointer("/toolResponse/functionResponses/0"))
            .unwrap();
        assert_eq!(response["id"], "call-1");
        assert_eq!(response["name"], "recordOrder");
        assert_eq!(response["response"]["result"], RECORD_ORDER_RESULT);
    }

    #[tokio::test]
    async fn unknown_function_gets_error_response_and_no_order() {
        let h = harness();
        let (wire, server) = h.open_active(None).await;

        server
            .send(Inbound::Message(
                json!({"toolCall":{"functionCalls":[{"id":"x","name":"cancelOrder","args":{}}]}})
                    .to_string(),
            ))
            .await
            .unwrap();

        wait_for("tool response", || {
            wire.sent().iter().any(|m| m.get("toolResponse").is_some())
        })
        .await;
        let sent = wire.sent();
        let response = sent
            .iter()
            .find_map(|m| m.pointer("/toolResponse/functionResponses/0"))
            .unwrap();
        assert_eq!(response["name"], "cancelOrder");
        assert!(response["response"]["error"].is_string());
        assert!(h.store.lock().unwrap().orders().is_empty());
    }

    #[tokio::test]
    async fn audio_is_played_and_interruption_flushes() {
        let h = harness();
        let (_wire, server) = h.open_active(None).await;

        server
            .send(Inbound::Message(
                r#"{"serverContent":{"modelTurn":{"parts":[{"inlineData":{"mimeType":"audio/pcm;rate=24000","data":"AAAA"}}]}}}"#.into(),
            ))
            .await
            .unwrap();
        wait_for("chunk", || h.playback.chunks.lock().unwrap().len() == 1).await;

        let flushes_before = h.playback.flushes.load(Ordering::SeqCst);
        server
            .send(Inbound::Message(r#"{"serverContent":{"interrupted":true}}"#.into()))
            .await
            .unwrap();
        wait_for("flush", || {
            h.playback.flushes.load(Ordering::SeqCst) == flushes_before + 1
        })
        .await;
        assert!(h.playback.chunks.lock().unwrap().is_empty());
        assert_eq!(h.session(), SessionState::Active);
    }

    #[tokio::test]
    async fn transcripts_merge_until_turn_complete() {
        let h = harness();
        let (_wire, server) = h.open_active(None).await;

        for frame in [
            r#"{"serverContent":{"outputTranscription":{"text":"مرحباً "}}}"#,
            r#"{"serverContent":{"outputTranscription":{"text":"بك"}}}"#,
            r#"{"serverContent":{"turnComplete":true}}"#,
            r#"{"serverContent":{"outputTranscription":{"text":"تفضل"}}}"#,
        ] {
            server.send(Inbound::Message(frame.into())).await.unwrap();
        }

        wait_for("two bubbles", || h.state.lock().unwrap().chat.messages().len() == 2).await;
        let st = h.state.lock().unwrap();
        assert_eq!(st.chat.messages()[0].text, "مرحباً بك");
        assert_eq!(st.chat.messages()[1].text, "تفضل");
    }

    #[tokio::test]
    async fn channel_close_returns_to_idle_and_releases_audio() {
        let h = harness();
        let (_wire, server) = h.open_active(None).await;
        assert!(!h.input.stop.load(Ordering::SeqCst));

        server.send(Inbound::Closed(Some("1000 bye".into()))).await.unwrap();
        wait_for("idle", || h.session() == SessionState::Idle).await;

        assert!(h.input.stop.load(Ordering::SeqCst));
        assert!(h.playback.flushes.load(Ordering::SeqCst) >= 1);
        assert!(!h.state.lock().unwrap().capturing);
    }

    #[tokio::test]
    async fn dropped_server_counts_as_closed() {
        let h = harness();
        let (_wire, server) = h.open_active(None).await;
        drop(server);
        wait_for("idle", || h.session() == SessionState::Idle).await;
    }

    #[tokio::test]
    async fn channel_error_keeps_session_active() {
        let h = harness();
        let (wire, server) = h.open_active(None).await;

        server.send(Inbound::Error("reset".into())).await.unwrap();
        h.command(SessionCommand::SendText("still here?".into())).await;
        wait_for("text", || wire.texts().len() == 2).await;
        assert_eq!(h.session(), SessionState::Active);
    }

    #[tokio::test]
    async fn failed_connect_returns_to_idle_without_retry() {
        let h = harness();
        h.connector.push_failure();

        h.command(SessionCommand::Open { initial_text: None }).await;
        wait_for("notice", || h.state.lock().unwrap().notice.is_some()).await;

        assert_eq!(h.session(), SessionState::Idle);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.connector.calls(), 1);
    }

    #[tokio::test]
    async fn missing_api_key_never_connects() {
        let config = LiveConfig {
            api_key: None,
            api_key_env: "ZAMZAMI_CONTROLLER_TEST_UNSET_KEY".into(),
            ..live_config()
        };
        let h = harness_with(config, MockInput::default());

        h.command(SessionCommand::Open { initial_text: None }).await;
        wait_for("notice", || h.state.lock().unwrap().notice.is_some()).await;
        assert_eq!(h.session(), SessionState::Idle);
        assert_eq!(h.connector.calls(), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_noop_when_idle() {
        let h = harness();
        h.command(SessionCommand::Close).await;
        h.command(SessionCommand::Close).await;

        let (wire, _server) = h.open_active(None).await;
        h.command(SessionCommand::Close).await;
        wait_for("idle", || h.session() == SessionState::Idle).await;
        assert!(wire.closed.load(Ordering::SeqCst));
        assert!(h.input.stop.load(Ordering::SeqCst));

        h.command(SessionCommand::Close).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.session(), SessionState::Idle);
    }

    #[tokio::test]
    async fn session_can_be_reopened_after_close() {
        let h = harness();
        let (_wire, _server) = h.open_active(None).await;
        h.command(SessionCommand::Close).await;
        wait_for("idle", || h.session() == SessionState::Idle).await;

        let (wire, _server) = h.open_active(None).await;
        wait_for("greeting", || wire.texts().len() == 1).await;
        assert_eq!(h.connector.calls(), 2);
    }

    #[tokio::test]
    async fn microphone_frames_are_streamed_while_active() {
        let h = harness();
        let (wire, _server) = h.open_active(None).await;

        let frames = h.input.frames.lock().unwrap().clone().unwrap();
        frames
            .send(AudioFrame::encode(&[0.0; 4096], 16_000))
            .await
            .unwrap();

        wait_for("audio sent", || {
            wire.sent()
                .iter()
                .any(|m| m.pointer("/realtimeInput/audio/data").is_some())
        })
        .await;
        let sent = wire.sent();
        let audio = sent
            .iter()
            .find_map(|m| m.pointer("/realtimeInput/audio"))
            .unwrap();
        assert_eq!(audio["mimeType"], "audio/pcm;rate=16000");
    }

    #[tokio::test]
    async fn microphone_failure_is_reported_once_and_session_continues() {
        let input = MockInput {
            fail: true,
            ..MockInput::default()
        };
        let h = harness_with(live_config(), input);

        let (wire, _server) = h.open_active(None).await;
        wait_for("greeting", || wire.texts().len() == 1).await;
        wait_for("notice", || !h.state.lock().unwrap().chat.is_empty()).await;

        h.command(SessionCommand::Close).await;
        wait_for("idle", || h.session() == SessionState::Idle).await;
        let (_wire, _server) = h.open_active(None).await;
        wait_for("second start", || h.input.starts.load(Ordering::SeqCst) == 2).await;

        let st = h.state.lock().unwrap();
        let notices = st
            .chat
            .messages()
            .iter()
            .filter(|m| m.text == MIC_UNAVAILABLE_NOTICE)
            .count();
        assert_eq!(notices, 1);
        assert_eq!(st.session, SessionState::Active);
        assert!(!st.capturing);
    }

    #[tokio::test]
    async fn silent_session_is_closed_by_liveness_timeout() {
        let config = LiveConfig {
            liveness_timeout_secs: 1,
            ..live_config()
        };
        let h = harness_with(config, MockInput::default());
        let (wire, _server) = h.open_active(None).await;

        for _ in 0..60 {
            if h.session() == SessionState::Idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(h.session(), SessionState::Idle);
        assert!(wire.closed.load(Ordering::SeqCst));
        assert!(h.state.lock().unwrap().notice.is_some());
    }

    #[tokio::test]
    async fn close_while_connecting_abandons_handshake() {
        let h = harness();
        h.connector.hang.store(true, Ordering::SeqCst);

        h.command(SessionCommand::Open { initial_text: None }).await;
        wait_for("connect attempted", || h.connector.calls() == 1).await;
        assert_eq!(h.session(), SessionState::Connecting);

        h.command(SessionCommand::Close).await;
        wait_for("idle", || h.session() == SessionState::Idle).await;
        assert!(h.state.lock().unwrap().notice.is_none());

        // The controller is free for the next session straight away.
        h.connector.hang.store(false, Ordering::SeqCst);
        let (wire, _server) = h.open_active(None).await;
        wait_for("greeting", || wire.texts().len() == 1).await;
        assert_eq!(h.connector.calls(), 2);
    }

    #[tokio::test]
    async fn unsaved_order_is_answered_with_error_but_kept_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the record's parent directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let store = SettingsStore::in_memory(
            blocker.join("zamzami_settings.json"),
            crate::store::Settings::default(),
        );
        let h = harness_on(dir, store, live_config(), MockInput::default());
        let (wire, server) = h.open_active(None).await;

        server
            .send(record_order_frame("call-9", json!({"customerName": "Ahmed"})))
            .await
            .unwrap();
        wait_for("tool response", || {
            wire.sent().iter().any(|m| m.get("toolResponse").is_some())
        })
        .await;

        let sent = wire.sent();
        let response = sent
            .iter()
            .find_map(|m| m.pointer("/toolResponse/functionResponses/0"))
            .unwrap();
        assert_eq!(response["id"], "call-9");
        assert!(response["response"]["error"].is_string());
        assert!(response["response"].get("result").is_none());

        let store = h.store.lock().unwrap();
        assert_eq!(store.orders().len(), 1);
        assert_eq!(store.orders()[0].customer_name, "Ahmed");
        assert!(h.state.lock().unwrap().last_order.is_none());
    }

    #[tokio::test]
    async fn microphone_notice_is_skipped_for_text_sessions() {
        let input = MockInput {
            fail: true,
            ..MockInput::default()
        };
        let h = harness_with(live_config(), input);

        let (wire, _server) = h.open_active(Some("أسعار حقن الأنسولين كم؟")).await;
        wait_for("stimulus", || wire.texts().len() == 1).await;
        wait_for("mic tried", || h.input.starts.load(Ordering::SeqCst) == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let st = h.state.lock().unwrap();
        assert!(st
            .chat
            .messages()
            .iter()
            .all(|m| m.text != MIC_UNAVAILABLE_NOTICE));
    }
}
