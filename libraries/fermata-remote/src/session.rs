//! One remote connection
//!
//! ```text
//! CONNECTING ──register──► AUTHENTICATING ──valid credential──► ACTIVE
//!                               │  │                               │
//!        bad credential (4003)  │  │ no credential in time (4004)  │ superseded (4001)
//!        version mismatch (4002)▼  ▼                               ▼ shutdown (4000)
//!                               CLOSING ───────close sent────────► CLOSED
//! ```
//!
//! The decision logic lives in [`Session`], which turns client events into
//! [`Action`]s; [`run`] executes them against the socket, the hub and the
//! playback controller. Reader and writer are separate tasks so a slow
//! client only ever backs up its own outbound queue.

use crate::auth::RemoteAuth;
use crate::hub::SessionId;
use crate::outbound::{OutboundQueue, Outgoing};
use crate::protocol::{
    ClientEvent, RemoteState, ServerEvent, CLOSE_AUTH_REJECTED, CLOSE_AUTH_TIMEOUT,
    CLOSE_SHUTDOWN, CLOSE_VERSION_MISMATCH, PROTOCOL_VERSION,
};
use crate::state::AppState;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fermata_playback::Command;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// How long to wait for the writer to flush a close
const CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    Active,
    Closing,
    Closed,
}

/// Side effects requested by the session logic
#[derive(Debug)]
pub enum Action {
    /// Send to this session only
    Push(ServerEvent),
    /// Start receiving broadcasts and send the full state
    Activate,
    Close { code: u16, reason: &'static str },
    Control(Command),
    /// Fetch the current artwork for this session
    Proxy,
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: SessionState,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Connecting,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Registered with the hub; waiting for `authenticate`
    pub fn opened(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Authenticating;
        }
    }

    /// Handle one text frame
    pub fn on_text(&mut self, text: &str, auth: &RemoteAuth) -> Vec<Action> {
        match ClientEvent::parse(text) {
            Ok(event) => self.on_event(event, auth),
            Err(e) => {
                tracing::debug!(session = self.id, "Unparseable remote message: {}", e);
                vec![Action::Push(ServerEvent::Error(format!("Invalid message: {}", e)))]
            }
        }
    }

    pub fn on_event(&mut self, event: ClientEvent, auth: &RemoteAuth) -> Vec<Action> {
        match self.state {
            SessionState::Closing | SessionState::Closed | SessionState::Connecting => Vec::new(),
            SessionState::Authenticating => match event {
                ClientEvent::Authenticate { header, version } => {
                    self.authenticate(&header, version, auth)
                }
                _ => vec![Action::Push(ServerEvent::Error(
                    "Not authenticated".to_string(),
                ))],
            },
            SessionState::Active => match event {
                ClientEvent::Authenticate { .. } => vec![Action::Push(ServerEvent::Error(
                    "Already authenticated".to_string(),
                ))],
                ClientEvent::Proxy => vec![Action::Proxy],
                event => event.into_command().map(Action::Control).into_iter().collect(),
            },
        }
    }

    fn authenticate(
        &mut self,
        header: &str,
        version: Option<u32>,
        auth: &RemoteAuth,
    ) -> Vec<Action> {
        if let Some(version) = version.filter(|v| *v != PROTOCOL_VERSION) {
            tracing::info!(session = self.id, version, "Remote protocol version mismatch");
            self.state = SessionState::Closing;
            return vec![
                Action::Push(ServerEvent::Error(format!(
                    "Unsupported protocol version {}, expected {}",
                    version, PROTOCOL_VERSION
                ))),
                Action::Close {
                    code: CLOSE_VERSION_MISMATCH,
                    reason: "protocol version mismatch",
                },
            ];
        }

        match auth.verify_header(header) {
            Ok(()) => {
                tracing::info!(session = self.id, "Remote session authenticated");
                self.state = SessionState::Active;
                vec![Action::Activate]
            }
            Err(e) => {
                tracing::warn!(session = self.id, "Remote authentication failed: {}", e);
                self.state = SessionState::Closing;
                vec![
                    Action::Push(ServerEvent::Error("Authentication failed".to_string())),
                    Action::Close {
                        code: CLOSE_AUTH_REJECTED,
                        reason: "authentication failed",
                    },
                ]
            }
        }
    }

    /// The authentication window elapsed
    pub fn on_auth_timeout(&mut self) -> Vec<Action> {
        if self.state != SessionState::Authenticating {
            return Vec::new();
        }
        tracing::info!(session = self.id, "Remote session did not authenticate in time");
        self.state = SessionState::Closing;
        vec![
            Action::Push(ServerEvent::Error("Authentication timed out".to_string())),
            Action::Close {
                code: CLOSE_AUTH_TIMEOUT,
                reason: "authentication timeout",
            },
        ]
    }

    pub fn closed(&mut self) {
        self.state = SessionState::Closed;
    }
}

/// Drive one upgraded socket until it closes
pub async fn run(socket: WebSocket, app: Arc<AppState>) {
    let Some((id, queue)) = app.hub.register() else {
        refuse(socket).await;
        return;
    };

    let (sink, mut stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(sink, Arc::clone(&queue)));
    let mut writer_done = false;

    let mut session = Session::new(id);
    session.opened();
    tracing::debug!(session = id, "Remote connection opened");

    let auth_deadline = tokio::time::sleep(app.auth_timeout);
    tokio::pin!(auth_deadline);

    loop {
        let actions = tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => session.on_text(&text, &app.auth),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!(session = id, "Remote socket error: {}", e);
                    break;
                }
            },
            () = &mut auth_deadline, if session.state() == SessionState::Authenticating => {
                session.on_auth_timeout()
            }
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        };

        for action in actions {
            execute(action, id, &queue, &app).await;
        }
    }

    app.hub.remove(id);
    session.closed();
    if !writer_done {
        if !queue.is_closing() {
            queue.abort();
        }
        if tokio::time::timeout(CLOSE_GRACE, writer).await.is_err() {
            tracing::debug!(session = id, "Remote writer did not finish in time");
        }
    }
    tracing::debug!(session = id, dropped = queue.dropped(), "Remote connection closed");
}

async fn execute(action: Action, id: SessionId, queue: &Arc<OutboundQueue>, app: &Arc<AppState>) {
    match action {
        Action::Push(event) => push(queue, &event),
        Action::Activate => {
            app.hub.activate(id);
            let state = RemoteState::from(&app.controller.snapshot());
            push(queue, &ServerEvent::State(state));
        }
        Action::Close { code, reason } => queue.close(code, reason),
        Action::Control(command) => {
            if let Err(e) = app.controller.send(command).await {
                tracing::warn!(session = id, "Dropping remote command: {}", e);
                push(queue, &ServerEvent::Error("Player unavailable".to_string()));
            }
        }
        Action::Proxy => {
            let queue = Arc::clone(queue);
            let app = Arc::clone(app);
            tokio::spawn(async move {
                let event = match fetch_artwork(&app).await {
                    Ok(data) => ServerEvent::Proxy(data),
                    Err(message) => ServerEvent::Error(message),
                };
                push(&queue, &event);
            });
        }
    }
}

fn push(queue: &OutboundQueue, event: &ServerEvent) {
    match event.to_json() {
        Ok(text) => {
            queue.push(text);
        }
        Err(e) => tracing::error!("Failed to serialize remote event: {}", e),
    }
}

/// Current song's artwork as base64
async fn fetch_artwork(app: &AppState) -> std::result::Result<String, String> {
    let url = app
        .controller
        .snapshot()
        .song
        .and_then(|entry| entry.song.image_url)
        .ok_or_else(|| "No artwork for the current song".to_string())?;

    let response = app
        .http
        .get(&url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| {
            tracing::warn!("Artwork fetch failed: {}", e);
            "Failed to fetch artwork".to_string()
        })?;
    let bytes = response.bytes().await.map_err(|e| {
        tracing::warn!("Artwork read failed: {}", e);
        "Failed to fetch artwork".to_string()
    })?;

    Ok(STANDARD.encode(&bytes))
}

async fn write_loop(mut sink: SplitSink<WebSocket, Message>, queue: Arc<OutboundQueue>) {
    while let Some(item) = queue.next().await {
        match item {
            Outgoing::Text(text) => {
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Outgoing::Close { code, reason } => {
                let frame = CloseFrame {
                    code,
                    reason: reason.into(),
                };
                // The peer may already be gone
                let _ = sink.send(Message::Close(Some(frame))).await;
                break;
            }
        }
    }
}

/// Turn away a connection that arrived during shutdown
async fn refuse(mut socket: WebSocket) {
    let frame = CloseFrame {
        code: CLOSE_SHUTDOWN,
        reason: "server shutting down".into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}
