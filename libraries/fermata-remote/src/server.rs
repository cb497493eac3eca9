//! HTTP/WebSocket listener
//!
//! Routes:
//! - `GET /ws`: remote session socket
//! - `GET /`: the remote web client page, or the session socket when the
//!   request is a WebSocket upgrade (the client connects to its own page URL)
//! - `GET /credentials`: Basic-auth guarded, returns a `Bearer` header value
//! - `GET /health`
//! - everything else: the remote web client from `static_dir`, when configured

use crate::auth::RemoteAuth;
use crate::config::RemoteConfig;
use crate::error::{RemoteError, Result};
use crate::hub::Hub;
use crate::middleware;
use crate::protocol::{RemoteState, ServerEvent};
use crate::session;
use crate::state::AppState;
use axum::{
    extract::{Request, State, WebSocketUpgrade},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use fermata_playback::{ControllerHandle, PlayerEvent};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

const ART_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub fn create_router(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    // Credential route (Basic auth required)
    let credential_routes = Router::new()
        .route("/credentials", get(credentials))
        .route_layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::basic_auth,
        ));

    let static_files = static_dir.map(ServeDir::new);
    let index_files = static_files.clone();

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route(
            "/",
            get(
                move |ws: Option<WebSocketUpgrade>, state: State<Arc<AppState>>, request: Request| {
                    page_or_socket(ws, state, index_files.clone(), request)
                },
            ),
        )
        .merge(credential_routes);

    if let Some(files) = static_files {
        router = router.fallback_service(files);
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn credentials(State(state): State<Arc<AppState>>) -> Result<String> {
    state.auth.credential_header()
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::run(socket, state))
}

async fn page_or_socket(
    ws: Option<WebSocketUpgrade>,
    State(state): State<Arc<AppState>>,
    static_files: Option<ServeDir>,
    request: Request,
) -> Response {
    match (ws, static_files) {
        (Some(ws), _) => ws
            .on_upgrade(move |socket| session::run(socket, state))
            .into_response(),
        (None, Some(files)) => match files.oneshot(request).await {
            Ok(response) => response.into_response(),
            Err(never) => match never {},
        },
        (None, None) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Fan controller events out to the hub
///
/// A lagging receiver has missed events, so the sessions get a full state
/// resync instead of a replay.
async fn forward_events(mut events: broadcast::Receiver<PlayerEvent>, state: Arc<AppState>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(event) = ServerEvent::from_player_event(&event) {
                    state.hub.broadcast(&event);
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Remote forwarder lagged, resyncing state");
                let snapshot = state.controller.snapshot();
                state
                    .hub
                    .broadcast(&ServerEvent::State(RemoteState::from(&snapshot)));
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::debug!("Player event stream closed");
                break;
            }
        }
    }
}

/// Running remote server
pub struct RemoteServer {
    local_addr: SocketAddr,
    state: Arc<AppState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: JoinHandle<std::io::Result<()>>,
    forwarder: JoinHandle<()>,
}

impl RemoteServer {
    /// Bind and start serving
    pub async fn start(
        config: &RemoteConfig,
        auth: RemoteAuth,
        controller: ControllerHandle,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(ART_FETCH_TIMEOUT)
            .build()?;
        let hub = Hub::new(config.max_sessions, config.outbound_capacity);
        let events = controller.subscribe();
        let state = Arc::new(AppState::new(
            controller,
            hub,
            auth,
            http,
            config.auth_timeout(),
        ));

        let app = create_router(Arc::clone(&state), config.static_dir.as_deref());

        let listener = tokio::net::TcpListener::bind(config.bind_address())
            .await
            .map_err(|e| {
                RemoteError::Config(format!("cannot bind {}: {}", config.bind_address(), e))
            })?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Remote server listening on {}", local_addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    // Sender dropped counts as shutdown too
                    let _ = shutdown_rx.await;
                })
                .await
        });
        let forwarder = tokio::spawn(forward_events(events, Arc::clone(&state)));

        Ok(Self {
            local_addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            server,
            forwarder,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connected sessions, authenticated or not
    pub fn session_count(&self) -> usize {
        self.state.hub.len()
    }

    /// Close every session with 4000 and stop listening
    pub async fn shutdown(mut self) {
        tracing::info!("Stopping remote server");
        self.state.hub.shutdown();
        self.forwarder.abort();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut self.server).await {
            Ok(Ok(Ok(()))) => tracing::info!("Remote server stopped"),
            Ok(Ok(Err(e))) => tracing::warn!("Remote server exited with error: {}", e),
            Ok(Err(e)) => tracing::warn!("Remote server task failed: {}", e),
            Err(_) => {
                tracing::warn!("Remote server did not stop in time");
                self.server.abort();
            }
        }
    }
}
