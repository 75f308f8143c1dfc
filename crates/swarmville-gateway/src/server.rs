use crate::api;
use crate::connection::ClientRegistry;
use crate::router::MessageRouter;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use swarmville_orchestrator::{EventBus, Orchestrator};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub router: Arc<MessageRouter>,
    pub connections: Arc<ClientRegistry>,
}

/// The main gateway server.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the HTTP/WebSocket app and start forwarding `events` to
    /// connected WebSocket clients. Must be called inside a Tokio runtime.
    pub fn build(orchestrator: Arc<Orchestrator>, events: &EventBus) -> Router {
        let connections = ClientRegistry::new();
        let router = Arc::new(MessageRouter::new(
            orchestrator.clone(),
            connections.clone(),
        ));
        spawn_event_forwarder(events.subscribe(), connections.clone());

        let state = Arc::new(AppState {
            orchestrator,
            router,
            connections,
        });

        Router::new()
            .route("/", get(index_handler))
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .route("/tasks", get(api::list_tasks).post(api::create_task))
            .route("/tasks/{id}", get(api::get_task))
            .route("/tasks/{id}/pause", put(api::pause_task))
            .route("/tasks/{id}/resume", put(api::resume_task))
            .route("/tasks/{id}/reassign", put(api::reassign_task))
            .route("/agents", get(api::list_agents))
            .route("/agents/states", get(api::agent_states))
            .route("/approvals", get(api::list_approvals))
            .route("/approvals/{id}", get(api::get_approval))
            .route("/approvals/{id}/approve", put(api::approve))
            .route("/approvals/{id}/deny", put(api::deny))
            .route("/conflicts", get(api::list_conflicts))
            .with_state(state)
    }
}

/// Relay every orchestration event to all WebSocket clients as JSON.
pub fn spawn_event_forwarder(
    mut events: broadcast::Receiver<swarmville_core::OrchestrationEvent>,
    connections: Arc<ClientRegistry>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        connections.broadcast(&json).await;
                    }
                    Err(e) => error!(error = %e, "Failed to serialize event"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event forwarder lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "swarmville"}))
}

async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "SwarmVille",
        "version": env!("CARGO_PKG_VERSION"),
        "agents": state.orchestrator.roster().len(),
        "websocket_clients": state.connections.client_count().await,
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending messages back to the WebSocket
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.connections.register(connection_id, tx).await;
    info!(connection_id = %connection_id, "WebSocket connected");

    state.router.send_agent_states(connection_id).await;

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let router = state.router.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) = router.handle_message(text.as_str(), connection_id).await {
                        error!(error = %e, "Failed to handle message");
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.connections.unregister(connection_id).await;
    info!(connection_id = %connection_id, "WebSocket disconnected");
}
