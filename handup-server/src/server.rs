//! HTTP and WebSocket surface: shared state, router, handlers.
//!
//! Handlers stay thin: decode the request, thread the caller's identity
//! into the lifecycle engine, and wrap the result in the
//! `{success, data}` envelope. The WebSocket route subscribes an observer
//! to the broadcast hub before completing the upgrade, so a connected
//! client is guaranteed to see every event accepted afterwards.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use handup_proto::event::{self, BoardEvent};
use handup_proto::task::{NewTask, TaskId, TaskPatch, TaskView};
use handup_proto::user::{LoginRequest, RegisterRequest, UserProfile};

use crate::auth::{AuthService, Identity};
use crate::broadcast::{BroadcastHub, EventSink};
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::store::UserStore;
use crate::tasks::TaskBoard;

/// Shared server state: the gate, the engine, and the hub.
pub struct AppState {
    /// Issues and verifies bearer credentials.
    pub auth: AuthService,
    /// The task lifecycle engine.
    pub board: TaskBoard,
    /// Fan-out channel for connected observers.
    pub hub: Arc<BroadcastHub>,
}

/// Builds the shared state from a resolved configuration.
#[must_use]
pub fn build_state(config: &ServerConfig) -> Arc<AppState> {
    let users = Arc::new(UserStore::new());
    let hub = Arc::new(BroadcastHub::new(config.event_buffer));
    let board = TaskBoard::new(
        Arc::clone(&users),
        Arc::clone(&hub) as Arc<dyn EventSink>,
    );
    let auth = AuthService::new(users, &config.jwt_secret, config.token_ttl_days);
    Arc::new(AppState { auth, board, hub })
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/my-tasks", get(my_tasks))
        .route("/tasks/{id}", put(update_task).delete(delete_task))
        .route("/tasks/{id}/claim", put(claim_task))
        .route("/tasks/{id}/complete", put(complete_task))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Starts the server on the given address and returns the bound address
/// and a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
    state: Arc<AppState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok((bound_addr, handle))
}

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

/// `{success, token, user}` for the auth endpoints.
#[derive(Debug, Serialize)]
struct AuthBody {
    success: bool,
    token: String,
    user: UserProfile,
}

/// `{success, user}` for `GET /auth/me`.
#[derive(Debug, Serialize)]
struct UserBody {
    success: bool,
    user: UserProfile,
}

/// `{success, data}` for task endpoints.
#[derive(Debug, Serialize)]
struct DataBody<T> {
    success: bool,
    data: T,
}

/// `{success, count, data}` for `GET /tasks/my-tasks`.
#[derive(Debug, Serialize)]
struct CountedBody {
    success: bool,
    count: usize,
    data: Vec<TaskView>,
}

fn data<T: Serialize>(value: T) -> Json<DataBody<T>> {
    Json(DataBody {
        success: true,
        data: value,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn root() -> &'static str {
    "HandUp Server is Running"
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthBody>), ApiError> {
    let (token, user) = state.auth.register(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthBody {
            success: true,
            token,
            user,
        }),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthBody>, ApiError> {
    let (token, user) = state.auth.login(request).await?;
    Ok(Json(AuthBody {
        success: true,
        token,
        user,
    }))
}

async fn me(Identity(user): Identity) -> Json<UserBody> {
    Json(UserBody {
        success: true,
        user: UserProfile::from(&user),
    })
}

async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<DataBody<Vec<TaskView>>> {
    data(state.board.list().await)
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    Json(payload): Json<NewTask>,
) -> Result<(StatusCode, Json<DataBody<TaskView>>), ApiError> {
    let task = state.board.create(&caller, payload).await?;
    Ok((StatusCode::CREATED, data(task)))
}

async fn update_task(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    Path(id): Path<Uuid>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<DataBody<TaskView>>, ApiError> {
    let task = state
        .board
        .update(&caller, &TaskId::from_uuid(id), patch)
        .await?;
    Ok(data(task))
}

async fn claim_task(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<DataBody<TaskView>>, ApiError> {
    let task = state.board.claim(&caller, &TaskId::from_uuid(id)).await?;
    Ok(data(task))
}

async fn complete_task(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<DataBody<TaskView>>, ApiError> {
    let task = state
        .board
        .complete(&caller, &TaskId::from_uuid(id))
        .await?;
    Ok(data(task))
}

async fn my_tasks(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
) -> Json<CountedBody> {
    let tasks = state.board.list_mine(&caller).await;
    Json(CountedBody {
        success: true,
        count: tasks.len(),
        data: tasks,
    })
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<DataBody<serde_json::Value>>, ApiError> {
    state.board.delete(&caller, &TaskId::from_uuid(id)).await?;
    Ok(data(serde_json::Value::Object(serde_json::Map::new())))
}

// ---------------------------------------------------------------------------
// WebSocket push channel
// ---------------------------------------------------------------------------

/// Upgrades to a WebSocket and attaches the observer to the hub.
///
/// The subscription is taken before the upgrade response is sent, so by
/// the time the client's handshake completes it is already registered and
/// cannot miss events published after connecting.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let events = state.hub.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, events))
}

/// Forwards broadcast events to one observer until either side hangs up.
///
/// The observer never sends application messages; incoming frames other
/// than Close are ignored. A lagging observer loses the skipped events
/// rather than slowing anyone down.
async fn handle_socket(socket: WebSocket, mut events: broadcast::Receiver<BoardEvent>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    tracing::info!("observer connected");

    let mut write_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match event::encode(&event) {
                    Ok(text) => {
                        if ws_sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode event");
                    }
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "observer lagging, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Close(_) => break,
                _ => {
                    // Observers have nothing to say; drop other frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut write_task => {
            read_task.abort();
        }
        _ = &mut read_task => {
            write_task.abort();
        }
    }

    tracing::info!("observer disconnected");
}
