use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::ws::{
        AckResponse, ClientMessage, IntervalAction, RegisterPayload, RegisterRole, ServerMessage,
        TimerAction,
    },
    error::ServiceError,
    state::{Judge, Session, SharedState},
};

/// Role a connection is bound to after a successful registration,
/// together with the credential it registered with. The credential is
/// re-validated against the live registry on every guarded command, so
/// a token rotation takes effect mid-connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BoundRole {
    /// Administrator console.
    Admin {
        /// PIN presented at registration.
        pin: String,
    },
    /// Public display (same credential as admin, read-mostly).
    Display {
        /// PIN presented at registration.
        pin: String,
    },
    /// One referee console.
    Judge {
        /// Bound referee position.
        judge: Judge,
        /// Token presented at registration.
        token: String,
    },
    /// Read-only observer.
    Viewer,
}

/// A connection's binding to one room.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub(crate) room_id: String,
    pub(crate) role: BoundRole,
}

/// Per-connection state for the realtime gateway. Every connection
/// starts unbound and becomes bound through `client:register`.
pub(crate) struct ClientConn {
    pub(crate) id: Uuid,
    pub(crate) binding: Option<Binding>,
}

impl ClientConn {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            binding: None,
        }
    }
}

/// What the socket loop must do after a successfully handled message.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    /// Acknowledge; nothing else.
    Ack,
    /// The connection was (re-)bound: acknowledge, re-subscribe the
    /// snapshot stream, and push an immediate snapshot.
    Registered,
}

/// Handle the full lifecycle of one client WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps snapshots flowing even while we await
    // inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut conn = ClientConn::new();
    let mut forward_task: Option<JoinHandle<()>> = None;
    info!(connection = %conn.id, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let mut just_registered = false;
                let ack = match serde_json::from_str::<ClientMessage>(&text) {
                    Err(err) => {
                        warn!(connection = %conn.id, error = %err, "failed to parse client message");
                        AckResponse::error(ServiceError::InvalidPayload(err.to_string()).kind())
                    }
                    Ok(message) => match handle_client_message(&state, &mut conn, message) {
                        Ok(DispatchOutcome::Ack) => AckResponse::ok(),
                        Ok(DispatchOutcome::Registered) => {
                            if let Some(task) = forward_task.take() {
                                task.abort();
                            }
                            if let Some(binding) = conn.binding.as_ref() {
                                info!(
                                    connection = %conn.id,
                                    room_id = %binding.room_id,
                                    role = ?binding.role_name(),
                                    "client registered"
                                );
                                forward_task = Some(spawn_snapshot_forwarder(
                                    &state,
                                    &binding.room_id,
                                    outbound_tx.clone(),
                                ));
                            }
                            just_registered = true;
                            AckResponse::ok()
                        }
                        Err(err) => {
                            info!(connection = %conn.id, error = %err, "command rejected");
                            AckResponse::error(err.kind())
                        }
                    },
                };
                if send_server_message(&outbound_tx, &ServerMessage::Ack { ack }).is_err() {
                    break;
                }
                // Push the bound room's current snapshot right after a
                // registration ack so the client renders immediately.
                if just_registered {
                    let session = conn
                        .binding
                        .as_ref()
                        .and_then(|binding| state.registry().room_state(&binding.room_id));
                    if let Some(session) = session {
                        let update = ServerMessage::StateUpdate {
                            state: session.snapshot(),
                        };
                        if send_server_message(&outbound_tx, &update).is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %conn.id, error = %err, "websocket error");
                break;
            }
        }
    }

    if let Some(task) = forward_task.take() {
        task.abort();
    }
    if let Some(binding) = conn.binding.take() {
        clear_judge_presence(&state, &binding);
    }
    info!(connection = %conn.id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Apply one parsed client message against the shared state.
///
/// Guarded commands re-check the caller's credential against the live
/// registry before touching the session; any rejection leaves both the
/// session and the connection binding untouched.
pub(crate) fn handle_client_message(
    state: &SharedState,
    conn: &mut ClientConn,
    message: ClientMessage,
) -> Result<DispatchOutcome, ServiceError> {
    match message {
        ClientMessage::Register(payload) => {
            register(state, conn, payload)?;
            Ok(DispatchOutcome::Registered)
        }
        ClientMessage::RefVote { vote } => {
            let (judge, session) = authorise_judge(state, conn)?;
            session.set_vote(judge, vote);
            Ok(DispatchOutcome::Ack)
        }
        ClientMessage::RefCard { card } => {
            let (judge, session) = authorise_judge(state, conn)?;
            session.set_card(judge, card);
            Ok(DispatchOutcome::Ack)
        }
        ClientMessage::AdminReady => {
            let session = authorise_admin(state, conn)?;
            session.set_phase_ready();
            Ok(DispatchOutcome::Ack)
        }
        ClientMessage::AdminRelease => {
            let session = authorise_admin(state, conn)?;
            session.release_decision();
            Ok(DispatchOutcome::Ack)
        }
        ClientMessage::AdminClear => {
            let session = authorise_admin(state, conn)?;
            session.clear_decision();
            Ok(DispatchOutcome::Ack)
        }
        ClientMessage::TimerCommand(payload) => {
            payload.validate()?;
            let session = authorise_timer(state, conn)?;
            match payload.action {
                TimerAction::Start => session.start_timer(),
                TimerAction::Stop => session.stop_timer(),
                TimerAction::Reset => session.reset_timer(),
                TimerAction::Set => {
                    session.start_timer_with_seconds(payload.seconds.unwrap_or(60.0))
                }
                TimerAction::Unknown => return Err(ServiceError::UnknownAction),
            }
            Ok(DispatchOutcome::Ack)
        }
        ClientMessage::IntervalCommand(payload) => {
            payload.validate()?;
            let session = authorise_admin(state, conn)?;
            match payload.action {
                IntervalAction::Start => session.start_interval(),
                IntervalAction::Stop => session.stop_interval(),
                IntervalAction::Reset => session.reset_interval(),
                IntervalAction::Set => session.configure_interval(payload.seconds.unwrap_or(0.0)),
                IntervalAction::Show => session.set_interval_visible(true),
                IntervalAction::Hide => session.set_interval_visible(false),
                IntervalAction::Unknown => return Err(ServiceError::UnknownAction),
            }
            Ok(DispatchOutcome::Ack)
        }
        ClientMessage::Unknown => Err(ServiceError::UnknownAction),
    }
}

/// Validate credentials and bind the connection to the requested room.
fn register(
    state: &SharedState,
    conn: &mut ClientConn,
    payload: RegisterPayload,
) -> Result<(), ServiceError> {
    let registry = state.registry();
    let session = registry
        .room_state(&payload.room_id)
        .ok_or(ServiceError::RoomNotFound)?;

    let role = match payload.role {
        RegisterRole::Admin | RegisterRole::Display => {
            let pin = payload.pin.ok_or(ServiceError::InvalidPin)?;
            if !registry.verify_admin_pin(&payload.room_id, &pin) {
                return Err(ServiceError::InvalidPin);
            }
            if payload.role == RegisterRole::Admin {
                BoundRole::Admin { pin }
            } else {
                BoundRole::Display { pin }
            }
        }
        RegisterRole::Viewer => BoundRole::Viewer,
        referee => {
            let judge = referee
                .judge()
                .ok_or_else(|| ServiceError::Internal("role is not a referee".into()))?;
            let token = payload.token.ok_or(ServiceError::InvalidToken)?;
            if !registry.is_valid_ref_token(&payload.room_id, judge, &token) {
                return Err(ServiceError::InvalidToken);
            }
            BoundRole::Judge { judge, token }
        }
    };

    // Leave the previous room's group before binding to the new one.
    if let Some(previous) = conn.binding.take() {
        clear_judge_presence(state, &previous);
    }
    if let BoundRole::Judge { judge, .. } = &role {
        session.set_connected(*judge, true);
    }
    conn.binding = Some(Binding {
        room_id: payload.room_id,
        role,
    });
    Ok(())
}

/// Re-validate a referee binding and resolve its session.
fn authorise_judge(
    state: &SharedState,
    conn: &ClientConn,
) -> Result<(Judge, Session), ServiceError> {
    let binding = conn.binding.as_ref().ok_or(ServiceError::NotAuthorised)?;
    let BoundRole::Judge { judge, token } = &binding.role else {
        return Err(ServiceError::NotAuthorised);
    };
    if !state
        .registry()
        .is_valid_ref_token(&binding.room_id, *judge, token)
    {
        return Err(ServiceError::InvalidToken);
    }
    let session = state
        .registry()
        .room_state(&binding.room_id)
        .ok_or(ServiceError::RoomNotFound)?;
    Ok((*judge, session))
}

/// Re-validate an admin or display binding and resolve its session.
fn authorise_admin(state: &SharedState, conn: &ClientConn) -> Result<Session, ServiceError> {
    let binding = conn.binding.as_ref().ok_or(ServiceError::NotAuthorised)?;
    let pin = match &binding.role {
        BoundRole::Admin { pin } | BoundRole::Display { pin } => pin,
        _ => return Err(ServiceError::NotAuthorised),
    };
    if !state.registry().verify_admin_pin(&binding.room_id, pin) {
        return Err(ServiceError::InvalidPin);
    }
    state
        .registry()
        .room_state(&binding.room_id)
        .ok_or(ServiceError::RoomNotFound)
}

/// The lift clock is controlled by admin/display or the center referee.
fn authorise_timer(state: &SharedState, conn: &ClientConn) -> Result<Session, ServiceError> {
    let binding = conn.binding.as_ref().ok_or(ServiceError::NotAuthorised)?;
    match &binding.role {
        BoundRole::Admin { .. } | BoundRole::Display { .. } => authorise_admin(state, conn),
        BoundRole::Judge {
            judge: Judge::Center,
            ..
        } => authorise_judge(state, conn).map(|(_, session)| session),
        _ => Err(ServiceError::NotAuthorised),
    }
}

/// Clear referee presence when a judge-bound connection goes away.
fn clear_judge_presence(state: &SharedState, binding: &Binding) {
    if let BoundRole::Judge { judge, .. } = &binding.role {
        if let Some(session) = state.registry().room_state(&binding.room_id) {
            session.set_connected(*judge, false);
        }
    }
}

/// Forward a room's snapshot stream onto one connection's writer.
fn spawn_snapshot_forwarder(
    state: &SharedState,
    room_id: &str,
    tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    let mut updates = state.hub().subscribe(room_id);
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(snapshot) => {
                    let message = ServerMessage::StateUpdate { state: snapshot };
                    if send_server_message(&tx, &message).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Skipped snapshots are fine: the next one is complete.
                    warn!(skipped, "snapshot stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Serialize a server message and queue it on the writer. Serialization
/// failures are logged and swallowed (a bug, retrying cannot help); a
/// closed writer is returned so the caller can wind the connection down.
fn send_server_message(
    tx: &mpsc::UnboundedSender<Message>,
    message: &ServerMessage,
) -> Result<(), ()> {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize server message");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into())).map_err(|_| ())
}

impl Binding {
    fn role_name(&self) -> &'static str {
        match &self.role {
            BoundRole::Admin { .. } => "admin",
            BoundRole::Display { .. } => "display",
            BoundRole::Viewer => "viewer",
            BoundRole::Judge { judge, .. } => match judge {
                Judge::Left => "left",
                Judge::Center => "center",
                Judge::Right => "right",
            },
        }
    }
}

/// Ensure the writer task winds down before the socket handler returns.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
