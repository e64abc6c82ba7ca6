//! WebSocket push: live change events for signed-in clients.
//!
//! Connection lifecycle:
//! 1. Client calls `POST /api/auth/ws-ticket` to get a one-time ticket
//! 2. Client opens `GET /ws/connect?ticket=xxx`; ticket validated, WS upgraded
//! 3. Server subscribes the change hub scoped to the user, sends Welcome
//! 4. Matching [`ChangeEvent`]s are forwarded as JSON frames
//! 5. Heartbeat every 30s; 3 missed pongs disconnect
//!
//! The hub subscriptions are dropped on disconnect, so a dead socket never
//! keeps a publisher fanning out to it.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::enums::UserRole;
use crate::realtime::{ChangeEvent, ChangeHub, Resource, Subscription};
use crate::state::AppState;

/// Server heartbeat cadence.
const HEARTBEAT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

/// Missed pongs tolerated before the server hangs up (3 x 30s = 90s).
const MAX_MISSED_HEARTBEATS: u32 = 3;

/// Frames the server pushes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum WsOutgoing {
    Welcome {
        session_id: String,
        user_id: Uuid,
        role: UserRole,
    },
    Change(ChangeEvent),
    Heartbeat {
        server_time: String,
    },
}

/// Frames the client may send. Everything else is ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum WsIncoming {
    Pong {},
}

#[derive(Deserialize)]
pub struct WsAuthQuery {
    ticket: String,
}

/// Action returned by [`WsSessionState::on_heartbeat_tick`].
#[derive(Debug, PartialEq)]
pub(crate) enum HeartbeatAction {
    SendHeartbeat,
    HeartbeatTimeout,
}

/// Heartbeat bookkeeping, separated from the socket so the miss counting
/// is testable without a live connection.
pub(crate) struct WsSessionState {
    missed_heartbeats: u32,
}

impl WsSessionState {
    fn new() -> Self {
        Self {
            missed_heartbeats: 0,
        }
    }

    fn on_pong(&mut self) {
        self.missed_heartbeats = 0;
    }

    fn on_heartbeat_tick(&mut self) -> HeartbeatAction {
        if self.missed_heartbeats >= MAX_MISSED_HEARTBEATS {
            return HeartbeatAction::HeartbeatTimeout;
        }
        self.missed_heartbeats += 1;
        HeartbeatAction::SendHeartbeat
    }
}

/// WebSocket upgrade handler. The one-time ticket from
/// `POST /api/auth/ws-ticket` is the whole handshake; a missing or spent
/// ticket is rejected before the upgrade.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(ctx): State<ApiContext>,
    Query(query): Query<WsAuthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (user_id, role) = {
        let mut tickets = ctx
            .ws_tickets
            .lock()
            .map_err(|_| ApiError::Internal("ticket lock".into()))?;
        tickets
            .consume(&query.ticket)
            .ok_or(ApiError::Unauthorized)?
    };

    tracing::info!(user_id = %user_id, role = role.as_str(), "websocket upgrade accepted");
    let state = ctx.state.clone();
    Ok(ws.on_upgrade(move |socket| handle_ws(socket, state, user_id, role)))
}

/// Hub subscriptions scoping the change feed to what this user may see.
///
/// Doctors watch the whole case table (the shared queue moves under them);
/// patients only their own rows. Conversation and message events reach
/// exactly the two participants. The catalog is public to every role.
fn subscriptions_for(hub: &ChangeHub, user_id: Uuid, role: UserRole) -> Vec<Subscription> {
    let me = user_id.to_string();
    match role {
        UserRole::Patient => vec![
            hub.subscribe(Resource::Cases, field_is("patient_id", me.clone())),
            hub.subscribe(Resource::Conversations, participant(me.clone())),
            hub.subscribe(Resource::Messages, message_party(me.clone())),
            hub.subscribe(Resource::Orders, field_is("patient_id", me)),
            hub.subscribe(Resource::Medications, |_| true),
        ],
        UserRole::Doctor => vec![
            hub.subscribe(Resource::Cases, |_| true),
            hub.subscribe(Resource::Conversations, participant(me.clone())),
            hub.subscribe(Resource::Messages, message_party(me)),
            hub.subscribe(Resource::Medications, |_| true),
        ],
        UserRole::Admin => vec![
            hub.subscribe(Resource::Cases, |_| true),
            hub.subscribe(Resource::Orders, |_| true),
            hub.subscribe(Resource::Medications, |_| true),
        ],
    }
}

fn field_is(
    field: &'static str,
    me: String,
) -> impl Fn(&ChangeEvent) -> bool + Send + Sync + 'static {
    move |event| event.payload[field] == me
}

fn participant(me: String) -> impl Fn(&ChangeEvent) -> bool + Send + Sync + 'static {
    move |event| event.payload["doctor_id"] == me || event.payload["patient_id"] == me
}

/// Message events name the sender and receiver; read receipts carry the
/// thread's participants instead.
fn message_party(me: String) -> impl Fn(&ChangeEvent) -> bool + Send + Sync + 'static {
    move |event| {
        ["sender_id", "receiver_id", "doctor_id", "patient_id"]
            .iter()
            .any(|field| event.payload[*field] == me)
    }
}

/// Main connection handler: forward matching hub events, keep the
/// heartbeat, tear everything down on disconnect.
async fn handle_ws(socket: WebSocket, state: Arc<AppState>, user_id: Uuid, role: UserRole) {
    let (ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<WsOutgoing>(64);

    // Subscriptions are registered before the Welcome frame goes out, so a
    // client that has seen Welcome never misses a subsequent event.
    let mut forwarders = Vec::new();
    for mut sub in subscriptions_for(&state.hub, user_id, role) {
        let tx = tx.clone();
        forwarders.push(tokio::spawn(async move {
            while let Some(event) = sub.recv().await {
                if tx.send(WsOutgoing::Change(event)).await.is_err() {
                    break;
                }
            }
        }));
    }

    // Sender task: channel to socket.
    let sender_handle = tokio::spawn(async move {
        let mut sink = ws_sink;
        while let Some(frame) = rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(j) => j,
                Err(_) => continue,
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let _ = tx
        .send(WsOutgoing::Welcome {
            session_id: Uuid::new_v4().to_string(),
            user_id,
            role,
        })
        .await;

    let mut session = WsSessionState::new();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(ref text))) => {
                        if let Ok(WsIncoming::Pong {}) = serde_json::from_str::<WsIncoming>(text) {
                            session.on_pong();
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {} // ping/pong frames handled by the transport
                }
            }
            _ = heartbeat.tick() => {
                match session.on_heartbeat_tick() {
                    HeartbeatAction::HeartbeatTimeout => {
                        tracing::info!(
                            user_id = %user_id,
                            "{MAX_MISSED_HEARTBEATS} missed heartbeats, disconnecting"
                        );
                        break;
                    }
                    HeartbeatAction::SendHeartbeat => {
                        let _ = tx.send(WsOutgoing::Heartbeat {
                            server_time: chrono::Utc::now().to_rfc3339(),
                        }).await;
                    }
                }
            }
        }
    }

    // Aborting a forwarder drops its Subscription, which removes the hub
    // handler immediately.
    for handle in &forwarders {
        handle.abort();
    }
    drop(tx);
    let _ = sender_handle.await;

    tracing::info!(user_id = %user_id, "websocket disconnected");
}
