//! The Session Gateway (§4.1, §4.4): owns one WebSocket connection, tracks
//! whatever that connection has authenticated and joined so far, and turns
//! inbound frames into `RoomCommand`s. It holds no game state of its own —
//! only an id into whichever room's roster it has joined.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use poker_core::ids::RoomId;
use poker_core::protocol::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;

use crate::auth::{AuthIdentity, AuthService};
use crate::error::ClientProtocolError;
use crate::registry::RoomRegistry;
use crate::room::RoomCommand;
use crate::store::Store;

#[derive(Clone)]
pub struct GatewayState {
    pub auth: Arc<dyn AuthService>,
    pub store: Arc<dyn Store>,
    pub registry: Arc<RoomRegistry>,
}

struct Session {
    identity: Option<AuthIdentity>,
    room_id: Option<RoomId>,
    room_tx: Option<mpsc::UnboundedSender<RoomCommand>>,
}

impl Session {
    fn new() -> Self {
        Self {
            identity: None,
            room_id: None,
            room_tx: None,
        }
    }
}

pub async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let Ok(text) = serde_json::to_string(&msg) else { continue };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new();

    while let Some(Ok(msg)) = ws_rx.next().await {
        let Message::Text(text) = msg else { continue };
        let parsed: Result<ClientMessage, _> = serde_json::from_str(&text);
        match parsed {
            Ok(client_msg) => {
                dispatch(client_msg, &mut session, &state, &out_tx).await;
            }
            Err(_) => {
                let _ = out_tx.send(ServerMessage::error(classify_parse_error(&text).to_string()));
            }
        }
    }

    if let (Some(identity), Some(room_tx)) = (&session.identity, &session.room_tx) {
        let _ = room_tx.send(RoomCommand::Disconnected {
            user_id: identity.user_id,
        });
    }
    writer.abort();
}

async fn dispatch(
    msg: ClientMessage,
    session: &mut Session,
    state: &GatewayState,
    out_tx: &mpsc::UnboundedSender<ServerMessage>,
) {
    match msg {
        ClientMessage::Auth { token } => {
            match state.auth.verify(&token).await {
                Ok(identity) => {
                    let _ = out_tx.send(ServerMessage::AuthSuccess {
                        user_id: identity.user_id,
                        username: identity.username.clone(),
                    });
                    session.identity = Some(identity);
                }
                Err(_) => {
                    let _ = out_tx.send(ServerMessage::error(ClientProtocolError::InvalidToken.to_string()));
                }
            }
        }
        ClientMessage::JoinRoom { room_id } => {
            let Some(identity) = require_auth(session, out_tx) else { return };
            let user_id = identity.user_id;

            let Some(seat) = state.store.get_seat(&room_id, user_id).await else {
                let _ = out_tx.send(ServerMessage::error(ClientProtocolError::NoPersistedSeat.to_string()));
                return;
            };

            let room_tx = match state.registry.get_or_create(&room_id).await {
                Ok(tx) => tx,
                Err(_) => {
                    let _ = out_tx.send(ServerMessage::error(ClientProtocolError::RoomNotFound.to_string()));
                    return;
                }
            };

            let _ = room_tx.send(RoomCommand::Join {
                user_id,
                username: identity.username.clone(),
                seat_number: seat.seat_number,
                stack: seat.stack,
                outbound: out_tx.clone(),
            });

            let _ = out_tx.send(ServerMessage::JoinedRoom {
                room_id: room_id.clone(),
                seat_number: seat.seat_number,
                stack: seat.stack,
            });

            session.room_id = Some(room_id);
            session.room_tx = Some(room_tx);
        }
        ClientMessage::LeaveRoom {} => {
            let Some(identity) = require_auth(session, out_tx) else { return };
            let Some(room_tx) = &session.room_tx else {
                let _ = out_tx.send(ServerMessage::error(ClientProtocolError::NotSeated.to_string()));
                return;
            };
            let _ = room_tx.send(RoomCommand::Leave {
                user_id: identity.user_id,
            });
            let _ = out_tx.send(ServerMessage::LeftRoom {});
            session.room_id = None;
            session.room_tx = None;
        }
        ClientMessage::PlayerAction { action, amount } => {
            let Some(identity) = require_auth(session, out_tx) else { return };
            let Some(room_tx) = &session.room_tx else {
                let _ = out_tx.send(ServerMessage::error(ClientProtocolError::NotSeated.to_string()));
                return;
            };
            let _ = room_tx.send(RoomCommand::PlayerAction {
                user_id: identity.user_id,
                action,
                amount,
            });
        }
        ClientMessage::Spectate { room_id } => {
            // Spectating needs no auth (§4.1: "any (auth optional)").
            let room_tx = match state.registry.get_or_create(&room_id).await {
                Ok(tx) => tx,
                Err(_) => {
                    let _ = out_tx.send(ServerMessage::error(ClientProtocolError::RoomNotFound.to_string()));
                    return;
                }
            };
            let _ = room_tx.send(RoomCommand::Spectate {
                outbound: out_tx.clone(),
            });
            let _ = out_tx.send(ServerMessage::Spectating { room_id: room_id.clone() });
            session.room_id = Some(room_id);
            session.room_tx = Some(room_tx);
        }
        ClientMessage::ChatMessage { message } => {
            let Some(identity) = require_auth(session, out_tx) else { return };
            let Some(room_tx) = &session.room_tx else { return };
            let _ = room_tx.send(RoomCommand::ChatMessage {
                user_id: identity.user_id,
                message,
            });
        }
    }
}

/// Distinguish the two inbound-frame failure modes §4.1 requires a distinct
/// error for: text that isn't JSON at all versus JSON whose `type` tag is
/// missing or not one of `ClientMessage`'s variants.
fn classify_parse_error(text: &str) -> ClientProtocolError {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => {
            let type_tag = value.get("type").and_then(|t| t.as_str()).unwrap_or("").to_string();
            ClientProtocolError::UnknownMessageType(type_tag)
        }
        Err(_) => ClientProtocolError::InvalidMessageFormat,
    }
}

fn require_auth<'a>(
    session: &'a Session,
    out_tx: &mpsc::UnboundedSender<ServerMessage>,
) -> Option<&'a AuthIdentity> {
    match &session.identity {
        Some(identity) => Some(identity),
        None => {
            let _ = out_tx.send(ServerMessage::error(ClientProtocolError::NotAuthenticated.to_string()));
            None
        }
    }
}

