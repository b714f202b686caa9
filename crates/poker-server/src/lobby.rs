//! The Lobby HTTP surface (§6.1): registration, login, room discovery, and
//! seating. Everything here is a thin wrapper over `Store` plus the wallet
//! bookkeeping the Room Engine otherwise never touches.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use poker_core::ids::{validate_room_id, RoomId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{AuthIdentity, AuthService};
use crate::error::BusinessRuleError;
use crate::model::{RoomConfig, RoomRecord, RoomStatus, Seat, TransactionKind, User};
use crate::store::{transaction, Store};

/// Chips a freshly registered account starts with (§6.1).
const SIGNUP_BONUS: u32 = 50_000;

#[derive(Clone)]
pub struct LobbyState {
    pub auth: Arc<dyn AuthService>,
    pub store: Arc<dyn Store>,
}

pub fn router(state: LobbyState) -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/rooms", get(list_rooms))
        .route("/rooms/{id}", get(get_room))
        .route("/rooms/{id}/join", post(join_room))
        .route("/rooms/{id}/leave", post(leave_room))
        .route("/admin/rooms", post(create_room))
        .route("/admin/rooms/{id}", patch(update_room))
        .route("/admin/rooms/{id}", delete(delete_room))
        .with_state(state)
}

fn envelope_ok<T: Serialize>(data: T) -> Response {
    Json(json!({ "success": true, "data": data })).into_response()
}

fn envelope_err(err: BusinessRuleError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(json!({ "success": false, "error": err.to_string() }))).into_response()
}

async fn authenticate(auth: &Arc<dyn AuthService>, headers: &axum::http::HeaderMap) -> Result<AuthIdentity, BusinessRuleError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(BusinessRuleError::InvalidCredentials)?;
    auth.verify(token).await.map_err(|_| BusinessRuleError::InvalidCredentials)
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    username: String,
    password: String,
}

async fn register(State(state): State<LobbyState>, Json(req): Json<RegisterRequest>) -> Response {
    if req.password.len() < 6 {
        return envelope_err(BusinessRuleError::Validation("password must be at least 6 characters".to_string()));
    }
    if !(3..=20).contains(&req.username.len()) {
        return envelope_err(BusinessRuleError::Validation("username must be 3-20 characters".to_string()));
    }
    if state.store.find_user_by_email_or_username(&req.email, &req.username).await.is_some() {
        return envelope_err(BusinessRuleError::DuplicateAccount);
    }

    let user = User {
        id: UserId::new(),
        email: req.email,
        username: req.username,
        password_hash: hash_password(&req.password),
        balance: SIGNUP_BONUS,
        is_admin: false,
        created_at: Utc::now(),
    };

    if state.store.create_user(user.clone()).await.is_err() {
        return envelope_err(BusinessRuleError::DuplicateAccount);
    }

    let token = state
        .auth
        .issue(AuthIdentity {
            user_id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        })
        .await;

    envelope_ok(json!({ "token": token, "user": user }))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(State(state): State<LobbyState>, Json(req): Json<LoginRequest>) -> Response {
    let Some(user) = state.store.find_user_by_email_or_username(&req.email, &req.email).await else {
        return envelope_err(BusinessRuleError::InvalidCredentials);
    };
    if user.password_hash != hash_password(&req.password) {
        return envelope_err(BusinessRuleError::InvalidCredentials);
    }
    let token = state
        .auth
        .issue(AuthIdentity {
            user_id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        })
        .await;
    envelope_ok(json!({ "token": token }))
}

/// Not a real KDF — the Auth service owns password hashing in production
/// (§6.3); this stand-in only needs to be deterministic for the in-memory
/// Store round-trip.
fn hash_password(password: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    password.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

#[derive(Serialize)]
struct RoomSummary {
    #[serde(flatten)]
    config: RoomConfig,
    status: RoomStatus,
    seat_count: usize,
}

async fn list_rooms(State(state): State<LobbyState>) -> Response {
    let mut summaries = Vec::new();
    for room in state.store.list_rooms().await {
        if room.status == RoomStatus::Waiting {
            let seat_count = state.store.list_seats(&room.config.id).await.len();
            summaries.push(RoomSummary {
                config: room.config,
                status: room.status,
                seat_count,
            });
        }
    }
    envelope_ok(summaries)
}

async fn get_room(State(state): State<LobbyState>, Path(id): Path<String>) -> Response {
    let room_id = RoomId::from(id);
    match state.store.get_room(&room_id).await {
        Some(room) => {
            let seat_count = state.store.list_seats(&room_id).await.len();
            envelope_ok(RoomSummary {
                config: room.config,
                status: room.status,
                seat_count,
            })
        }
        None => envelope_err(BusinessRuleError::NotFound),
    }
}

#[derive(Deserialize)]
struct JoinRequest {
    buy_in: u32,
}

async fn join_room(
    State(state): State<LobbyState>,
    headers: axum::http::HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<JoinRequest>,
) -> Response {
    let identity = match authenticate(&state.auth, &headers).await {
        Ok(identity) => identity,
        Err(e) => return envelope_err(e),
    };
    let room_id = RoomId::from(id);

    let Some(room) = state.store.get_room(&room_id).await else {
        return envelope_err(BusinessRuleError::NotFound);
    };
    if room.status == RoomStatus::Closed {
        return envelope_err(BusinessRuleError::RoomClosed);
    }
    if req.buy_in < room.config.min_buy_in || req.buy_in > room.config.max_buy_in {
        return envelope_err(BusinessRuleError::BuyInOutOfRange {
            min: room.config.min_buy_in,
            max: room.config.max_buy_in,
        });
    }

    let Some(user) = state.store.find_user_by_id(identity.user_id).await else {
        return envelope_err(BusinessRuleError::NotFound);
    };
    if user.balance < req.buy_in || user.balance < room.config.big_blind * 3 {
        return envelope_err(BusinessRuleError::InsufficientBalance);
    }

    if state.store.get_seat(&room_id, identity.user_id).await.is_some() {
        return envelope_err(BusinessRuleError::AlreadySeated);
    }

    let existing_seats = state.store.list_seats(&room_id).await;
    if existing_seats.len() >= room.config.max_players as usize {
        return envelope_err(BusinessRuleError::SeatTaken);
    }
    let taken: std::collections::HashSet<u8> = existing_seats.iter().map(|s| s.seat_number).collect();
    let Some(seat_number) = (0..room.config.max_players).find(|n| !taken.contains(n)) else {
        return envelope_err(BusinessRuleError::SeatTaken);
    };

    let balance_before = user.balance;
    let balance_after = balance_before - req.buy_in;
    if state.store.set_balance(identity.user_id, balance_after).await.is_err() {
        return envelope_err(BusinessRuleError::NotFound);
    }

    let seat = Seat {
        room_id: room_id.clone(),
        user_id: identity.user_id,
        seat_number,
        stack: req.buy_in,
        status: poker_core::protocol::SeatStatus::Waiting,
    };
    if state.store.upsert_seat(seat.clone()).await.is_err() {
        return envelope_err(BusinessRuleError::NotFound);
    }

    let _ = state
        .store
        .append_transaction(transaction(
            identity.user_id,
            Some(room_id),
            TransactionKind::BuyIn,
            -(req.buy_in as i64),
            balance_before,
            balance_after,
        ))
        .await;

    envelope_ok(seat)
}

async fn leave_room(
    State(state): State<LobbyState>,
    headers: axum::http::HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let identity = match authenticate(&state.auth, &headers).await {
        Ok(identity) => identity,
        Err(e) => return envelope_err(e),
    };
    let room_id = RoomId::from(id);

    let Some(seat) = state.store.get_seat(&room_id, identity.user_id).await else {
        return envelope_err(BusinessRuleError::NotFound);
    };
    let Some(user) = state.store.find_user_by_id(identity.user_id).await else {
        return envelope_err(BusinessRuleError::NotFound);
    };

    let balance_before = user.balance;
    let balance_after = balance_before + seat.stack;
    let _ = state.store.set_balance(identity.user_id, balance_after).await;
    let _ = state.store.delete_seat(&room_id, identity.user_id).await;
    let _ = state
        .store
        .append_transaction(transaction(
            identity.user_id,
            Some(room_id),
            TransactionKind::CashOut,
            seat.stack as i64,
            balance_before,
            balance_after,
        ))
        .await;

    envelope_ok(json!({ "balance": balance_after }))
}

#[derive(Deserialize)]
struct CreateRoomRequest {
    id: String,
    name: String,
    small_blind: u32,
    min_buy_in: u32,
    max_buy_in: u32,
    max_players: u8,
}

async fn create_room(
    State(state): State<LobbyState>,
    headers: axum::http::HeaderMap,
    Json(req): Json<CreateRoomRequest>,
) -> Response {
    let identity = match authenticate(&state.auth, &headers).await {
        Ok(identity) => identity,
        Err(e) => return envelope_err(e),
    };
    if !identity.is_admin {
        return envelope_err(BusinessRuleError::Forbidden);
    }
    if validate_room_id(&req.id).is_err() {
        return envelope_err(BusinessRuleError::Validation("invalid room id".to_string()));
    }

    let config = match RoomConfig::new(
        RoomId::from(req.id),
        req.name,
        req.small_blind,
        req.min_buy_in,
        req.max_buy_in,
        req.max_players,
    ) {
        Ok(config) => config,
        Err(msg) => return envelope_err(BusinessRuleError::Validation(msg)),
    };

    let record = RoomRecord {
        config,
        status: RoomStatus::Waiting,
        created_by: identity.user_id,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    match state.store.create_room(record.clone()).await {
        Ok(()) => envelope_ok(record),
        Err(_) => envelope_err(BusinessRuleError::Validation("room id already exists".to_string())),
    }
}

#[derive(Deserialize)]
struct UpdateRoomRequest {
    status: RoomStatus,
}

async fn update_room(
    State(state): State<LobbyState>,
    headers: axum::http::HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoomRequest>,
) -> Response {
    let identity = match authenticate(&state.auth, &headers).await {
        Ok(identity) => identity,
        Err(e) => return envelope_err(e),
    };
    if !identity.is_admin {
        return envelope_err(BusinessRuleError::Forbidden);
    }
    let room_id = RoomId::from(id);
    let Some(mut record) = state.store.get_room(&room_id).await else {
        return envelope_err(BusinessRuleError::NotFound);
    };
    record.status = req.status;
    record.updated_at = Utc::now();
    match state.store.update_room(record.clone()).await {
        Ok(()) => envelope_ok(record),
        Err(_) => envelope_err(BusinessRuleError::NotFound),
    }
}

async fn delete_room(
    State(state): State<LobbyState>,
    headers: axum::http::HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let identity = match authenticate(&state.auth, &headers).await {
        Ok(identity) => identity,
        Err(e) => return envelope_err(e),
    };
    if !identity.is_admin {
        return envelope_err(BusinessRuleError::Forbidden);
    }
    let room_id = RoomId::from(id);
    if !state.store.list_seats(&room_id).await.is_empty() {
        return envelope_err(BusinessRuleError::RoomNotEmpty);
    }
    match state.store.delete_room(&room_id).await {
        Ok(()) => envelope_ok(json!({ "deleted": true })),
        Err(_) => envelope_err(BusinessRuleError::NotFound),
    }
}

