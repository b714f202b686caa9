//! Persistent record shapes (§6.4) and the in-memory seated-player view (§3).
//!
//! These mirror the rows the Store owns and the `RoomPlayer` extension the
//! Room Engine keeps in memory. Nothing here talks to a socket or a database;
//! that's `store.rs` and `persistence.rs`.

use chrono::{DateTime, Utc};
use poker_core::card::Card;
use poker_core::ids::{RoomId, UserId};
use poker_core::protocol::{CardInfo, SeatStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `rooms.status` (§6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Closed,
}

/// Immutable-during-lifetime room configuration (§3 `RoomConfig`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub id: RoomId,
    pub name: String,
    pub small_blind: u32,
    pub big_blind: u32,
    pub min_buy_in: u32,
    pub max_buy_in: u32,
    pub max_players: u8,
}

impl RoomConfig {
    /// Build a config enforcing `bigBlind = 2*smallBlind`, `minBuyIn >=
    /// 10*bigBlind`, `maxPlayers in [2,9]` (§6.1 `POST /admin/rooms`).
    pub fn new(
        id: RoomId,
        name: String,
        small_blind: u32,
        min_buy_in: u32,
        max_buy_in: u32,
        max_players: u8,
    ) -> Result<Self, String> {
        let big_blind = small_blind * 2;
        if min_buy_in < big_blind * 10 {
            return Err(format!("minBuyIn must be at least {}", big_blind * 10));
        }
        if max_buy_in < min_buy_in {
            return Err("maxBuyIn must be >= minBuyIn".to_string());
        }
        if !(2..=9).contains(&max_players) {
            return Err("maxPlayers must be between 2 and 9".to_string());
        }
        Ok(Self {
            id,
            name,
            small_blind,
            big_blind,
            min_buy_in,
            max_buy_in,
            max_players,
        })
    }
}

/// A full room row, as stored (§6.4 `rooms`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRecord {
    pub config: RoomConfig,
    pub status: RoomStatus,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `table_players` row (§3 `Seat`). Unique on `(room_id, seat_number)` and
/// `(room_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub seat_number: u8,
    pub stack: u32,
    pub status: SeatStatus,
}

/// `users` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub balance: u32,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// `transactions.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    BuyIn,
    CashOut,
    Win,
}

/// `transactions` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub room_id: Option<RoomId>,
    pub kind: TransactionKind,
    pub amount: i64,
    pub balance_before: u32,
    pub balance_after: u32,
    pub created_at: DateTime<Utc>,
}

/// `game_history` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameHistoryRecord {
    pub id: Uuid,
    pub room_id: RoomId,
    pub winner_id: UserId,
    pub pot: u32,
    pub community_cards: Vec<CardInfo>,
    pub hand_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// The in-memory view of a seated, connected player (§3 `RoomPlayer`).
/// Extends `Seat` with the fields only the live Room Engine needs.
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    pub user_id: UserId,
    pub username: String,
    pub seat_number: u8,
    pub stack: u32,
    pub status: SeatStatus,
    pub hole_cards: Option<(Card, Card)>,
    pub current_bet: u32,
    pub connected: bool,
}

impl RoomPlayer {
    pub fn new(user_id: UserId, username: String, seat_number: u8, stack: u32) -> Self {
        Self {
            user_id,
            username,
            seat_number,
            stack,
            status: SeatStatus::Waiting,
            hole_cards: None,
            current_bet: 0,
            connected: true,
        }
    }

    pub fn to_seat(&self, room_id: RoomId) -> Seat {
        Seat {
            room_id,
            user_id: self.user_id,
            seat_number: self.seat_number,
            stack: self.stack,
            status: self.status,
        }
    }
}
