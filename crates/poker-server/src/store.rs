//! The Store boundary (§4.5, §6.4): durable persistence, named by interface
//! only. `InMemoryStore` is a simplified stand-in good enough to exercise the
//! Engine end-to-end; a real deployment swaps it for a database-backed impl
//! without the Engine noticing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use poker_core::ids::{RoomId, UserId};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{GameHistoryRecord, RoomRecord, Seat, Transaction, TransactionKind, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("duplicate: {0}")]
    Duplicate(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: User) -> Result<(), StoreError>;
    async fn find_user_by_id(&self, id: UserId) -> Option<User>;
    async fn find_user_by_email_or_username(&self, email: &str, username: &str) -> Option<User>;
    async fn set_balance(&self, id: UserId, balance: u32) -> Result<(), StoreError>;

    async fn create_room(&self, room: RoomRecord) -> Result<(), StoreError>;
    async fn get_room(&self, id: &RoomId) -> Option<RoomRecord>;
    async fn list_rooms(&self) -> Vec<RoomRecord>;
    async fn update_room(&self, room: RoomRecord) -> Result<(), StoreError>;
    async fn delete_room(&self, id: &RoomId) -> Result<(), StoreError>;

    async fn upsert_seat(&self, seat: Seat) -> Result<(), StoreError>;
    async fn delete_seat(&self, room_id: &RoomId, user_id: UserId) -> Result<(), StoreError>;
    async fn get_seat(&self, room_id: &RoomId, user_id: UserId) -> Option<Seat>;
    async fn list_seats(&self, room_id: &RoomId) -> Vec<Seat>;

    async fn append_transaction(&self, tx: Transaction) -> Result<(), StoreError>;
    async fn append_game_history(&self, entry: GameHistoryRecord) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    rooms: HashMap<RoomId, RoomRecord>,
    seats: HashMap<(RoomId, UserId), Seat>,
    transactions: Vec<Transaction>,
    game_history: Vec<GameHistoryRecord>,
}

pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_user(&self, user: User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email || u.username == user.username) {
            return Err(StoreError::Duplicate("email or username taken".to_string()));
        }
        tables.users.insert(user.id, user);
        Ok(())
    }

    async fn find_user_by_id(&self, id: UserId) -> Option<User> {
        self.tables.read().await.users.get(&id).cloned()
    }

    async fn find_user_by_email_or_username(&self, email: &str, username: &str) -> Option<User> {
        self.tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email || u.username == username)
            .cloned()
    }

    async fn set_balance(&self, id: UserId, balance: u32) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.balance = balance;
        Ok(())
    }

    async fn create_room(&self, room: RoomRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.rooms.contains_key(&room.config.id) {
            return Err(StoreError::Duplicate(room.config.id.to_string()));
        }
        tables.rooms.insert(room.config.id.clone(), room);
        Ok(())
    }

    async fn get_room(&self, id: &RoomId) -> Option<RoomRecord> {
        self.tables.read().await.rooms.get(id).cloned()
    }

    async fn list_rooms(&self) -> Vec<RoomRecord> {
        self.tables.read().await.rooms.values().cloned().collect()
    }

    async fn update_room(&self, room: RoomRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.rooms.contains_key(&room.config.id) {
            return Err(StoreError::NotFound);
        }
        tables.rooms.insert(room.config.id.clone(), room);
        Ok(())
    }

    async fn delete_room(&self, id: &RoomId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.seats.keys().any(|(room_id, _)| room_id == id) {
            return Err(StoreError::Duplicate("room has seated players".to_string()));
        }
        tables.rooms.remove(id).ok_or(StoreError::NotFound)?;
        Ok(())
    }

    async fn upsert_seat(&self, seat: Seat) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.seats.insert((seat.room_id.clone(), seat.user_id), seat);
        Ok(())
    }

    async fn delete_seat(&self, room_id: &RoomId, user_id: UserId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.seats.remove(&(room_id.clone(), user_id)).ok_or(StoreError::NotFound)?;
        Ok(())
    }

    async fn get_seat(&self, room_id: &RoomId, user_id: UserId) -> Option<Seat> {
        self.tables.read().await.seats.get(&(room_id.clone(), user_id)).cloned()
    }

    async fn list_seats(&self, room_id: &RoomId) -> Vec<Seat> {
        self.tables
            .read()
            .await
            .seats
            .values()
            .filter(|s| &s.room_id == room_id)
            .cloned()
            .collect()
    }

    async fn append_transaction(&self, tx: Transaction) -> Result<(), StoreError> {
        self.tables.write().await.transactions.push(tx);
        Ok(())
    }

    async fn append_game_history(&self, entry: GameHistoryRecord) -> Result<(), StoreError> {
        self.tables.write().await.game_history.push(entry);
        Ok(())
    }
}

/// Convenience constructor used by the Lobby when crediting/debiting a
/// wallet, keeping `balance_before`/`balance_after` bookkeeping in one place.
pub fn transaction(
    user_id: UserId,
    room_id: Option<RoomId>,
    kind: TransactionKind,
    amount: i64,
    balance_before: u32,
    balance_after: u32,
) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        user_id,
        room_id,
        kind,
        amount,
        balance_before,
        balance_after,
        created_at: Utc::now(),
    }
}
