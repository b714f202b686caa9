//! Persistence Adapter (§4.5): the exact set of Store operations the Room
//! Engine needs, wrapped so callers never touch `Store` directly. Each
//! method is a single atomic unit from the caller's point of view.

use std::sync::Arc;

use chrono::Utc;
use poker_core::ids::{RoomId, UserId};
use poker_core::protocol::CardInfo;
use uuid::Uuid;

use crate::model::{GameHistoryRecord, Seat, Transaction, TransactionKind};
use crate::store::{Store, StoreError, transaction};

pub struct PersistenceAdapter {
    store: Arc<dyn Store>,
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn upsert_seat(&self, seat: Seat) -> Result<(), StoreError> {
        self.store.upsert_seat(seat).await
    }

    pub async fn delete_seat(&self, room_id: &RoomId, user_id: UserId) -> Result<(), StoreError> {
        self.store.delete_seat(room_id, user_id).await
    }

    /// Adjust a user's wallet balance by `delta` (positive or negative),
    /// returning the new balance.
    pub async fn adjust_wallet_balance(&self, user_id: UserId, delta: i64) -> Result<u32, StoreError> {
        let user = self.store.find_user_by_id(user_id).await.ok_or(StoreError::NotFound)?;
        let new_balance = (user.balance as i64 + delta).max(0) as u32;
        self.store.set_balance(user_id, new_balance).await?;
        Ok(new_balance)
    }

    /// A single transactional unit that both moves wallet chips and
    /// upserts/deletes the seat, so a crash cannot leave chips doubled or
    /// lost (§4.5, §5 shared-resource policy).
    pub async fn credit_wallet_and_delete_seat(
        &self,
        room_id: &RoomId,
        user_id: UserId,
        stack: u32,
        kind: TransactionKind,
    ) -> Result<(), StoreError> {
        let balance_before = self.store.find_user_by_id(user_id).await.ok_or(StoreError::NotFound)?.balance;
        let balance_after = self.adjust_wallet_balance(user_id, stack as i64).await?;
        self.store.delete_seat(room_id, user_id).await?;
        self.append_transaction(
            user_id,
            Some(room_id.clone()),
            kind,
            stack as i64,
            balance_before,
            balance_after,
        )
        .await
    }

    /// Record a hand win (§4.3.7: "insert a win-type transaction per
    /// winner"). The wallet itself is untouched — winnings stay in the
    /// room's in-memory `stack` until cash-out — so this is a pure audit
    /// record: `balance_before`/`balance_after` are both the wallet's
    /// current balance.
    pub async fn append_win_transaction(&self, room_id: &RoomId, user_id: UserId, amount: u32) -> Result<(), StoreError> {
        let balance = self.store.find_user_by_id(user_id).await.ok_or(StoreError::NotFound)?.balance;
        self.append_transaction(user_id, Some(room_id.clone()), TransactionKind::Win, amount as i64, balance, balance)
            .await
    }

    pub async fn append_transaction(
        &self,
        user_id: UserId,
        room_id: Option<RoomId>,
        kind: TransactionKind,
        amount: i64,
        balance_before: u32,
        balance_after: u32,
    ) -> Result<(), StoreError> {
        self.store
            .append_transaction(transaction(user_id, room_id, kind, amount, balance_before, balance_after))
            .await
    }

    pub async fn append_game_history(
        &self,
        room_id: RoomId,
        winner_id: UserId,
        pot: u32,
        community_cards: Vec<CardInfo>,
        hand_data: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.store
            .append_game_history(GameHistoryRecord {
                id: Uuid::new_v4(),
                room_id,
                winner_id,
                pot,
                community_cards,
                hand_data,
                created_at: Utc::now(),
            })
            .await
    }

    pub async fn list_open_rooms_with_seats(&self) -> Vec<(crate::model::RoomRecord, Vec<Seat>)> {
        let mut out = Vec::new();
        for room in self.store.list_rooms().await {
            if room.status != crate::model::RoomStatus::Closed {
                let seats = self.store.list_seats(&room.config.id).await;
                out.push((room, seats));
            }
        }
        out
    }
}
