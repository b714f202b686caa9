//! Lazily materializes one Room actor per room id, from a cold Store-backed
//! start (§4.2): the Registry never holds more than a cheap sender handle per
//! live room, so an idle room costs nothing beyond its Store row.

use std::collections::HashMap;
use std::sync::Arc;

use poker_core::ids::RoomId;
use tokio::sync::{mpsc, RwLock};

use crate::error::BusinessRuleError;
use crate::model::{RoomPlayer, RoomStatus};
use crate::persistence::PersistenceAdapter;
use crate::room::{Room, RoomCommand};
use crate::store::Store;

pub struct RoomRegistry {
    store: Arc<dyn Store>,
    persistence: Arc<PersistenceAdapter>,
    handles: RwLock<HashMap<RoomId, mpsc::UnboundedSender<RoomCommand>>>,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn Store>, persistence: Arc<PersistenceAdapter>) -> Self {
        Self {
            store,
            persistence,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Return a live command sender for `room_id`, spawning its actor from
    /// the Store's `RoomConfig` if it isn't already running.
    pub async fn get_or_create(
        &self,
        room_id: &RoomId,
    ) -> Result<mpsc::UnboundedSender<RoomCommand>, BusinessRuleError> {
        if let Some(tx) = self.existing_handle(room_id).await {
            return Ok(tx);
        }

        let mut handles = self.handles.write().await;
        if let Some(tx) = handles.get(room_id) {
            if !tx.is_closed() {
                return Ok(tx.clone());
            }
        }

        let record = self.store.get_room(room_id).await.ok_or(BusinessRuleError::NotFound)?;
        if record.status == RoomStatus::Closed {
            return Err(BusinessRuleError::RoomClosed);
        }

        let room = Room::new(record.config, self.persistence.clone());
        let tx = room.spawn();
        handles.insert(room_id.clone(), tx.clone());
        Ok(tx)
    }

    /// Read every non-closed room's persisted seats and spawn its actor
    /// eagerly (§4.2: "arm a reclamation timer for every waiting-room seat
    /// at startup"). Without this, a seat left over from before a restart
    /// never gets a live Room actor to own its reclamation timer, and so is
    /// never reclaimed until someone happens to `join_room` that id again.
    pub async fn bootstrap(&self) {
        for (record, seats) in self.persistence.list_open_rooms_with_seats().await {
            if seats.is_empty() {
                continue;
            }
            let room_id = record.config.id.clone();
            let mut players = Vec::with_capacity(seats.len());
            for seat in seats {
                let username = self.store.find_user_by_id(seat.user_id).await.map(|u| u.username).unwrap_or_default();
                let mut player = RoomPlayer::new(seat.user_id, username, seat.seat_number, seat.stack);
                player.status = seat.status;
                player.connected = false;
                players.push(player);
            }
            let room = Room::new_with_seats(record.config, self.persistence.clone(), players);
            let tx = room.spawn();
            self.handles.write().await.insert(room_id, tx);
        }
    }

    async fn existing_handle(&self, room_id: &RoomId) -> Option<mpsc::UnboundedSender<RoomCommand>> {
        let handles = self.handles.read().await;
        handles.get(room_id).filter(|tx| !tx.is_closed()).cloned()
    }

    pub async fn is_live(&self, room_id: &RoomId) -> bool {
        self.existing_handle(room_id).await.is_some()
    }
}
