//! The real-time wire protocol: frames exchanged between the Session Gateway
//! and clients, `{type, payload}` over a bidirectional text transport.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::card::Card;
use crate::evaluator::HandValue;
use crate::ids::{RoomId, UserId};

/// Serializable card, independent of the internal `card::Card` representation
/// so the wire format is stable even if the engine's type changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardInfo {
    pub rank: u8, // 2-14 (14 = Ace)
    pub suit: u8, // 0-3 (Diamonds, Spades, Clubs, Hearts)
}

impl From<Card> for CardInfo {
    fn from(card: Card) -> Self {
        CardInfo {
            rank: card.rank as u8,
            suit: card.suit as u8,
        }
    }
}

impl fmt::Display for CardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rank = match self.rank {
            2 => "2", 3 => "3", 4 => "4", 5 => "5", 6 => "6", 7 => "7",
            8 => "8", 9 => "9", 10 => "T", 11 => "J", 12 => "Q", 13 => "K", 14 => "A",
            _ => "?",
        };
        let suit = match self.suit {
            0 => "♦", 1 => "♠", 2 => "♣", 3 => "♥",
            _ => "?",
        };
        write!(f, "{rank}{suit}")
    }
}

/// An action a player may take during a betting round (§4.3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Fold,
    Check,
    Call,
    Raise,
    #[serde(rename = "all-in")]
    AllIn,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Fold => "fold",
            ActionKind::Check => "check",
            ActionKind::Call => "call",
            ActionKind::Raise => "raise",
            ActionKind::AllIn => "all-in",
        };
        f.write_str(s)
    }
}

/// A seat's public status, as reported in a [`PublicPlayerState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeatStatus {
    Waiting,
    Active,
    Folded,
    AllIn,
    SittingOut,
}

/// One street of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

/// Public view of a single seated player, safe to broadcast to everyone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicPlayerState {
    pub user_id: UserId,
    pub username: String,
    pub seat_number: u8,
    pub stack: u32,
    pub current_bet: u32,
    pub status: SeatStatus,
    pub is_dealer: bool,
    pub is_small_blind: bool,
    pub is_big_blind: bool,
}

/// The public portion of hand state, shared by `new_round` and `game_state`.
/// Never contains another player's hole cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicHandState {
    pub phase: Phase,
    pub community_cards: Vec<CardInfo>,
    pub pot: u32,
    pub current_bet: u32,
    pub min_raise: u32,
    pub current_actor: Option<UserId>,
    pub players: Vec<PublicPlayerState>,
}

/// A winner entry in a `hand_result` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinnerInfo {
    pub user_id: UserId,
    pub username: String,
    pub amount: u32,
    pub hand: Option<RevealedHand>,
}

/// A revealed hand at showdown: category, description, and the hole cards
/// that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealedHand {
    pub rank: String,
    pub description: String,
    pub cards: [CardInfo; 2],
}

impl RevealedHand {
    pub fn new(value: &HandValue, cards: [CardInfo; 2]) -> Self {
        Self {
            rank: value.category.to_string(),
            description: value.description.clone(),
            cards,
        }
    }
}

/// Why a seat was removed for sitting out (§4.3.5, §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SatOutReason {
    Timeout,
    Disconnect,
}

/// Messages the Session Gateway accepts from a client connection (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    #[serde(rename = "auth")]
    Auth { token: String },

    #[serde(rename = "join_room")]
    JoinRoom { room_id: RoomId },

    #[serde(rename = "leave_room")]
    LeaveRoom {},

    #[serde(rename = "player_action")]
    PlayerAction {
        action: ActionKind,
        amount: Option<u32>,
    },

    #[serde(rename = "spectate")]
    Spectate { room_id: RoomId },

    #[serde(rename = "chat_message")]
    ChatMessage { message: String },
}

/// Messages the Session Gateway emits to a client connection (§6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    #[serde(rename = "auth_success")]
    AuthSuccess { user_id: UserId, username: String },

    #[serde(rename = "joined_room")]
    JoinedRoom {
        room_id: RoomId,
        seat_number: u8,
        stack: u32,
    },

    #[serde(rename = "left_room")]
    LeftRoom {},

    #[serde(rename = "spectating")]
    Spectating { room_id: RoomId },

    #[serde(rename = "new_round")]
    NewRound(PublicHandState),

    #[serde(rename = "game_state")]
    GameState {
        #[serde(flatten)]
        state: PublicHandState,
        your_cards: Option<[CardInfo; 2]>,
    },

    #[serde(rename = "player_joined")]
    PlayerJoined {
        user_id: UserId,
        username: String,
        seat_number: u8,
        stack: u32,
    },

    #[serde(rename = "player_left")]
    PlayerLeft {
        user_id: UserId,
        reason: Option<String>,
    },

    #[serde(rename = "player_sat_out")]
    PlayerSatOut {
        user_id: UserId,
        username: String,
        reason: SatOutReason,
        chips_returned: u32,
    },

    #[serde(rename = "action_result")]
    ActionResult {
        user_id: UserId,
        action: ActionKind,
        amount: u32,
        stack: u32,
    },

    #[serde(rename = "timer_update")]
    TimerUpdate {
        user_id: UserId,
        remaining_ms: u64,
        timed_out: Option<bool>,
    },

    #[serde(rename = "hand_result")]
    HandResult {
        winners: Vec<WinnerInfo>,
        pot: u32,
        revealed_hands: Option<Vec<(UserId, RevealedHand)>>,
        community_cards: Option<Vec<CardInfo>>,
    },

    #[serde(rename = "chat_message")]
    ChatMessage {
        id: String,
        user_id: UserId,
        username: String,
        message: String,
        timestamp: i64,
    },

    #[serde(rename = "error")]
    Error {
        message: String,
        code: Option<String>,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            code: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_round_trips_through_json() {
        let msg = ClientMessage::PlayerAction {
            action: ActionKind::Raise,
            amount: Some(60),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"player_action\""));
        let ClientMessage::PlayerAction { action, amount } =
            serde_json::from_str(&json).unwrap()
        else {
            panic!("expected PlayerAction");
        };
        assert_eq!(action, ActionKind::Raise);
        assert_eq!(amount, Some(60));
    }

    #[test]
    fn all_in_action_serializes_with_hyphen() {
        let json = serde_json::to_string(&ActionKind::AllIn).unwrap();
        assert_eq!(json, "\"all-in\"");
    }

    #[test]
    fn error_frame_has_type_tag() {
        let msg = ServerMessage::error("Invalid action");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("Invalid action"));
    }
}
