//! The Room Engine (§4.3): one actor per room, serializing every mutation to
//! its `Hand` and roster through a single inbound command queue (§9 redesign
//! flag — no shared-mutable-state locking, no closure-captured timers).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use poker_core::card::Card;
use poker_core::ids::UserId;
use poker_core::protocol::{
    ActionKind, CardInfo, Phase, PublicHandState, PublicPlayerState, RevealedHand, SatOutReason,
    SeatStatus, ServerMessage, WinnerInfo,
};
use tokio::sync::mpsc;

use crate::config::{INTER_HAND_DELAY_SECS, STALE_SEAT_RECLAMATION_SECS};
use crate::error::ClientProtocolError;
use crate::hand::{ActionError, Hand, HandEvent};
use crate::model::{RoomConfig, RoomPlayer, TransactionKind};
use crate::persistence::PersistenceAdapter;

pub type OutboundTx = mpsc::UnboundedSender<ServerMessage>;

/// Commands the Session Gateway forwards into a room's actor loop. Every
/// variant corresponds to an inbound frame from §4.1, already authenticated
/// and demultiplexed to this room.
pub enum RoomCommand {
    Join {
        user_id: UserId,
        username: String,
        seat_number: u8,
        stack: u32,
        outbound: OutboundTx,
    },
    Spectate {
        outbound: OutboundTx,
    },
    Leave {
        user_id: UserId,
    },
    PlayerAction {
        user_id: UserId,
        action: ActionKind,
        amount: Option<u32>,
    },
    ChatMessage {
        user_id: UserId,
        message: String,
    },
    /// The connection closed without an explicit `leave_room` (§5
    /// cancellation: the seat is not removed, only marked disconnected).
    Disconnected {
        user_id: UserId,
    },
}

struct Connections {
    players: HashMap<UserId, OutboundTx>,
    spectators: Vec<OutboundTx>,
}

impl Connections {
    fn new() -> Self {
        Self {
            players: HashMap::new(),
            spectators: Vec::new(),
        }
    }

    fn send_to(&self, user_id: UserId, msg: &ServerMessage) {
        if let Some(tx) = self.players.get(&user_id) {
            let _ = tx.send(msg.clone());
        }
    }

    fn broadcast(&mut self, msg: &ServerMessage) {
        self.players.retain(|_, tx| tx.send(msg.clone()).is_ok());
        self.spectators.retain(|tx| tx.send(msg.clone()).is_ok());
    }
}

/// The live actor state for one room.
pub struct Room {
    config: RoomConfig,
    players: Vec<RoomPlayer>,
    hand: Option<Hand>,
    dealer_seat: Option<u8>,
    connections: Connections,
    persistence: Arc<PersistenceAdapter>,
    /// When the next hand should try to start: set on the 2s idle grace
    /// period and on the 5s post-hand delay (§4.3.1).
    next_hand_at: Option<Instant>,
    /// Seats whose connection dropped without an explicit `leave_room`,
    /// timestamped so a reconnect within the grace window clears it (§4.2).
    disconnected_at: HashMap<UserId, Instant>,
}

impl Room {
    pub fn new(config: RoomConfig, persistence: Arc<PersistenceAdapter>) -> Self {
        Self::new_with_seats(config, persistence, Vec::new())
    }

    /// Build a room actor pre-populated with seats read back from the Store
    /// (§4.2 startup reclamation): every seeded player is marked disconnected
    /// as of now, so each gets a full stale-seat reclamation window rather
    /// than never being reclaimed because no Room actor ever touches them.
    pub fn new_with_seats(config: RoomConfig, persistence: Arc<PersistenceAdapter>, players: Vec<RoomPlayer>) -> Self {
        let disconnected_at = players.iter().map(|p| (p.user_id, Instant::now())).collect();
        Self {
            config,
            players,
            hand: None,
            dealer_seat: None,
            connections: Connections::new(),
            persistence,
            next_hand_at: None,
            disconnected_at,
        }
    }

    /// Spawn the actor task and return a handle to its command queue.
    pub fn spawn(self) -> mpsc::UnboundedSender<RoomCommand> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.run(rx));
        tx
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RoomCommand>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    self.handle_tick().await;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                user_id,
                username,
                seat_number,
                stack,
                outbound,
            } => self.handle_join(user_id, username, seat_number, stack, outbound),
            RoomCommand::Spectate { outbound } => {
                self.connections.spectators.push(outbound);
            }
            RoomCommand::Leave { user_id } => self.handle_leave(user_id).await,
            RoomCommand::PlayerAction { user_id, action, amount } => {
                self.handle_player_action(user_id, action, amount).await
            }
            RoomCommand::ChatMessage { user_id, message } => self.handle_chat(user_id, message),
            RoomCommand::Disconnected { user_id } => {
                self.connections.players.remove(&user_id);
                if let Some(p) = self.players.iter_mut().find(|p| p.user_id == user_id) {
                    p.connected = false;
                    self.disconnected_at.insert(user_id, Instant::now());
                }
            }
        }
    }

    fn handle_join(
        &mut self,
        user_id: UserId,
        username: String,
        seat_number: u8,
        stack: u32,
        outbound: OutboundTx,
    ) {
        if let Some(p) = self.players.iter_mut().find(|p| p.user_id == user_id) {
            p.connected = true;
        } else {
            self.players.push(RoomPlayer::new(user_id, username.clone(), seat_number, stack));
        }
        self.connections.players.insert(user_id, outbound);
        self.disconnected_at.remove(&user_id);

        self.connections.broadcast(&ServerMessage::PlayerJoined {
            user_id,
            username,
            seat_number,
            stack,
        });

        self.send_state_to(user_id);
        self.maybe_arm_start_timer();
    }

    async fn handle_leave(&mut self, user_id: UserId) {
        // Mid-hand, leaving is a fold (§4.1 leave_room, §5 voluntary leave).
        // Must run to completion while `user_id` is still in `self.players` —
        // `Hand` looks up every seat in its fixed `seat_order` by id.
        self.fold_out_of_hand(user_id).await;

        let stack = self.players.iter().find(|p| p.user_id == user_id).map(|p| p.stack).unwrap_or(0);
        self.players.retain(|p| p.user_id != user_id);
        self.connections.players.remove(&user_id);

        let _ = self
            .persistence
            .credit_wallet_and_delete_seat(&self.config.id, user_id, stack, TransactionKind::CashOut)
            .await;

        self.connections.broadcast(&ServerMessage::PlayerLeft {
            user_id,
            reason: Some("left".to_string()),
        });
    }

    /// Fold `user_id` out of whatever hand is live and let the state machine
    /// react — fold-to-one, the all-in runout shortcut, round closure, or
    /// just advancing the actor if it was their turn. Callers must remove
    /// the seat from `self.players` only *after* this returns: every
    /// `Hand` query (`live_count`, `round_closed`, `advance_to_next_actor`,
    /// …) looks up each id in `hand.seat_order` against `self.players` and
    /// panics if the seat is already gone.
    async fn fold_out_of_hand(&mut self, user_id: UserId) {
        let Some(hand) = &self.hand else { return };
        if hand.current_actor() == user_id
            && self.players.iter().any(|p| p.user_id == user_id && p.status == SeatStatus::Active)
        {
            self.apply_fold_and_continue(user_id).await;
            return;
        }

        if let Some(p) = self.players.iter_mut().find(|p| p.user_id == user_id) {
            if p.status == SeatStatus::Active {
                p.status = SeatStatus::Folded;
            }
        }
        // Not the current actor, so never advance the turn on their behalf —
        // only check whether their fold itself concludes the hand.
        let Some(hand) = &self.hand else { return };
        if hand.live_count(&self.players) <= 1 {
            self.end_hand_by_fold().await;
        } else if hand.should_run_out(&self.players) {
            self.run_out_and_showdown().await;
        }
    }

    fn handle_chat(&mut self, user_id: UserId, message: String) {
        let Some(player) = self.players.iter().find(|p| p.user_id == user_id) else {
            return;
        };
        let trimmed: String = message.trim().chars().take(200).collect();
        self.connections.broadcast(&ServerMessage::ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            username: player.username.clone(),
            message: trimmed,
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
    }

    async fn handle_player_action(&mut self, user_id: UserId, action: ActionKind, amount: Option<u32>) {
        let Some(hand) = &mut self.hand else {
            self.connections.send_to(user_id, &ServerMessage::error("Invalid action"));
            return;
        };

        match hand.apply_action(&mut self.players, user_id, action, amount) {
            Ok(()) => {}
            Err(ActionError::NotYourTurn) | Err(ActionError::InvalidAction) => {
                self.connections.send_to(user_id, &ServerMessage::error("Invalid action"));
                return;
            }
        }

        let stack = self.players.iter().find(|p| p.user_id == user_id).map(|p| p.stack).unwrap_or(0);
        self.connections.broadcast(&ServerMessage::ActionResult {
            user_id,
            action,
            amount: amount.unwrap_or(0),
            stack,
        });

        self.continue_hand_after_action().await;
    }

    async fn apply_fold_and_continue(&mut self, user_id: UserId) {
        if let Some(hand) = &mut self.hand {
            let _ = hand.apply_action(&mut self.players, user_id, ActionKind::Fold, None);
        }
        self.continue_hand_after_action().await;
    }

    /// The shared tail of both a normal action and a forced timeout fold:
    /// check for fold-to-one, the all-in shortcut, round closure, or just
    /// advance to the next actor.
    async fn continue_hand_after_action(&mut self) {
        let Some(hand) = &self.hand else { return };

        if hand.live_count(&self.players) <= 1 {
            self.end_hand_by_fold().await;
            return;
        }

        if hand.should_run_out(&self.players) {
            self.run_out_and_showdown().await;
            return;
        }

        if hand.round_closed(&self.players) {
            self.close_round_and_proceed().await;
            return;
        }

        let hand = self.hand.as_mut().unwrap();
        if !hand.advance_to_next_actor(&self.players) {
            // Nobody left who can act: treat as closed.
            self.close_round_and_proceed().await;
            return;
        }
        self.broadcast_state();
    }

    async fn close_round_and_proceed(&mut self) {
        let hand = self.hand.as_mut().unwrap();
        let dealt = hand.close_round_and_deal_next_street(&mut self.players);
        match dealt {
            Some(cards) => {
                let phase = hand.phase;
                self.broadcast_street(phase, cards);
                if hand.should_run_out(&self.players) {
                    self.run_out_and_showdown().await;
                } else {
                    self.broadcast_state();
                }
            }
            None => self.run_showdown().await,
        }
    }

    async fn run_out_and_showdown(&mut self) {
        let hand = self.hand.as_mut().unwrap();
        let events = hand.run_out_remaining_streets();
        for event in events {
            if let HandEvent::StreetDealt { phase, cards } = event {
                self.broadcast_street(phase, cards);
            }
        }
        self.run_showdown().await;
    }

    fn broadcast_street(&mut self, phase: Phase, cards: Vec<Card>) {
        tracing::info!(room = %self.config.id, ?phase, dealt = cards.len(), "community cards dealt");
        self.broadcast_state();
    }

    async fn end_hand_by_fold(&mut self) {
        let hand = self.hand.as_mut().unwrap();
        let event = hand.award_by_fold(&mut self.players);
        let HandEvent::AwardedByFold { winner, amount } = event else { unreachable!() };

        let username = self.players.iter().find(|p| p.user_id == winner).map(|p| p.username.clone()).unwrap_or_default();
        self.connections.broadcast(&ServerMessage::HandResult {
            winners: vec![WinnerInfo {
                user_id: winner,
                username,
                amount,
                hand: None,
            }],
            pot: amount,
            revealed_hands: None,
            community_cards: None,
        });

        self.finish_hand(winner, amount, Vec::new(), vec![(winner, amount)]).await;
    }

    async fn run_showdown(&mut self) {
        let hand = self.hand.as_mut().unwrap();
        let event = hand.showdown(&mut self.players);
        let HandEvent::Showdown { results } = event else { unreachable!() };

        let community_cards: Vec<CardInfo> = hand.community_cards.iter().copied().map(CardInfo::from).collect();

        let winners: Vec<WinnerInfo> = results
            .iter()
            .filter(|r| r.amount > 0)
            .map(|r| {
                let username = self.players.iter().find(|p| p.user_id == r.user_id).map(|p| p.username.clone()).unwrap_or_default();
                WinnerInfo {
                    user_id: r.user_id,
                    username,
                    amount: r.amount,
                    hand: Some(RevealedHand::new(&r.value, [r.cards.0.into(), r.cards.1.into()])),
                }
            })
            .collect();

        let revealed_hands: Vec<(UserId, RevealedHand)> = results
            .iter()
            .map(|r| (r.user_id, RevealedHand::new(&r.value, [r.cards.0.into(), r.cards.1.into()])))
            .collect();

        let pot: u32 = winners.iter().map(|w| w.amount).sum();
        let first_winner = winners.first().map(|w| w.user_id);
        let payouts: Vec<(UserId, u32)> = winners.iter().map(|w| (w.user_id, w.amount)).collect();

        self.connections.broadcast(&ServerMessage::HandResult {
            winners,
            pot,
            revealed_hands: Some(revealed_hands),
            community_cards: Some(community_cards.clone()),
        });

        if let Some(winner) = first_winner {
            self.finish_hand(winner, pot, community_cards, payouts).await;
        }
    }

    /// Persist seats, the game-history row, and a win-type transaction per
    /// winner (§4.3.7), then clear the finished hand.
    async fn finish_hand(&mut self, winner_id: UserId, pot: u32, community_cards: Vec<CardInfo>, winners: Vec<(UserId, u32)>) {
        if let Some(hand) = &self.hand {
            let dealer_user = hand.seat_order[hand.dealer_index];
            if let Some(p) = self.players.iter().find(|p| p.user_id == dealer_user) {
                self.dealer_seat = Some(p.seat_number);
            }
        }

        for player in &self.players {
            let _ = self
                .persistence
                .upsert_seat(player.to_seat(self.config.id.clone()))
                .await;
        }
        let _ = self
            .persistence
            .append_game_history(self.config.id.clone(), winner_id, pot, community_cards, serde_json::Value::Null)
            .await;
        for (user_id, amount) in winners {
            let _ = self.persistence.append_win_transaction(&self.config.id, user_id, amount).await;
        }

        // Bust players are removed from the roster and the Store (§4.3.7).
        let busted: Vec<UserId> = self.players.iter().filter(|p| p.stack == 0).map(|p| p.user_id).collect();
        for user_id in busted {
            self.players.retain(|p| p.user_id != user_id);
            let _ = self.persistence.delete_seat(&self.config.id, user_id).await;
            self.connections.broadcast(&ServerMessage::PlayerLeft {
                user_id,
                reason: Some("busted".to_string()),
            });
        }

        self.hand = None;
        self.next_hand_at = Some(Instant::now() + Duration::from_secs(INTER_HAND_DELAY_SECS));
    }

    fn maybe_arm_start_timer(&mut self) {
        if self.hand.is_none() && self.next_hand_at.is_none() && self.eligible_count() >= 2 {
            self.next_hand_at = Some(Instant::now() + Duration::from_secs(2));
        }
    }

    /// Free any seat that has been disconnected longer than the reclamation
    /// window (§4.2), returning its chips to the wallet just like a
    /// voluntary leave.
    async fn reclaim_stale_seats(&mut self) {
        let deadline = Duration::from_secs(STALE_SEAT_RECLAMATION_SECS);
        let stale: Vec<UserId> = self
            .disconnected_at
            .iter()
            .filter(|(_, since)| since.elapsed() >= deadline)
            .map(|(uid, _)| *uid)
            .collect();
        for user_id in stale {
            self.disconnected_at.remove(&user_id);
            self.reclaim_seat(user_id).await;
        }
    }

    async fn reclaim_seat(&mut self, user_id: UserId) {
        self.fold_out_of_hand(user_id).await;

        let stack = self.players.iter().find(|p| p.user_id == user_id).map(|p| p.stack).unwrap_or(0);
        let username = self.players.iter().find(|p| p.user_id == user_id).map(|p| p.username.clone()).unwrap_or_default();
        self.players.retain(|p| p.user_id != user_id);
        self.connections.players.remove(&user_id);

        let _ = self
            .persistence
            .credit_wallet_and_delete_seat(&self.config.id, user_id, stack, TransactionKind::CashOut)
            .await;

        self.connections.broadcast(&ServerMessage::PlayerSatOut {
            user_id,
            username,
            reason: SatOutReason::Disconnect,
            chips_returned: stack,
        });
    }

    fn eligible_count(&self) -> usize {
        self.players.iter().filter(|p| p.status != SeatStatus::SittingOut && p.stack > 0).count()
    }

    async fn handle_tick(&mut self) {
        self.reclaim_stale_seats().await;

        if let Some(hand) = &self.hand {
            if hand.phase != Phase::Showdown {
                let now = Instant::now();
                if now >= hand.turn_deadline {
                    self.handle_timeout().await;
                } else {
                    let remaining_ms = hand.turn_deadline.saturating_duration_since(now).as_millis() as u64;
                    self.connections.broadcast(&ServerMessage::TimerUpdate {
                        user_id: hand.current_actor(),
                        remaining_ms,
                        timed_out: None,
                    });
                }
                return;
            }
        }

        if self.hand.is_none() {
            if let Some(at) = self.next_hand_at {
                if Instant::now() >= at && self.eligible_count() >= 2 {
                    self.next_hand_at = None;
                    self.start_hand();
                }
            }
        }
    }

    async fn handle_timeout(&mut self) {
        let Some(hand) = &self.hand else { return };
        let user_id = hand.current_actor();
        let stack = self.players.iter().find(|p| p.user_id == user_id).map(|p| p.stack).unwrap_or(0);
        let username = self.players.iter().find(|p| p.user_id == user_id).map(|p| p.username.clone()).unwrap_or_default();

        self.connections.broadcast(&ServerMessage::TimerUpdate {
            user_id,
            remaining_ms: 0,
            timed_out: Some(true),
        });

        self.fold_out_of_hand(user_id).await;

        self.players.retain(|p| p.user_id != user_id);
        self.connections.players.remove(&user_id);
        let _ = self
            .persistence
            .credit_wallet_and_delete_seat(&self.config.id, user_id, stack, TransactionKind::CashOut)
            .await;

        self.connections.broadcast(&ServerMessage::PlayerSatOut {
            user_id,
            username,
            reason: SatOutReason::Timeout,
            chips_returned: stack,
        });
    }

    fn start_hand(&mut self) {
        let mut eligible: Vec<RoomPlayer> = self
            .players
            .iter()
            .filter(|p| p.status != SeatStatus::SittingOut && p.stack > 0)
            .cloned()
            .collect();
        eligible.sort_by_key(|p| p.seat_number);

        let Some(new_hand) = Hand::start(&mut eligible, self.dealer_seat, self.config.small_blind, self.config.big_blind) else {
            return;
        };

        for updated in &eligible {
            if let Some(p) = self.players.iter_mut().find(|p| p.user_id == updated.user_id) {
                *p = updated.clone();
            }
        }

        self.dealer_seat = eligible.get(new_hand.dealer_index).map(|p| p.seat_number);
        self.hand = Some(new_hand);
        self.broadcast_new_round();
    }

    fn public_state(&self) -> PublicHandState {
        let hand = self.hand.as_ref();
        PublicHandState {
            phase: hand.map(|h| h.phase).unwrap_or(Phase::Preflop),
            community_cards: hand
                .map(|h| h.community_cards.iter().copied().map(CardInfo::from).collect())
                .unwrap_or_default(),
            pot: hand.map(|h| h.pot).unwrap_or(0),
            current_bet: hand.map(|h| h.current_bet).unwrap_or(0),
            min_raise: hand.map(|h| h.min_raise).unwrap_or(self.config.big_blind),
            current_actor: hand.map(|h| h.current_actor()),
            players: self
                .players
                .iter()
                .map(|p| PublicPlayerState {
                    user_id: p.user_id,
                    username: p.username.clone(),
                    seat_number: p.seat_number,
                    stack: p.stack,
                    current_bet: p.current_bet,
                    status: p.status,
                    is_dealer: self.dealer_seat == Some(p.seat_number),
                    is_small_blind: hand
                        .map(|h| h.seat_order.get(h.small_blind_index) == Some(&p.user_id))
                        .unwrap_or(false),
                    is_big_blind: hand
                        .map(|h| h.seat_order.get(h.big_blind_index) == Some(&p.user_id))
                        .unwrap_or(false),
                })
                .collect(),
        }
    }

    fn broadcast_state(&mut self) {
        let state = self.public_state();
        self.connections.broadcast(&ServerMessage::GameState {
            state,
            your_cards: None,
        });
    }

    fn broadcast_new_round(&mut self) {
        let state = self.public_state();
        self.connections.broadcast(&ServerMessage::NewRound(state));
        for player in self.players.clone() {
            if let Some(cards) = player.hole_cards {
                self.connections.send_to(
                    player.user_id,
                    &ServerMessage::GameState {
                        state: self.public_state(),
                        your_cards: Some([cards.0.into(), cards.1.into()]),
                    },
                );
            }
        }
    }

    fn send_state_to(&mut self, user_id: UserId) {
        let your_cards = self
            .players
            .iter()
            .find(|p| p.user_id == user_id)
            .and_then(|p| p.hole_cards)
            .map(|(a, b)| [a.into(), b.into()]);
        let state = self.public_state();
        self.connections.send_to(user_id, &ServerMessage::GameState { state, your_cards });
    }
}

pub fn client_protocol_error_frame(err: ClientProtocolError) -> ServerMessage {
    ServerMessage::error(err.to_string())
}
