//! The betting state machine: one per live hand on a room.
//!
//! Transport-agnostic and persistence-agnostic — it knows nothing about
//! WebSockets, channels, or the Store. `room.rs` drives it and turns its
//! return values into wire frames and persistence calls.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use poker_core::card::{Card, Deck};
use poker_core::evaluator::{self, HandValue};
use poker_core::ids::UserId;
use poker_core::protocol::{ActionKind, Phase, SeatStatus};
use uuid::Uuid;

use crate::model::RoomPlayer;

/// Every actor gets exactly this long to act (§4.3.5).
pub const TURN_TIMEOUT: Duration = Duration::from_secs(30);

/// Rejected-action reasons (§4.3.3, §7 client protocol errors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionError {
    NotYourTurn,
    InvalidAction,
}

/// What happened as a result of a legal action or a phase transition.
#[derive(Debug, Clone)]
pub enum HandEvent {
    /// Community cards were dealt for the named street.
    StreetDealt { phase: Phase, cards: Vec<Card> },
    /// Fewer than two players can still act: remaining streets are dealt
    /// immediately with no further betting (§4.3.4 all-in shortcut).
    RunningOutBoard,
    /// The hand ended because only one non-folded player remains.
    AwardedByFold { winner: UserId, amount: u32 },
    /// The hand reached showdown; `results` is sorted best-hand-first.
    Showdown { results: Vec<ShowdownEntry> },
}

#[derive(Debug, Clone)]
pub struct ShowdownEntry {
    pub user_id: UserId,
    pub cards: (Card, Card),
    pub value: HandValue,
    pub amount: u32,
}

/// The live state of one hand (§3 `Hand`).
pub struct Hand {
    pub id: Uuid,
    pub phase: Phase,
    pub community_cards: Vec<Card>,
    pub pot: u32,
    pub current_bet: u32,
    pub min_raise: u32,
    pub dealer_index: usize,
    pub small_blind_index: usize,
    pub big_blind_index: usize,
    pub current_actor_index: usize,
    pub turn_deadline: Instant,
    pub acted_this_round: HashSet<UserId>,
    pub last_aggressor_id: Option<UserId>,
    /// Eligible players at hand start, in seat order. Indices above refer
    /// into this vector, which stays fixed for the life of the hand even as
    /// players fold or go all-in.
    pub seat_order: Vec<UserId>,
    deck: Deck,
}

fn find<'a>(players: &'a [RoomPlayer], user_id: UserId) -> &'a RoomPlayer {
    players.iter().find(|p| p.user_id == user_id).expect("player must be seated")
}

fn find_mut<'a>(players: &'a mut [RoomPlayer], user_id: UserId) -> &'a mut RoomPlayer {
    players.iter_mut().find(|p| p.user_id == user_id).expect("player must be seated")
}

impl Hand {
    /// Start a new hand. `players` must already be sorted by `seat_number`
    /// and filtered to `status != sitting-out && stack > 0` (§4.3.2 step 1).
    /// `prev_dealer_seat` is the previous hand's dealer seat number, if any.
    pub fn start(
        players: &mut [RoomPlayer],
        prev_dealer_seat: Option<u8>,
        small_blind: u32,
        big_blind: u32,
    ) -> Option<Hand> {
        if players.len() < 2 {
            return None;
        }

        for p in players.iter_mut() {
            p.status = SeatStatus::Active;
            p.hole_cards = None;
            p.current_bet = 0;
        }

        let dealer_index = match prev_dealer_seat {
            Some(prev) => {
                let prev_pos = players.iter().position(|p| p.seat_number == prev).unwrap_or(0);
                (prev_pos + 1) % players.len()
            }
            None => 0,
        };

        let (small_blind_index, big_blind_index, first_actor_index) = if players.len() == 2 {
            // Heads-up: dealer is small blind and acts first preflop.
            (dealer_index, (dealer_index + 1) % 2, dealer_index)
        } else {
            let sb = (dealer_index + 1) % players.len();
            let bb = (dealer_index + 2) % players.len();
            let first = (bb + 1) % players.len();
            (sb, bb, first)
        };

        let deck = Deck::shuffled();

        let mut hand = Hand {
            id: Uuid::new_v4(),
            phase: Phase::Preflop,
            community_cards: Vec::new(),
            pot: 0,
            current_bet: big_blind,
            min_raise: big_blind,
            dealer_index,
            small_blind_index,
            big_blind_index,
            current_actor_index: first_actor_index,
            turn_deadline: Instant::now() + TURN_TIMEOUT,
            acted_this_round: HashSet::new(),
            last_aggressor_id: None,
            seat_order: players.iter().map(|p| p.user_id).collect(),
            deck,
        };

        hand.post_blind(players, small_blind_index, small_blind);
        hand.post_blind(players, big_blind_index, big_blind);
        // A short big blind (posted from a smaller stack) lowers the table's
        // current bet to what was actually posted.
        hand.current_bet = find(players, hand.seat_order[big_blind_index]).current_bet;

        for &user_id in &hand.seat_order.clone() {
            let c1 = hand.deck.deal().expect("deck not exhausted dealing hole cards");
            let c2 = hand.deck.deal().expect("deck not exhausted dealing hole cards");
            find_mut(players, user_id).hole_cards = Some((c1, c2));
        }

        Some(hand)
    }

    fn post_blind(&mut self, players: &mut [RoomPlayer], seat_index: usize, amount: u32) {
        let user_id = self.seat_order[seat_index];
        let player = find_mut(players, user_id);
        let actual = amount.min(player.stack);
        player.stack -= actual;
        player.current_bet = actual;
        self.pot += actual;
        if player.stack == 0 {
            player.status = SeatStatus::AllIn;
        }
    }

    pub fn current_actor(&self) -> UserId {
        self.seat_order[self.current_actor_index]
    }

    /// Legal actions for `user_id`, empty if it is not their turn or they
    /// cannot act (§4.3.3).
    pub fn legal_actions(&self, players: &[RoomPlayer], user_id: UserId) -> Vec<ActionKind> {
        if self.current_actor() != user_id {
            return Vec::new();
        }
        let player = find(players, user_id);
        if player.status != SeatStatus::Active {
            return Vec::new();
        }
        let to_call = self.current_bet.saturating_sub(player.current_bet);
        let mut actions = vec![ActionKind::Fold];
        if to_call == 0 {
            actions.push(ActionKind::Check);
        } else if player.stack >= to_call {
            actions.push(ActionKind::Call);
        }
        if player.stack > to_call {
            actions.push(ActionKind::Raise);
        }
        if player.stack > 0 {
            actions.push(ActionKind::AllIn);
        }
        actions
    }

    /// Apply a legal action from the current actor (§4.3.3). Does not
    /// advance the round or deal cards — the caller inspects
    /// `round_closed()`/`needs_betting()` afterwards and drives the rest of
    /// the state machine via `close_round`, `award_by_fold`, `showdown`.
    pub fn apply_action(
        &mut self,
        players: &mut [RoomPlayer],
        user_id: UserId,
        action: ActionKind,
        amount: Option<u32>,
    ) -> Result<(), ActionError> {
        if self.current_actor() != user_id {
            return Err(ActionError::NotYourTurn);
        }
        let legal = self.legal_actions(players, user_id);
        if !legal.contains(&action) {
            return Err(ActionError::InvalidAction);
        }

        let player = find_mut(players, user_id);
        let to_call = self.current_bet.saturating_sub(player.current_bet);

        match action {
            ActionKind::Fold => {
                player.status = SeatStatus::Folded;
            }
            ActionKind::Check => {
                self.acted_this_round.insert(user_id);
            }
            ActionKind::Call => {
                let contribution = to_call.min(player.stack);
                player.stack -= contribution;
                player.current_bet += contribution;
                self.pot += contribution;
                if player.stack == 0 {
                    player.status = SeatStatus::AllIn;
                }
                self.acted_this_round.insert(user_id);
            }
            ActionKind::Raise => {
                let raise_amount = amount.ok_or(ActionError::InvalidAction)?;
                let reopens = raise_amount >= self.min_raise;
                let is_short_all_in = raise_amount == player.stack.saturating_sub(to_call);
                if !reopens && !is_short_all_in {
                    return Err(ActionError::InvalidAction);
                }
                let contribution = to_call + raise_amount;
                if contribution > player.stack {
                    return Err(ActionError::InvalidAction);
                }
                player.stack -= contribution;
                player.current_bet += contribution;
                self.pot += contribution;
                self.current_bet = player.current_bet;
                if raise_amount >= self.min_raise {
                    self.min_raise = raise_amount;
                }
                if player.stack == 0 {
                    player.status = SeatStatus::AllIn;
                }
                self.acted_this_round.clear();
                self.acted_this_round.insert(user_id);
                self.last_aggressor_id = Some(user_id);
            }
            ActionKind::AllIn => {
                let contribution = player.stack;
                player.stack = 0;
                player.current_bet += contribution;
                self.pot += contribution;
                player.status = SeatStatus::AllIn;
                let raise_portion = player.current_bet.saturating_sub(self.current_bet);
                if player.current_bet > self.current_bet {
                    self.current_bet = player.current_bet;
                    if raise_portion >= self.min_raise {
                        self.min_raise = raise_portion;
                    }
                    self.acted_this_round.clear();
                    self.acted_this_round.insert(user_id);
                    self.last_aggressor_id = Some(user_id);
                } else {
                    self.acted_this_round.insert(user_id);
                }
            }
        }

        Ok(())
    }

    /// Non-folded players still in the hand.
    pub fn live_count(&self, players: &[RoomPlayer]) -> usize {
        self.seat_order
            .iter()
            .map(|uid| find(players, *uid))
            .filter(|p| p.status != SeatStatus::Folded)
            .count()
    }

    /// Non-folded, non-all-in players: those who can still make a decision.
    pub fn actionable_count(&self, players: &[RoomPlayer]) -> usize {
        self.seat_order
            .iter()
            .map(|uid| find(players, *uid))
            .filter(|p| p.status == SeatStatus::Active)
            .count()
    }

    /// The round-closure rule (§4.3.4): every non-folded, non-all-in player
    /// has acted this round and matches the table's current bet.
    pub fn round_closed(&self, players: &[RoomPlayer]) -> bool {
        self.seat_order
            .iter()
            .map(|uid| find(players, *uid))
            .filter(|p| p.status == SeatStatus::Active)
            .all(|p| self.acted_this_round.contains(&p.user_id) && p.current_bet == self.current_bet)
    }

    /// Advance `current_actor_index` to the next player able to act, cycling
    /// from `start_index`. Returns `false` if no player can act.
    fn advance_actor(&mut self, players: &[RoomPlayer], start_index: usize) -> bool {
        let n = self.seat_order.len();
        for step in 1..=n {
            let idx = (start_index + step) % n;
            if find(players, self.seat_order[idx]).status == SeatStatus::Active {
                self.current_actor_index = idx;
                return true;
            }
        }
        false
    }

    /// Move to the next actor after the current one acts. Resets the timer
    /// deadline for the new actor.
    pub fn advance_to_next_actor(&mut self, players: &[RoomPlayer]) -> bool {
        let found = self.advance_actor(players, self.current_actor_index);
        if found {
            self.turn_deadline = Instant::now() + TURN_TIMEOUT;
        }
        found
    }

    /// Close the round, reset street-local state, and deal the next street's
    /// community cards. Returns the cards dealt, or `None` at the river
    /// (caller should move to showdown).
    pub fn close_round_and_deal_next_street(&mut self, players: &mut [RoomPlayer]) -> Option<Vec<Card>> {
        for &uid in &self.seat_order {
            find_mut(players, uid).current_bet = 0;
        }
        self.current_bet = 0;
        self.acted_this_round.clear();
        self.last_aggressor_id = None;

        let deal_count = match self.phase {
            Phase::Preflop => {
                self.phase = Phase::Flop;
                3
            }
            Phase::Flop => {
                self.phase = Phase::Turn;
                1
            }
            Phase::Turn => {
                self.phase = Phase::River;
                1
            }
            Phase::River => {
                self.phase = Phase::Showdown;
                return None;
            }
            Phase::Showdown => return None,
        };

        let mut dealt = Vec::with_capacity(deal_count);
        for _ in 0..deal_count {
            if let Some(card) = self.deck.deal() {
                self.community_cards.push(card);
                dealt.push(card);
            }
        }

        // First to act post-flop is the first non-folded, non-all-in seat
        // left of the dealer (§4.3.4).
        self.advance_actor(players, self.dealer_index);
        self.turn_deadline = Instant::now() + TURN_TIMEOUT;
        Some(dealt)
    }

    /// Whether the remaining cards should simply be run out with no further
    /// betting (§4.3.4 all-in shortcut): fewer than two players can still
    /// act, but at least two remain in the hand.
    pub fn should_run_out(&self, players: &[RoomPlayer]) -> bool {
        self.live_count(players) >= 2 && self.actionable_count(players) < 2
    }

    /// Deal every remaining street with no betting, used by the all-in
    /// shortcut.
    pub fn run_out_remaining_streets(&mut self) -> Vec<HandEvent> {
        let mut events = Vec::new();
        while self.phase != Phase::Showdown {
            let deal_count = match self.phase {
                Phase::Preflop => {
                    self.phase = Phase::Flop;
                    3
                }
                Phase::Flop => {
                    self.phase = Phase::Turn;
                    1
                }
                Phase::Turn => {
                    self.phase = Phase::River;
                    1
                }
                Phase::River => {
                    self.phase = Phase::Showdown;
                    break;
                }
                Phase::Showdown => break,
            };
            let mut dealt = Vec::with_capacity(deal_count);
            for _ in 0..deal_count {
                if let Some(card) = self.deck.deal() {
                    self.community_cards.push(card);
                    dealt.push(card);
                }
            }
            let phase = self.phase;
            events.push(HandEvent::StreetDealt { phase, cards: dealt });
        }
        events
    }

    /// Award the pot to the single remaining non-folded player
    /// (§4.3.6 award-by-fold). Panics if more than one player remains.
    pub fn award_by_fold(&mut self, players: &mut [RoomPlayer]) -> HandEvent {
        let winner = self
            .seat_order
            .iter()
            .copied()
            .find(|uid| find(players, *uid).status != SeatStatus::Folded)
            .expect("at least one non-folded player");
        let amount = self.pot;
        find_mut(players, winner).stack += amount;
        self.pot = 0;
        HandEvent::AwardedByFold { winner, amount }
    }

    /// Run the Hand Evaluator for every non-folded player and split the pot
    /// among the top tier, discarding any remainder from integer division
    /// (§4.3.6, §9 open question: side pots are not modeled — see DESIGN.md).
    pub fn showdown(&mut self, players: &mut [RoomPlayer]) -> HandEvent {
        let mut entries: Vec<(UserId, (Card, Card), HandValue)> = self
            .seat_order
            .iter()
            .copied()
            .filter(|uid| find(players, *uid).status != SeatStatus::Folded)
            .map(|uid| {
                let cards = find(players, uid).hole_cards.expect("non-folded player has hole cards");
                let value = evaluator::evaluate(cards, &self.community_cards);
                (uid, cards, value)
            })
            .collect();

        entries.sort_by(|a, b| b.2.cmp(&a.2));
        let best = entries[0].2.clone();
        let winner_count = entries.iter().filter(|e| e.2 == best).count();
        let share = self.pot / winner_count as u32;

        let mut results = Vec::with_capacity(entries.len());
        for (user_id, cards, value) in entries {
            let amount = if value == best {
                find_mut(players, user_id).stack += share;
                share
            } else {
                0
            };
            results.push(ShowdownEntry {
                user_id,
                cards,
                value,
                amount,
            });
        }
        self.pot = 0;

        HandEvent::Showdown { results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poker_core::ids::UserId;

    fn player(stack: u32, seat: u8) -> RoomPlayer {
        RoomPlayer::new(UserId::new(), format!("p{seat}"), seat, stack)
    }

    #[test]
    fn heads_up_blinds_and_first_actor() {
        let mut players = vec![player(1000, 0), player(1000, 1)];
        let hand = Hand::start(&mut players, None, 10, 20).unwrap();
        assert_eq!(hand.dealer_index, 0);
        assert_eq!(hand.small_blind_index, 0);
        assert_eq!(hand.big_blind_index, 1);
        assert_eq!(hand.current_actor(), players[0].user_id);
        assert_eq!(players[0].current_bet, 10);
        assert_eq!(players[1].current_bet, 20);
        assert_eq!(hand.pot, 30);
    }

    #[test]
    fn fold_to_one_awards_full_pot() {
        let mut players = vec![player(1000, 0), player(1000, 1)];
        let mut hand = Hand::start(&mut players, None, 10, 20).unwrap();
        let actor = hand.current_actor();
        hand.apply_action(&mut players, actor, ActionKind::Fold, None).unwrap();
        assert_eq!(hand.live_count(&players), 1);
        let event = hand.award_by_fold(&mut players);
        match event {
            HandEvent::AwardedByFold { amount, .. } => assert_eq!(amount, 30),
            _ => panic!("expected AwardedByFold"),
        }
        let winner = players.iter().find(|p| p.user_id != actor).unwrap();
        assert_eq!(winner.stack, 1010);
        let loser = players.iter().find(|p| p.user_id == actor).unwrap();
        assert_eq!(loser.stack, 990);
    }

    #[test]
    fn short_all_in_does_not_reopen_action() {
        // 3-handed: dealer=seat0, sb=seat1, bb=seat2 (stack 25, posts 20,
        // leaving 5), first to act preflop is seat0.
        let mut players = vec![player(1000, 0), player(1000, 1), player(25, 2)];
        let mut hand = Hand::start(&mut players, None, 10, 20).unwrap();

        // Seat0 raises to 60 — the table's current_bet and min_raise move,
        // and seat0 becomes the last aggressor.
        let seat0 = hand.current_actor();
        hand.apply_action(&mut players, seat0, ActionKind::Raise, Some(40)).unwrap();
        assert_eq!(hand.last_aggressor_id, Some(seat0));
        assert_eq!(hand.current_bet, 60);

        // Seat1 folds.
        assert!(hand.advance_to_next_actor(&players));
        let seat1 = hand.current_actor();
        hand.apply_action(&mut players, seat1, ActionKind::Fold, None).unwrap();

        // Seat2 can only fold or go all-in for far less than a full raise
        // (stack 5 against a 40-to-call).
        assert!(hand.advance_to_next_actor(&players));
        let seat2 = hand.current_actor();
        assert_eq!(hand.legal_actions(&players, seat2), vec![ActionKind::Fold, ActionKind::AllIn]);
        hand.apply_action(&mut players, seat2, ActionKind::AllIn, None).unwrap();

        // The short all-in must not reopen action: the aggressor and the
        // table's current_bet/min_raise are unchanged, and seat0 — who
        // already matched 60 and acted — is not made to act again. With
        // only one non-folded, non-all-in player left, the hand proceeds
        // straight to the all-in runout rather than back to seat0.
        assert_eq!(hand.last_aggressor_id, Some(seat0));
        assert_eq!(hand.current_bet, 60);
        assert!(hand.should_run_out(&players));
        assert!(hand.round_closed(&players));
    }

    #[test]
    fn raise_then_call_closes_round() {
        let mut players = vec![player(1000, 0), player(1000, 1)];
        let mut hand = Hand::start(&mut players, None, 10, 20).unwrap();
        let p1 = hand.current_actor();
        hand.apply_action(&mut players, p1, ActionKind::Raise, Some(40)).unwrap();
        assert!(hand.advance_to_next_actor(&players));
        let p2 = hand.current_actor();
        hand.apply_action(&mut players, p2, ActionKind::Call, None).unwrap();
        assert!(hand.round_closed(&players));
        assert_eq!(hand.pot, 120);
    }

    #[test]
    fn blinds_only_checkdown_runs_to_showdown_with_pot_40() {
        let mut players = vec![player(1000, 0), player(1000, 1)];
        let mut hand = Hand::start(&mut players, None, 10, 20).unwrap();

        // Preflop: dealer/SB calls the 10 owed, BB checks.
        let sb = hand.current_actor();
        hand.apply_action(&mut players, sb, ActionKind::Call, None).unwrap();
        assert!(hand.advance_to_next_actor(&players));
        let bb = hand.current_actor();
        hand.apply_action(&mut players, bb, ActionKind::Check, None).unwrap();
        assert!(hand.round_closed(&players));
        assert_eq!(hand.pot, 40);

        // Flop, turn, river: both check each street.
        for _ in 0..3 {
            assert!(hand.close_round_and_deal_next_street(&mut players).is_some());
            let first = hand.current_actor();
            hand.apply_action(&mut players, first, ActionKind::Check, None).unwrap();
            assert!(hand.advance_to_next_actor(&players));
            let second = hand.current_actor();
            hand.apply_action(&mut players, second, ActionKind::Check, None).unwrap();
            assert!(hand.round_closed(&players));
        }

        assert!(hand.close_round_and_deal_next_street(&mut players).is_none());
        assert_eq!(hand.phase, Phase::Showdown);
        assert_eq!(hand.community_cards.len(), 5);
        assert_eq!(hand.pot, 40);

        let event = hand.showdown(&mut players);
        match event {
            HandEvent::Showdown { results } => {
                let total: u32 = results.iter().map(|r| r.amount).sum();
                assert_eq!(total, 40);
            }
            _ => panic!("expected Showdown"),
        }
        assert_eq!(hand.pot, 0);
    }

    #[test]
    fn all_in_runout_deals_remaining_streets_with_no_further_betting() {
        let mut players = vec![player(200, 0), player(200, 1)];
        let mut hand = Hand::start(&mut players, None, 10, 20).unwrap();

        let sb = hand.current_actor();
        hand.apply_action(&mut players, sb, ActionKind::AllIn, None).unwrap();
        assert!(hand.advance_to_next_actor(&players));
        let bb = hand.current_actor();
        hand.apply_action(&mut players, bb, ActionKind::Call, None).unwrap();

        assert_eq!(hand.pot, 400);
        assert!(hand.should_run_out(&players));
        let events = hand.run_out_remaining_streets();
        assert_eq!(hand.phase, Phase::Showdown);
        assert_eq!(hand.community_cards.len(), 5);
        assert_eq!(events.len(), 3);

        let event = hand.showdown(&mut players);
        match event {
            HandEvent::Showdown { results } => {
                let total: u32 = results.iter().map(|r| r.amount).sum();
                assert_eq!(total, 400);
            }
            _ => panic!("expected Showdown"),
        }
        let stack_total: u32 = players.iter().map(|p| p.stack).sum();
        assert_eq!(stack_total, 400);
    }
}
