//! Playing cards and the 52-card deck.
//!
//! A [`Deck`] is shuffled once per hand by the Room Engine using the OS CSPRNG
//! (`rand::rng()`, which draws from `getrandom`) and dealt from the front;
//! nothing here reuses a card within a shuffle.

use rand::rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A card suit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suit {
    Diamonds,
    Spades,
    Clubs,
    Hearts,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Diamonds, Suit::Spades, Suit::Clubs, Suit::Hearts];

    pub fn symbol(&self) -> &'static str {
        match self {
            Suit::Diamonds => "♦",
            Suit::Spades => "♠",
            Suit::Clubs => "♣",
            Suit::Hearts => "♥",
        }
    }
}

/// A card rank, `Two` through `Ace`. The discriminant doubles as the rank's
/// numeric value (2-14) so comparisons and straight detection need no lookup
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
    Ten = 10,
    Jack = 11,
    Queen = 12,
    King = 13,
    Ace = 14,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "T",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank.symbol(), self.suit.symbol())
    }
}

/// Returns all 52 distinct cards, in no particular order.
pub fn full_deck() -> Vec<Card> {
    let mut cards = Vec::with_capacity(52);
    for suit in Suit::ALL {
        for rank in Rank::ALL {
            cards.push(Card::new(rank, suit));
        }
    }
    cards
}

/// An ordered, shuffled sequence of all 52 cards. `deal` consumes from the
/// front; a fresh `Deck` is created at the start of every hand so no card is
/// ever reused within a hand.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Build a new deck shuffled with a cryptographically secure RNG
    /// (Fisher-Yates via `rand::seq::SliceRandom`).
    pub fn shuffled() -> Self {
        let mut cards = full_deck();
        cards.shuffle(&mut rng());
        // Dealt from the front; reverse so `pop()` deals in shuffle order.
        cards.reverse();
        Self { cards }
    }

    /// Deal the next card, or `None` if the deck is exhausted (never happens
    /// in a legal hand: at most 9 players * 2 + 5 board = 23 cards).
    pub fn deal(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_deck_has_52_distinct_cards() {
        let cards = full_deck();
        assert_eq!(cards.len(), 52);
        for rank in Rank::ALL {
            assert_eq!(cards.iter().filter(|c| c.rank == rank).count(), 4);
        }
        for suit in Suit::ALL {
            assert_eq!(cards.iter().filter(|c| c.suit == suit).count(), 13);
        }
    }

    #[test]
    fn deck_deals_every_card_exactly_once() {
        let mut deck = Deck::shuffled();
        let mut seen = std::collections::HashSet::new();
        let mut count = 0;
        while let Some(card) = deck.deal() {
            assert!(seen.insert(card), "card dealt twice: {card}");
            count += 1;
        }
        assert_eq!(count, 52);
    }
}
