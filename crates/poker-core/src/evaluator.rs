//! Hand evaluation: the pure function at the heart of showdown.
//!
//! `evaluate` takes two hole cards plus the community cards seen so far and
//! returns the best possible 5-card hand as a [`HandValue`] — a totally
//! ordered value (stronger hands compare greater) plus a human description.
//! No game state, no mutation, no I/O.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::card::{Card, Suit};

/// The category of a made poker hand, ordered weakest to strongest so that
/// `#[derive(Ord)]` gives the correct comparison for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HandCategory {
    HighCard,
    Pair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandCategory::HighCard => "High Card",
            HandCategory::Pair => "Pair",
            HandCategory::TwoPair => "Two Pair",
            HandCategory::ThreeOfAKind => "Three of a Kind",
            HandCategory::Straight => "Straight",
            HandCategory::Flush => "Flush",
            HandCategory::FullHouse => "Full House",
            HandCategory::FourOfAKind => "Four of a Kind",
            HandCategory::StraightFlush => "Straight Flush",
            HandCategory::RoyalFlush => "Royal Flush",
        };
        f.write_str(s)
    }
}

/// The result of evaluating a hand: a total order (`category` then
/// `tiebreak`, compared lexicographically) plus a human-readable
/// description. `tiebreak` holds up to 5 rank values in descending
/// significance; unused slots are zero and never affect comparisons because
/// `category` plus the populated slots already disambiguate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandValue {
    pub category: HandCategory,
    tiebreak: [u8; 5],
    pub description: String,
}

impl HandValue {
    /// Pack this value into a single `u32` ordering key: useful for storage
    /// or cross-process comparison without shipping the whole struct.
    pub fn ordering_key(&self) -> u32 {
        let mut key = self.category as u32;
        for &rank in &self.tiebreak {
            key = (key << 4) | rank as u32;
        }
        key
    }
}

impl PartialOrd for HandValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HandValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.category, self.tiebreak).cmp(&(other.category, other.tiebreak))
    }
}

fn rank_name(rank: u8) -> &'static str {
    match rank {
        2 => "2s",
        3 => "3s",
        4 => "4s",
        5 => "5s",
        6 => "6s",
        7 => "7s",
        8 => "8s",
        9 => "9s",
        10 => "10s",
        11 => "Jacks",
        12 => "Queens",
        13 => "Kings",
        14 => "Aces",
        _ => "?",
    }
}

fn rank_symbol(rank: u8) -> &'static str {
    match rank {
        2 => "2",
        3 => "3",
        4 => "4",
        5 => "5",
        6 => "6",
        7 => "7",
        8 => "8",
        9 => "9",
        10 => "10",
        11 => "Jack",
        12 => "Queen",
        13 => "King",
        14 => "Ace",
        _ => "?",
    }
}

/// Find the high card of the best 5-consecutive-rank run among `distinct_desc`
/// (unique rank values, sorted descending). Recognises the wheel (A-2-3-4-5)
/// as a 5-high straight.
fn straight_high(distinct_desc: &[u8]) -> Option<u8> {
    for window in distinct_desc.windows(5) {
        if window[0] - window[4] == 4 {
            return Some(window[0]);
        }
    }
    let set: HashSet<u8> = distinct_desc.iter().copied().collect();
    if [14u8, 5, 4, 3, 2].iter().all(|r| set.contains(r)) {
        return Some(5);
    }
    None
}

/// Evaluate the best 5-card hand from 2 hole cards plus 3-5 community cards.
pub fn evaluate(hole: (Card, Card), community: &[Card]) -> HandValue {
    let mut cards: Vec<Card> = Vec::with_capacity(2 + community.len());
    cards.push(hole.0);
    cards.push(hole.1);
    cards.extend_from_slice(community);

    let rank_of = |c: &Card| c.rank as u8;

    // Rank groups, sorted by (count desc, rank desc) so groups[0] is always
    // the strongest candidate for quads/trips/pairs.
    let mut counts: Vec<(u8, u8)> = Vec::new(); // (rank, count)
    for &r in &[14u8, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2] {
        let n = cards.iter().filter(|c| rank_of(c) == r).count() as u8;
        if n > 0 {
            counts.push((r, n));
        }
    }
    let mut groups = counts.clone();
    groups.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));

    let distinct_desc: Vec<u8> = counts.iter().map(|(r, _)| *r).collect();

    // Flush detection: a suit with >= 5 cards.
    let flush_suit: Option<Suit> =
        Suit::ALL.into_iter().find(|&s| cards.iter().filter(|c| c.suit == s).count() >= 5);
    let flush_ranks_desc: Option<Vec<u8>> = flush_suit.map(|s| {
        let mut ranks: Vec<u8> = cards.iter().filter(|c| c.suit == s).map(rank_of).collect();
        ranks.sort_unstable_by(|a, b| b.cmp(a));
        ranks
    });

    let straight_flush_high = flush_ranks_desc.as_ref().and_then(|r| straight_high(r));

    if let Some(high) = straight_flush_high {
        return if high == 14 {
            HandValue {
                category: HandCategory::RoyalFlush,
                tiebreak: [14, 0, 0, 0, 0],
                description: "Royal Flush".to_string(),
            }
        } else {
            HandValue {
                category: HandCategory::StraightFlush,
                tiebreak: [high, 0, 0, 0, 0],
                description: format!("Straight Flush, {} high", rank_symbol(high)),
            }
        };
    }

    if groups[0].1 == 4 {
        let quad = groups[0].0;
        let kicker = distinct_desc.iter().copied().find(|&r| r != quad).unwrap_or(0);
        return HandValue {
            category: HandCategory::FourOfAKind,
            tiebreak: [quad, kicker, 0, 0, 0],
            description: format!("Four of a Kind, {}", rank_name(quad)),
        };
    }

    if groups[0].1 >= 3 && groups.get(1).is_some_and(|g| g.1 >= 2) {
        let trip = groups[0].0;
        let pair = groups[1].0;
        return HandValue {
            category: HandCategory::FullHouse,
            tiebreak: [trip, pair, 0, 0, 0],
            description: format!("Full House, {} full of {}", rank_name(trip), rank_name(pair)),
        };
    }

    if let Some(flush_ranks) = &flush_ranks_desc {
        let mut tb = [0u8; 5];
        for (i, &r) in flush_ranks.iter().take(5).enumerate() {
            tb[i] = r;
        }
        return HandValue {
            category: HandCategory::Flush,
            tiebreak: tb,
            description: format!("Flush, {} high", rank_symbol(tb[0])),
        };
    }

    if let Some(high) = straight_high(&distinct_desc) {
        return HandValue {
            category: HandCategory::Straight,
            tiebreak: [high, 0, 0, 0, 0],
            description: format!("Straight, {} high", rank_symbol(high)),
        };
    }

    if groups[0].1 == 3 {
        let trip = groups[0].0;
        let mut kickers: Vec<u8> = distinct_desc.iter().copied().filter(|&r| r != trip).collect();
        kickers.truncate(2);
        return HandValue {
            category: HandCategory::ThreeOfAKind,
            tiebreak: [
                trip,
                kickers.first().copied().unwrap_or(0),
                kickers.get(1).copied().unwrap_or(0),
                0,
                0,
            ],
            description: format!("Three of a Kind, {}", rank_name(trip)),
        };
    }

    if groups[0].1 == 2 && groups.get(1).is_some_and(|g| g.1 == 2) {
        let high_pair = groups[0].0;
        let low_pair = groups[1].0;
        let kicker = distinct_desc
            .iter()
            .copied()
            .find(|&r| r != high_pair && r != low_pair)
            .unwrap_or(0);
        return HandValue {
            category: HandCategory::TwoPair,
            tiebreak: [high_pair, low_pair, kicker, 0, 0],
            description: format!("Two Pair, {} and {}", rank_name(high_pair), rank_name(low_pair)),
        };
    }

    if groups[0].1 == 2 {
        let pair = groups[0].0;
        let mut kickers: Vec<u8> = distinct_desc.iter().copied().filter(|&r| r != pair).collect();
        kickers.truncate(3);
        return HandValue {
            category: HandCategory::Pair,
            tiebreak: [
                pair,
                kickers.first().copied().unwrap_or(0),
                kickers.get(1).copied().unwrap_or(0),
                kickers.get(2).copied().unwrap_or(0),
                0,
            ],
            description: format!("Pair of {}", rank_name(pair)),
        };
    }

    let mut tb = [0u8; 5];
    for (i, &r) in distinct_desc.iter().take(5).enumerate() {
        tb[i] = r;
    }
    HandValue {
        category: HandCategory::HighCard,
        tiebreak: tb,
        description: format!("High Card, {}", rank_symbol(tb[0])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Card, Rank, Suit};

    fn c(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    #[test]
    fn royal_flush_beats_straight_flush() {
        let royal = evaluate(
            (c(Rank::Ace, Suit::Spades), c(Rank::King, Suit::Spades)),
            &[
                c(Rank::Queen, Suit::Spades),
                c(Rank::Jack, Suit::Spades),
                c(Rank::Ten, Suit::Spades),
                c(Rank::Two, Suit::Hearts),
                c(Rank::Three, Suit::Clubs),
            ],
        );
        assert_eq!(royal.category, HandCategory::RoyalFlush);

        let sf = evaluate(
            (c(Rank::Nine, Suit::Hearts), c(Rank::Eight, Suit::Hearts)),
            &[
                c(Rank::Seven, Suit::Hearts),
                c(Rank::Six, Suit::Hearts),
                c(Rank::Five, Suit::Hearts),
                c(Rank::Two, Suit::Clubs),
                c(Rank::Three, Suit::Diamonds),
            ],
        );
        assert_eq!(sf.category, HandCategory::StraightFlush);
        assert!(royal > sf);
    }

    #[test]
    fn wheel_beats_no_pair_ace_high_but_loses_to_six_high() {
        let wheel = evaluate(
            (c(Rank::Ace, Suit::Spades), c(Rank::Two, Suit::Hearts)),
            &[
                c(Rank::Three, Suit::Clubs),
                c(Rank::Four, Suit::Diamonds),
                c(Rank::Five, Suit::Spades),
                c(Rank::King, Suit::Hearts),
                c(Rank::Queen, Suit::Clubs),
            ],
        );
        assert_eq!(wheel.category, HandCategory::Straight);

        let ace_high_no_pair = evaluate(
            (c(Rank::Ace, Suit::Diamonds), c(Rank::King, Suit::Diamonds)),
            &[
                c(Rank::Nine, Suit::Clubs),
                c(Rank::Seven, Suit::Hearts),
                c(Rank::Four, Suit::Spades),
                c(Rank::Two, Suit::Hearts),
                c(Rank::Three, Suit::Clubs),
            ],
        );
        assert_eq!(ace_high_no_pair.category, HandCategory::HighCard);
        assert!(wheel > ace_high_no_pair);

        let six_high = evaluate(
            (c(Rank::Six, Suit::Spades), c(Rank::Two, Suit::Diamonds)),
            &[
                c(Rank::Three, Suit::Clubs),
                c(Rank::Four, Suit::Diamonds),
                c(Rank::Five, Suit::Spades),
                c(Rank::King, Suit::Hearts),
                c(Rank::Queen, Suit::Clubs),
            ],
        );
        assert_eq!(six_high.category, HandCategory::Straight);
        assert!(six_high > wheel);
    }

    #[test]
    fn full_house_beats_flush() {
        let full_house = evaluate(
            (c(Rank::King, Suit::Spades), c(Rank::King, Suit::Hearts)),
            &[
                c(Rank::King, Suit::Diamonds),
                c(Rank::Queen, Suit::Clubs),
                c(Rank::Jack, Suit::Clubs),
                c(Rank::Nine, Suit::Clubs),
                c(Rank::Queen, Suit::Hearts),
            ],
        );
        let flush = evaluate(
            (c(Rank::Ace, Suit::Clubs), c(Rank::Ten, Suit::Clubs)),
            &[
                c(Rank::King, Suit::Diamonds),
                c(Rank::Queen, Suit::Clubs),
                c(Rank::Jack, Suit::Clubs),
                c(Rank::Nine, Suit::Clubs),
                c(Rank::Queen, Suit::Hearts),
            ],
        );
        assert_eq!(full_house.category, HandCategory::FullHouse);
        assert_eq!(flush.category, HandCategory::Flush);
        assert!(full_house > flush);
    }

    #[test]
    fn two_trips_on_board_resolve_to_full_house() {
        // Board has trip queens; hero's pair of kings plays as the pair half.
        let hero = evaluate(
            (c(Rank::King, Suit::Spades), c(Rank::King, Suit::Hearts)),
            &[
                c(Rank::Queen, Suit::Diamonds),
                c(Rank::Queen, Suit::Clubs),
                c(Rank::Queen, Suit::Hearts),
                c(Rank::Two, Suit::Clubs),
                c(Rank::Three, Suit::Spades),
            ],
        );
        assert_eq!(hero.category, HandCategory::FullHouse);
        assert_eq!(hero.description, "Full House, Queens full of Kings");
    }

    #[test]
    fn pair_tiebreak_uses_kicker() {
        let better = evaluate(
            (c(Rank::Ace, Suit::Spades), c(Rank::King, Suit::Hearts)),
            &[
                c(Rank::Ace, Suit::Hearts),
                c(Rank::Nine, Suit::Clubs),
                c(Rank::Seven, Suit::Spades),
                c(Rank::Six, Suit::Hearts),
                c(Rank::Two, Suit::Diamonds),
            ],
        );
        let worse = evaluate(
            (c(Rank::Ace, Suit::Diamonds), c(Rank::Queen, Suit::Clubs)),
            &[
                c(Rank::Ace, Suit::Hearts),
                c(Rank::Nine, Suit::Clubs),
                c(Rank::Seven, Suit::Spades),
                c(Rank::Six, Suit::Hearts),
                c(Rank::Two, Suit::Diamonds),
            ],
        );
        assert_eq!(better.category, HandCategory::Pair);
        assert_eq!(worse.category, HandCategory::Pair);
        assert!(better > worse);
    }

    #[test]
    fn identical_boards_tie() {
        let a = evaluate(
            (c(Rank::Two, Suit::Spades), c(Rank::Three, Suit::Hearts)),
            &[
                c(Rank::Ten, Suit::Hearts),
                c(Rank::Jack, Suit::Clubs),
                c(Rank::Queen, Suit::Spades),
                c(Rank::King, Suit::Hearts),
                c(Rank::Ace, Suit::Diamonds),
            ],
        );
        let b = evaluate(
            (c(Rank::Two, Suit::Diamonds), c(Rank::Three, Suit::Clubs)),
            &[
                c(Rank::Ten, Suit::Hearts),
                c(Rank::Jack, Suit::Clubs),
                c(Rank::Queen, Suit::Spades),
                c(Rank::King, Suit::Hearts),
                c(Rank::Ace, Suit::Diamonds),
            ],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn category_ordering_matches_spec() {
        assert!(HandCategory::RoyalFlush > HandCategory::StraightFlush);
        assert!(HandCategory::StraightFlush > HandCategory::FourOfAKind);
        assert!(HandCategory::FourOfAKind > HandCategory::FullHouse);
        assert!(HandCategory::FullHouse > HandCategory::Flush);
        assert!(HandCategory::Flush > HandCategory::Straight);
        assert!(HandCategory::Straight > HandCategory::ThreeOfAKind);
        assert!(HandCategory::ThreeOfAKind > HandCategory::TwoPair);
        assert!(HandCategory::TwoPair > HandCategory::Pair);
        assert!(HandCategory::Pair > HandCategory::HighCard);
    }
}
