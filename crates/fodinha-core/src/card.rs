//! Card model, deck, and trick-ranking rules.
//!
//! Fodinha is played with a stripped 40-card deck (no 8, 9 or 10). Rank
//! strength runs `4 < 5 < 6 < 7 < Q < J < K < A < 2 < 3`. Each round one
//! card is revealed and the *next* rank in that same cyclic order becomes
//! the manilha: every card of that rank, regardless of suit, beats every
//! non-manilha card. Two manilhas are ordered by suit.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of cards in a full deck (4 suits x 10 ranks).
pub const DECK_SIZE: usize = 40;

/// Card suits, weakest to strongest.
///
/// Suit strength only ever matters between two manilhas; plain cards of
/// equal rank tie and are split by play order instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Diamonds,
    Spades,
    Hearts,
    Clubs,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Diamonds, Suit::Spades, Suit::Hearts, Suit::Clubs];

    /// Strength used to break ties between two manilhas (clubs highest).
    pub fn strength(&self) -> u8 {
        match self {
            Suit::Diamonds => 0,
            Suit::Spades => 1,
            Suit::Hearts => 2,
            Suit::Clubs => 3,
        }
    }

    /// Lowercase name used in card identifiers.
    pub fn name(&self) -> &'static str {
        match self {
            Suit::Diamonds => "diamonds",
            Suit::Spades => "spades",
            Suit::Hearts => "hearts",
            Suit::Clubs => "clubs",
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Suit::Diamonds => '♦',
            Suit::Spades => '♠',
            Suit::Hearts => '♥',
            Suit::Clubs => '♣',
        }
    }
}

/// Card ranks, weakest to strongest.
///
/// The declaration order doubles as the manilha cycle: the manilha rank
/// is always the successor of the revealed card's rank, wrapping from
/// `3` back to `4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "A")]
    Ace,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
}

impl Rank {
    /// All ranks in ascending strength order.
    pub const ORDER: [Rank; 10] = [
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Queen,
        Rank::Jack,
        Rank::King,
        Rank::Ace,
        Rank::Two,
        Rank::Three,
    ];

    /// Position in the strength order (0 = weakest).
    pub fn strength(&self) -> u8 {
        Rank::ORDER
            .iter()
            .position(|r| r == self)
            .map(|i| i as u8)
            .unwrap_or(0)
    }

    /// The rank that becomes manilha when this rank is revealed.
    pub fn manilha_successor(&self) -> Rank {
        let idx = self.strength() as usize;
        Rank::ORDER[(idx + 1) % Rank::ORDER.len()]
    }

    /// Label used in card identifiers and display.
    pub fn label(&self) -> &'static str {
        match self {
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Queen => "Q",
            Rank::Jack => "J",
            Rank::King => "K",
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
        }
    }
}

/// A single playing card. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    /// Stable identifier, e.g. `"Q-hearts"`. Unique within a deck.
    pub fn id(&self) -> String {
        format!("{}-{}", self.rank.label(), self.suit.name())
    }

    /// Whether this card is a manilha for the given manilha rank.
    pub fn is_manilha(&self, manilha: Rank) -> bool {
        self.rank == manilha
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank.label(), self.suit.symbol())
    }
}

/// Which of two compared cards takes precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    First,
    Second,
}

/// Compare two cards under the round's manilha rank.
///
/// Manilhas beat everything else and are ordered among themselves by
/// suit. Plain cards compare by rank strength. An exact rank tie between
/// plain cards is decided by `first_played_wins`: the caller chooses
/// which side keeps precedence.
pub fn compare_cards(first: Card, second: Card, manilha: Rank, first_played_wins: bool) -> Winner {
    match (first.is_manilha(manilha), second.is_manilha(manilha)) {
        (true, true) => {
            if first.suit.strength() > second.suit.strength() {
                Winner::First
            } else {
                Winner::Second
            }
        }
        (true, false) => Winner::First,
        (false, true) => Winner::Second,
        (false, false) => {
            use std::cmp::Ordering;
            match first.rank.strength().cmp(&second.rank.strength()) {
                Ordering::Greater => Winner::First,
                Ordering::Less => Winner::Second,
                Ordering::Equal => {
                    if first_played_wins {
                        Winner::First
                    } else {
                        Winner::Second
                    }
                }
            }
        }
    }
}

/// Index of the winning card among cards played in order.
///
/// Left-to-right fold keeping a running best; a later card displaces the
/// best only on a strict win, so the earliest card among equals keeps
/// the trick. Returns `None` for an empty slice.
pub fn trick_winner(cards: &[Card], manilha: Rank) -> Option<usize> {
    if cards.is_empty() {
        return None;
    }

    let mut winner = 0;
    for (i, card) in cards.iter().enumerate().skip(1) {
        if compare_cards(*card, cards[winner], manilha, false) == Winner::First {
            winner = i;
        }
    }
    Some(winner)
}

/// An ordered deck of the remaining cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// All 40 unique cards in suit-then-rank order, unshuffled.
    pub fn new() -> Self {
        let mut cards = Vec::with_capacity(DECK_SIZE);
        for suit in Suit::ALL {
            for rank in Rank::ORDER {
                cards.push(Card::new(rank, suit));
            }
        }
        Self { cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Uniform random permutation of the remaining cards.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
    }

    /// Remove and return the first `count` cards, or `None` when fewer
    /// remain. The deck is untouched on `None`.
    pub fn deal(&mut self, count: usize) -> Option<Vec<Card>> {
        if count > self.cards.len() {
            return None;
        }
        Some(self.cards.drain(..count).collect())
    }

    /// Remove and return the new first card (used to reveal the card
    /// that defines the manilha rank).
    pub fn draw_one(&mut self) -> Option<Card> {
        if self.cards.is_empty() {
            None
        } else {
            Some(self.cards.remove(0))
        }
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}
