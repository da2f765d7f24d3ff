//! Player state.

use crate::card::Card;
use serde::{Deserialize, Serialize};

/// Seat index into the room's roster, assigned in join order.
pub type PlayerId = u8;

/// Lives every player starts a game with.
pub const STARTING_LIVES: u8 = 10;

/// A single player's state.
///
/// `lives` and `eliminated` persist across rounds within a game;
/// `hand`, `prediction` and `tricks_won` reset every round. An
/// eliminated player is never removed from the list, only skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub lives: u8,
    pub hand: Vec<Card>,
    pub prediction: Option<u8>,
    /// Tricks won in the current round.
    pub tricks_won: u8,
    pub eliminated: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            lives: STARTING_LIVES,
            hand: Vec::new(),
            prediction: None,
            tricks_won: 0,
            eliminated: false,
        }
    }

    /// Full reset at the start of a game.
    pub fn reset_for_game(&mut self) {
        self.lives = STARTING_LIVES;
        self.hand.clear();
        self.prediction = None;
        self.tricks_won = 0;
        self.eliminated = false;
    }

    /// Per-round reset; the hand is replaced by the fresh deal.
    pub fn reset_for_round(&mut self) {
        self.prediction = None;
        self.tricks_won = 0;
    }

    /// Remove the card with the given identifier from the hand. The
    /// hand is untouched when the card is absent.
    pub fn take_card(&mut self, card_id: &str) -> Option<Card> {
        let pos = self.hand.iter().position(|c| c.id() == card_id)?;
        Some(self.hand.remove(pos))
    }
}
