//! Events emitted by the game state machine.
//!
//! Every mutating operation returns the events it produced so the
//! transport layer can log them and drive its broadcast/scheduling
//! without re-deriving what happened.

use crate::card::Card;
use crate::game::TrickOutcome;
use crate::player::PlayerId;
use serde::{Deserialize, Serialize};

/// Events that occur as a result of applying an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A round was dealt and bidding opened.
    RoundStarted {
        round: u32,
        cards_per_player: u8,
        revealed_card: Card,
    },

    /// A prediction was recorded.
    PredictionMade { player: PlayerId, prediction: u8 },

    /// Every active player has predicted; play begins.
    BiddingComplete,

    /// A card was played into the current trick.
    CardPlayed { player: PlayerId, card: Card },

    /// The trick was resolved; the winner leads the next trick.
    TrickResolved {
        winner: PlayerId,
        trick_number: u32,
        outcome: TrickOutcome,
    },

    /// The display window ended and the next trick begins.
    TrickCleared { trick_number: u32 },

    /// A player's prediction missed and cost lives.
    LivesLost {
        player: PlayerId,
        lives_lost: u8,
        lives_remaining: u8,
    },

    /// A player's prediction matched exactly.
    PredictionExact { player: PlayerId },

    /// A player ran out of lives.
    PlayerEliminated { player: PlayerId },

    /// At most one player remains; the game is over.
    GameFinished { winner: Option<PlayerId> },
}
