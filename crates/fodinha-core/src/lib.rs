//! Fodinha - a trick-taking elimination card game engine
//!
//! This crate provides the core game logic for Fodinha, including:
//! - The stripped 40-card deck, manilha derivation, and trick ranking
//! - Player state with lives and eliminations
//! - The round/trick/prediction state machine with full rule enforcement
//!
//! # Architecture
//!
//! The engine is transport-agnostic and fully synchronous: an external
//! caller holds one [`GameState`] per room and invokes its operations in
//! response to player intents. The engine never calls back out and never
//! owns timers; the post-trick display window is ended by the caller via
//! [`GameState::continue_trick`].
//!
//! # Modules
//!
//! - [`card`]: card model, deck, comparison, and trick-winner resolution
//! - [`player`]: per-player state
//! - [`game`]: the round/trick/prediction state machine
//! - [`events`]: events emitted by the state machine

pub mod card;
pub mod events;
pub mod game;
pub mod player;

// Re-export commonly used types
pub use card::{compare_cards, trick_winner, Card, Deck, Rank, Suit, Winner, DECK_SIZE};
pub use events::GameEvent;
pub use game::{
    cards_for_round, GameError, GamePhase, GameState, PlayedCard, RoundState, TrickOutcome,
};
pub use player::{Player, PlayerId, STARTING_LIVES};
