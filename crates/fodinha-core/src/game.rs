//! Core game state machine.
//!
//! One `GameState` exists per room while a game is in progress. All
//! operations are synchronous and atomic: validation fully precedes
//! mutation, so a rejected call leaves the state unchanged. The engine
//! never owns timers; the pause after a resolved trick is ended by the
//! caller through [`GameState::continue_trick`].

use crate::card::{self, Card, Deck, DECK_SIZE};
use crate::events::GameEvent;
use crate::player::{Player, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Game phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GamePhase {
    /// No game in progress.
    Waiting,
    /// Players are bidding how many tricks they expect to win.
    Prediction,
    /// Players are playing cards into the current trick.
    Playing,
    /// A trick was resolved; waiting for the display window to end.
    TrickComplete { outcome: TrickOutcome },
    /// End-of-round scoring is being applied.
    Scoring,
    /// At most one player remains. Terminal.
    Finished,
}

/// Result of resolving a trick, carried in the `TrickComplete` phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrickOutcome {
    MoreTricksRemain,
    RoundComplete,
}

/// Errors that can occur when applying actions.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Operation not valid in the current phase")]
    IllegalPhase,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Unknown or eliminated player")]
    UnknownOrEliminatedPlayer,

    #[error("Invalid prediction")]
    InvalidPrediction,

    #[error("Card not in hand")]
    CardNotInHand,

    #[error("At least 2 players are required")]
    InsufficientPlayers,

    #[error("Not enough cards left in the deck")]
    DeckExhausted,
}

/// A card played into the current trick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedCard {
    pub player: PlayerId,
    pub card: Card,
    /// Sequence order within the trick, starting at 0.
    pub order: u8,
}

/// Per-round state, replaced wholesale at the start of each round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundState {
    pub round_number: u32,
    pub cards_per_player: u8,
    pub phase: GamePhase,
    /// The card revealed after the deal; its rank's successor is the
    /// manilha rank for this round.
    pub revealed_card: Card,
    /// Index into the active-player list of the player due to act.
    pub current_turn: usize,
    pub played_cards: Vec<PlayedCard>,
    pub current_trick_winner: Option<PlayerId>,
    /// Predictions in bidding order.
    pub predictions: Vec<(PlayerId, u8)>,
    pub tricks_won: HashMap<PlayerId, u8>,
    pub trick_number: u32,
}

impl RoundState {
    /// The manilha rank derived from the revealed card.
    pub fn manilha(&self) -> crate::card::Rank {
        self.revealed_card.rank.manilha_successor()
    }
}

/// Cards dealt to each player in the given round: 1,2,...,9,8,...,1.
///
/// The formula is undefined past round 18 (a 10-life game practically
/// never gets there); it saturates to a zero-card deal rather than
/// inventing a second cycle.
pub fn cards_for_round(round_number: u32) -> u8 {
    if round_number <= 9 {
        round_number as u8
    } else {
        19u32.saturating_sub(round_number) as u8
    }
}

/// The complete game state for one room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub players: Vec<Player>,
    pub round: Option<RoundState>,
}

impl GameState {
    /// Create a game for the given roster, seated in join order.
    pub fn new(player_names: Vec<String>) -> Self {
        let players = player_names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Player::new(i as PlayerId, name))
            .collect();
        Self {
            players,
            round: None,
        }
    }

    /// Current phase; `Waiting` while no round exists.
    pub fn phase(&self) -> GamePhase {
        self.round
            .as_ref()
            .map(|r| r.phase)
            .unwrap_or(GamePhase::Waiting)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn round_state(&self) -> Option<&RoundState> {
        self.round.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase(), GamePhase::Finished)
    }

    /// The sole surviving player, or `None` while more than one remains.
    pub fn winner(&self) -> Option<&Player> {
        let mut survivors = self.players.iter().filter(|p| !p.eliminated);
        let first = survivors.next()?;
        if survivors.next().is_some() {
            None
        } else {
            Some(first)
        }
    }

    /// The player due to act: the next bidder during `Prediction`, the
    /// next card player during `Playing`, `None` in every other phase.
    pub fn current_actor(&self) -> Option<PlayerId> {
        let round = self.round.as_ref()?;
        let active = self.active_player_ids();
        if active.is_empty() {
            return None;
        }
        match round.phase {
            GamePhase::Prediction => {
                Some(active[(round.current_turn + round.predictions.len()) % active.len()])
            }
            GamePhase::Playing => Some(active[round.current_turn]),
            _ => None,
        }
    }

    /// Non-eliminated players in join order. Stable mid-round because
    /// eliminations only happen during scoring.
    fn active_player_ids(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| !p.eliminated)
            .map(|p| p.id)
            .collect()
    }

    fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    fn require_participant(&self, id: PlayerId) -> Result<(), GameError> {
        match self.player(id) {
            Some(p) if !p.eliminated => Ok(()),
            _ => Err(GameError::UnknownOrEliminatedPlayer),
        }
    }

    /// Start (or restart) the game: reset every player and deal round 1.
    pub fn start_game(&mut self) -> Result<Vec<GameEvent>, GameError> {
        if self.players.len() < 2 {
            return Err(GameError::InsufficientPlayers);
        }

        for player in &mut self.players {
            player.reset_for_game();
        }
        self.round = None;

        self.start_round(1)
    }

    /// Deal a fresh round and open bidding.
    fn start_round(&mut self, round_number: u32) -> Result<Vec<GameEvent>, GameError> {
        let cards_per_player = cards_for_round(round_number);
        let active = self.active_player_ids();

        // A full deal plus the revealed card must come out of one deck.
        let needed = cards_per_player as usize * active.len() + 1;
        if needed > DECK_SIZE {
            return Err(GameError::DeckExhausted);
        }

        let mut rng = rand::thread_rng();
        let mut deck = Deck::new();
        deck.shuffle(&mut rng);

        for &id in &active {
            let hand = deck
                .deal(cards_per_player as usize)
                .ok_or(GameError::DeckExhausted)?;
            if let Some(player) = self.player_mut(id) {
                player.hand = hand;
                player.reset_for_round();
            }
        }

        let revealed_card = deck.draw_one().ok_or(GameError::DeckExhausted)?;

        // Starting actor rotates one seat per round.
        let starting = (round_number as usize - 1) % active.len();

        self.round = Some(RoundState {
            round_number,
            cards_per_player,
            phase: GamePhase::Prediction,
            revealed_card,
            current_turn: starting,
            played_cards: Vec::new(),
            current_trick_winner: None,
            predictions: Vec::new(),
            tricks_won: HashMap::new(),
            trick_number: 0,
        });

        Ok(vec![GameEvent::RoundStarted {
            round: round_number,
            cards_per_player,
            revealed_card,
        }])
    }

    /// Record a prediction for the player whose bidding turn it is.
    pub fn make_prediction(
        &mut self,
        player: PlayerId,
        value: u8,
    ) -> Result<Vec<GameEvent>, GameError> {
        if self.phase() != GamePhase::Prediction {
            return Err(GameError::IllegalPhase);
        }
        self.require_participant(player)?;

        let active = self.active_player_ids();
        let round = self.round.as_ref().ok_or(GameError::IllegalPhase)?;

        let due = active[(round.current_turn + round.predictions.len()) % active.len()];
        if due != player {
            return Err(GameError::NotYourTurn);
        }

        if value > round.cards_per_player {
            return Err(GameError::InvalidPrediction);
        }

        // The last bidder may not make the predictions sum to the
        // number of tricks in the round.
        if round.predictions.len() + 1 == active.len() {
            let sum: u32 = round.predictions.iter().map(|&(_, v)| v as u32).sum();
            if sum + value as u32 == round.cards_per_player as u32 {
                return Err(GameError::InvalidPrediction);
            }
        }

        if let Some(p) = self.player_mut(player) {
            p.prediction = Some(value);
        }
        let round = self.round.as_mut().ok_or(GameError::IllegalPhase)?;
        round.predictions.push((player, value));

        let mut events = vec![GameEvent::PredictionMade {
            player,
            prediction: value,
        }];

        if round.predictions.len() == active.len() {
            round.phase = GamePhase::Playing;
            round.trick_number = 1;
            events.push(GameEvent::BiddingComplete);
        }

        Ok(events)
    }

    /// Play a card from the acting player's hand into the trick.
    pub fn play_card(
        &mut self,
        player: PlayerId,
        card_id: &str,
    ) -> Result<Vec<GameEvent>, GameError> {
        if self.phase() != GamePhase::Playing {
            return Err(GameError::IllegalPhase);
        }
        self.require_participant(player)?;

        let active = self.active_player_ids();
        {
            let round = self.round.as_ref().ok_or(GameError::IllegalPhase)?;
            if active[round.current_turn] != player {
                return Err(GameError::NotYourTurn);
            }
        }

        let card = self
            .player_mut(player)
            .and_then(|p| p.take_card(card_id))
            .ok_or(GameError::CardNotInHand)?;

        let round = self.round.as_mut().ok_or(GameError::IllegalPhase)?;
        let order = round.played_cards.len() as u8;
        round.played_cards.push(PlayedCard {
            player,
            card,
            order,
        });
        round.current_turn = (round.current_turn + 1) % active.len();

        let mut events = vec![GameEvent::CardPlayed { player, card }];

        if round.played_cards.len() == active.len() {
            events.extend(self.resolve_trick());
        }

        Ok(events)
    }

    /// Resolve a completed trick: pick the winner, hand them the lead,
    /// and pause in `TrickComplete` so the presentation layer can show
    /// the outcome before the cards are cleared.
    fn resolve_trick(&mut self) -> Vec<GameEvent> {
        let active = self.active_player_ids();
        let round_over = self
            .players
            .iter()
            .filter(|p| !p.eliminated)
            .all(|p| p.hand.is_empty());

        let Some(round) = self.round.as_mut() else {
            return Vec::new();
        };

        let manilha = round.revealed_card.rank.manilha_successor();
        let cards: Vec<Card> = round.played_cards.iter().map(|p| p.card).collect();
        let Some(idx) = card::trick_winner(&cards, manilha) else {
            return Vec::new();
        };
        let winner = round.played_cards[idx].player;

        *round.tricks_won.entry(winner).or_insert(0) += 1;
        round.current_trick_winner = Some(winner);
        // Winner leads the next trick.
        round.current_turn = active.iter().position(|&id| id == winner).unwrap_or(0);

        let outcome = if round_over {
            TrickOutcome::RoundComplete
        } else {
            TrickOutcome::MoreTricksRemain
        };
        round.phase = GamePhase::TrickComplete { outcome };
        let trick_number = round.trick_number;

        if let Some(p) = self.player_mut(winner) {
            p.tricks_won += 1;
        }

        vec![GameEvent::TrickResolved {
            winner,
            trick_number,
            outcome,
        }]
    }

    /// End the post-trick display window.
    ///
    /// A defined no-op outside `TrickComplete`, so a stale scheduler
    /// callback that arrives after the state has already advanced does
    /// nothing.
    pub fn continue_trick(&mut self) -> Result<Vec<GameEvent>, GameError> {
        let outcome = match self.round.as_ref().map(|r| r.phase) {
            Some(GamePhase::TrickComplete { outcome }) => outcome,
            _ => return Ok(Vec::new()),
        };

        match outcome {
            TrickOutcome::MoreTricksRemain => {
                let round = self.round.as_mut().ok_or(GameError::IllegalPhase)?;
                round.played_cards.clear();
                round.phase = GamePhase::Playing;
                round.trick_number += 1;
                Ok(vec![GameEvent::TrickCleared {
                    trick_number: round.trick_number,
                }])
            }
            TrickOutcome::RoundComplete => {
                // The next deal must fit the deck before scoring touches
                // anything, so a rejected call leaves the round intact.
                self.check_next_deal()?;
                let round = self.round.as_mut().ok_or(GameError::IllegalPhase)?;
                round.played_cards.clear();
                round.phase = GamePhase::Scoring;
                self.score_round()
            }
        }
    }

    /// Whether the round dealt after this one's scoring would fit the
    /// deck. Computed from the would-be survivor count without mutating,
    /// mirroring the scoring rule: a player survives when their lives
    /// exceed the margin they missed their prediction by.
    fn check_next_deal(&self) -> Result<(), GameError> {
        let survivors = self
            .players
            .iter()
            .filter(|p| !p.eliminated)
            .filter(|p| {
                let missed = p.prediction.unwrap_or(0).abs_diff(p.tricks_won);
                p.lives.saturating_sub(missed) > 0
            })
            .count();
        if survivors <= 1 {
            return Ok(());
        }

        let next = self.round.as_ref().map_or(1, |r| r.round_number + 1);
        let needed = cards_for_round(next) as usize * survivors + 1;
        if needed > DECK_SIZE {
            return Err(GameError::DeckExhausted);
        }
        Ok(())
    }

    /// Apply end-of-round scoring, eliminate players at zero lives, and
    /// either finish the game or deal the next round.
    fn score_round(&mut self) -> Result<Vec<GameEvent>, GameError> {
        let mut events = Vec::new();

        for player in self.players.iter_mut().filter(|p| !p.eliminated) {
            let prediction = player.prediction.unwrap_or(0);
            let missed = prediction.abs_diff(player.tricks_won);

            if missed > 0 {
                let before = player.lives;
                player.lives = player.lives.saturating_sub(missed);
                events.push(GameEvent::LivesLost {
                    player: player.id,
                    lives_lost: before - player.lives,
                    lives_remaining: player.lives,
                });
            } else {
                events.push(GameEvent::PredictionExact { player: player.id });
            }

            if player.lives == 0 {
                player.eliminated = true;
                events.push(GameEvent::PlayerEliminated { player: player.id });
            }
        }

        let remaining = self.active_player_ids();
        if remaining.len() <= 1 {
            if let Some(round) = self.round.as_mut() {
                round.phase = GamePhase::Finished;
            }
            events.push(GameEvent::GameFinished {
                winner: remaining.first().copied(),
            });
        } else {
            let next = self.round.as_ref().map_or(1, |r| r.round_number + 1);
            events.extend(self.start_round(next)?);
        }

        Ok(events)
    }
}
