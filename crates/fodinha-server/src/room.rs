//! Game room management.
//!
//! A room owns the roster and exactly one engine instance. Player
//! identity is a token issued at first join; the transport resolves
//! sessions to tokens, and the room resolves tokens to engine seats.

use fodinha_core::{GameError, GameEvent, GamePhase, GameState, PlayerId};
use rand::seq::SliceRandom;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::{PlayerInfo, RoomInfo, RoomStatus};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("Only the host can do that")]
    NotHost,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Game not started")]
    GameNotStarted,

    #[error(transparent)]
    Game(#[from] GameError),
}

/// A player in a game room.
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    /// Stable identity issued at first join, independent of any socket.
    pub token: Uuid,
    pub name: String,
    pub connected: bool,
    /// Seat in the engine, assigned when a game starts.
    pub seat: Option<PlayerId>,
}

impl RoomPlayer {
    pub fn new(token: Uuid, name: String) -> Self {
        Self {
            token,
            name,
            connected: true,
            seat: None,
        }
    }

    pub fn to_info(&self) -> PlayerInfo {
        PlayerInfo {
            token: self.token,
            name: self.name.clone(),
            connected: self.connected,
        }
    }
}

/// A game room holding the roster and the engine for one table.
pub struct GameRoom {
    pub id: Uuid,
    pub name: String,
    pub max_players: u8,
    /// Token of the current host.
    pub host: Uuid,
    pub status: RoomStatus,
    /// Roster in join order; eliminated players stay seated.
    pub players: Vec<RoomPlayer>,
    /// The engine instance (once a game has started).
    pub game: Option<GameState>,
    pub created_at: Instant,
    /// Bumped on every state-advancing call. Scheduled tasks capture the
    /// epoch at creation and no-op when the room has since moved on.
    pub timer_epoch: u64,
}

impl GameRoom {
    pub fn new(id: Uuid, host_token: Uuid, host_name: String, max_players: u8) -> Self {
        Self {
            id,
            name: format!("{}'s Table", host_name),
            max_players: max_players.clamp(2, 10),
            host: host_token,
            status: RoomStatus::Waiting,
            players: vec![RoomPlayer::new(host_token, host_name)],
            game: None,
            created_at: Instant::now(),
            timer_epoch: 0,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }

    pub fn has_player(&self, token: Uuid) -> bool {
        self.players.iter().any(|p| p.token == token)
    }

    pub fn add_player(&mut self, token: Uuid, name: String) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }

        self.players.push(RoomPlayer::new(token, name));
        Ok(())
    }

    /// Remove a player, handing the host role over if needed. Returns
    /// true when the room is now empty.
    pub fn remove_player(&mut self, token: Uuid) -> Result<bool, RoomError> {
        let pos = self
            .players
            .iter()
            .position(|p| p.token == token)
            .ok_or(RoomError::PlayerNotInRoom)?;
        self.players.remove(pos);

        if token == self.host {
            if let Some(next) = self.players.first() {
                self.host = next.token;
            }
        }

        Ok(self.players.is_empty())
    }

    pub fn set_player_connected(&mut self, token: Uuid, connected: bool) {
        if let Some(player) = self.players.iter_mut().find(|p| p.token == token) {
            player.connected = connected;
        }
    }

    pub fn seat_of(&self, token: Uuid) -> Option<PlayerId> {
        self.players.iter().find(|p| p.token == token)?.seat
    }

    pub fn name_of_seat(&self, seat: PlayerId) -> Option<&str> {
        self.players
            .iter()
            .find(|p| p.seat == Some(seat))
            .map(|p| p.name.as_str())
    }

    /// Start (or restart) a game with the current roster. Host only.
    pub fn start_game(&mut self, requester: Uuid) -> Result<Vec<GameEvent>, RoomError> {
        if requester != self.host {
            return Err(RoomError::NotHost);
        }

        // Seats follow join order.
        for (idx, player) in self.players.iter_mut().enumerate() {
            player.seat = Some(idx as PlayerId);
        }

        let names: Vec<String> = self.players.iter().map(|p| p.name.clone()).collect();
        let mut game = GameState::new(names);
        let events = game.start_game()?;

        self.game = Some(game);
        self.status = RoomStatus::InGame;

        Ok(events)
    }

    pub fn make_prediction(
        &mut self,
        token: Uuid,
        prediction: u8,
    ) -> Result<Vec<GameEvent>, RoomError> {
        let seat = self.seat_of(token).ok_or(RoomError::PlayerNotInRoom)?;
        let game = self.game.as_mut().ok_or(RoomError::GameNotStarted)?;
        let events = game.make_prediction(seat, prediction)?;
        self.refresh_status();
        Ok(events)
    }

    pub fn play_card(&mut self, token: Uuid, card_id: &str) -> Result<Vec<GameEvent>, RoomError> {
        let seat = self.seat_of(token).ok_or(RoomError::PlayerNotInRoom)?;
        let game = self.game.as_mut().ok_or(RoomError::GameNotStarted)?;
        let events = game.play_card(seat, card_id)?;
        self.refresh_status();
        Ok(events)
    }

    /// End the post-trick display window.
    pub fn continue_trick(&mut self) -> Result<Vec<GameEvent>, RoomError> {
        let game = self.game.as_mut().ok_or(RoomError::GameNotStarted)?;
        let events = game.continue_trick()?;
        self.refresh_status();
        Ok(events)
    }

    /// Forced move on turn timeout: play a uniformly random card from
    /// the due player's hand. Re-checks the precondition, so a stale
    /// callback that fires after the player already acted is a no-op.
    pub fn force_play_due_card(&mut self) -> Result<Vec<GameEvent>, RoomError> {
        let game = self.game.as_mut().ok_or(RoomError::GameNotStarted)?;
        if game.phase() != GamePhase::Playing {
            return Ok(Vec::new());
        }
        let Some(actor) = game.current_actor() else {
            return Ok(Vec::new());
        };

        let card_id = {
            let mut rng = rand::thread_rng();
            game.players()
                .iter()
                .find(|p| p.id == actor)
                .and_then(|p| p.hand.choose(&mut rng))
                .map(|c| c.id())
        };
        let Some(card_id) = card_id else {
            return Ok(Vec::new());
        };

        let events = game.play_card(actor, &card_id)?;
        self.refresh_status();
        Ok(events)
    }

    fn refresh_status(&mut self) {
        if self.game.as_ref().is_some_and(|g| g.is_finished()) {
            self.status = RoomStatus::Finished;
        }
    }

    pub fn bump_epoch(&mut self) -> u64 {
        self.timer_epoch += 1;
        self.timer_epoch
    }

    pub fn phase(&self) -> Option<GamePhase> {
        self.game.as_ref().map(|g| g.phase())
    }

    pub fn game_snapshot(&self) -> Option<serde_json::Value> {
        self.game.as_ref().map(|g| serde_json::to_value(g).unwrap())
    }

    pub fn winner_name(&self) -> Option<String> {
        self.game
            .as_ref()
            .and_then(|g| g.winner())
            .map(|p| p.name.clone())
    }

    /// Room age / emptiness check used by the periodic cleanup task.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.players.is_empty() || self.created_at.elapsed() > max_age
    }

    /// Human-readable log lines for a batch of engine events.
    pub fn event_log_lines(&self, events: &[GameEvent]) -> Vec<String> {
        let name = |seat: PlayerId| {
            self.name_of_seat(seat)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Seat {}", seat))
        };

        events
            .iter()
            .filter_map(|event| match event {
                GameEvent::RoundStarted {
                    round,
                    cards_per_player,
                    revealed_card,
                } => Some(format!(
                    "🔄 Round {} started ({} card{}), revealed {}",
                    round,
                    cards_per_player,
                    if *cards_per_player == 1 { "" } else { "s" },
                    revealed_card
                )),
                GameEvent::PredictionMade { player, prediction } => {
                    Some(format!("🔮 {} predicted {}", name(*player), prediction))
                }
                GameEvent::BiddingComplete => None,
                GameEvent::CardPlayed { player, card } => {
                    Some(format!("🃏 {} played {}", name(*player), card))
                }
                GameEvent::TrickResolved { winner, .. } => {
                    Some(format!("🏆 {} won the trick!", name(*winner)))
                }
                GameEvent::TrickCleared { .. } => None,
                GameEvent::LivesLost {
                    player,
                    lives_lost,
                    lives_remaining,
                } => Some(format!(
                    "💔 {} lost {} {} ({} remaining)",
                    name(*player),
                    lives_lost,
                    if *lives_lost == 1 { "life" } else { "lives" },
                    lives_remaining
                )),
                GameEvent::PredictionExact { player } => {
                    Some(format!("✅ {} hit their prediction!", name(*player)))
                }
                GameEvent::PlayerEliminated { player } => {
                    Some(format!("☠️ {} was eliminated!", name(*player)))
                }
                GameEvent::GameFinished { winner } => Some(match winner {
                    Some(seat) => format!("🏅 {} wins the game!", name(*seat)),
                    None => "🏅 Nobody survived the last round".to_string(),
                }),
            })
            .collect()
    }

    pub fn to_info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            name: self.name.clone(),
            players: self.players.iter().map(|p| p.to_info()).collect(),
            max_players: self.max_players,
            host: self.host,
            status: self.status,
        }
    }
}
