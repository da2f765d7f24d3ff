//! Timed room actions.
//!
//! Three timers drive a room: the post-trick display window, the turn
//! timeout that plays a random card for a stalled player, and the
//! periodic sweep of abandoned rooms. The first two are armed anew
//! after every state change and carry the room's epoch at arming time;
//! `advance_room` discards callbacks whose epoch is stale.

use crate::server::{self, ServerState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// How long a resolved trick stays on the table before play resumes.
pub const TRICK_DISPLAY_DELAY: Duration = Duration::from_millis(4500);

/// How long the due player gets before a card is played for them.
pub const TURN_TIMEOUT: Duration = Duration::from_secs(30);

/// Rooms older than this are removed regardless of occupancy.
pub const ROOM_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// How often the stale-room sweep runs.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// End the post-trick display window after [`TRICK_DISPLAY_DELAY`].
pub fn schedule_trick_continue(state: Arc<ServerState>, room_id: Uuid, epoch: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(TRICK_DISPLAY_DELAY).await;
        let result = server::advance_room(&state, room_id, Some(epoch), false, |room| {
            room.continue_trick()
        });
        if let Err(e) = result {
            warn!("Trick continuation in room {} failed: {}", room_id, e);
        }
    });
}

/// Force a random card after [`TURN_TIMEOUT`] if the same player is
/// still due to play.
pub fn schedule_turn_timeout(state: Arc<ServerState>, room_id: Uuid, epoch: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(TURN_TIMEOUT).await;
        let result = server::advance_room(&state, room_id, Some(epoch), false, |room| {
            room.force_play_due_card()
        });
        if let Err(e) = result {
            warn!("Turn timeout in room {} failed: {}", room_id, e);
        }
    });
}

/// Periodically remove empty and expired rooms, along with any player
/// token bindings that pointed into them.
pub fn spawn_room_cleanup(state: Arc<ServerState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;

            let stale: Vec<Uuid> = state
                .rooms
                .iter()
                .filter(|r| r.is_stale(ROOM_MAX_AGE))
                .map(|r| r.id)
                .collect();

            for room_id in stale {
                if let Some((_, room)) = state.rooms.remove(&room_id) {
                    info!("Removing stale room {} ({})", room_id, room.name);
                    for player in &room.players {
                        if let Some((_, session)) = state.token_sessions.remove(&player.token) {
                            state.session_rooms.remove(&session);
                            state.session_tokens.remove(&session);
                        }
                    }
                }
            }
        }
    });
}
