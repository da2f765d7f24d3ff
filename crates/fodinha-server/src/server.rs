//! WebSocket server and connection handling.
//!
//! Each connection gets a throwaway session ID; joining a room issues a
//! stable player token. The token survives socket drops, so a client can
//! rejoin mid-game and pick its seat back up.

use crate::protocol::{ClientMessage, RoomStatus, ServerMessage};
use crate::room::{GameRoom, RoomError};
use crate::scheduler;
use dashmap::DashMap;
use fodinha_core::{GameEvent, GamePhase};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    /// All active rooms
    pub rooms: DashMap<Uuid, GameRoom>,
    /// Session -> room the session's player is in
    pub session_rooms: DashMap<Uuid, Uuid>,
    /// Session -> player token
    pub session_tokens: DashMap<Uuid, Uuid>,
    /// Player token -> currently bound session (absent while disconnected)
    pub token_sessions: DashMap<Uuid, Uuid>,
    /// Session -> outgoing message channel
    pub senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            session_rooms: DashMap::new(),
            session_tokens: DashMap::new(),
            token_sessions: DashMap::new(),
            senders: DashMap::new(),
        }
    }

    /// Send a message to a specific session.
    pub fn send_to_session(&self, session_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.senders.get(&session_id) {
            let _ = sender.send(msg);
        }
    }

    /// Send a message to the session currently bound to a player token.
    pub fn send_to_player(&self, token: Uuid, msg: ServerMessage) {
        if let Some(session_id) = self.token_sessions.get(&token) {
            self.send_to_session(*session_id, msg);
        }
    }

    /// Broadcast a message to every connected player in a room.
    pub fn broadcast_to_room(&self, room_id: Uuid, msg: ServerMessage) {
        let tokens: Vec<Uuid> = match self.rooms.get(&room_id) {
            Some(room) => room.players.iter().map(|p| p.token).collect(),
            None => return,
        };
        for token in tokens {
            self.send_to_player(token, msg.clone());
        }
    }

    /// Get the list of rooms still open for joining.
    pub fn get_waiting_rooms(&self) -> Vec<crate::protocol::RoomInfo> {
        self.rooms
            .iter()
            .filter(|r| r.status == RoomStatus::Waiting)
            .map(|r| r.to_info())
            .collect()
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply a state-advancing operation to a room and publish the outcome:
/// broadcast the new snapshot and log lines, then arm whichever timer
/// the resulting phase calls for.
///
/// `expect_epoch` is set by scheduled callbacks: if the room's epoch has
/// moved since the timer was armed, some other action got there first
/// and the callback gives way.
pub fn advance_room<F>(
    state: &Arc<ServerState>,
    room_id: Uuid,
    expect_epoch: Option<u64>,
    started: bool,
    op: F,
) -> Result<(), RoomError>
where
    F: FnOnce(&mut GameRoom) -> Result<Vec<GameEvent>, RoomError>,
{
    let (snapshot, logs, room_info, phase, epoch, finished, winner_name) = {
        let mut room = state.rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;

        if let Some(expected) = expect_epoch {
            if room.timer_epoch != expected {
                return Ok(());
            }
        }

        let events = op(&mut room)?;
        if expect_epoch.is_some() && events.is_empty() {
            // The precondition lapsed before the timer fired.
            return Ok(());
        }

        let epoch = room.bump_epoch();
        let logs = room.event_log_lines(&events);
        (
            room.game_snapshot(),
            logs,
            started.then(|| room.to_info()),
            room.phase(),
            epoch,
            room.status == RoomStatus::Finished,
            room.winner_name(),
        )
    };

    if let Some(room_info) = room_info {
        state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
    }
    if let Some(game_state) = snapshot {
        let msg = if started {
            ServerMessage::GameStarted { state: game_state }
        } else {
            ServerMessage::GameUpdated { state: game_state }
        };
        state.broadcast_to_room(room_id, msg);
    }
    for message in logs {
        state.broadcast_to_room(room_id, ServerMessage::GameLog { message });
    }

    if finished {
        state.broadcast_to_room(room_id, ServerMessage::GameOver { winner_name });
        return Ok(());
    }

    match phase {
        Some(GamePhase::TrickComplete { .. }) => {
            scheduler::schedule_trick_continue(Arc::clone(state), room_id, epoch);
        }
        Some(GamePhase::Playing) => {
            scheduler::schedule_turn_timeout(Arc::clone(state), room_id, epoch);
        }
        _ => {}
    }

    Ok(())
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Fodinha server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let session_id = Uuid::new_v4();

    // Channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.senders.insert(session_id, tx);

    let welcome = ServerMessage::Welcome { session_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text.into())).await?;

    // Forward messages from the channel to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) {
                    handle_message(session_id, client_msg, &state);
                } else {
                    warn!("Invalid message from {}: {}", session_id, text);
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", session_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_session(session_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", session_id, e);
                break;
            }
            _ => {}
        }
    }

    handle_disconnect(session_id, &state);
    state.senders.remove(&session_id);
    send_task.abort();

    info!("Connection closed for {}", session_id);
    Ok(())
}

fn bind_session(state: &ServerState, session_id: Uuid, token: Uuid, room_id: Uuid) {
    state.session_tokens.insert(session_id, token);
    state.token_sessions.insert(token, session_id);
    state.session_rooms.insert(session_id, room_id);
}

fn send_error(state: &ServerState, session_id: Uuid, message: impl ToString) {
    state.send_to_session(
        session_id,
        ServerMessage::Error {
            message: message.to_string(),
        },
    );
}

/// Handle a client message.
fn handle_message(session_id: Uuid, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::CreateRoom {
            player_name,
            max_players,
        } => {
            let room_id = Uuid::new_v4();
            let player_token = Uuid::new_v4();
            let room = GameRoom::new(room_id, player_token, player_name, max_players);
            let room_info = room.to_info();

            state.rooms.insert(room_id, room);
            bind_session(state, session_id, player_token, room_id);

            state.send_to_session(
                session_id,
                ServerMessage::RoomCreated {
                    room_id,
                    player_token,
                },
            );
            state.send_to_session(
                session_id,
                ServerMessage::JoinedRoom {
                    room: room_info,
                    player_token,
                },
            );
        }

        ClientMessage::JoinRoom {
            room_id,
            player_name,
        } => {
            let player_token = Uuid::new_v4();
            if let Some(mut room) = state.rooms.get_mut(&room_id) {
                match room.add_player(player_token, player_name) {
                    Ok(()) => {
                        let room_info = room.to_info();
                        drop(room); // Release lock before broadcasting

                        bind_session(state, session_id, player_token, room_id);
                        state.send_to_session(
                            session_id,
                            ServerMessage::JoinedRoom {
                                room: room_info.clone(),
                                player_token,
                            },
                        );
                        state.broadcast_to_room(
                            room_id,
                            ServerMessage::RoomUpdated { room: room_info },
                        );
                    }
                    Err(e) => send_error(state, session_id, e),
                }
            } else {
                send_error(state, session_id, "Room not found");
            }
        }

        ClientMessage::Rejoin {
            room_id,
            player_token,
        } => {
            if let Some(mut room) = state.rooms.get_mut(&room_id) {
                if !room.has_player(player_token) {
                    drop(room);
                    send_error(state, session_id, "Unknown player token");
                    return;
                }

                room.set_player_connected(player_token, true);
                let room_info = room.to_info();
                let snapshot = room.game_snapshot();
                drop(room);

                // Detach any previous session still bound to the token.
                if let Some((_, old_session)) = state.token_sessions.remove(&player_token) {
                    state.session_rooms.remove(&old_session);
                    state.session_tokens.remove(&old_session);
                }
                bind_session(state, session_id, player_token, room_id);

                state.send_to_session(
                    session_id,
                    ServerMessage::JoinedRoom {
                        room: room_info.clone(),
                        player_token,
                    },
                );
                if let Some(game_state) = snapshot {
                    state.send_to_session(session_id, ServerMessage::GameUpdated { state: game_state });
                }
                state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
            } else {
                send_error(state, session_id, "Room not found");
            }
        }

        ClientMessage::LeaveRoom => {
            if let Some((_, room_id)) = state.session_rooms.remove(&session_id) {
                let token = state.session_tokens.remove(&session_id).map(|(_, t)| t);
                if let Some(token) = token {
                    state.token_sessions.remove(&token);

                    let should_remove = {
                        if let Some(mut room) = state.rooms.get_mut(&room_id) {
                            // A leave doesn't advance game state, so the
                            // epoch stays put and any armed display or
                            // turn timer remains valid.
                            let is_empty = room.remove_player(token).unwrap_or(false);

                            if !is_empty {
                                let room_info = room.to_info();
                                drop(room);
                                state.broadcast_to_room(
                                    room_id,
                                    ServerMessage::RoomUpdated { room: room_info },
                                );
                            }

                            is_empty
                        } else {
                            false
                        }
                    };

                    if should_remove {
                        state.rooms.remove(&room_id);
                    }
                }

                state.send_to_session(session_id, ServerMessage::LeftRoom);
            }
        }

        ClientMessage::StartGame | ClientMessage::RestartGame => {
            let room_id = state.session_rooms.get(&session_id).map(|r| *r);
            let token = state.session_tokens.get(&session_id).map(|t| *t);
            if let (Some(room_id), Some(token)) = (room_id, token) {
                let result = advance_room(state, room_id, None, true, |room| {
                    room.start_game(token)
                });
                if let Err(e) = result {
                    send_error(state, session_id, e);
                }
            }
        }

        ClientMessage::MakePrediction { prediction } => {
            let room_id = state.session_rooms.get(&session_id).map(|r| *r);
            let token = state.session_tokens.get(&session_id).map(|t| *t);
            if let (Some(room_id), Some(token)) = (room_id, token) {
                let result = advance_room(state, room_id, None, false, |room| {
                    room.make_prediction(token, prediction)
                });
                if let Err(e) = result {
                    send_error(state, session_id, e);
                }
            }
        }

        ClientMessage::PlayCard { card_id } => {
            let room_id = state.session_rooms.get(&session_id).map(|r| *r);
            let token = state.session_tokens.get(&session_id).map(|t| *t);
            if let (Some(room_id), Some(token)) = (room_id, token) {
                let result = advance_room(state, room_id, None, false, |room| {
                    room.play_card(token, &card_id)
                });
                if let Err(e) = result {
                    send_error(state, session_id, e);
                }
            }
        }

        ClientMessage::ListRooms => {
            let rooms = state.get_waiting_rooms();
            state.send_to_session(session_id, ServerMessage::RoomList { rooms });
        }

        ClientMessage::Ping => {
            state.send_to_session(session_id, ServerMessage::Pong);
        }
    }
}

/// Handle a dropped connection.
///
/// Mid-game the player's seat is kept and only marked disconnected, so
/// a `Rejoin` with the issued token can resume. In a waiting room the
/// player is removed outright.
fn handle_disconnect(session_id: Uuid, state: &Arc<ServerState>) {
    let Some((_, room_id)) = state.session_rooms.remove(&session_id) else {
        return;
    };
    let Some((_, token)) = state.session_tokens.remove(&session_id) else {
        return;
    };
    state.token_sessions.remove(&token);

    if let Some(mut room) = state.rooms.get_mut(&room_id) {
        if room.status == RoomStatus::InGame {
            room.set_player_connected(token, false);
            let room_info = room.to_info();
            drop(room);
            state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
        } else {
            let is_empty = room.remove_player(token).unwrap_or(false);
            if is_empty {
                drop(room);
                state.rooms.remove(&room_id);
            } else {
                let room_info = room.to_info();
                drop(room);
                state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fodinha_core::{GamePhase, TrickOutcome};

    /// Create a room with two players through the message handler,
    /// returning the sessions and the room ID. No sockets are involved;
    /// outgoing messages drop on the floor because no senders exist.
    fn two_player_room(state: &Arc<ServerState>) -> (Uuid, Uuid, Uuid) {
        let session_a = Uuid::new_v4();
        let session_b = Uuid::new_v4();

        handle_message(
            session_a,
            ClientMessage::CreateRoom {
                player_name: "Ana".to_string(),
                max_players: 4,
            },
            state,
        );
        let room_id = *state.session_rooms.get(&session_a).unwrap();

        handle_message(
            session_b,
            ClientMessage::JoinRoom {
                room_id,
                player_name: "Bruno".to_string(),
            },
            state,
        );

        (session_a, session_b, room_id)
    }

    #[tokio::test]
    async fn test_leaving_mid_game_keeps_armed_timers_valid() {
        let state = Arc::new(ServerState::new());
        let (session_a, session_b, room_id) = two_player_room(&state);
        handle_message(session_a, ClientMessage::StartGame, &state);

        // Put the room in the post-trick display window and capture the
        // epoch a display timer armed at that moment would hold.
        let armed_epoch = {
            let mut room = state.rooms.get_mut(&room_id).unwrap();
            let round = room.game.as_mut().unwrap().round.as_mut().unwrap();
            round.phase = GamePhase::TrickComplete {
                outcome: TrickOutcome::MoreTricksRemain,
            };
            round.trick_number = 1;
            room.bump_epoch()
        };

        // A player leaves while the timer is pending.
        handle_message(session_b, ClientMessage::LeaveRoom, &state);
        assert_eq!(state.rooms.get(&room_id).unwrap().player_count(), 1);

        // The callback still matches the room's epoch and advances play.
        advance_room(&state, room_id, Some(armed_epoch), false, |room| {
            room.continue_trick()
        })
        .unwrap();
        assert_eq!(
            state.rooms.get(&room_id).unwrap().phase(),
            Some(GamePhase::Playing)
        );
    }

    #[tokio::test]
    async fn test_stale_epoch_callback_gives_way() {
        let state = Arc::new(ServerState::new());
        let (session_a, _session_b, room_id) = two_player_room(&state);
        handle_message(session_a, ClientMessage::StartGame, &state);

        let armed_epoch = {
            let mut room = state.rooms.get_mut(&room_id).unwrap();
            let round = room.game.as_mut().unwrap().round.as_mut().unwrap();
            round.phase = GamePhase::TrickComplete {
                outcome: TrickOutcome::MoreTricksRemain,
            };
            round.trick_number = 1;
            room.bump_epoch()
        };

        // Some other action advanced the room after the timer was armed.
        state.rooms.get_mut(&room_id).unwrap().bump_epoch();

        advance_room(&state, room_id, Some(armed_epoch), false, |room| {
            room.continue_trick()
        })
        .unwrap();
        assert_eq!(
            state.rooms.get(&room_id).unwrap().phase(),
            Some(GamePhase::TrickComplete {
                outcome: TrickOutcome::MoreTricksRemain
            })
        );
    }
}
