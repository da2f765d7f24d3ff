//! WebSocket protocol messages for Fodinha multiplayer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Create a new game room
    CreateRoom { player_name: String, max_players: u8 },

    /// Join an existing room
    JoinRoom { room_id: Uuid, player_name: String },

    /// Re-bind this connection to a previously issued player token
    /// (reconnection after a dropped socket)
    Rejoin { room_id: Uuid, player_token: Uuid },

    /// Leave current room
    LeaveRoom,

    /// Start the game (host only)
    StartGame,

    /// Restart the game with the current roster (host only)
    RestartGame,

    /// Submit a trick prediction for the current round
    MakePrediction { prediction: u8 },

    /// Play a card from the hand
    PlayCard { card_id: String },

    /// Request room list
    ListRooms,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with the connection's session ID
    Welcome { session_id: Uuid },

    /// Room created successfully; the token identifies this player from
    /// now on, across reconnects
    RoomCreated { room_id: Uuid, player_token: Uuid },

    /// Joined room successfully
    JoinedRoom { room: RoomInfo, player_token: Uuid },

    /// Left room successfully
    LeftRoom,

    /// Room state updated (player joined/left/reconnected)
    RoomUpdated { room: RoomInfo },

    /// Game started (or restarted)
    GameStarted { state: serde_json::Value },

    /// Game state updated after an action
    GameUpdated { state: serde_json::Value },

    /// Human-readable game log line
    GameLog { message: String },

    /// List of available rooms
    RoomList { rooms: Vec<RoomInfo> },

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,

    /// Game finished
    GameOver { winner_name: Option<String> },
}

/// Room information for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: Uuid,
    pub name: String,
    pub players: Vec<PlayerInfo>,
    pub max_players: u8,
    pub host: Uuid,
    pub status: RoomStatus,
}

/// Player information in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub token: Uuid,
    pub name: String,
    pub connected: bool,
}

/// Room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    InGame,
    Finished,
}
