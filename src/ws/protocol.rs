//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Optional display name; accepted once per connection
    Nickname { name: String },

    /// Single-character control code.
    /// Lower-case holds a control, its upper-case form releases it,
    /// 's' fires the shoot action. Unknown codes are ignored.
    Input { code: char },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp, echoed back unchanged
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Identity message, sent once after connection
    Welcome { id: Uuid, server_time: u64 },

    /// Complete positional state of the arena. Broadcast at the snapshot
    /// rate on a lossy channel; every snapshot is self-sufficient, so a
    /// dropped one is simply superseded by the next.
    Snapshot {
        players: Vec<PlayerSnapshot>,
        bombs: Vec<BombSnapshot>,
    },

    /// Unicast to an attacker: damage dealt and where it landed
    Strike {
        damage: i32,
        positions: Vec<ContactPos>,
    },

    /// Unicast to a victim: health after the hit resolved
    Injury { health: i32 },

    /// Broadcast scoreboard, sorted by kills
    Leaderboard { entries: Vec<LeaderboardEntry> },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Player state in a snapshot. Positions are rounded to whole pixels and the
/// angle to two decimals to keep the payload small.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub x: i32,
    pub y: i32,
    /// Orientation in radians, two decimal places
    pub angle: f32,
}

/// Bomb state in a snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BombSnapshot {
    pub id: Uuid,
    pub x: i32,
    pub y: i32,
}

/// World-space contact position for damage-number rendering
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContactPos {
    pub x: f32,
    pub y: f32,
}

/// One scoreboard row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub nickname: String,
    pub kills: u32,
}
