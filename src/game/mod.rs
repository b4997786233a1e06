//! Game simulation modules

pub mod arena;
pub mod combat;
pub mod input;
pub mod physics;
pub mod reconcile;
pub mod registry;
pub mod snapshot;

pub use arena::{Arena, ArenaHandle};

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Sender half of a connection's unicast channel.
///
/// Targeted messages (welcome, strike, injury) go through here. Sends never
/// block the simulation loop: a full or closed queue drops the message, and
/// snapshots will carry the client forward.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    tx: mpsc::Sender<ServerMsg>,
}

impl ClientHandle {
    pub fn new(tx: mpsc::Sender<ServerMsg>) -> Self {
        Self { tx }
    }

    pub fn send(&self, msg: ServerMsg) {
        let _ = self.tx.try_send(msg);
    }
}

/// Commands funneled into the arena task. Every mutation of game state
/// happens on that task in response to one of these, including the deferred
/// ones posted back by shield and fuse timers.
#[derive(Debug)]
pub enum ArenaCommand {
    /// New connection: spawn an entity and reply with its id
    Connect {
        client: ClientHandle,
        reply: oneshot::Sender<Uuid>,
    },
    /// Connection closed: tear the entity down
    Disconnect { entity_id: Uuid },
    /// Raw control code from the client
    Input { entity_id: Uuid, code: char },
    /// Display name request
    Nickname { entity_id: Uuid, name: String },
    /// Posted by the shield timer one cooldown after a stab
    ShieldExpired { entity_id: Uuid },
    /// Posted by the fuse timer when a bomb must explode
    FuseExpired { bomb_id: Uuid },
}
