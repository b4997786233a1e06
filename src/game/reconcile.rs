//! Client-side snapshot reconciliation.
//!
//! The browser derives its visual world from whatever snapshot arrived last:
//! add ids it has never seen, teleport the ones it knows, drop the ones that
//! vanished, and play an explosion where a bomb stopped being reported. This
//! module is the reference implementation of that contract; keeping it next
//! to the broadcaster keeps both ends of the sync protocol under one test
//! suite.
#![allow(dead_code)] // consumed by the client, not by the server binary

use std::collections::HashMap;

use uuid::Uuid;

use crate::ws::protocol::{BombSnapshot, PlayerSnapshot};

/// Pose of a purely visual body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualPose {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

/// Cosmetic side effects of applying a snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconcileEffect {
    PlayerAppeared(Uuid),
    PlayerRemoved(Uuid),
    /// A bomb id stopped being reported: it exploded; render the ring at its
    /// last known position
    BombExploded { id: Uuid, x: f32, y: f32 },
}

/// Local visual world derived from authoritative snapshots. Never simulated;
/// each applied snapshot is ground truth.
#[derive(Debug, Default)]
pub struct ReconciledWorld {
    players: HashMap<Uuid, VisualPose>,
    bombs: HashMap<Uuid, (f32, f32)>,
}

impl ReconciledWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one snapshot. Snapshots are complete, so any single one fully
    /// determines the resulting world; dropped or reordered snapshots can
    /// never wedge it.
    pub fn apply(
        &mut self,
        players: &[PlayerSnapshot],
        bombs: &[BombSnapshot],
    ) -> Vec<ReconcileEffect> {
        let mut effects = Vec::new();

        for player in players {
            let pose = VisualPose {
                x: player.x as f32,
                y: player.y as f32,
                angle: player.angle,
            };
            if self.players.insert(player.id, pose).is_none() {
                effects.push(ReconcileEffect::PlayerAppeared(player.id));
            }
        }
        self.players.retain(|id, _| {
            let present = players.iter().any(|p| p.id == *id);
            if !present {
                effects.push(ReconcileEffect::PlayerRemoved(*id));
            }
            present
        });

        for bomb in bombs {
            self.bombs.insert(bomb.id, (bomb.x as f32, bomb.y as f32));
        }
        self.bombs.retain(|id, (x, y)| {
            let present = bombs.iter().any(|b| b.id == *id);
            if !present {
                effects.push(ReconcileEffect::BombExploded {
                    id: *id,
                    x: *x,
                    y: *y,
                });
            }
            present
        });

        effects
    }

    pub fn player(&self, id: Uuid) -> Option<&VisualPose> {
        self.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn bomb_count(&self) -> usize {
        self.bombs.len()
    }
}
