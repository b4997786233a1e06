//! Snapshot building for the periodic state broadcast

use uuid::Uuid;

use crate::ws::protocol::{BombSnapshot, PlayerSnapshot, ServerMsg};

/// Decides when a snapshot is due and assembles it. The simulation runs
/// faster than the broadcast; every `snapshot_interval` ticks one snapshot
/// goes out.
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force a snapshot on the next check (used after important events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Assemble a snapshot message from live poses
    pub fn build<P, B>(players: P, bombs: B) -> ServerMsg
    where
        P: Iterator<Item = (Uuid, f32, f32, f32)>,
        B: Iterator<Item = (Uuid, f32, f32)>,
    {
        ServerMsg::Snapshot {
            players: players
                .map(|(id, x, y, angle)| PlayerSnapshot {
                    id,
                    x: x.round() as i32,
                    y: y.round() as i32,
                    angle: round_angle(angle),
                })
                .collect(),
            bombs: bombs
                .map(|(id, x, y)| BombSnapshot {
                    id,
                    x: x.round() as i32,
                    y: y.round() as i32,
                })
                .collect(),
        }
    }
}

/// Two decimal places is plenty for rendering and keeps payloads small
fn round_angle(angle: f32) -> f32 {
    (angle * 100.0).round() / 100.0
}
