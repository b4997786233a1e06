//! The authoritative arena simulation.
//!
//! One task owns the physics world, the entity registry and the live bombs.
//! Connection handlers and timers only post commands; the tick loop drains
//! them, applies control forces, steps the engine, resolves the tick's
//! collisions and periodically broadcasts a snapshot. Nothing else touches
//! the state, so no collision is ever resolved against a half-updated world.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rapier2d::prelude::RigidBodyHandle;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::combat::{
    self, Stab, BLAST_DAMAGE, BOMB_FUSE, BOMB_SPAWN_OFFSET, BOMB_SPEED, SHIELD_DURATION,
};
use crate::game::input::{self, InputAction};
use crate::game::physics::{ContactPairEvent, PhysicsWorld};
use crate::game::registry::Registry;
use crate::game::snapshot::SnapshotBuilder;
use crate::game::{ArenaCommand, ClientHandle};
use crate::util::time::{unix_millis, SIMULATION_TPS, SNAPSHOT_TPS};
use crate::ws::protocol::{ContactPos, ServerMsg};

const COMMAND_QUEUE_DEPTH: usize = 256;
const BROADCAST_QUEUE_DEPTH: usize = 64;

/// A bomb in flight
struct Bomb {
    id: Uuid,
    owner: Uuid,
    body: RigidBodyHandle,
    spawned_at: Instant,
}

/// Handle for talking to a running arena
#[derive(Clone)]
pub struct ArenaHandle {
    command_tx: mpsc::Sender<ArenaCommand>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    player_count: Arc<AtomicUsize>,
}

impl ArenaHandle {
    /// Sender for posting commands into the simulation loop
    pub fn command_sender(&self) -> mpsc::Sender<ArenaCommand> {
        self.command_tx.clone()
    }

    /// Subscribe to the lossy snapshot/leaderboard broadcast
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.broadcast_tx.subscribe()
    }

    /// Live player count, for the health endpoint
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// The authoritative game arena
pub struct Arena {
    physics: PhysicsWorld,
    registry: Registry,
    bombs: HashMap<Uuid, Bomb>,
    command_rx: mpsc::Receiver<ArenaCommand>,
    /// Kept for timers, which post their expiry back as commands
    command_tx: mpsc::Sender<ArenaCommand>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
}

impl Arena {
    pub fn new() -> (Self, ArenaHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_QUEUE_DEPTH);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = ArenaHandle {
            command_tx: command_tx.clone(),
            broadcast_tx: broadcast_tx.clone(),
            player_count: player_count.clone(),
        };

        let arena = Self {
            physics: PhysicsWorld::new(),
            registry: Registry::new(),
            bombs: HashMap::new(),
            command_rx,
            command_tx,
            broadcast_tx,
            snapshot_builder: SnapshotBuilder::new(SIMULATION_TPS / SNAPSHOT_TPS),
            player_count,
        };

        (arena, handle)
    }

    /// Run the simulation loop. Never returns; the arena lives as long as
    /// the process.
    pub async fn run(mut self) {
        info!(tps = SIMULATION_TPS, snapshot_tps = SNAPSHOT_TPS, "Arena started");

        let tick_duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain pending commands
            self.process_commands();

            // Read control state into force/torque requests
            self.apply_controls();

            // Advance the world and resolve what it reports
            let contacts = self.physics.step();
            self.resolve_stabs(contacts);

            // Broadcast a snapshot if one is due
            if self.snapshot_builder.should_send() {
                let _ = self.broadcast_tx.send(self.build_snapshot());
            }
        }
    }

    /// Process all pending commands
    fn process_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                ArenaCommand::Connect { client, reply } => {
                    let id = self.handle_connect(client);
                    let _ = reply.send(id);
                }
                ArenaCommand::Disconnect { entity_id } => self.handle_disconnect(entity_id),
                ArenaCommand::Input { entity_id, code } => self.handle_input(entity_id, code),
                ArenaCommand::Nickname { entity_id, name } => {
                    self.handle_nickname(entity_id, &name)
                }
                ArenaCommand::ShieldExpired { entity_id } => {
                    // guarded: the entity may have despawned since the stab
                    if let Some(entity) = self.registry.get_mut(entity_id) {
                        entity.shielded = false;
                    }
                }
                ArenaCommand::FuseExpired { bomb_id } => self.explode_bomb(bomb_id),
            }
        }
    }

    fn handle_connect(&mut self, client: ClientHandle) -> Uuid {
        let id = self.registry.spawn(&mut self.physics, client);
        self.player_count.store(self.registry.len(), Ordering::Relaxed);

        if let Some(handle) = self.registry.client(id) {
            handle.send(ServerMsg::Welcome {
                id,
                server_time: unix_millis(),
            });
        }
        self.broadcast_leaderboard();

        info!(entity_id = %id, players = self.registry.len(), "Player connected");
        id
    }

    fn handle_disconnect(&mut self, entity_id: Uuid) {
        // A live bomb outlasts its owner; the fuse command cleans it up.
        self.registry.despawn(&mut self.physics, entity_id);
        self.player_count.store(self.registry.len(), Ordering::Relaxed);
        self.broadcast_leaderboard();

        info!(entity_id = %entity_id, players = self.registry.len(), "Player disconnected");
    }

    fn handle_input(&mut self, entity_id: Uuid, code: char) {
        match input::decode(code) {
            Some(InputAction::Press(flag)) => self.registry.set_control(entity_id, flag, true),
            Some(InputAction::Release(flag)) => self.registry.set_control(entity_id, flag, false),
            Some(InputAction::Shoot) => self.shoot(entity_id),
            // unknown codes are not an error
            None => {}
        }
    }

    fn handle_nickname(&mut self, entity_id: Uuid, name: &str) {
        if self.registry.set_nickname(entity_id, name) {
            self.broadcast_leaderboard();
        }
    }

    fn apply_controls(&mut self) {
        for entity in self.registry.iter() {
            self.physics.apply_controls(entity.body, &entity.controls);
        }
    }

    /// Resolve the collision pairs the engine reported for this tick
    fn resolve_stabs(&mut self, contacts: Vec<ContactPairEvent>) {
        for event in contacts {
            let Some(stab) = combat::classify_stab(&event, |id| self.registry.contains(id))
            else {
                continue;
            };
            // A shielded victim skips only this pair; the rest of the
            // tick's pairs still resolve.
            if self.registry.get(stab.victim).is_some_and(|v| v.shielded) {
                continue;
            }
            self.apply_stab(stab);
        }
    }

    fn apply_stab(&mut self, stab: Stab) {
        let Some(outcome) = self
            .registry
            .apply_damage(&mut self.physics, stab.victim, stab.damage)
        else {
            return;
        };

        if let Some(victim) = self.registry.get_mut(stab.victim) {
            victim.shielded = true;
        }
        self.schedule_shield_expiry(stab.victim);

        if let Some(attacker) = self.registry.client(stab.attacker) {
            attacker.send(ServerMsg::Strike {
                damage: stab.damage,
                positions: vec![ContactPos { x: stab.x, y: stab.y }],
            });
        }
        if let Some(victim) = self.registry.client(stab.victim) {
            victim.send(ServerMsg::Injury {
                health: outcome.health,
            });
        }
        if outcome.died {
            self.credit_kill(stab.attacker, stab.victim);
            // get the respawn teleport out promptly
            self.snapshot_builder.force_next();
        }

        debug!(
            attacker = %stab.attacker,
            victim = %stab.victim,
            damage = stab.damage,
            "Stab"
        );
    }

    fn schedule_shield_expiry(&self, entity_id: Uuid) {
        let command_tx = self.command_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SHIELD_DURATION).await;
            let _ = command_tx.send(ArenaCommand::ShieldExpired { entity_id }).await;
        });
    }

    /// Shoot action: throw this player's bomb if it is available
    fn shoot(&mut self, entity_id: Uuid) {
        let Some(entity) = self.registry.get(entity_id) else {
            return;
        };
        // one bomb in flight per player
        if !entity.has_bomb {
            return;
        }
        let body_handle = entity.body;
        let Some((x, y, angle)) = self.physics.pose(body_handle) else {
            return;
        };

        let (dir_x, dir_y) = (angle.sin(), -angle.cos());
        let bomb_id = Uuid::new_v4();
        let (body, _collider) = self.physics.spawn_bomb(
            bomb_id,
            x + dir_x * BOMB_SPAWN_OFFSET,
            y + dir_y * BOMB_SPAWN_OFFSET,
            dir_x * BOMB_SPEED,
            dir_y * BOMB_SPEED,
        );
        self.bombs.insert(
            bomb_id,
            Bomb {
                id: bomb_id,
                owner: entity_id,
                body,
                spawned_at: Instant::now(),
            },
        );
        if let Some(entity) = self.registry.get_mut(entity_id) {
            entity.has_bomb = false;
        }
        self.schedule_fuse(bomb_id);

        debug!(entity_id = %entity_id, bomb_id = %bomb_id, "Bomb thrown");
    }

    fn schedule_fuse(&self, bomb_id: Uuid) {
        let command_tx = self.command_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(BOMB_FUSE).await;
            let _ = command_tx.send(ArenaCommand::FuseExpired { bomb_id }).await;
        });
    }

    /// Fuse expiry: area damage at the bomb's current position, then
    /// cleanup. The blast bypasses shields, and the bomber's own bomb can
    /// hurt them too. A disconnected bomber is skipped silently; remaining
    /// players are still damaged.
    fn explode_bomb(&mut self, bomb_id: Uuid) {
        let Some(bomb) = self.bombs.remove(&bomb_id) else {
            return;
        };
        let Some((blast_x, blast_y, _)) = self.physics.pose(bomb.body) else {
            return;
        };

        let positions: Vec<(Uuid, f32, f32)> = self
            .registry
            .iter()
            .filter_map(|e| self.physics.pose(e.body).map(|(x, y, _)| (e.id, x, y)))
            .collect();
        let victims = combat::blast_victims(blast_x, blast_y, positions.into_iter());

        let mut strike_positions = Vec::with_capacity(victims.len());
        for (victim_id, victim_x, victim_y) in victims {
            let Some(outcome) = self
                .registry
                .apply_damage(&mut self.physics, victim_id, BLAST_DAMAGE)
            else {
                continue;
            };
            strike_positions.push(ContactPos {
                x: victim_x,
                y: victim_y,
            });
            if let Some(client) = self.registry.client(victim_id) {
                client.send(ServerMsg::Injury {
                    health: outcome.health,
                });
            }
            if outcome.died {
                self.credit_kill(bomb.owner, victim_id);
                self.snapshot_builder.force_next();
            }
        }

        if !strike_positions.is_empty() {
            if let Some(client) = self.registry.client(bomb.owner) {
                client.send(ServerMsg::Strike {
                    damage: BLAST_DAMAGE,
                    positions: strike_positions,
                });
            }
        }

        self.physics.remove_body(bomb.body);
        if let Some(owner) = self.registry.get_mut(bomb.owner) {
            owner.has_bomb = true;
        }

        debug!(bomb_id = %bomb_id, flight = ?bomb.spawned_at.elapsed(), "Bomb exploded");
    }

    fn credit_kill(&mut self, attacker: Uuid, victim: Uuid) {
        // no credit for self-damage
        if attacker == victim {
            return;
        }
        let Some(entity) = self.registry.get_mut(attacker) else {
            return;
        };
        entity.kills += 1;
        self.broadcast_leaderboard();
    }

    fn broadcast_leaderboard(&self) {
        let _ = self.broadcast_tx.send(ServerMsg::Leaderboard {
            entries: self.registry.leaderboard(),
        });
    }

    fn build_snapshot(&self) -> ServerMsg {
        SnapshotBuilder::build(
            self.registry
                .iter()
                .filter_map(|e| self.physics.pose(e.body).map(|(x, y, a)| (e.id, x, y, a))),
            self.bombs
                .values()
                .filter_map(|b| self.physics.pose(b.body).map(|(x, y, _)| (b.id, x, y))),
        )
    }
}
