//! Entity Registry: authoritative per-player state and connection bindings.
//!
//! Gameplay attributes live here as an explicit record per entity; the
//! physics body is referenced by handle only. Every lookup treats a missing
//! entity as a normal race with disconnection, not an error.

use std::collections::HashMap;

use rapier2d::prelude::{ColliderHandle, RigidBodyHandle};
use uuid::Uuid;

use crate::game::input::ControlFlag;
use crate::game::physics::{PhysicsWorld, SPAWN_X, SPAWN_Y};
use crate::game::ClientHandle;
use crate::ws::protocol::LeaderboardEntry;

pub const MAX_HEALTH: i32 = 100;
const MAX_NICKNAME_LEN: usize = 24;

/// Currently-held control flags; mutually independent booleans
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub rotate_left: bool,
    pub rotate_right: bool,
    pub thrust: bool,
}

/// A player entity
#[derive(Debug)]
pub struct Entity {
    pub id: Uuid,
    pub body: RigidBodyHandle,
    pub collider: ColliderHandle,
    /// Always in (0, MAX_HEALTH]; a lethal hit resets it to MAX_HEALTH
    pub health: i32,
    pub kills: u32,
    pub nickname: Option<String>,
    pub controls: Controls,
    /// Post-hit invulnerability window is active
    pub shielded: bool,
    /// False while this player's bomb is in flight
    pub has_bomb: bool,
}

/// Outcome of a damage application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    /// Health after resolution; never outside (0, MAX_HEALTH]
    pub health: i32,
    /// The hit crossed the death threshold and the entity respawned
    pub died: bool,
}

/// Owns all live entities and their connection bindings. Only the arena task
/// touches this.
pub struct Registry {
    entities: HashMap<Uuid, Entity>,
    connections: HashMap<Uuid, ClientHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            connections: HashMap::new(),
        }
    }

    /// Create a player entity at the spawn point and bind its connection
    pub fn spawn(&mut self, physics: &mut PhysicsWorld, client: ClientHandle) -> Uuid {
        let id = Uuid::new_v4();
        let (body, collider) = physics.spawn_player(id);
        self.entities.insert(
            id,
            Entity {
                id,
                body,
                collider,
                health: MAX_HEALTH,
                kills: 0,
                nickname: None,
                controls: Controls::default(),
                shielded: false,
                has_bomb: true,
            },
        );
        self.connections.insert(id, client);
        id
    }

    /// Remove the entity from the physics world and every map. Safe to call
    /// twice; the second call is a no-op.
    pub fn despawn(&mut self, physics: &mut PhysicsWorld, id: Uuid) {
        if let Some(entity) = self.entities.remove(&id) {
            physics.remove_body(entity.body);
        }
        self.connections.remove(&id);
    }

    /// Set a control flag; silently ignored if the entity is gone
    pub fn set_control(&mut self, id: Uuid, flag: ControlFlag, active: bool) {
        if let Some(entity) = self.entities.get_mut(&id) {
            match flag {
                ControlFlag::RotateLeft => entity.controls.rotate_left = active,
                ControlFlag::RotateRight => entity.controls.rotate_right = active,
                ControlFlag::Thrust => entity.controls.thrust = active,
            }
        }
    }

    /// Subtract damage, clamping the death transition: a result at or below
    /// zero resets health to MAX_HEALTH and repositions the body to the spawn
    /// point. Clients never observe non-positive health.
    pub fn apply_damage(
        &mut self,
        physics: &mut PhysicsWorld,
        id: Uuid,
        amount: i32,
    ) -> Option<DamageOutcome> {
        let entity = self.entities.get_mut(&id)?;
        entity.health -= amount.max(0);
        if entity.health <= 0 {
            entity.health = MAX_HEALTH;
            physics.set_position(entity.body, SPAWN_X, SPAWN_Y);
            return Some(DamageOutcome {
                health: entity.health,
                died: true,
            });
        }
        Some(DamageOutcome {
            health: entity.health,
            died: false,
        })
    }

    /// First write wins; later attempts and empty names are ignored.
    /// Returns whether the name changed.
    pub fn set_nickname(&mut self, id: Uuid, name: &str) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if entity.nickname.is_some() {
            return false;
        }
        let trimmed: String = name.trim().chars().take(MAX_NICKNAME_LEN).collect();
        if trimmed.is_empty() {
            return false;
        }
        entity.nickname = Some(trimmed);
        true
    }

    pub fn get(&self, id: Uuid) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Unicast sender for an entity's connection
    pub fn client(&self, id: Uuid) -> Option<&ClientHandle> {
        self.connections.get(&id)
    }

    /// Display name, falling back to an anonymous tag derived from the id
    pub fn display_name(entity: &Entity) -> String {
        entity
            .nickname
            .clone()
            .unwrap_or_else(|| format!("Player_{}", &entity.id.to_string()[..8]))
    }

    /// Scoreboard rows sorted by kills, best first
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .entities
            .values()
            .map(|entity| LeaderboardEntry {
                nickname: Self::display_name(entity),
                kills: entity.kills,
            })
            .collect();
        entries.sort_by(|a, b| b.kills.cmp(&a.kills));
        entries
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_client() -> ClientHandle {
        let (tx, _rx) = mpsc::channel(8);
        ClientHandle::new(tx)
    }

    fn setup() -> (PhysicsWorld, Registry, Uuid) {
        let mut physics = PhysicsWorld::new();
        let mut registry = Registry::new();
        let id = registry.spawn(&mut physics, test_client());
        (physics, registry, id)
    }

    #[test]
    fn spawn_initializes_full_health_and_a_bomb() {
        let (_physics, registry, id) = setup();
        let entity = registry.get(id).unwrap();
        assert_eq!(entity.health, MAX_HEALTH);
        assert_eq!(entity.kills, 0);
        assert_eq!(entity.controls, Controls::default());
        assert!(!entity.shielded);
        assert!(entity.has_bomb);
        assert!(registry.client(id).is_some());
    }

    #[test]
    fn despawn_is_idempotent() {
        let (mut physics, mut registry, id) = setup();
        registry.despawn(&mut physics, id);
        assert!(registry.is_empty());
        assert!(!registry.contains(id));
        assert!(registry.client(id).is_none());
        // second call is a no-op, not a panic
        registry.despawn(&mut physics, id);
    }

    #[test]
    fn controls_follow_the_last_applied_event() {
        let (_physics, mut registry, id) = setup();

        // release before press leaves the flag off
        registry.set_control(id, ControlFlag::Thrust, false);
        assert!(!registry.get(id).unwrap().controls.thrust);

        // duplicate presses are idempotent
        registry.set_control(id, ControlFlag::Thrust, true);
        registry.set_control(id, ControlFlag::Thrust, true);
        assert!(registry.get(id).unwrap().controls.thrust);

        registry.set_control(id, ControlFlag::Thrust, false);
        assert!(!registry.get(id).unwrap().controls.thrust);
    }

    #[test]
    fn control_updates_for_missing_entities_are_ignored() {
        let (_physics, mut registry, _id) = setup();
        registry.set_control(Uuid::new_v4(), ControlFlag::RotateLeft, true);
    }

    #[test]
    fn damage_subtracts_and_reports_new_health() {
        let (mut physics, mut registry, id) = setup();
        let outcome = registry.apply_damage(&mut physics, id, 30).unwrap();
        assert_eq!(outcome, DamageOutcome { health: 70, died: false });
    }

    #[test]
    fn lethal_damage_resets_health_and_repositions_to_spawn() {
        let (mut physics, mut registry, id) = setup();
        let body = registry.get(id).unwrap().body;
        physics.set_position(body, 200.0, 700.0);

        let outcome = registry.apply_damage(&mut physics, id, 150).unwrap();
        assert_eq!(outcome, DamageOutcome { health: MAX_HEALTH, died: true });

        let (x, y, _) = physics.pose(body).unwrap();
        assert_eq!((x, y), (SPAWN_X, SPAWN_Y));
    }

    #[test]
    fn exact_lethal_damage_also_resets() {
        let (mut physics, mut registry, id) = setup();
        let outcome = registry.apply_damage(&mut physics, id, MAX_HEALTH).unwrap();
        assert!(outcome.died);
        assert_eq!(outcome.health, MAX_HEALTH);
    }

    #[test]
    fn negative_damage_never_heals() {
        let (mut physics, mut registry, id) = setup();
        registry.apply_damage(&mut physics, id, 40);
        let outcome = registry.apply_damage(&mut physics, id, -10).unwrap();
        assert_eq!(outcome.health, 60);
    }

    #[test]
    fn damage_to_missing_entities_reports_none() {
        let (mut physics, mut registry, _id) = setup();
        assert!(registry.apply_damage(&mut physics, Uuid::new_v4(), 10).is_none());
    }

    #[test]
    fn nickname_is_set_once_and_trimmed() {
        let (_physics, mut registry, id) = setup();
        assert!(registry.set_nickname(id, "  pointy  "));
        assert_eq!(registry.get(id).unwrap().nickname.as_deref(), Some("pointy"));
        // second write is ignored
        assert!(!registry.set_nickname(id, "other"));
        assert_eq!(registry.get(id).unwrap().nickname.as_deref(), Some("pointy"));
    }

    #[test]
    fn blank_nicknames_are_rejected() {
        let (_physics, mut registry, id) = setup();
        assert!(!registry.set_nickname(id, "   "));
        assert!(registry.get(id).unwrap().nickname.is_none());
    }

    #[test]
    fn leaderboard_sorts_by_kills() {
        let (mut physics, mut registry, first) = setup();
        let second = registry.spawn(&mut physics, test_client());
        registry.set_nickname(second, "champ");
        registry.get_mut(second).unwrap().kills = 3;

        let entries = registry.leaderboard();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].nickname, "champ");
        assert_eq!(entries[0].kills, 3);
        assert_eq!(entries[1].kills, 0);

        let _ = first;
    }
}
