//! Physics boundary: a thin wrapper around the rapier2d world.
//!
//! The simulation treats the engine as a black box: spawn bodies, apply
//! per-tick forces, advance one tick, read poses, and drain newly-started
//! contact pairs. Coordinates are y-down screen pixels, matching the browser
//! client, so "up" is negative y and gravity is positive.

use std::collections::HashSet;

use rapier2d::parry::shape::FeatureId;
use rapier2d::prelude::*;
use uuid::Uuid;

use crate::game::registry::Controls;
use crate::util::time::tick_delta;

/// Play field dimensions in pixels
pub const ARENA_WIDTH: f32 = 800.0;
pub const ARENA_HEIGHT: f32 = 1000.0;
const WALL_THICKNESS: f32 = 50.0;

/// Fixed spawn point for new and respawned players
pub const SPAWN_X: f32 = 400.0;
pub const SPAWN_Y: f32 = 100.0;

/// Downward (screen) gravity in px/s^2
const GRAVITY: f32 = 980.0;

/// Torque applied while a rotate control is held. Positive turns clockwise
/// on screen.
const TURN_TORQUE: f32 = 1200.0;
/// Thrust force along the facing direction while the thrust control is held
const THRUST_FORCE: f32 = 1500.0;

const PLAYER_MASS: f32 = 0.5;
const PLAYER_FRICTION: f32 = 0.01;
const PLAYER_LINEAR_DAMPING: f32 = 0.6;
const PLAYER_ANGULAR_DAMPING: f32 = 4.0;

pub const BOMB_RADIUS: f32 = 16.0;
const BOMB_MASS: f32 = 0.3;

/// Arrow collider vertices in the local frame, centroid at the origin, nose
/// first and counter-clockwise as the convex polygon shape expects. Contact
/// feature `Vertex(0)` is therefore always the tip.
fn arrow_vertices() -> Vec<Point<Real>> {
    vec![
        point![0.0, -160.0 / 3.0],
        point![20.0, 80.0 / 3.0],
        point![-20.0, 80.0 / 3.0],
    ]
}

/// Shape feature on one side of a contact point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactFeature {
    /// Polygon vertex with its index on the owning collider
    Vertex(u32),
    /// Edge or unknown feature
    Other,
}

/// One penetrating contact point inside a started pair
#[derive(Debug, Clone, Copy)]
pub struct ContactPoint {
    /// World-space contact position
    pub x: f32,
    pub y: f32,
    /// Penetration depth, positive
    pub depth: f32,
    /// Shape feature on body `a` at this contact
    pub feature_a: ContactFeature,
    /// Shape feature on body `b` at this contact
    pub feature_b: ContactFeature,
}

/// A collision pair that started touching during the last tick. `a` and `b`
/// carry the ids the bodies were spawned with; static walls report a nil id.
#[derive(Debug, Clone)]
pub struct ContactPairEvent {
    pub a: Uuid,
    pub b: Uuid,
    pub points: Vec<ContactPoint>,
}

type PairKey = ((u32, u32), (u32, u32));

fn pair_key(a: ColliderHandle, b: ColliderHandle) -> PairKey {
    let (a, b) = (a.into_raw_parts(), b.into_raw_parts());
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// The rapier world plus the bookkeeping rapier needs to step it
pub struct PhysicsWorld {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    /// Pairs in active contact after the previous tick, for started-pair
    /// detection
    active_pairs: HashSet<PairKey>,
}

impl PhysicsWorld {
    /// Create the world with the four static boundary walls
    pub fn new() -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = tick_delta();

        let mut world = Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            gravity: vector![0.0, GRAVITY],
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            active_pairs: HashSet::new(),
        };

        let half = WALL_THICKNESS / 2.0;
        let walls = [
            // (center x, center y, half width, half height)
            (ARENA_WIDTH / 2.0, -half, ARENA_WIDTH / 2.0, half),
            (ARENA_WIDTH / 2.0, ARENA_HEIGHT + half, ARENA_WIDTH / 2.0, half),
            (ARENA_WIDTH + half, ARENA_HEIGHT / 2.0, half, ARENA_HEIGHT / 2.0),
            (-half, ARENA_HEIGHT / 2.0, half, ARENA_HEIGHT / 2.0),
        ];
        for (cx, cy, hx, hy) in walls {
            let body = RigidBodyBuilder::fixed().translation(vector![cx, cy]).build();
            let handle = world.bodies.insert(body);
            let collider = ColliderBuilder::cuboid(hx, hy).build();
            world
                .colliders
                .insert_with_parent(collider, handle, &mut world.bodies);
        }

        world
    }

    /// Spawn a player arrow at the fixed spawn point
    pub fn spawn_player(&mut self, id: Uuid) -> (RigidBodyHandle, ColliderHandle) {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![SPAWN_X, SPAWN_Y])
            .linear_damping(PLAYER_LINEAR_DAMPING)
            .angular_damping(PLAYER_ANGULAR_DAMPING)
            .build();
        let handle = self.bodies.insert(body);
        let collider = ColliderBuilder::convex_polyline(arrow_vertices())
            .expect("arrow vertices form a convex polygon")
            .mass(PLAYER_MASS)
            .friction(PLAYER_FRICTION)
            .user_data(id.as_u128())
            .build();
        let collider_handle = self
            .colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        (handle, collider_handle)
    }

    /// Spawn a bomb disc with an initial velocity
    pub fn spawn_bomb(
        &mut self,
        id: Uuid,
        x: f32,
        y: f32,
        vel_x: f32,
        vel_y: f32,
    ) -> (RigidBodyHandle, ColliderHandle) {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![x, y])
            .linvel(vector![vel_x, vel_y])
            .build();
        let handle = self.bodies.insert(body);
        let collider = ColliderBuilder::ball(BOMB_RADIUS)
            .mass(BOMB_MASS)
            .user_data(id.as_u128())
            .build();
        let collider_handle = self
            .colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        (handle, collider_handle)
    }

    /// Remove a body and its colliders; a stale handle is a no-op
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    /// Apply the per-tick force and torque requests for one entity's held
    /// controls. Thrust always points along the current facing:
    /// `F = THRUST * (sin angle, -cos angle)`.
    pub fn apply_controls(&mut self, handle: RigidBodyHandle, controls: &Controls) {
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        body.reset_forces(true);
        body.reset_torques(true);
        if controls.rotate_left {
            body.add_torque(-TURN_TORQUE, true);
        }
        if controls.rotate_right {
            body.add_torque(TURN_TORQUE, true);
        }
        if controls.thrust {
            let angle = body.rotation().angle();
            body.add_force(
                vector![THRUST_FORCE * angle.sin(), -THRUST_FORCE * angle.cos()],
                true,
            );
        }
    }

    /// Current (x, y, angle) of a body, None if it was removed
    pub fn pose(&self, handle: RigidBodyHandle) -> Option<(f32, f32, f32)> {
        self.bodies
            .get(handle)
            .map(|body| (body.translation().x, body.translation().y, body.rotation().angle()))
    }

    /// Teleport a body, keeping its velocity and orientation
    pub fn set_position(&mut self, handle: RigidBodyHandle, x: f32, y: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_translation(vector![x, y], true);
        }
    }

    /// Advance the simulation by one tick and return the collision pairs
    /// that started touching during it, with per-contact feature detail.
    pub fn step(&mut self) -> Vec<ContactPairEvent> {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
        self.collect_started_pairs()
    }

    fn collect_started_pairs(&mut self) -> Vec<ContactPairEvent> {
        let mut current = HashSet::new();
        let mut events = Vec::new();

        for pair in self.narrow_phase.contact_pairs() {
            if !pair.has_any_active_contact {
                continue;
            }
            let key = pair_key(pair.collider1, pair.collider2);
            current.insert(key);
            if self.active_pairs.contains(&key) {
                continue;
            }

            let (Some(c1), Some(c2)) = (
                self.colliders.get(pair.collider1),
                self.colliders.get(pair.collider2),
            ) else {
                continue;
            };

            let mut points = Vec::new();
            for manifold in &pair.manifolds {
                for contact in &manifold.points {
                    if contact.dist > 0.0 {
                        continue;
                    }
                    let world = c1.position() * contact.local_p1;
                    points.push(ContactPoint {
                        x: world.x,
                        y: world.y,
                        depth: -contact.dist,
                        feature_a: feature(contact.fid1.unpack()),
                        feature_b: feature(contact.fid2.unpack()),
                    });
                }
            }
            if points.is_empty() {
                continue;
            }

            events.push(ContactPairEvent {
                a: Uuid::from_u128(c1.user_data),
                b: Uuid::from_u128(c2.user_data),
                points,
            });
        }

        self.active_pairs = current;
        events
    }
}

fn feature(id: FeatureId) -> ContactFeature {
    match id {
        FeatureId::Vertex(index) => ContactFeature::Vertex(index),
        _ => ContactFeature::Other,
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn players_spawn_at_the_fixed_spawn_point() {
        let mut physics = PhysicsWorld::new();
        let (body, _) = physics.spawn_player(Uuid::new_v4());
        let (x, y, angle) = physics.pose(body).unwrap();
        assert_eq!((x, y), (SPAWN_X, SPAWN_Y));
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn thrust_accelerates_against_gravity() {
        let mut physics = PhysicsWorld::new();
        let (body, _) = physics.spawn_player(Uuid::new_v4());
        let controls = Controls {
            thrust: true,
            ..Controls::default()
        };
        // at angle 0 thrust points up the screen and beats gravity
        for _ in 0..6 {
            physics.apply_controls(body, &controls);
            physics.step();
        }
        let (_, y, _) = physics.pose(body).unwrap();
        assert!(y < SPAWN_Y, "expected upward motion, got y = {}", y);
    }

    #[test]
    fn rotate_controls_turn_in_opposite_directions() {
        let mut physics = PhysicsWorld::new();
        let (left_body, _) = physics.spawn_player(Uuid::new_v4());
        let mut right_world = PhysicsWorld::new();
        let (right_body, _) = right_world.spawn_player(Uuid::new_v4());

        let left = Controls {
            rotate_left: true,
            ..Controls::default()
        };
        let right = Controls {
            rotate_right: true,
            ..Controls::default()
        };
        for _ in 0..10 {
            physics.apply_controls(left_body, &left);
            physics.step();
            right_world.apply_controls(right_body, &right);
            right_world.step();
        }
        let (_, _, left_angle) = physics.pose(left_body).unwrap();
        let (_, _, right_angle) = right_world.pose(right_body).unwrap();
        assert!(left_angle < 0.0);
        assert!(right_angle > 0.0);
    }

    #[test]
    fn overlapping_players_report_a_started_pair_once() {
        let mut physics = PhysicsWorld::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        physics.spawn_player(a);
        let (b_body, _) = physics.spawn_player(b);
        // partially overlapping, not coincident
        physics.set_position(b_body, 410.0, 130.0);

        let first = physics.step();
        assert!(
            first
                .iter()
                .any(|e| (e.a == a && e.b == b) || (e.a == b && e.b == a)),
            "expected a contact between the overlapping players"
        );

        // still touching next tick: not reported again as started
        let second = physics.step();
        assert!(!second
            .iter()
            .any(|e| (e.a == a && e.b == b) || (e.a == b && e.b == a)));
    }

    #[test]
    fn removed_bodies_have_no_pose() {
        let mut physics = PhysicsWorld::new();
        let (body, _) = physics.spawn_player(Uuid::new_v4());
        physics.remove_body(body);
        assert!(physics.pose(body).is_none());
        // removing again is a no-op
        physics.remove_body(body);
    }
}
