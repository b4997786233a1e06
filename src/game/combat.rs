//! Combat Resolver rules: stab classification and bomb blasts.
//!
//! These are pure decision functions; the arena task owns the state they act
//! on and performs the actual mutations.

use std::time::Duration;

use uuid::Uuid;

use crate::game::physics::{ContactFeature, ContactPairEvent};

/// Damage per pixel of stab penetration depth
const STAB_DAMAGE_PER_DEPTH: f32 = 5.0;

/// Post-hit invulnerability window for the victim
pub const SHIELD_DURATION: Duration = Duration::from_secs(1);

/// Delay between a bomb's creation and its explosion
pub const BOMB_FUSE: Duration = Duration::from_secs(3);

/// Players strictly inside this radius of the blast take damage
pub const BLAST_RADIUS: f32 = 100.0;

/// Flat blast damage, no distance falloff; bypasses shields
pub const BLAST_DAMAGE: i32 = 20;

/// How far ahead of the shooter a bomb appears, along the facing direction
pub const BOMB_SPAWN_OFFSET: f32 = 80.0;

/// Initial bomb speed along the shooter's facing
pub const BOMB_SPEED: f32 = 300.0;

/// A classified nose-first hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stab {
    pub attacker: Uuid,
    pub victim: Uuid,
    pub damage: i32,
    /// World-space contact position
    pub x: f32,
    pub y: f32,
}

/// Decide whether a started collision pair is a valid stab.
///
/// Both bodies must be live players, the pair must have exactly one
/// penetrating contact, and that contact must sit on vertex 0 (the nose) of
/// one of them. Multi-point contact is glancing or resting, not a stab.
pub fn classify_stab(
    event: &ContactPairEvent,
    is_player: impl Fn(Uuid) -> bool,
) -> Option<Stab> {
    if !is_player(event.a) || !is_player(event.b) {
        return None;
    }

    let [point] = event.points.as_slice() else {
        return None;
    };

    let attacker = match (point.feature_a, point.feature_b) {
        (ContactFeature::Vertex(0), _) => event.a,
        (_, ContactFeature::Vertex(0)) => event.b,
        _ => return None,
    };
    let victim = if attacker == event.a { event.b } else { event.a };

    Some(Stab {
        attacker,
        victim,
        damage: stab_damage(point.depth),
        x: point.x,
        y: point.y,
    })
}

/// Stab damage is linear in penetration depth, rounded to the nearest point
pub fn stab_damage(depth: f32) -> i32 {
    (depth * STAB_DAMAGE_PER_DEPTH).round() as i32
}

/// Players strictly within the blast radius of (x, y), with the positions
/// they held at that instant. Distance is measured at fuse expiry, not at
/// spawn, and the bomber is not exempt.
pub fn blast_victims<I>(x: f32, y: f32, positions: I) -> Vec<(Uuid, f32, f32)>
where
    I: Iterator<Item = (Uuid, f32, f32)>,
{
    positions
        .filter(|(_, px, py)| {
            let dx = px - x;
            let dy = py - y;
            dx * dx + dy * dy < BLAST_RADIUS * BLAST_RADIUS
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::ContactPoint;

    fn point(depth: f32, feature_a: ContactFeature, feature_b: ContactFeature) -> ContactPoint {
        ContactPoint {
            x: 120.0,
            y: 340.0,
            depth,
            feature_a,
            feature_b,
        }
    }

    fn players() -> (Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn nose_first_single_contact_is_a_stab() {
        let (a, b) = players();
        let event = ContactPairEvent {
            a,
            b,
            points: vec![point(2.0, ContactFeature::Vertex(0), ContactFeature::Other)],
        };
        let stab = classify_stab(&event, |_| true).unwrap();
        assert_eq!(stab.attacker, a);
        assert_eq!(stab.victim, b);
        assert_eq!(stab.damage, 10); // round(2.0 * 5)
        assert_eq!((stab.x, stab.y), (120.0, 340.0));
    }

    #[test]
    fn the_nose_owner_may_be_either_side_of_the_pair() {
        let (a, b) = players();
        let event = ContactPairEvent {
            a,
            b,
            points: vec![point(1.0, ContactFeature::Other, ContactFeature::Vertex(0))],
        };
        let stab = classify_stab(&event, |_| true).unwrap();
        assert_eq!(stab.attacker, b);
        assert_eq!(stab.victim, a);
    }

    #[test]
    fn multi_point_contact_is_not_a_stab() {
        let (a, b) = players();
        let event = ContactPairEvent {
            a,
            b,
            points: vec![
                point(2.0, ContactFeature::Vertex(0), ContactFeature::Other),
                point(1.5, ContactFeature::Vertex(1), ContactFeature::Other),
            ],
        };
        assert!(classify_stab(&event, |_| true).is_none());
    }

    #[test]
    fn side_or_tail_contact_is_not_a_stab() {
        let (a, b) = players();
        for feature in [ContactFeature::Vertex(1), ContactFeature::Vertex(2), ContactFeature::Other] {
            let event = ContactPairEvent {
                a,
                b,
                points: vec![point(2.0, feature, ContactFeature::Other)],
            };
            assert!(classify_stab(&event, |_| true).is_none());
        }
    }

    #[test]
    fn walls_and_bombs_never_stab() {
        let (a, _) = players();
        let event = ContactPairEvent {
            a,
            b: Uuid::nil(), // a wall
            points: vec![point(2.0, ContactFeature::Vertex(0), ContactFeature::Other)],
        };
        assert!(classify_stab(&event, |id| id == a).is_none());
    }

    #[test]
    fn stab_damage_rounds_to_nearest() {
        assert_eq!(stab_damage(2.0), 10);
        assert_eq!(stab_damage(0.49), 2);
        assert_eq!(stab_damage(0.1), 1);
        assert_eq!(stab_damage(0.0), 0);
    }

    #[test]
    fn blast_includes_everyone_strictly_inside_the_radius() {
        let (near, bomber) = players();
        let far = Uuid::new_v4();
        let edge = Uuid::new_v4();
        let positions = vec![
            (near, 430.0, 60.0),
            (bomber, 400.0, 100.0),
            (far, 700.0, 900.0),
            (edge, 400.0 + BLAST_RADIUS, 0.0),
        ];

        let victims = blast_victims(400.0, 0.0, positions.into_iter());
        let ids: Vec<Uuid> = victims.iter().map(|(id, _, _)| *id).collect();
        assert!(ids.contains(&near));
        assert!(ids.contains(&bomber), "the bomber is not exempt");
        assert!(!ids.contains(&far));
        assert!(!ids.contains(&edge), "exactly on the radius is outside");
    }
}
