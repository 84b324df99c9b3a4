// Projectile record with exactly-once collision resolution and destruction effect.

use crate::domain::authority::{EntityId, NodeId, Role};
use crate::domain::damage::DamageType;
use crate::domain::math::{Transform, Vec3};
use std::time::Duration;

/// Collision event delivered by the external physics collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    pub other_entity: Option<EntityId>,
    pub hit_position: Vec3,
    pub hit_normal: Vec3,
    pub impulse: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    Unresolved,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyCause {
    Collision,
    Expired,
    Replicated,
    Removed,
}

/// What the owning world must do after a collision was accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    /// Present when the collision struck an entity that should take damage.
    pub target: Option<EntityId>,
    pub position: Vec3,
}

pub struct ProjectileRecord {
    pub id: EntityId,
    pub role: Role,
    /// Node controlling the character that fired.
    pub owner: NodeId,
    pub instigator: EntityId,
    pub damage: f32,
    pub damage_type: DamageType,
    pub spawn: Transform,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Remaining lifetime before the external-timeout path destroys it.
    pub ttl: Duration,

    state: ResolveState,
    collision_hook: bool,
    effect_triggered: bool,
}

impl ProjectileRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: EntityId,
        role: Role,
        owner: NodeId,
        instigator: EntityId,
        damage: f32,
        damage_type: DamageType,
        spawn: Transform,
        speed: f32,
        ttl: Duration,
    ) -> Self {
        Self {
            id,
            role,
            owner,
            instigator,
            damage,
            damage_type,
            spawn,
            position: spawn.position,
            velocity: spawn.rotation.forward() * speed,
            ttl,
            state: ResolveState::Unresolved,
            // Observers never resolve damage on their own physics view.
            collision_hook: role == Role::Authority,
            effect_triggered: false,
        }
    }

    pub fn state(&self) -> ResolveState {
        self.state
    }

    pub fn has_collision_hook(&self) -> bool {
        self.collision_hook
    }

    pub fn effect_triggered(&self) -> bool {
        self.effect_triggered
    }

    /// Collision hook. Returns `None` when the event must be ignored: no hook on this node,
    /// or the projectile already resolved.
    pub fn on_collision(&mut self, event: &CollisionEvent) -> Option<Impact> {
        if !self.collision_hook || self.state == ResolveState::Resolved {
            return None;
        }
        self.state = ResolveState::Resolved;
        self.position = event.hit_position;
        Some(Impact {
            target: event.other_entity,
            position: event.hit_position,
        })
    }

    /// Destruction from any path. Returns the effect position the first time only.
    pub fn destroy(&mut self) -> Option<Vec3> {
        if self.effect_triggered {
            return None;
        }
        self.effect_triggered = true;
        self.state = ResolveState::Resolved;
        Some(self.position)
    }

    /// Straight-line flight (no gravity). Returns true when the lifetime ran out.
    pub fn advance(&mut self, dt: Duration) -> bool {
        if self.effect_triggered {
            return false;
        }
        self.position = self.position + self.velocity * dt.as_secs_f32();
        self.ttl = self.ttl.saturating_sub(dt);
        self.ttl.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projectile(role: Role) -> ProjectileRecord {
        ProjectileRecord::new(
            10,
            role,
            NodeId(3),
            1,
            10.0,
            DamageType::Ballistic,
            Transform::default(),
            1500.0,
            Duration::from_secs(3),
        )
    }

    fn hit(other: Option<EntityId>) -> CollisionEvent {
        CollisionEvent {
            other_entity: other,
            hit_position: Vec3::new(5.0, 0.0, 0.0),
            hit_normal: Vec3::new(-1.0, 0.0, 0.0),
            impulse: Vec3::ZERO,
        }
    }

    #[test]
    fn when_two_collisions_arrive_then_only_first_resolves() {
        let mut p = projectile(Role::Authority);
        let first = p.on_collision(&hit(Some(2)));
        assert_eq!(
            first,
            Some(Impact {
                target: Some(2),
                position: Vec3::new(5.0, 0.0, 0.0)
            })
        );
        assert_eq!(p.on_collision(&hit(Some(2))), None);
        assert_eq!(p.state(), ResolveState::Resolved);
    }

    #[test]
    fn when_observer_instance_collides_then_event_is_ignored() {
        let mut p = projectile(Role::Observer);
        assert!(!p.has_collision_hook());
        assert_eq!(p.on_collision(&hit(Some(2))), None);
        assert_eq!(p.state(), ResolveState::Unresolved);
    }

    #[test]
    fn when_destroyed_from_two_paths_then_effect_position_returned_once() {
        let mut p = projectile(Role::Authority);
        p.on_collision(&hit(None));
        assert_eq!(p.destroy(), Some(Vec3::new(5.0, 0.0, 0.0)));
        assert_eq!(p.destroy(), None);
        assert!(p.effect_triggered());
    }

    #[test]
    fn when_lifetime_runs_out_then_advance_reports_expiry() {
        let mut p = projectile(Role::Authority);
        assert!(!p.advance(Duration::from_secs(1)));
        assert!((p.position.x - 1500.0).abs() < 1e-3);
        assert!(p.advance(Duration::from_secs(2)));
    }
}
