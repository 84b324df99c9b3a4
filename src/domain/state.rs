// Domain-level simulation entities and snapshot types.

use crate::domain::authority::{EntityId, NodeId, Role};
use crate::domain::damage::ControllerId;
use crate::domain::death::DeathLatch;
use crate::domain::fire::FireController;
use crate::domain::health::ReplicatedHealth;
use crate::domain::math::Transform;
use crate::domain::projectile::ProjectileRecord;
use crate::domain::tuning::character::CharacterTuning;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterSnapshot {
    pub id: EntityId,
    pub owner: NodeId,
    pub health: f32,
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSnapshot {
    pub id: EntityId,
    pub owner: NodeId,
    pub instigator: EntityId,
    pub spawn: Transform,
}

/// One node's instance of a player character.
pub struct SimCharacter {
    pub id: EntityId,
    pub role: Role,
    /// Node whose player drives this character.
    pub owner: NodeId,
    /// Only known where the controller lives (authority and owning client).
    pub controller: Option<ControllerId>,
    pub transform: Transform,

    // Replicated combat state.
    pub health: ReplicatedHealth,
    pub death: DeathLatch,

    // Local-only state (never replicated).
    pub fire: FireController,
    pub respawn_in: Option<Duration>,
}

impl SimCharacter {
    pub fn new(
        id: EntityId,
        role: Role,
        owner: NodeId,
        controller: Option<ControllerId>,
        transform: Transform,
        tuning: &CharacterTuning,
    ) -> Self {
        Self {
            id,
            role,
            owner,
            controller,
            transform,
            health: ReplicatedHealth::new(role, tuning.max_health),
            death: DeathLatch::default(),
            fire: FireController::new(tuning.fire_rate),
            respawn_in: None,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.death.is_destroyed()
    }

    /// Health and the destroyed flag always reset together.
    pub fn revive(&mut self) {
        self.health.reset();
        self.death.reset();
        self.respawn_in = None;
    }
}

impl From<&SimCharacter> for CharacterSnapshot {
    fn from(c: &SimCharacter) -> Self {
        Self {
            id: c.id,
            owner: c.owner,
            health: c.health.current(),
            transform: c.transform,
        }
    }
}

impl From<&ProjectileRecord> for ProjectileSnapshot {
    fn from(p: &ProjectileRecord) -> Self {
        Self {
            id: p.id,
            owner: p.owner,
            instigator: p.instigator,
            spawn: p.spawn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character() -> SimCharacter {
        SimCharacter::new(
            1,
            Role::Authority,
            NodeId(1),
            Some(ControllerId(1)),
            Transform::default(),
            &CharacterTuning::default(),
        )
    }

    #[test]
    fn when_revived_then_health_and_destroyed_flag_reset_together() {
        let mut c = character();
        c.health.set(0.0);
        assert!(c.death.evaluate(0.0));
        c.respawn_in = Some(Duration::from_secs(1));

        c.revive();

        assert!(!c.is_destroyed());
        assert_eq!(c.health.current(), 100.0);
        assert_eq!(c.respawn_in, None);
    }

    #[test]
    fn when_revived_mid_cooldown_then_cooldown_still_runs_to_its_deadline() {
        let mut c = character();
        assert!(c.fire.start_fire(Duration::ZERO));

        c.revive();

        assert!(c.fire.is_firing());
        assert!(!c.fire.start_fire(Duration::from_millis(100)));
        assert!(c.fire.start_fire(Duration::from_millis(250)));
    }
}
