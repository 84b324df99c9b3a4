use crate::domain::damage::DamageType;
use std::time::Duration;

/// Gameplay tuning for projectiles.
#[derive(Debug, Clone, Copy)]
pub struct ProjectileTuning {
    pub damage: f32,

    pub damage_type: DamageType,

    /// Flight speed in units per second (no gravity).
    pub speed: f32,

    /// Collision sphere radius, used by the external collision system.
    pub radius: f32,

    /// Lifetime before the projectile is cleaned up without a hit.
    pub life_time: Duration,

    /// Upper bound on live projectiles; spawns beyond it fail.
    pub max_live: usize,

    /// Effect spawned where the projectile is destroyed.
    pub explosion_effect: &'static str,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            damage: 10.0,
            damage_type: DamageType::Generic,
            speed: 1500.0,
            radius: 40.0,
            life_time: Duration::from_secs(3),
            max_live: 256,
            explosion_effect: "explosion",
        }
    }
}
