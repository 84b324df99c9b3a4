// Tracing-backed implementations of the presentation ports.

use crate::domain::ports::{EffectSink, HealthEvents};
use crate::domain::{EntityId, Vec3};
use tracing::{debug, info};

/// Writes health notifications to the log instead of an on-screen display.
#[derive(Debug, Default)]
pub struct TracingHealthEvents;

impl HealthEvents for TracingHealthEvents {
    fn health_changed(&mut self, entity_id: EntityId, health: f32) {
        debug!(entity_id, health, "health changed");
    }

    fn private_status(&mut self, entity_id: EntityId, health: f32) {
        info!(entity_id, health, "your health");
    }

    fn broadcast_status(&mut self, entity_id: EntityId, health: f32) {
        info!(entity_id, health, "character health");
    }

    fn destroyed(&mut self, entity_id: EntityId) {
        info!(entity_id, "character has been killed");
    }
}

#[derive(Debug, Default)]
pub struct TracingEffects;

impl EffectSink for TracingEffects {
    fn spawn_effect(&mut self, effect: &str, position: Vec3) {
        debug!(
            effect,
            x = position.x,
            y = position.y,
            z = position.z,
            "spawn effect"
        );
    }
}
