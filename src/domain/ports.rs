// Ports for presentation side effects triggered by the simulation.

use crate::domain::authority::EntityId;
use crate::domain::math::Vec3;

/// Receives the "on health changed" notification and its display side effects.
pub trait HealthEvents: Send {
    /// Fired once per notification, on every node, before any display decision.
    fn health_changed(&mut self, entity_id: EntityId, health: f32);
    /// Shown only on the node that controls the character.
    fn private_status(&mut self, entity_id: EntityId, health: f32);
    /// Shown on the authority, naming the character.
    fn broadcast_status(&mut self, entity_id: EntityId, health: f32);
    fn destroyed(&mut self, entity_id: EntityId);
}

/// Fire-and-forget effect trigger.
pub trait EffectSink: Send {
    fn spawn_effect(&mut self, effect: &str, position: Vec3);
}
