// Damage events and the subtractive-set rule used to apply them.

use crate::domain::authority::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the controller (player connection) credited with an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControllerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    #[default]
    Generic,
    Ballistic,
    Explosive,
}

/// Everything needed to apply one hit to a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageEvent {
    pub amount: f32,
    pub damage_type: DamageType,
    pub instigator: Option<ControllerId>,
    pub causer: Option<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageError {
    /// The damage source lost its controller between firing and impact.
    MissingInstigatorController,
    /// No character with this id exists on the local node.
    UnknownTarget(EntityId),
}

impl fmt::Display for DamageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DamageError::MissingInstigatorController => {
                write!(f, "damage instigator has no controller")
            }
            DamageError::UnknownTarget(id) => write!(f, "unknown damage target {id}"),
        }
    }
}

impl std::error::Error for DamageError {}

impl DamageEvent {
    /// Rejects events whose instigator has no controller instead of crediting nobody.
    pub fn validate(&self) -> Result<ControllerId, DamageError> {
        self.instigator
            .ok_or(DamageError::MissingInstigatorController)
    }
}

/// Value to write back as an absolute set. Not an atomic decrement: the caller must
/// serialize damage application for a target.
pub fn subtractive_target(current_health: f32, amount: f32) -> f32 {
    current_health - amount
}
