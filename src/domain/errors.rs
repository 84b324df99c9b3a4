// Domain-level errors for spawn workflows. Damage errors live next to the damage rules.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// Live projectile cap reached.
    Exhausted,
    /// The firing character is missing or destroyed.
    InvalidShooter,
    /// Fire handling reached a node that is not the shooter's authority.
    NotAuthority,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::Exhausted => write!(f, "projectile pool exhausted"),
            SpawnError::InvalidShooter => write!(f, "shooter cannot fire"),
            SpawnError::NotAuthority => write!(f, "fire handled outside the authority"),
        }
    }
}

impl std::error::Error for SpawnError {}
