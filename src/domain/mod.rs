// Domain layer: core replication, combat rules and data.

pub mod authority;
pub mod damage;
pub mod death;
pub mod errors;
pub mod fire;
pub mod health;
pub mod math;
pub mod ports;
pub mod projectile;
pub mod state;
pub mod tuning;

pub use authority::{AuthorityGate, EntityId, NodeId, Role, SERVER_NODE};
pub use damage::{ControllerId, DamageError, DamageEvent, DamageType};
pub use math::{Rotation, Transform, Vec3};
pub use projectile::{CollisionEvent, ProjectileRecord};
pub use state::{CharacterSnapshot, ProjectileSnapshot, SimCharacter};
