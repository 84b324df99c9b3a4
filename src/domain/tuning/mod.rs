pub mod character;
pub mod projectile;
