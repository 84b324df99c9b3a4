// Network adapter modules split by external client sockets vs internal HTTP routes.

pub mod client;
pub mod internal;

pub use client::{replication_serializer, ws_handler};
pub use internal::{apply_damage_handler, collision_handler};
