// Use cases layer: per-node world rules and the authority game loop.

pub mod game;
pub mod node;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use node::{FireOutcome, Node};
pub use types::{
    AuthorityCommand, DamageRequest, JoinAccepted, RemoteCall, ReplicationBatch,
    ReplicationUpdate, WorldSnapshot,
};
