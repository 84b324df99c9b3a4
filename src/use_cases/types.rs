// Use-case level messages crossing the authority boundary.

use crate::domain::{
    CharacterSnapshot, CollisionEvent, DamageError, DamageType, EntityId, NodeId,
    ProjectileSnapshot, Vec3,
};
use tokio::sync::oneshot;

/// Messages processed by the authority on its next tick.
#[derive(Debug)]
pub enum AuthorityCommand {
    Join {
        node: NodeId,
        reply: oneshot::Sender<JoinAccepted>,
    },
    Leave {
        node: NodeId,
    },
    /// Fire trigger from a thin client; rate limited on the authority.
    StartFire { entity_id: EntityId },
    /// Remote invocation issued by a client node that already applied its own cooldown.
    HandleFire { entity_id: EntityId },
    Collision {
        projectile_id: EntityId,
        event: CollisionEvent,
    },
    ApplyDamage {
        request: DamageRequest,
        reply: oneshot::Sender<Result<f32, DamageError>>,
    },
}

/// Damage application requested by another gameplay system.
#[derive(Debug, Clone, Copy)]
pub struct DamageRequest {
    pub target: EntityId,
    pub amount: f32,
    pub damage_type: DamageType,
    /// Character credited with the damage; its controller is resolved at apply time.
    pub instigator: EntityId,
    pub causer: Option<EntityId>,
}

/// Calls an observer node queues for delivery to the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCall {
    HandleFire { entity_id: EntityId },
}

impl From<RemoteCall> for AuthorityCommand {
    fn from(call: RemoteCall) -> Self {
        match call {
            RemoteCall::HandleFire { entity_id } => AuthorityCommand::HandleFire { entity_id },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationUpdate {
    CharacterSpawned(CharacterSnapshot),
    HealthChanged { entity_id: EntityId, health: f32 },
    CharacterRespawned { entity_id: EntityId, health: f32 },
    CharacterRemoved { entity_id: EntityId },
    ProjectileSpawned(ProjectileSnapshot),
    ProjectileDestroyed { projectile_id: EntityId, position: Vec3 },
}

/// Updates produced by one replication pass, in production order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationBatch {
    pub tick: u64,
    pub updates: Vec<ReplicationUpdate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub characters: Vec<CharacterSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
}

#[derive(Debug, Clone)]
pub struct JoinAccepted {
    pub node: NodeId,
    pub entity_id: EntityId,
    pub snapshot: WorldSnapshot,
}
