// Wire protocol DTOs and conversions for public WebSocket messages.
// Internal HTTP request/response bodies live with their handlers in `net::internal`.

use crate::domain::{CharacterSnapshot, ProjectileSnapshot, Transform, Vec3};
use crate::use_cases::{JoinAccepted, ReplicationBatch, ReplicationUpdate, WorldSnapshot};
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Assigned node and character after Join is accepted.
    Identity { node_id: u64, entity_id: u64 },
    // Full state used to seed the client's cache right after Identity.
    Snapshot(SnapshotDto),
    // One replication pass, in the order the authority produced it.
    Replication(ReplicationBatchDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    // Initial handshake message; the server assigns the node and character.
    Join,
    // Fire trigger; the server applies the cooldown.
    Fire,
    // Remote fire invocation from a client that rate limits locally.
    HandleFire,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotDto {
    pub tick: u64,
    pub characters: Vec<CharacterDto>,
    pub projectiles: Vec<ProjectileDto>,
}

impl From<&WorldSnapshot> for SnapshotDto {
    fn from(snapshot: &WorldSnapshot) -> Self {
        Self {
            tick: snapshot.tick,
            characters: snapshot.characters.iter().map(CharacterDto::from).collect(),
            projectiles: snapshot
                .projectiles
                .iter()
                .map(ProjectileDto::from)
                .collect(),
        }
    }
}

impl From<&JoinAccepted> for ServerMessage {
    fn from(accepted: &JoinAccepted) -> Self {
        ServerMessage::Identity {
            node_id: accepted.node.0,
            entity_id: accepted.entity_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplicationBatchDto {
    pub tick: u64,
    pub updates: Vec<ReplicationUpdateDto>,
}

impl From<ReplicationBatch> for ReplicationBatchDto {
    fn from(batch: ReplicationBatch) -> Self {
        Self {
            tick: batch.tick,
            updates: batch
                .updates
                .iter()
                .map(ReplicationUpdateDto::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplicationUpdateDto {
    CharacterSpawned(CharacterDto),
    HealthChanged { entity_id: u64, health: f32 },
    CharacterRespawned { entity_id: u64, health: f32 },
    CharacterRemoved { entity_id: u64 },
    ProjectileSpawned(ProjectileDto),
    ProjectileDestroyed { projectile_id: u64, position: Vec3 },
}

impl From<&ReplicationUpdate> for ReplicationUpdateDto {
    fn from(update: &ReplicationUpdate) -> Self {
        match update {
            ReplicationUpdate::CharacterSpawned(c) => Self::CharacterSpawned(c.into()),
            ReplicationUpdate::HealthChanged { entity_id, health } => Self::HealthChanged {
                entity_id: *entity_id,
                health: *health,
            },
            ReplicationUpdate::CharacterRespawned { entity_id, health } => {
                Self::CharacterRespawned {
                    entity_id: *entity_id,
                    health: *health,
                }
            }
            ReplicationUpdate::CharacterRemoved { entity_id } => Self::CharacterRemoved {
                entity_id: *entity_id,
            },
            ReplicationUpdate::ProjectileSpawned(p) => Self::ProjectileSpawned(p.into()),
            ReplicationUpdate::ProjectileDestroyed {
                projectile_id,
                position,
            } => Self::ProjectileDestroyed {
                projectile_id: *projectile_id,
                position: *position,
            },
        }
    }
}

/// Flattened character state for wire transmission.
#[derive(Debug, Clone, Serialize)]
pub struct CharacterDto {
    pub id: u64,
    pub owner: u64,
    pub health: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
}

impl From<&CharacterSnapshot> for CharacterDto {
    fn from(c: &CharacterSnapshot) -> Self {
        let Transform { position, rotation } = c.transform;
        Self {
            id: c.id,
            owner: c.owner.0,
            health: c.health,
            x: position.x,
            y: position.y,
            z: position.z,
            yaw: rotation.yaw,
        }
    }
}

/// Flattened projectile spawn state; clients extrapolate flight from it.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectileDto {
    pub id: u64,
    pub owner: u64,
    pub instigator: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub pitch: f32,
}

impl From<&ProjectileSnapshot> for ProjectileDto {
    fn from(p: &ProjectileSnapshot) -> Self {
        let Transform { position, rotation } = p.spawn;
        Self {
            id: p.id,
            owner: p.owner.0,
            instigator: p.instigator,
            x: position.x,
            y: position.y,
            z: position.z,
            yaw: rotation.yaw,
            pitch: rotation.pitch,
        }
    }
}
