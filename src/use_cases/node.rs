// One participant's view of the world: canonical state where it is authority, cached state
// everywhere else.

use super::types::{RemoteCall, ReplicationBatch, ReplicationUpdate, WorldSnapshot};
use crate::domain::errors::SpawnError;
use crate::domain::ports::{EffectSink, HealthEvents};
use crate::domain::projectile::DestroyCause;
use crate::domain::tuning::character::CharacterTuning;
use crate::domain::tuning::projectile::ProjectileTuning;
use crate::domain::{
    AuthorityGate, CharacterSnapshot, CollisionEvent, ControllerId, DamageError, DamageEvent,
    EntityId, NodeId, ProjectileRecord, ProjectileSnapshot, Role, Rotation, SERVER_NODE,
    SimCharacter, Transform, Vec3,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a local fire trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Cooldown running, character destroyed, or not ours to fire.
    Rejected,
    /// Executed on this node because it is the authority.
    Local(Result<EntityId, SpawnError>),
    /// Queued for the authority.
    Remote,
}

pub struct Node<H, E> {
    gate: AuthorityGate,
    character_tuning: CharacterTuning,
    projectile_tuning: ProjectileTuning,
    characters: BTreeMap<EntityId, SimCharacter>,
    projectiles: BTreeMap<EntityId, ProjectileRecord>,
    // Authority: updates waiting for the next replication pass.
    replication_queue: Vec<ReplicationUpdate>,
    // Observer: invocations waiting for the transport.
    outbox: Vec<RemoteCall>,
    next_entity_id: EntityId,
    // Observer: tick of the snapshot this cache was seeded from.
    seeded_tick: Option<u64>,
    now: Duration,
    health_events: H,
    effects: E,
}

impl<H, E> Node<H, E>
where
    H: HealthEvents,
    E: EffectSink,
{
    pub fn new(
        local: NodeId,
        character_tuning: CharacterTuning,
        projectile_tuning: ProjectileTuning,
        health_events: H,
        effects: E,
    ) -> Self {
        Self {
            gate: AuthorityGate::new(local),
            character_tuning,
            projectile_tuning,
            characters: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            replication_queue: Vec::new(),
            outbox: Vec::new(),
            next_entity_id: 1,
            seeded_tick: None,
            now: Duration::ZERO,
            health_events,
            effects,
        }
    }

    pub fn local_node(&self) -> NodeId {
        self.gate.local_node()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn character(&self, id: EntityId) -> Option<&SimCharacter> {
        self.characters.get(&id)
    }

    pub fn character_mut(&mut self, id: EntityId) -> Option<&mut SimCharacter> {
        self.characters.get_mut(&id)
    }

    pub fn projectile(&self, id: EntityId) -> Option<&ProjectileRecord> {
        self.projectiles.get(&id)
    }

    pub fn live_projectiles(&self) -> usize {
        self.projectiles.len()
    }

    pub fn health_events(&self) -> &H {
        &self.health_events
    }

    pub fn effects(&self) -> &E {
        &self.effects
    }

    pub fn is_authority(&self, id: EntityId) -> bool {
        self.characters
            .get(&id)
            .map(|c| self.gate.is_authority(c.role))
            .or_else(|| {
                self.projectiles
                    .get(&id)
                    .map(|p| self.gate.is_authority(p.role))
            })
            .unwrap_or(false)
    }

    fn hosts_authority(&self) -> bool {
        self.gate.role_for(SERVER_NODE) == Role::Authority
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.wrapping_add(1);
        id
    }

    // ---------------------------------------------------------------- characters

    /// Spawns a character controlled by `owner`. Authority only.
    pub fn spawn_character(&mut self, owner: NodeId, transform: Transform) -> Option<EntityId> {
        if !self.hosts_authority() {
            return None;
        }
        let id = self.allocate_id();
        let character = SimCharacter::new(
            id,
            Role::Authority,
            owner,
            Some(ControllerId(owner.0)),
            transform,
            &self.character_tuning,
        );
        self.replication_queue
            .push(ReplicationUpdate::CharacterSpawned(CharacterSnapshot::from(
                &character,
            )));
        self.characters.insert(id, character);
        info!(entity_id = id, owner = owner.0, "character spawned");
        Some(id)
    }

    /// Spawns a character for a newly joined node at a spread-out spawn point.
    pub fn join(&mut self, owner: NodeId) -> Option<EntityId> {
        // Golden-angle ring keeps consecutive spawns apart.
        let angle = (self.next_entity_id as f32) * 2.399_963;
        let transform = Transform {
            position: Vec3::new(angle.cos() * 500.0, angle.sin() * 500.0, 0.0),
            rotation: Rotation {
                yaw: angle + std::f32::consts::PI,
                pitch: 0.0,
            },
        };
        self.spawn_character(owner, transform)
    }

    /// Removes every character controlled by `owner`. In-flight projectiles keep flying.
    pub fn remove_characters_owned_by(&mut self, owner: NodeId) -> Vec<EntityId> {
        if !self.hosts_authority() {
            return Vec::new();
        }
        let removed: Vec<EntityId> = self
            .characters
            .values()
            .filter(|c| c.owner == owner)
            .map(|c| c.id)
            .collect();
        for id in &removed {
            self.characters.remove(id);
            self.replication_queue
                .push(ReplicationUpdate::CharacterRemoved { entity_id: *id });
            info!(entity_id = *id, owner = owner.0, "character removed");
        }
        removed
    }

    // ---------------------------------------------------------------- health

    /// Authority write of a character's health, clamped to `[0, max]`.
    ///
    /// Returns the stored value, or `None` when rejected: unknown entity, observer role, or
    /// a destroyed character waiting for respawn.
    pub fn set_current_health(&mut self, id: EntityId, value: f32) -> Option<f32> {
        let character = self.characters.get_mut(&id)?;
        if !self.gate.is_authority(character.role) {
            return None;
        }
        // Only a respawn brings health back, together with the destroyed flag.
        if character.is_destroyed() {
            debug!(entity_id = id, "health write to destroyed character ignored");
            return None;
        }
        let stored = character.health.set(value)?;
        self.replication_queue.push(ReplicationUpdate::HealthChanged {
            entity_id: id,
            health: stored,
        });
        // The authority observes its own writes.
        self.on_health_changed(id);
        Some(stored)
    }

    fn on_health_changed(&mut self, id: EntityId) {
        let Some(character) = self.characters.get_mut(&id) else {
            return;
        };
        let health = character.health.current();
        self.health_events.health_changed(id, health);

        if self.gate.is_locally_controlled(character.owner) {
            self.health_events.private_status(id, health);
        }
        let authority = self.gate.is_authority(character.role);
        if authority {
            self.health_events.broadcast_status(id, health);
        }

        if character.death.evaluate(health) {
            if authority {
                character.respawn_in = Some(self.character_tuning.respawn_delay);
            }
            self.health_events.destroyed(id);
            info!(entity_id = id, "character destroyed");
        }
    }

    // ---------------------------------------------------------------- damage

    /// Applies damage to `target` as a subtractive set and returns the clamped result.
    ///
    /// Observers get the cached value back unchanged. Damage without an instigator
    /// controller is rejected.
    pub fn apply_damage(
        &mut self,
        target: EntityId,
        event: DamageEvent,
    ) -> Result<f32, DamageError> {
        let character = self
            .characters
            .get(&target)
            .ok_or(DamageError::UnknownTarget(target))?;
        let current = character.health.current();
        if !self.gate.is_authority(character.role) {
            return Ok(current);
        }
        let instigator = event.validate()?;

        let value = crate::domain::damage::subtractive_target(current, event.amount);
        let applied = self.set_current_health(target, value).unwrap_or(current);
        debug!(
            target_id = target,
            instigator = instigator.0,
            causer = ?event.causer,
            damage_type = ?event.damage_type,
            amount = event.amount,
            health = applied,
            "damage applied"
        );
        Ok(applied)
    }

    /// Controller currently attached to a character, if the character still exists.
    pub fn controller_of(&self, id: EntityId) -> Option<ControllerId> {
        self.characters.get(&id).and_then(|c| c.controller)
    }

    // ---------------------------------------------------------------- fire

    /// Local fire trigger for a character this node controls or is authority for.
    pub fn start_fire(&mut self, id: EntityId) -> FireOutcome {
        let now = self.now;
        let Some(character) = self.characters.get_mut(&id) else {
            return FireOutcome::Rejected;
        };
        let authority = self.gate.is_authority(character.role);
        if !authority && !self.gate.is_locally_controlled(character.owner) {
            return FireOutcome::Rejected;
        }
        if character.is_destroyed() || !character.fire.start_fire(now) {
            return FireOutcome::Rejected;
        }

        if authority {
            FireOutcome::Local(self.handle_fire(id))
        } else {
            self.outbox.push(RemoteCall::HandleFire { entity_id: id });
            FireOutcome::Remote
        }
    }

    /// Authority-side fire: spawns a projectile in front of the character.
    ///
    /// Failures leave any running cooldown untouched.
    pub fn handle_fire(&mut self, id: EntityId) -> Result<EntityId, SpawnError> {
        let result = self.spawn_projectile(id);
        if let Err(e) = result {
            warn!(entity_id = id, error = %e, "fire dropped");
        }
        result
    }

    fn spawn_projectile(&mut self, shooter: EntityId) -> Result<EntityId, SpawnError> {
        let character = self
            .characters
            .get(&shooter)
            .ok_or(SpawnError::InvalidShooter)?;
        if !self.gate.is_authority(character.role) {
            return Err(SpawnError::NotAuthority);
        }
        if character.is_destroyed() {
            return Err(SpawnError::InvalidShooter);
        }
        if self.projectiles.len() >= self.projectile_tuning.max_live {
            return Err(SpawnError::Exhausted);
        }

        let tuning = self.character_tuning;
        let rotation = character.transform.rotation;
        let spawn = Transform {
            position: character.transform.position
                + rotation.forward() * tuning.muzzle_forward
                + Vec3::UP * tuning.muzzle_up,
            rotation,
        };
        let owner = character.owner;

        let id = self.allocate_id();
        let projectile = ProjectileRecord::new(
            id,
            Role::Authority,
            owner,
            shooter,
            self.projectile_tuning.damage,
            self.projectile_tuning.damage_type,
            spawn,
            self.projectile_tuning.speed,
            self.projectile_tuning.life_time,
        );
        self.replication_queue
            .push(ReplicationUpdate::ProjectileSpawned(ProjectileSnapshot::from(
                &projectile,
            )));
        self.projectiles.insert(id, projectile);
        debug!(projectile_id = id, shooter_id = shooter, "projectile spawned");
        Ok(id)
    }

    pub fn drain_outbox(&mut self) -> Vec<RemoteCall> {
        std::mem::take(&mut self.outbox)
    }

    // ---------------------------------------------------------------- projectiles

    /// Collision hook. Returns true when the event resolved the projectile.
    pub fn deliver_collision(&mut self, projectile_id: EntityId, event: CollisionEvent) -> bool {
        let Some(projectile) = self.projectiles.get_mut(&projectile_id) else {
            debug!(projectile_id, "collision for unknown projectile ignored");
            return false;
        };
        let Some(impact) = projectile.on_collision(&event) else {
            return false;
        };
        let damage = DamageEvent {
            amount: projectile.damage,
            damage_type: projectile.damage_type,
            instigator: None,
            causer: Some(projectile_id),
        };
        let instigator = projectile.instigator;

        if let Some(target) = impact.target {
            let damage = DamageEvent {
                instigator: self.controller_of(instigator),
                ..damage
            };
            match self.apply_damage(target, damage) {
                Ok(health) => info!(
                    victim_id = target,
                    shooter_id = instigator,
                    projectile_id,
                    victim_hp = health,
                    "character hit"
                ),
                Err(DamageError::UnknownTarget(_)) => {
                    debug!(projectile_id, other = target, "hit non-damageable entity")
                }
                Err(e) => warn!(
                    projectile_id,
                    shooter_id = instigator,
                    error = %e,
                    "damage rejected"
                ),
            }
        }

        self.destroy_projectile(projectile_id, DestroyCause::Collision);
        true
    }

    /// Destroys a projectile from any path. The effect spawns once per projectile.
    pub fn destroy_projectile(&mut self, projectile_id: EntityId, cause: DestroyCause) -> bool {
        let Some(projectile) = self.projectiles.get_mut(&projectile_id) else {
            return false;
        };
        let Some(position) = projectile.destroy() else {
            return false;
        };
        let authority = self.gate.is_authority(projectile.role);
        self.projectiles.remove(&projectile_id);

        self.effects
            .spawn_effect(self.projectile_tuning.explosion_effect, position);
        if authority {
            self.replication_queue
                .push(ReplicationUpdate::ProjectileDestroyed {
                    projectile_id,
                    position,
                });
        }
        debug!(projectile_id, ?cause, "projectile destroyed");
        true
    }

    // ---------------------------------------------------------------- tick

    /// Advances local timers: fire cooldowns, respawns (authority) and projectile flight.
    pub fn tick(&mut self, dt: Duration) {
        self.now += dt;
        let now = self.now;

        let mut respawned = Vec::new();
        for character in self.characters.values_mut() {
            character.fire.expire(now);
            if let Some(remaining) = character.respawn_in {
                let remaining = remaining.saturating_sub(dt);
                if remaining.is_zero() {
                    respawned.push(character.id);
                } else {
                    character.respawn_in = Some(remaining);
                }
            }
        }
        for id in respawned {
            self.respawn(id);
        }

        let expired: Vec<EntityId> = self
            .projectiles
            .values_mut()
            .filter_map(|p| p.advance(dt).then_some(p.id))
            .collect();
        for id in expired {
            self.destroy_projectile(id, DestroyCause::Expired);
        }
    }

    fn respawn(&mut self, id: EntityId) {
        let Some(character) = self.characters.get_mut(&id) else {
            return;
        };
        character.revive();
        let health = character.health.current();
        if self.gate.is_authority(character.role) {
            self.replication_queue
                .push(ReplicationUpdate::CharacterRespawned {
                    entity_id: id,
                    health,
                });
            info!(entity_id = id, "character respawned");
        }
        self.on_health_changed(id);
    }

    // ---------------------------------------------------------------- replication

    /// Drains every queued update, in production order. Authority only.
    pub fn replication_pass(&mut self, tick: u64) -> Option<ReplicationBatch> {
        if self.replication_queue.is_empty() {
            return None;
        }
        Some(ReplicationBatch {
            tick,
            updates: std::mem::take(&mut self.replication_queue),
        })
    }

    /// Current state as of `tick`. Taken right after that tick's replication pass, it reflects
    /// every batch up to and including `tick`.
    pub fn snapshot(&self, tick: u64) -> WorldSnapshot {
        WorldSnapshot {
            tick,
            characters: self.characters.values().map(CharacterSnapshot::from).collect(),
            projectiles: self
                .projectiles
                .values()
                .map(ProjectileSnapshot::from)
                .collect(),
        }
    }

    /// Seeds an observer cache from a join snapshot. Batches at or below the snapshot's tick
    /// are already reflected in it and get dropped afterwards.
    pub fn seed(&mut self, snapshot: &WorldSnapshot) {
        self.seeded_tick = Some(snapshot.tick);
        for character in &snapshot.characters {
            self.insert_observed_character(character);
        }
        for projectile in &snapshot.projectiles {
            self.insert_observed_projectile(projectile);
        }
    }

    /// Applies one replication batch in delivery order.
    pub fn apply_replication(&mut self, batch: &ReplicationBatch) {
        if self.hosts_authority() {
            warn!(tick = batch.tick, "authority ignoring its own replication batch");
            return;
        }
        if self.seeded_tick.is_some_and(|seeded| batch.tick <= seeded) {
            debug!(tick = batch.tick, "batch predates seed snapshot; dropped");
            return;
        }
        for update in &batch.updates {
            self.apply_update(update);
        }
    }

    fn apply_update(&mut self, update: &ReplicationUpdate) {
        match update {
            ReplicationUpdate::CharacterSpawned(snapshot) => {
                self.insert_observed_character(snapshot);
            }
            ReplicationUpdate::HealthChanged { entity_id, health } => {
                let Some(character) = self.characters.get_mut(entity_id) else {
                    debug!(entity_id, "health update for unknown character dropped");
                    return;
                };
                character.health.apply_replicated(*health);
                self.on_health_changed(*entity_id);
            }
            ReplicationUpdate::CharacterRespawned { entity_id, health } => {
                let Some(character) = self.characters.get_mut(entity_id) else {
                    return;
                };
                character.revive();
                character.health.apply_replicated(*health);
                self.on_health_changed(*entity_id);
            }
            ReplicationUpdate::CharacterRemoved { entity_id } => {
                self.characters.remove(entity_id);
            }
            ReplicationUpdate::ProjectileSpawned(snapshot) => {
                self.insert_observed_projectile(snapshot);
            }
            ReplicationUpdate::ProjectileDestroyed {
                projectile_id,
                position,
            } => {
                if let Some(projectile) = self.projectiles.get_mut(projectile_id) {
                    projectile.position = *position;
                }
                self.destroy_projectile(*projectile_id, DestroyCause::Replicated);
            }
        }
    }

    fn insert_observed_character(&mut self, snapshot: &CharacterSnapshot) {
        if self.characters.contains_key(&snapshot.id) {
            return;
        }
        let role = self.gate.role_for(SERVER_NODE);
        let controller = self
            .gate
            .is_locally_controlled(snapshot.owner)
            .then_some(ControllerId(snapshot.owner.0));
        let mut character = SimCharacter::new(
            snapshot.id,
            role,
            snapshot.owner,
            controller,
            snapshot.transform,
            &self.character_tuning,
        );
        character.health.apply_replicated(snapshot.health);
        // A character that is already down on arrival stays down without a second death.
        if snapshot.health == 0.0 {
            character.death.evaluate(0.0);
        }
        self.characters.insert(snapshot.id, character);
    }

    fn insert_observed_projectile(&mut self, snapshot: &ProjectileSnapshot) {
        if self.projectiles.contains_key(&snapshot.id) {
            return;
        }
        let record = ProjectileRecord::new(
            snapshot.id,
            self.gate.role_for(SERVER_NODE),
            snapshot.owner,
            snapshot.instigator,
            self.projectile_tuning.damage,
            self.projectile_tuning.damage_type,
            snapshot.spawn,
            self.projectile_tuning.speed,
            self.projectile_tuning.life_time,
        );
        self.projectiles.insert(snapshot.id, record);
    }
}
