use crate::domain::ports::{EffectSink, HealthEvents};
use crate::domain::tuning::character::CharacterTuning;
use crate::domain::tuning::projectile::ProjectileTuning;
use crate::domain::{EntityId, NodeId, SERVER_NODE, Vec3};
use crate::use_cases::node::Node;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HealthRecord {
    Changed(EntityId, f32),
    Private(EntityId, f32),
    Broadcast(EntityId, f32),
    Destroyed(EntityId),
}

// Captures every notification so tests can assert order and frequency.
#[derive(Default)]
pub(crate) struct RecordingHealthEvents {
    records: Vec<HealthRecord>,
}

impl RecordingHealthEvents {
    pub(crate) fn records(&self) -> &[HealthRecord] {
        &self.records
    }

    pub(crate) fn health_changes(&self, id: EntityId) -> Vec<f32> {
        self.records
            .iter()
            .filter_map(|r| match r {
                HealthRecord::Changed(e, h) if *e == id => Some(*h),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn private_statuses(&self, id: EntityId) -> Vec<f32> {
        self.records
            .iter()
            .filter_map(|r| match r {
                HealthRecord::Private(e, h) if *e == id => Some(*h),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn destroyed_count(&self, id: EntityId) -> usize {
        self.records
            .iter()
            .filter(|r| **r == HealthRecord::Destroyed(id))
            .count()
    }
}

impl HealthEvents for RecordingHealthEvents {
    fn health_changed(&mut self, entity_id: EntityId, health: f32) {
        self.records.push(HealthRecord::Changed(entity_id, health));
    }

    fn private_status(&mut self, entity_id: EntityId, health: f32) {
        self.records.push(HealthRecord::Private(entity_id, health));
    }

    fn broadcast_status(&mut self, entity_id: EntityId, health: f32) {
        self.records.push(HealthRecord::Broadcast(entity_id, health));
    }

    fn destroyed(&mut self, entity_id: EntityId) {
        self.records.push(HealthRecord::Destroyed(entity_id));
    }
}

#[derive(Default)]
pub(crate) struct RecordingEffects {
    spawned: Vec<(String, Vec3)>,
}

impl RecordingEffects {
    pub(crate) fn spawned(&self) -> Vec<Vec3> {
        self.spawned.iter().map(|(_, p)| *p).collect()
    }
}

impl EffectSink for RecordingEffects {
    fn spawn_effect(&mut self, effect: &str, position: Vec3) {
        self.spawned.push((effect.to_string(), position));
    }
}

pub(crate) type TestNode = Node<RecordingHealthEvents, RecordingEffects>;

pub(crate) fn authority_node() -> TestNode {
    node(SERVER_NODE)
}

pub(crate) fn observer_node(local: NodeId) -> TestNode {
    debug_assert_ne!(local, SERVER_NODE);
    node(local)
}

fn node(local: NodeId) -> TestNode {
    Node::new(
        local,
        CharacterTuning::default(),
        ProjectileTuning::default(),
        RecordingHealthEvents::default(),
        RecordingEffects::default(),
    )
}
