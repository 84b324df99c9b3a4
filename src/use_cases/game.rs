use super::node::{FireOutcome, Node};
use super::types::{AuthorityCommand, JoinAccepted, ReplicationBatch};
use crate::domain::{DamageEvent, EntityId, NodeId};
use crate::domain::ports::{EffectSink, HealthEvents};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

/// A spawned character whose join reply waits for the end of the tick.
#[derive(Debug)]
pub struct PendingJoin {
    node: NodeId,
    entity_id: EntityId,
    reply: oneshot::Sender<JoinAccepted>,
}

/// Authority game loop: drains the command inbox, advances the world one fixed step and
/// publishes the replication pass.
pub async fn world_task<H, E>(
    mut node: Node<H, E>,
    mut command_rx: mpsc::Receiver<AuthorityCommand>,
    replication_tx: broadcast::Sender<ReplicationBatch>,
    tick_interval: Duration,
    shutdown: Arc<Notify>,
) where
    H: HealthEvents,
    E: EffectSink,
{
    let mut tick: u64 = 0;
    let mut joins = Vec::new();

    // Drive the fixed-step loop at the configured tick rate.
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!(tick, "world task shutting down");
                break;
            }
            _ = interval.tick() => {}
        }

        // Remote invocations and external events from the previous interval.
        while let Ok(command) = command_rx.try_recv() {
            joins.extend(handle_command(&mut node, command));
        }

        node.tick(tick_interval);
        tick += 1;

        if let Some(batch) = node.replication_pass(tick) {
            // No receivers is fine: nobody is watching yet.
            let _ = replication_tx.send(batch);
        }

        // Snapshots taken here line up with the batch just published.
        for join in joins.drain(..) {
            answer_join(&mut node, join, tick);
        }
    }
}

/// Applies one command. Joins spawn immediately and are answered by [`answer_join`].
pub fn handle_command<H, E>(
    node: &mut Node<H, E>,
    command: AuthorityCommand,
) -> Option<PendingJoin>
where
    H: HealthEvents,
    E: EffectSink,
{
    match command {
        AuthorityCommand::Join { node: joining, reply } => {
            let Some(entity_id) = node.join(joining) else {
                warn!(node = joining.0, "join rejected: world is not authoritative");
                return None;
            };
            return Some(PendingJoin {
                node: joining,
                entity_id,
                reply,
            });
        }
        AuthorityCommand::Leave { node: leaving } => {
            node.remove_characters_owned_by(leaving);
        }
        AuthorityCommand::StartFire { entity_id } => match node.start_fire(entity_id) {
            FireOutcome::Local(Ok(projectile_id)) => {
                debug!(entity_id, projectile_id, "fire handled");
            }
            FireOutcome::Rejected => debug!(entity_id, "fire ignored during cooldown"),
            // Errors are logged by handle_fire; remote never happens on the authority.
            FireOutcome::Local(Err(_)) | FireOutcome::Remote => {}
        },
        AuthorityCommand::HandleFire { entity_id } => {
            let _ = node.handle_fire(entity_id);
        }
        AuthorityCommand::Collision {
            projectile_id,
            event,
        } => {
            node.deliver_collision(projectile_id, event);
        }
        AuthorityCommand::ApplyDamage { request, reply } => {
            let event = DamageEvent {
                amount: request.amount,
                damage_type: request.damage_type,
                instigator: node.controller_of(request.instigator),
                causer: request.causer,
            };
            let result = node.apply_damage(request.target, event);
            let _ = reply.send(result);
        }
    }
    None
}

/// Replies to a join with a snapshot as of `tick`, which must be the last published pass.
pub fn answer_join<H, E>(node: &mut Node<H, E>, join: PendingJoin, tick: u64)
where
    H: HealthEvents,
    E: EffectSink,
{
    let accepted = JoinAccepted {
        node: join.node,
        entity_id: join.entity_id,
        snapshot: node.snapshot(tick),
    };
    if join.reply.send(accepted).is_err() {
        // Caller went away mid-join; undo so the character doesn't linger.
        node.remove_characters_owned_by(join.node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CollisionEvent, DamageError, DamageType, NodeId, Vec3};
    use crate::use_cases::test_support::authority_node;
    use crate::use_cases::types::{DamageRequest, ReplicationUpdate};

    #[tokio::test]
    async fn when_client_joins_then_reply_contains_its_character() {
        let mut node = authority_node();
        let (reply, rx) = oneshot::channel();
        let join = handle_command(
            &mut node,
            AuthorityCommand::Join {
                node: NodeId(4),
                reply,
            },
        )
        .expect("join pending");
        node.replication_pass(1);
        answer_join(&mut node, join, 1);

        let accepted = rx.await.expect("join accepted");
        assert_eq!(accepted.node, NodeId(4));
        assert_eq!(accepted.snapshot.tick, 1);
        assert_eq!(accepted.snapshot.characters.len(), 1);
        assert_eq!(accepted.snapshot.characters[0].id, accepted.entity_id);
        assert_eq!(accepted.snapshot.characters[0].health, 100.0);
    }

    #[tokio::test]
    async fn when_join_reply_is_dropped_then_character_is_removed() {
        let mut node = authority_node();
        let (reply, rx) = oneshot::channel();
        drop(rx);
        let join = handle_command(
            &mut node,
            AuthorityCommand::Join {
                node: NodeId(4),
                reply,
            },
        )
        .expect("join pending");
        answer_join(&mut node, join, 0);

        assert!(node.snapshot(0).characters.is_empty());
    }

    #[tokio::test]
    async fn when_damage_requested_then_reply_carries_result() {
        let mut node = authority_node();
        let shooter = node.join(NodeId(1)).expect("spawned");
        let target = node.join(NodeId(2)).expect("spawned");

        let (reply, rx) = oneshot::channel();
        handle_command(
            &mut node,
            AuthorityCommand::ApplyDamage {
                request: DamageRequest {
                    target,
                    amount: 30.0,
                    damage_type: DamageType::Explosive,
                    instigator: shooter,
                    causer: None,
                },
                reply,
            },
        );
        assert_eq!(rx.await.expect("reply"), Ok(70.0));

        let (reply, rx) = oneshot::channel();
        handle_command(
            &mut node,
            AuthorityCommand::ApplyDamage {
                request: DamageRequest {
                    target,
                    amount: 30.0,
                    damage_type: DamageType::Generic,
                    instigator: 999,
                    causer: None,
                },
                reply,
            },
        );
        assert_eq!(
            rx.await.expect("reply"),
            Err(DamageError::MissingInstigatorController)
        );
    }

    #[tokio::test]
    async fn when_world_task_runs_then_fire_and_collision_are_replicated() {
        let mut node = authority_node();
        let shooter = node.join(NodeId(1)).expect("spawned");
        let victim = node.join(NodeId(2)).expect("spawned");

        let (command_tx, command_rx) = mpsc::channel(16);
        let (replication_tx, mut replication_rx) = broadcast::channel(16);
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(world_task(
            node,
            command_rx,
            replication_tx,
            Duration::from_millis(5),
            shutdown.clone(),
        ));

        // First batch carries the two spawns queued before the loop started.
        let first = replication_rx.recv().await.expect("spawn batch");
        assert_eq!(first.updates.len(), 2);

        command_tx
            .send(AuthorityCommand::StartFire { entity_id: shooter })
            .await
            .expect("send fire");
        let spawned = replication_rx.recv().await.expect("projectile batch");
        let projectile_id = match spawned.updates.as_slice() {
            [ReplicationUpdate::ProjectileSpawned(p)] => p.id,
            other => panic!("unexpected updates {other:?}"),
        };

        command_tx
            .send(AuthorityCommand::Collision {
                projectile_id,
                event: CollisionEvent {
                    other_entity: Some(victim),
                    hit_position: Vec3::new(0.0, 0.0, 0.0),
                    hit_normal: Vec3::UP,
                    impulse: Vec3::ZERO,
                },
            })
            .await
            .expect("send collision");
        let resolved = replication_rx.recv().await.expect("collision batch");
        assert_eq!(
            resolved.updates,
            vec![
                ReplicationUpdate::HealthChanged {
                    entity_id: victim,
                    health: 90.0
                },
                ReplicationUpdate::ProjectileDestroyed {
                    projectile_id,
                    position: Vec3::ZERO
                },
            ]
        );

        shutdown.notify_one();
        task.await.expect("world task exits");
    }

    #[tokio::test]
    async fn when_join_is_answered_then_snapshot_tick_covers_its_spawn_batch() {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (replication_tx, mut replication_rx) = broadcast::channel(16);
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(world_task(
            authority_node(),
            command_rx,
            replication_tx,
            Duration::from_millis(5),
            shutdown.clone(),
        ));

        let (reply, reply_rx) = oneshot::channel();
        command_tx
            .send(AuthorityCommand::Join {
                node: NodeId(7),
                reply,
            })
            .await
            .expect("send join");
        let accepted = reply_rx.await.expect("join accepted");
        let batch = replication_rx.recv().await.expect("spawn batch");

        assert!(matches!(
            batch.updates.as_slice(),
            [ReplicationUpdate::CharacterSpawned(c)] if c.id == accepted.entity_id
        ));
        // The spawn is in the snapshot, so the observer drops its batch.
        assert_eq!(batch.tick, accepted.snapshot.tick);

        shutdown.notify_one();
        task.await.expect("world task exits");
    }
}
