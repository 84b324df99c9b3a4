use crate::domain::NodeId;
use crate::interface_adapters::protocol::{
    ClientMessage, ReplicationBatchDto, ServerMessage, SnapshotDto,
};
use crate::interface_adapters::state::{AppState, EncodedBatch};
use crate::use_cases::{AuthorityCommand, JoinAccepted, ReplicationBatch};

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    CommandsClosed,
    ReplicationClosed,
    JoinRequired,
    JoinTimeout,
    JoinRejected,
    ClosedBeforeJoin,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn replication_serializer(
    mut replication_rx: broadcast::Receiver<ReplicationBatch>,
    replication_bytes_tx: broadcast::Sender<EncodedBatch>,
    resync_tx: watch::Sender<u64>,
) {
    // Serialize each batch once and broadcast the shared bytes.
    loop {
        match replication_rx.recv().await {
            Ok(batch) => {
                let tick = batch.tick;
                let msg = ServerMessage::Replication(ReplicationBatchDto::from(batch));
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize replication batch");
                        continue;
                    }
                };
                let _ = replication_bytes_tx.send(EncodedBatch {
                    tick,
                    bytes: Utf8Bytes::from(txt),
                });
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                // Every connection has a gap now; bump the generation before the next batch
                // goes out so they all rejoin with a fresh snapshot.
                error!(missed = n, "replication serializer lagged; forcing resync");
                resync_tx.send_modify(|generation| *generation += 1);
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("replication channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let node = state.allocate_node_id();
    let span = info_span!("conn", node = node.0, entity_id = tracing::field::Empty);
    serve_connection(socket, state, node, span.clone())
        .instrument(span)
        .await;
}

async fn serve_connection(
    mut socket: WebSocket,
    state: Arc<AppState>,
    node: NodeId,
    span: Span,
) {
    let mut ctx = match bootstrap_connection(&mut socket, &state, node).await {
        Ok(ctx) => ctx,
        Err(NetError::ClosedBeforeJoin) => {
            info!("client disconnected before join handshake");
            return;
        }
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = send_close_with_reason(&mut socket, close_code::POLICY, "bootstrap failed")
                .await;
            return;
        }
    };

    span.record("entity_id", ctx.entity_id);
    info!(
        entity_id = ctx.entity_id,
        snapshot_tick = ctx.snapshot_tick,
        "client connected"
    );

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

struct ConnCtx {
    pub node: NodeId,
    pub entity_id: u64,
    // Batches at or below this tick are already in the join snapshot.
    pub snapshot_tick: u64,
    pub command_tx: mpsc::Sender<AuthorityCommand>,
    pub replication_rx: broadcast::Receiver<EncodedBatch>,
    pub resync_rx: watch::Receiver<u64>,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_out: u64,
    pub fire_requests: u64,
    pub invalid_json: u32,

    pub last_invalid_log: Instant,
    pub close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    state: &AppState,
    node: NodeId,
) -> Result<ConnCtx, NetError> {
    // Subscribe before joining so no batch after the snapshot is missed.
    let replication_rx = state.replication_bytes_tx.subscribe();
    let mut resync_rx = state.resync_rx.clone();
    resync_rx.mark_unchanged();

    match timeout(JOIN_HANDSHAKE_TIMEOUT, read_join_handshake(socket)).await {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "join timeout").await;
            return Err(NetError::JoinTimeout);
        }
    };

    // Ask the authority to spawn our character; the reply carries the seed snapshot.
    let (reply, reply_rx) = oneshot::channel::<JoinAccepted>();
    state
        .command_tx
        .send(AuthorityCommand::Join { node, reply })
        .await
        .map_err(|_| NetError::CommandsClosed)?;
    let accepted = reply_rx.await.map_err(|_| NetError::JoinRejected)?;

    // If anything after Join fails, compensate with Leave to avoid orphaned characters.
    let mut msgs_out = 0;
    let mut bytes_out = 0;
    for msg in [
        ServerMessage::from(&accepted),
        ServerMessage::Snapshot(SnapshotDto::from(&accepted.snapshot)),
    ] {
        match send_message(socket, &msg).await {
            Ok(bytes) => {
                msgs_out += 1;
                bytes_out += bytes as u64;
            }
            Err(e) => {
                let _ = state.command_tx.send(AuthorityCommand::Leave { node }).await;
                return Err(e);
            }
        }
    }

    Ok(ConnCtx {
        node,
        entity_id: accepted.entity_id,
        snapshot_tick: accepted.snapshot.tick,
        command_tx: state.command_tx.clone(),
        replication_rx,
        resync_rx,
        msgs_in: 1,
        msgs_out,
        bytes_out,
        fire_requests: 0,
        invalid_json: 0,
        last_invalid_log: Instant::now() - LOG_THROTTLE,
        close_frame: None,
    })
}

async fn read_join_handshake(socket: &mut WebSocket) -> Result<(), NetError> {
    loop {
        let Some(incoming) = socket.recv().await else {
            return Err(NetError::ClosedBeforeJoin);
        };

        match incoming.map_err(NetError::Ws)? {
            Message::Text(text) => {
                if let Ok(ClientMessage::Join) = serde_json::from_str::<ClientMessage>(&text) {
                    return Ok(());
                }
                let _ = send_close_with_reason(socket, close_code::POLICY, "join required").await;
                return Err(NetError::JoinRequired);
            }
            Message::Binary(_) => {
                let _ = send_close_with_reason(
                    socket,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::JoinRequired);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect = tokio::select! {
            // Resync wins over any batch sent after the gap.
            biased;

            changed = ctx.resync_rx.changed() => {
                match changed {
                    Ok(()) => {
                        warn!("replication gap on server; disconnecting for resync");
                        ctx.close_frame = Some(CloseFrame {
                            code: close_code::AGAIN,
                            reason: "replication lagged".into(),
                        });
                    }
                    Err(_) => fatal = Some(NetError::ReplicationClosed),
                }
                true
            }

            incoming = socket.recv() => {
                match handle_incoming(incoming, ctx).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            batch = ctx.replication_rx.recv() => {
                match batch {
                    Ok(batch) if batch.tick <= ctx.snapshot_tick => false,
                    Ok(EncodedBatch { bytes, .. }) => {
                        let len = bytes.len();
                        match socket.send(Message::Text(bytes)).await {
                            Ok(()) => {
                                ctx.msgs_out += 1;
                                ctx.bytes_out += len as u64;
                                false
                            }
                            Err(e) => {
                                warn!(error = %e, "failed to send replication batch");
                                true
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Updates are reliable and ordered; a gap cannot be patched over.
                        warn!(missed = n, "replication lagged; disconnecting for resync");
                        ctx.close_frame = Some(CloseFrame {
                            code: close_code::AGAIN,
                            reason: "replication lagged".into(),
                        });
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::ReplicationClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(ctx).await {
        warn!(error = ?e, "error during disconnect cleanup");
        fatal.get_or_insert(e);
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming(
    incoming: Option<Result<Message, axum::Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    let msg = match incoming {
        Some(Ok(msg)) => msg,
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            return Ok(LoopControl::Disconnect);
        }
        None => {
            info!("websocket closed");
            return Ok(LoopControl::Disconnect);
        }
    };

    let text = match msg {
        Message::Text(text) => text,
        Message::Binary(_) => {
            ctx.close_frame = Some(CloseFrame {
                code: close_code::UNSUPPORTED,
                reason: "binary messages not supported".into(),
            });
            return Ok(LoopControl::Disconnect);
        }
        Message::Ping(_) | Message::Pong(_) => return Ok(LoopControl::Continue),
        Message::Close(_) => return Ok(LoopControl::Disconnect),
    };
    ctx.msgs_in += 1;

    let entity_id = ctx.entity_id;
    let command = match serde_json::from_str::<ClientMessage>(&text) {
        Ok(ClientMessage::Fire) => AuthorityCommand::StartFire { entity_id },
        Ok(ClientMessage::HandleFire) => AuthorityCommand::HandleFire { entity_id },
        Ok(ClientMessage::Join) => {
            if should_log(&mut ctx.last_invalid_log) {
                warn!(entity_id, "duplicate join ignored");
            }
            return Ok(LoopControl::Continue);
        }
        Err(parse_err) => {
            ctx.invalid_json += 1;
            if should_log(&mut ctx.last_invalid_log) {
                warn!(
                    entity_id,
                    bytes = text.len(),
                    error = %parse_err,
                    "failed to parse client message"
                );
            }
            if ctx.invalid_json > MAX_INVALID_JSON {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "too many invalid messages".into(),
                });
                return Ok(LoopControl::Disconnect);
            }
            return Ok(LoopControl::Continue);
        }
    };

    ctx.fire_requests += 1;
    match ctx.command_tx.try_send(command) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(mpsc::error::TrySendError::Full(_)) => {
            // A dropped fire request is indistinguishable from one inside the cooldown.
            if should_log(&mut ctx.last_invalid_log) {
                warn!(entity_id, "command channel full; dropping fire");
            }
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Closed(_)) => Err(NetError::CommandsClosed),
    }
}

async fn disconnect_cleanup(ctx: &ConnCtx) -> Result<(), NetError> {
    ctx.command_tx
        .send(AuthorityCommand::Leave { node: ctx.node })
        .await
        .map_err(|_| NetError::CommandsClosed)?;

    debug!(
        entity_id = ctx.entity_id,
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_out = ctx.bytes_out,
        fire_requests = ctx.fire_requests,
        invalid_json = ctx.invalid_json,
        "connection stats"
    );
    info!(entity_id = ctx.entity_id, "client disconnected");
    Ok(())
}
