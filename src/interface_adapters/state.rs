use crate::domain::NodeId;
use crate::use_cases::AuthorityCommand;
use axum::extract::ws::Utf8Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc, watch};

/// A replication batch serialized once for every connection.
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    pub tick: u64,
    pub bytes: Utf8Bytes,
}

pub struct AppState {
    // Remote invocations and external events flowing into the authority.
    pub command_tx: mpsc::Sender<AuthorityCommand>,
    // Serialized replication batches, shared across all connections.
    pub replication_bytes_tx: broadcast::Sender<EncodedBatch>,
    // Bumped when batches were lost before serialization; every connection must resync.
    pub resync_rx: watch::Receiver<u64>,
    // Node ids handed to connecting clients; 0 is the server.
    next_node_id: AtomicU64,
}

impl AppState {
    pub fn new(
        command_tx: mpsc::Sender<AuthorityCommand>,
        replication_bytes_tx: broadcast::Sender<EncodedBatch>,
        resync_rx: watch::Receiver<u64>,
    ) -> Self {
        Self {
            command_tx,
            replication_bytes_tx,
            resync_rx,
            next_node_id: AtomicU64::new(1),
        }
    }

    pub fn allocate_node_id(&self) -> NodeId {
        NodeId(self.next_node_id.fetch_add(1, Ordering::Relaxed))
    }
}
