// Framework bootstrap for the authority server runtime.

use crate::domain::SERVER_NODE;
use crate::domain::tuning::character::CharacterTuning;
use crate::domain::tuning::projectile::ProjectileTuning;
use crate::frameworks::config;
use crate::interface_adapters::net::{
    apply_damage_handler, collision_handler, replication_serializer, ws_handler,
};
use crate::interface_adapters::presenters::{TracingEffects, TracingHealthEvents};
use crate::interface_adapters::state::{AppState, EncodedBatch};
use crate::use_cases::game::world_task;
use crate::use_cases::{AuthorityCommand, Node, ReplicationBatch};

use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::{Notify, broadcast, mpsc, watch};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let shutdown = Arc::new(Notify::new());
    let state = build_state(shutdown.clone());

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/collisions", post(collision_handler))
        .route("/damage", post(apply_damage_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    let result = axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    });
    shutdown.notify_one();
    result
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state(shutdown: Arc<Notify>) -> Arc<AppState> {
    // command_tx/rx: remote invocations and external events go to the single world task.
    let (command_tx, command_rx) =
        mpsc::channel::<AuthorityCommand>(config::COMMAND_CHANNEL_CAPACITY);

    // replication_tx/rx: batches produced by each replication pass.
    let (replication_tx, replication_rx) =
        broadcast::channel::<ReplicationBatch>(config::REPLICATION_BROADCAST_CAPACITY);

    // replication_bytes_tx: serialized batches shared across all connections.
    let (replication_bytes_tx, _replication_bytes_rx) =
        broadcast::channel::<EncodedBatch>(config::REPLICATION_BROADCAST_CAPACITY);

    // resync_tx/rx: generation bumped when the serializer loses batches.
    let (resync_tx, resync_rx) = watch::channel(0u64);

    let node = Node::new(
        SERVER_NODE,
        CharacterTuning::default(),
        ProjectileTuning::default(),
        TracingHealthEvents,
        TracingEffects,
    );

    let tick_interval = config::tick_interval();
    tracing::debug!(
        tick_interval_ms = tick_interval.as_millis(),
        "world task configured"
    );
    tokio::spawn(world_task(
        node,
        command_rx,
        replication_tx,
        tick_interval,
        shutdown,
    ));
    tokio::spawn(replication_serializer(
        replication_rx,
        replication_bytes_tx.clone(),
        resync_tx,
    ));

    Arc::new(AppState::new(command_tx, replication_bytes_tx, resync_rx))
}
