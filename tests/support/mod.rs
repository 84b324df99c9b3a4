// One authority server per test binary, plus websocket helpers shared by the suites.
#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

static SERVER_URL: OnceLock<String> = OnceLock::new();
static SERVER_READY: OnceLock<()> = OnceLock::new();

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Starts the server on an ephemeral port the first time it is called.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        // The server gets its own OS thread and runtime so it outlives each #[tokio::test].
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("http://{addr}"));
                authority_server::run(listener).await.expect("server failed");
            });
        });
        wait_for_server_url_and_readiness(published_url);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    let _ = SERVER_URL.set(base_url.clone());

    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");
    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("server did not become ready in time");
}

pub fn ws_url() -> String {
    let base_url = ensure_server();
    format!("ws://{}/ws", base_url.trim_start_matches("http://"))
}

pub async fn connect() -> Socket {
    let (socket, _) = connect_async(ws_url()).await.expect("ws connect");
    socket
}

pub async fn send_json(socket: &mut Socket, value: Value) {
    socket
        .send(Message::text(value.to_string()))
        .await
        .expect("ws send");
}

/// Next text frame as JSON. Panics on timeout, close or binary frames.
pub async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, socket.next())
            .await
            .expect("timed out waiting for server message")
            .expect("socket closed")
            .expect("ws recv");
        match msg {
            Message::Text(_) => {
                let text = msg.to_text().expect("text frame");
                return serde_json::from_str(text).expect("server sent valid json");
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

pub struct Joined {
    pub socket: Socket,
    pub node_id: u64,
    pub entity_id: u64,
    pub snapshot: Value,
}

/// Connects, joins and consumes the identity and snapshot frames.
pub async fn join() -> Joined {
    let mut socket = connect().await;
    send_json(&mut socket, serde_json::json!({ "type": "Join" })).await;

    let identity = next_json(&mut socket).await;
    assert_eq!(identity["type"], "Identity");
    let snapshot = next_json(&mut socket).await;
    assert_eq!(snapshot["type"], "Snapshot");

    Joined {
        node_id: identity["data"]["node_id"].as_u64().expect("node id"),
        entity_id: identity["data"]["entity_id"].as_u64().expect("entity id"),
        snapshot: snapshot["data"].clone(),
        socket,
    }
}

/// Reads replication batches until one holds an update satisfying `matches`; returns its updates.
pub async fn wait_for_batch<F>(socket: &mut Socket, mut matches: F) -> Vec<Value>
where
    F: FnMut(&Value) -> bool,
{
    loop {
        let msg = next_json(socket).await;
        if msg["type"] != "Replication" {
            continue;
        }
        let updates = msg["data"]["updates"].as_array().cloned().unwrap_or_default();
        if updates.iter().any(&mut matches) {
            return updates;
        }
    }
}

/// First update satisfying `matches`, skipping everything before it.
pub async fn wait_for_update<F>(socket: &mut Socket, mut matches: F) -> Value
where
    F: FnMut(&Value) -> bool,
{
    let updates = wait_for_batch(socket, &mut matches).await;
    updates
        .into_iter()
        .find(|u| matches(u))
        .expect("batch holds a matching update")
}
