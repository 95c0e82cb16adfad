//! Wire-level test: real listeners, real WebSocket clients

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use disciple_server::config::Args;
use disciple_server::db::{Disciple, DiscipleModel, MemoryStore};
use disciple_server::registry::{DiscipleRegistry, ModelRegistry};
use disciple_server::server::{serve, AppState, Role};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn start() -> (SocketAddr, SocketAddr) {
    let args = Args::try_parse_from(["disciple-server", "--port", "1", "--memory-store"]).unwrap();
    let disciples = DiscipleRegistry::new(Arc::new(MemoryStore::<Disciple>::new()));
    let models = ModelRegistry::new(Arc::new(MemoryStore::<DiscipleModel>::new()));
    let state = Arc::new(AppState::new(args, disciples, models));

    let disciple_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addrs = (
        disciple_listener.local_addr().unwrap(),
        admin_listener.local_addr().unwrap(),
    );

    tokio::spawn(serve(disciple_listener, Role::Disciple, Arc::clone(&state)));
    tokio::spawn(serve(admin_listener, Role::Admin, state));
    addrs
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    ws
}

async fn send(ws: &mut Client, event: &str, data: Value) {
    let frame = json!({"event": event, "data": data}).to_string();
    ws.send(Message::Text(frame)).await.unwrap();
}

async fn recv(ws: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a reply")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Ask for connected disciples until `expected` of them show up
async fn wait_for_disciples(admin: &mut Client, query: &str, expected: usize) -> Value {
    for _ in 0..50 {
        send(admin, "disciples", json!(query)).await;
        let reply = recv(admin).await;
        if reply["data"].as_array().map(Vec::len) == Some(expected) {
            return reply;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("disciple count never reached {}", expected);
}

#[tokio::test]
async fn test_presence_and_admin_over_websocket() {
    let (disciple_addr, admin_addr) = start().await;

    let mut admin = connect(admin_addr).await;
    let mut worker = connect(disciple_addr).await;

    send(&mut worker, "disciple-connected", json!({"id": "d1", "hostname": "gpu-1", "ram": 64})).await;

    let reply = wait_for_disciples(&mut admin, "", 1).await;
    assert_eq!(reply["event"], "response:json");
    assert_eq!(reply["data"][0]["hostname"], "gpu-1");
    assert_eq!(reply["data"][0]["status"], "connected");

    // Closing the socket counts as a disconnect
    worker.close(None).await.unwrap();
    wait_for_disciples(&mut admin, "status: disconnected", 1).await;

    send(&mut admin, "disciples:flush", Value::Null).await;
    let reply = recv(&mut admin).await;
    assert_eq!(reply, json!({"event": "response:text", "data": "Dropped 1 Disciples!"}));
}

#[tokio::test]
async fn test_admin_replies_arrive_in_order() {
    let (_, admin_addr) = start().await;
    let mut admin = connect(admin_addr).await;

    send(&mut admin, "models", json!("{bogus: 1}")).await;
    send(&mut admin, "model", json!("name: iris")).await;
    send(&mut admin, "launch", Value::Null).await;
    send(&mut admin, "models", Value::Null).await;

    let first = recv(&mut admin).await;
    assert!(first["data"]["error"].is_string());
    assert_eq!(recv(&mut admin).await["data"], json!({"status": "success"}));
    assert_eq!(
        recv(&mut admin).await["data"],
        json!({"error": "Unknown command: launch"})
    );
    let listed = recv(&mut admin).await;
    assert_eq!(listed["data"][0]["name"], "iris");
}
