//! Integration tests for the remote control server.
//!
//! These tests drive the server over real TCP sockets with a mock serial
//! writer behind the handler.

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use smartlock_hardware::mock::{MockRecognizer, MockSerialHandle, MockSerialLink};
use smartlock_orchestrator::{FfmpegMerger, OrchestratorContext, PipelineSettings};
use smartlock_protocol::LockCommand;
use smartlock_remote::{RemoteServer, RemoteServerConfig};
use smartlock_storage::{Database, SqliteGateway};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpStream, task::JoinHandle, time::timeout};
use tokio_util::{
    codec::{Framed, LinesCodec},
    sync::CancellationToken,
};

struct Running {
    addr: SocketAddr,
    serial: MockSerialHandle,
    gateway: Arc<SqliteGateway>,
    cancel: CancellationToken,
    server: JoinHandle<smartlock_remote::Result<()>>,
    _db: Database,
}

async fn start_server(max_connections: usize) -> Running {
    let db = Database::in_memory().await.unwrap();
    let gateway = Arc::new(SqliteGateway::new(db.pool().clone()));
    let (_reader, writer, serial) = MockSerialLink::new();
    let (recognizer, _faces) = MockRecognizer::new();

    let ctx = OrchestratorContext::new(
        Arc::new(writer),
        Arc::new(recognizer),
        Arc::new(FfmpegMerger::default()),
        Arc::clone(&gateway),
        PipelineSettings::default(),
    );

    let config = RemoteServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        max_connections,
    };
    let server = RemoteServer::bind(config, ctx.remote_handler()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let cancel = CancellationToken::new();
    let server = tokio::spawn(server.serve(cancel.clone()));

    Running {
        addr,
        serial,
        gateway,
        cancel,
        server,
        _db: db,
    }
}

async fn connect(addr: SocketAddr) -> Framed<TcpStream, LinesCodec> {
    let stream = TcpStream::connect(addr).await.unwrap();
    Framed::new(stream, LinesCodec::new())
}

async fn request(client: &mut Framed<TcpStream, LinesCodec>, line: &str) -> Value {
    client.send(line.to_string()).await.unwrap();
    let reply = timeout(Duration::from_secs(5), client.next())
        .await
        .expect("reply timeout")
        .unwrap()
        .unwrap();
    serde_json::from_str(&reply).unwrap()
}

#[tokio::test]
async fn test_unlock_round_trip() {
    let running = start_server(4).await;
    let mut client = connect(running.addr).await;

    let reply = request(&mut client, r#"{"event":"unlock","data":true}"#).await;
    assert_eq!(reply, json!({"event": "unlocked"}));
    assert_eq!(running.serial.written(), vec![LockCommand::Unlock]);
    assert_eq!(running.gateway.recent_access_logs(10).await.unwrap().len(), 1);

    let reply = request(&mut client, r#"{"event":"unlock","data":false}"#).await;
    assert_eq!(reply, json!({"event": "locked"}));
    assert_eq!(
        running.serial.written(),
        vec![LockCommand::Unlock, LockCommand::Lock]
    );
    assert_eq!(running.gateway.recent_access_logs(10).await.unwrap().len(), 1);

    running.cancel.cancel();
    running.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_refresh_returns_seven_days() {
    let running = start_server(4).await;
    let mut client = connect(running.addr).await;

    request(&mut client, r#"{"event":"unlock","data":true}"#).await;
    let reply = request(&mut client, r#"{"event":"refresh"}"#).await;

    assert_eq!(reply["event"], "access_logs");
    let days = reply["data"].as_array().unwrap();
    assert_eq!(days.len(), 7);
    let today = days.last().unwrap();
    assert_eq!(today["face_count"], 0);
    assert_eq!(today["web_count"], 1);

    running.cancel.cancel();
    running.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_command_keeps_connection_open() {
    let running = start_server(4).await;
    let mut client = connect(running.addr).await;

    let reply = request(&mut client, r#"{"event":"open_sesame"}"#).await;
    assert_eq!(reply["event"], "error");

    let reply = request(&mut client, "not json").await;
    assert_eq!(reply["event"], "error");

    let reply = request(&mut client, r#"{"event":"unlock","data":true}"#).await;
    assert_eq!(reply["event"], "unlocked");
    assert_eq!(running.serial.count(LockCommand::Unlock), 1);

    running.cancel.cancel();
    running.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_concurrent_clients() {
    let running = start_server(8).await;

    let clients: Vec<_> = (0..4)
        .map(|_| {
            let addr = running.addr;
            tokio::spawn(async move {
                let mut client = connect(addr).await;
                request(&mut client, r#"{"event":"unlock","data":true}"#).await
            })
        })
        .collect();

    for client in clients {
        assert_eq!(client.await.unwrap(), json!({"event": "unlocked"}));
    }
    assert_eq!(running.serial.count(LockCommand::Unlock), 4);
    assert_eq!(running.gateway.recent_access_logs(10).await.unwrap().len(), 4);

    running.cancel.cancel();
    running.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_connection_limit() {
    let running = start_server(1).await;

    let mut first = connect(running.addr).await;
    request(&mut first, r#"{"event":"refresh"}"#).await;

    // The second connection is accepted by the OS and then dropped.
    let mut second = connect(running.addr).await;
    second
        .send(r#"{"event":"refresh"}"#.to_string())
        .await
        .ok();
    let reply = timeout(Duration::from_secs(5), second.next())
        .await
        .expect("rejected connection was not closed");
    assert!(matches!(reply, None | Some(Err(_))));

    // The first connection is unaffected.
    let reply = request(&mut first, r#"{"event":"unlock","data":false}"#).await;
    assert_eq!(reply, json!({"event": "locked"}));

    running.cancel.cancel();
    running.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_cancel_closes_open_connections() {
    let running = start_server(4).await;
    let mut client = connect(running.addr).await;
    request(&mut client, r#"{"event":"refresh"}"#).await;

    running.cancel.cancel();
    timeout(Duration::from_secs(5), running.server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();

    let next = timeout(Duration::from_secs(5), client.next())
        .await
        .expect("connection was not closed");
    assert!(matches!(next, None | Some(Err(_))));
}
