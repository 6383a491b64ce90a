use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use redis_protocol::resp2::decode::decode;
use redis_protocol::resp2::types::OwnedFrame as RespFrame;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

use queuebus::queue::processing_list;
use queuebus::resp::utils::{command, encode_frame};
use queuebus::{
    Broker, BusConfig, BusError, ConfigureOptions, ConsumerOptions, EventBus, EventMessage,
    QueueManager, RedisBroker, RedisOptions, RedisOverrides, RespConfig, RespConnection,
    RespServer,
};

async fn start_server() -> (Arc<QueueManager>, u16) {
    let manager = Arc::new(QueueManager::new(1000, 100));
    let config = RespConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };

    let server = RespServer::bind(config, manager.clone()).await.unwrap();
    let port = server.local_addr().unwrap().port();
    tokio::spawn(server.run());

    (manager, port)
}

fn options(port: u16) -> RedisOptions {
    RedisOptions {
        host: "127.0.0.1".to_string(),
        port,
        connect_timeout_ms: 1000,
    }
}

fn redis_bus(port: u16) -> EventBus {
    redis_bus_with_timeout(port, 100)
}

fn redis_bus_with_timeout(port: u16, consume_timeout_ms: u64) -> EventBus {
    let config = BusConfig {
        namespace: "it".to_string(),
        redis: options(port),
        consumer: ConsumerOptions { consume_timeout_ms },
        ..BusConfig::default()
    };
    EventBus::with_config(Arc::new(RedisBroker::new(config.redis.clone())), config)
}

#[tokio::test]
async fn test_ping_over_connection() {
    let (_, port) = start_server().await;
    let mut conn = RespConnection::connect("127.0.0.1", port, Duration::from_secs(1))
        .await
        .unwrap();

    let reply = conn.request(command(&["PING"])).await.unwrap();

    assert_eq!(reply, RespFrame::SimpleString(b"PONG".to_vec()));
}

#[tokio::test]
async fn test_error_reply_becomes_server_error() {
    let (_, port) = start_server().await;
    let mut conn = RespConnection::connect("127.0.0.1", port, Duration::from_secs(1))
        .await
        .unwrap();

    let result = conn.request(command(&["NOPE"])).await;

    assert!(matches!(result, Err(BusError::Server(e)) if e.contains("unknown command")));
}

#[tokio::test]
async fn test_sender_and_receiver_round_trip() {
    let (manager, port) = start_server().await;
    let broker = RedisBroker::new(options(port));
    let mut sender = broker.open_sender("it:jobs").await.unwrap();
    let mut receiver = broker.open_receiver("it:jobs").await.unwrap();

    sender.send(r#"{"job":1}"#).await.unwrap();
    let body = receiver
        .receive(Duration::from_millis(200))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(body, r#"{"job":1}"#);
    assert_eq!(manager.pending_len(&processing_list("it:jobs")), 1);

    receiver.ack(&body).await.unwrap();
    assert_eq!(manager.pending_len(&processing_list("it:jobs")), 0);

    sender.close().await.unwrap();
    receiver.close().await.unwrap();
    assert!(matches!(receiver.close().await, Err(BusError::Closed)));
}

#[tokio::test]
async fn test_receive_times_out_with_none() {
    let (_, port) = start_server().await;
    let broker = RedisBroker::new(options(port));
    let mut receiver = broker.open_receiver("it:quiet").await.unwrap();

    let body = receiver.receive(Duration::from_millis(50)).await.unwrap();

    assert!(body.is_none());
}

#[tokio::test]
async fn test_publish_and_subscribe_through_server() {
    let (manager, port) = start_server().await;
    let bus = redis_bus(port);
    let (tx, mut rx) = mpsc::unbounded_channel();

    bus.subscribe("user.created", move |message: EventMessage| {
        let _ = tx.send(message);
    })
    .await
    .unwrap();
    let sent = bus
        .publish("user.created", serde_json::json!({ "id": 9, "name": "grace" }))
        .await
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(received, sent);
    assert_eq!(manager.pending_len(&processing_list("it:user.created")), 0);
    assert!(bus.destroy().await.is_cleared());
}

#[tokio::test]
async fn test_publish_fails_when_server_is_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let bus = redis_bus(port);

    let result = bus.publish("user.created", serde_json::json!({})).await;

    assert!(matches!(result, Err(BusError::Io(_))));
}

#[tokio::test]
async fn test_configure_redirects_new_handles() {
    let (_, unused_port) = start_server().await;
    let (manager, port) = start_server().await;
    let bus = redis_bus(unused_port);

    bus.configure(
        "moved",
        ConfigureOptions::default().with_db(RedisOverrides {
            port: Some(port),
            ..Default::default()
        }),
    )
    .unwrap();
    bus.publish("ping", serde_json::json!(true)).await.unwrap();

    assert_eq!(bus.config().redis.port, port);
    assert_eq!(manager.get_queue("moved:ping").unwrap().size(), 1);
}

#[tokio::test]
async fn test_resubscriber_gets_message_published_after_unsubscribe() {
    let (manager, port) = start_server().await;
    let bus = redis_bus_with_timeout(port, 2000);

    bus.subscribe("ev", |_| {}).await.unwrap();
    // Let the consumer block in BRPOPLPUSH on the server.
    tokio::time::sleep(Duration::from_millis(100)).await;
    bus.unsubscribe("ev").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    bus.publish("ev", "after-unsub").await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    bus.subscribe("ev", move |message: EventMessage| {
        let _ = tx.send(message);
    })
    .await
    .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("message published after unsubscribe was not delivered")
        .unwrap();

    assert_eq!(received.payload, "after-unsub");
    assert_eq!(manager.pending_len(&processing_list("it:ev")), 0);
    assert!(bus.destroy().await.is_cleared());
}

/// Scripted server: every BRPOPLPUSH returns `body`, every LREM value is
/// forwarded to the returned channel.
async fn start_scripted_server(body: Vec<u8>) -> (u16, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buffer = BytesMut::new();

        loop {
            if socket.read_buf(&mut buffer).await.unwrap() == 0 {
                return;
            }

            while let Ok(Some((frame, consumed))) = decode(&buffer) {
                buffer.advance(consumed);

                let RespFrame::Array(parts) = frame else {
                    continue;
                };
                let reply = match &parts[0] {
                    RespFrame::BulkString(name) if name.as_slice() == b"BRPOPLPUSH" => {
                        RespFrame::BulkString(body.clone())
                    }
                    RespFrame::BulkString(name) if name.as_slice() == b"LREM" => {
                        if let RespFrame::BulkString(value) = &parts[3] {
                            let _ = tx.send(value.clone());
                        }
                        RespFrame::Integer(1)
                    }
                    _ => RespFrame::Error("ERR unexpected".to_string()),
                };
                socket.write_all(&encode_frame(&reply).unwrap()).await.unwrap();
            }
        }
    });

    (port, rx)
}

#[tokio::test]
async fn test_non_utf8_body_is_removed_with_its_exact_bytes() {
    let raw = vec![0xff, 0xfe, b'x'];
    let (port, mut removed) = start_scripted_server(raw.clone()).await;
    let broker = RedisBroker::new(options(port));
    let mut receiver = broker.open_receiver("it:binary").await.unwrap();

    let result = receiver.receive(Duration::from_millis(50)).await;

    assert!(matches!(result, Err(BusError::Protocol(_))));
    let value = tokio::time::timeout(Duration::from_secs(1), removed.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value, raw);
}
