use std::sync::Arc;

use queuebus::{LogOptions, QueueManager, RespConfig, RespServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let level = std::env::var("QUEUEBUS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    queuebus::logging::init(&LogOptions {
        enabled: true,
        level,
    });

    let host = std::env::var("QUEUEBUS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("QUEUEBUS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(6379);

    let queue_capacity = std::env::var("QUEUEBUS_QUEUE_CAPACITY")
        .ok()
        .and_then(|c| c.parse().ok())
        .unwrap_or(100_000);

    let max_queues = std::env::var("QUEUEBUS_MAX_QUEUES")
        .ok()
        .and_then(|m| m.parse().ok())
        .unwrap_or(1000);

    let queue_manager = Arc::new(QueueManager::new(queue_capacity, max_queues));

    let server = RespServer::bind(RespConfig { host, port }, queue_manager).await?;
    server.run().await?;

    Ok(())
}
