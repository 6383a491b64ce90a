use std::sync::Arc;

use redis_protocol::resp2::types::OwnedFrame as RespFrame;

use super::utils::{extract_bytes, extract_integer, extract_string, extract_timeout};
use crate::queue::QueueManager;

pub async fn handle_command(frame: RespFrame, queue_manager: Arc<QueueManager>) -> RespFrame {
    let cmd_array = match frame {
        RespFrame::Array(arr) => arr,
        _ => {
            return RespFrame::Error("ERR expected array".into());
        }
    };

    if cmd_array.is_empty() {
        return RespFrame::Error("ERR empty command".to_string());
    }

    let command_name = match &cmd_array[0] {
        RespFrame::BulkString(data) | RespFrame::SimpleString(data) => {
            String::from_utf8_lossy(data).to_uppercase()
        }
        _ => {
            return RespFrame::Error("ERR invalid command format".to_string());
        }
    };

    match command_name.as_str() {
        "PING" => handle_ping(&cmd_array),
        "LPUSH" => handle_lpush(&cmd_array, &queue_manager),
        "RPOP" => handle_rpop(&cmd_array, &queue_manager).await,
        "BRPOP" => handle_brpop(&cmd_array, &queue_manager).await,
        "BRPOPLPUSH" => handle_brpoplpush(&cmd_array, &queue_manager).await,
        "LREM" => handle_lrem(&cmd_array, &queue_manager),
        "LLEN" => handle_llen(&cmd_array, &queue_manager),
        "DEL" => handle_del(&cmd_array, &queue_manager),
        "COMMAND" => handle_command_docs(),
        _ => RespFrame::Error(format!("ERR unknown command '{}'", command_name)),
    }
}

fn wrong_arity(name: &str) -> RespFrame {
    RespFrame::Error(format!("ERR wrong number of arguments for '{}' command", name))
}

/// PING [message]
fn handle_ping(cmd: &[RespFrame]) -> RespFrame {
    match cmd.len() {
        1 => RespFrame::SimpleString(b"PONG".to_vec()),
        2 => cmd[1].clone(),
        _ => wrong_arity("ping"),
    }
}

/// LPUSH queue value [value ...]
///
/// Values that are not JSON are stored as JSON strings.
fn handle_lpush(cmd: &[RespFrame], queue_manager: &QueueManager) -> RespFrame {
    if cmd.len() < 3 {
        return wrong_arity("lpush");
    }

    let queue_name = match extract_string(&cmd[1]) {
        Ok(name) => name,
        Err(e) => return e,
    };

    for value in &cmd[2..] {
        let value = match extract_bytes(value) {
            Ok(data) => data,
            Err(e) => return e,
        };

        let json_value = serde_json::from_slice::<serde_json::Value>(&value).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&value).to_string())
        });

        if let Err(e) = queue_manager.enqueue(&queue_name, json_value) {
            return RespFrame::Error(format!("ERR {}", e));
        }
    }

    match queue_manager.get_queue(&queue_name) {
        Some(queue) => RespFrame::Integer(queue.size() as i64),
        None => RespFrame::Integer(0),
    }
}

/// RPOP queue
async fn handle_rpop(cmd: &[RespFrame], queue_manager: &QueueManager) -> RespFrame {
    if cmd.len() != 2 {
        return wrong_arity("rpop");
    }

    let queue_name = match extract_string(&cmd[1]) {
        Ok(name) => name,
        Err(e) => return e,
    };

    let Some(queue) = queue_manager.get_queue(&queue_name) else {
        return RespFrame::Null;
    };

    match queue.dequeue(std::time::Duration::ZERO).await {
        Some(message) => RespFrame::BulkString(message.payload.to_string().into_bytes()),
        None => RespFrame::Null,
    }
}

/// BRPOP queue timeout
async fn handle_brpop(cmd: &[RespFrame], queue_manager: &QueueManager) -> RespFrame {
    if cmd.len() != 3 {
        return wrong_arity("brpop");
    }

    let queue_name = match extract_string(&cmd[1]) {
        Ok(name) => name,
        Err(e) => return e,
    };

    let timeout = match extract_timeout(&cmd[2]) {
        Ok(timeout) => timeout,
        Err(e) => return e,
    };

    let queue = match queue_manager.get_or_create_queue(&queue_name) {
        Ok(queue) => queue,
        Err(e) => return RespFrame::Error(format!("ERR {}", e)),
    };

    match queue.dequeue(timeout).await {
        Some(message) => RespFrame::Array(vec![
            RespFrame::BulkString(queue_name.into_bytes()),
            RespFrame::BulkString(message.payload.to_string().into_bytes()),
        ]),
        None => RespFrame::Null,
    }
}

/// BRPOPLPUSH source destination timeout
async fn handle_brpoplpush(cmd: &[RespFrame], queue_manager: &QueueManager) -> RespFrame {
    if cmd.len() != 4 {
        return wrong_arity("brpoplpush");
    }

    let source = match extract_string(&cmd[1]) {
        Ok(name) => name,
        Err(e) => return e,
    };

    let destination = match extract_string(&cmd[2]) {
        Ok(name) => name,
        Err(e) => return e,
    };

    let timeout = match extract_timeout(&cmd[3]) {
        Ok(timeout) => timeout,
        Err(e) => return e,
    };

    match queue_manager.dequeue_to_pending(&source, &destination, timeout).await {
        Ok(Some(body)) => RespFrame::BulkString(body.into_bytes()),
        Ok(None) => RespFrame::Null,
        Err(e) => RespFrame::Error(format!("ERR {}", e)),
    }
}

/// LREM list count value
///
/// Only processing lists support removal. A count of zero removes every
/// occurrence, otherwise up to `|count|` occurrences.
fn handle_lrem(cmd: &[RespFrame], queue_manager: &QueueManager) -> RespFrame {
    if cmd.len() != 4 {
        return wrong_arity("lrem");
    }

    let list = match extract_string(&cmd[1]) {
        Ok(name) => name,
        Err(e) => return e,
    };

    let count = match extract_integer(&cmd[2]) {
        Ok(n) => n,
        Err(e) => return e,
    };

    let value = match extract_string(&cmd[3]) {
        Ok(value) => value,
        Err(e) => return e,
    };

    let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };

    let mut removed = 0;
    while removed < limit && queue_manager.ack_pending(&list, &value) {
        removed += 1;
    }

    RespFrame::Integer(removed as i64)
}

/// LLEN list
fn handle_llen(cmd: &[RespFrame], queue_manager: &QueueManager) -> RespFrame {
    if cmd.len() != 2 {
        return wrong_arity("llen");
    }

    let name = match extract_string(&cmd[1]) {
        Ok(name) => name,
        Err(e) => return e,
    };

    let len = match queue_manager.get_queue(&name) {
        Some(queue) => queue.size(),
        None => queue_manager.pending_len(&name),
    };

    RespFrame::Integer(len as i64)
}

/// DEL key [key ...]
fn handle_del(cmd: &[RespFrame], queue_manager: &QueueManager) -> RespFrame {
    if cmd.len() < 2 {
        return wrong_arity("del");
    }

    let mut count = 0;
    for key in &cmd[1..] {
        let name = match extract_string(key) {
            Ok(name) => name,
            Err(e) => return e,
        };

        if queue_manager.purge(&name) {
            count += 1;
        }
    }

    RespFrame::Integer(count)
}

fn handle_command_docs() -> RespFrame {
    RespFrame::Array(
        ["PING", "LPUSH", "RPOP", "BRPOP", "BRPOPLPUSH", "LREM", "LLEN", "DEL"]
            .iter()
            .map(|name| RespFrame::BulkString(name.as_bytes().to_vec()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resp::utils::command;

    fn manager() -> Arc<QueueManager> {
        Arc::new(QueueManager::new(100, 10))
    }

    #[tokio::test]
    async fn test_ping() {
        let reply = handle_command(command(&["PING"]), manager()).await;

        assert_eq!(reply, RespFrame::SimpleString(b"PONG".to_vec()));
    }

    #[tokio::test]
    async fn test_lpush_then_rpop() {
        let manager = manager();

        let reply =
            handle_command(command(&["LPUSH", "jobs", r#"{"id":1}"#]), manager.clone()).await;
        assert_eq!(reply, RespFrame::Integer(1));

        let reply = handle_command(command(&["RPOP", "jobs"]), manager.clone()).await;
        assert_eq!(reply, RespFrame::BulkString(br#"{"id":1}"#.to_vec()));

        let reply = handle_command(command(&["RPOP", "jobs"]), manager).await;
        assert_eq!(reply, RespFrame::Null);
    }

    #[tokio::test]
    async fn test_brpoplpush_then_lrem() {
        let manager = manager();
        handle_command(command(&["LPUSH", "jobs", r#""hello""#]), manager.clone()).await;

        let reply = handle_command(
            command(&["BRPOPLPUSH", "jobs", "jobs:processing", "0.1"]),
            manager.clone(),
        )
        .await;
        assert_eq!(reply, RespFrame::BulkString(br#""hello""#.to_vec()));

        let reply = handle_command(command(&["LLEN", "jobs:processing"]), manager.clone()).await;
        assert_eq!(reply, RespFrame::Integer(1));

        let reply = handle_command(
            command(&["LREM", "jobs:processing", "1", r#""hello""#]),
            manager.clone(),
        )
        .await;
        assert_eq!(reply, RespFrame::Integer(1));

        let reply = handle_command(command(&["LLEN", "jobs:processing"]), manager).await;
        assert_eq!(reply, RespFrame::Integer(0));
    }

    #[tokio::test]
    async fn test_brpoplpush_times_out_with_null() {
        let reply = handle_command(
            command(&["BRPOPLPUSH", "empty", "empty:processing", "0.05"]),
            manager(),
        )
        .await;

        assert_eq!(reply, RespFrame::Null);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let reply = handle_command(command(&["FLUSHALL"]), manager()).await;

        assert!(matches!(reply, RespFrame::Error(e) if e.contains("unknown command")));
    }

    #[tokio::test]
    async fn test_wrong_arity() {
        let reply = handle_command(command(&["LPUSH", "jobs"]), manager()).await;

        assert!(matches!(reply, RespFrame::Error(e) if e.contains("wrong number of arguments")));
    }

    #[tokio::test]
    async fn test_del_removes_non_empty_queue() {
        let manager = manager();
        handle_command(command(&["LPUSH", "jobs", "1", "2"]), manager.clone()).await;

        let reply = handle_command(command(&["DEL", "jobs", "missing"]), manager.clone()).await;

        assert_eq!(reply, RespFrame::Integer(1));
        assert_eq!(manager.queue_count(), 0);
    }
}
