use std::sync::Arc;
use std::time::Duration;

use queuebus::queue::processing_list;
use queuebus::{BusError, MessageQueue, QueueManager};

#[tokio::test]
async fn test_queue_keeps_fifo_order() {
    let queue = MessageQueue::new("orders".to_string(), 10);

    for order in 1..=3 {
        queue.enqueue(serde_json::json!({ "order": order })).unwrap();
    }

    for expected in 1..=3 {
        let message = queue.dequeue(Duration::ZERO).await.unwrap();
        assert_eq!(message.payload["order"], expected);
    }
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_full_queue_rejects_and_counts_overflow() {
    let queue = MessageQueue::new("orders".to_string(), 2);

    queue.enqueue(serde_json::json!(1)).unwrap();
    queue.enqueue(serde_json::json!(2)).unwrap();
    let overflow = queue.enqueue(serde_json::json!(3));

    assert!(matches!(overflow, Err(BusError::QueueFull(name)) if name == "orders"));
    assert_eq!(queue.size(), 2);
    assert_eq!(queue.stats().enqueued_total(), 2);
    assert_eq!(queue.stats().queue_full_count(), 1);
}

#[tokio::test]
async fn test_dequeue_wakes_on_enqueue() {
    let queue = Arc::new(MessageQueue::new("orders".to_string(), 10));
    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.dequeue(Duration::from_secs(2)).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.enqueue(serde_json::json!({ "woke": true })).unwrap();

    let message = waiter.await.unwrap().unwrap();
    assert_eq!(message.payload["woke"], true);
    assert_eq!(queue.stats().dequeued_total(), 1);
}

#[tokio::test]
async fn test_dequeue_gives_up_after_timeout() {
    let queue = MessageQueue::new("orders".to_string(), 10);

    let start = std::time::Instant::now();
    let message = queue.dequeue(Duration::from_millis(50)).await;

    assert!(message.is_none());
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn test_manager_enforces_max_queues() {
    let manager = QueueManager::new(10, 2);

    manager.get_or_create_queue("a").unwrap();
    manager.get_or_create_queue("b").unwrap();

    assert!(manager.get_or_create_queue("a").is_ok());
    assert!(matches!(manager.get_or_create_queue("c"), Err(BusError::Queue(_))));
    assert_eq!(manager.list_queues(), vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn test_dequeue_from_unknown_queue_fails() {
    let manager = QueueManager::new(10, 2);

    let result = manager.dequeue("missing", Duration::ZERO).await;

    assert!(matches!(result, Err(BusError::QueueNotFound(_))));
}

#[tokio::test]
async fn test_pending_list_tracks_unacked_messages() {
    let manager = QueueManager::new(10, 10);
    let pending = processing_list("mq:invoices");
    manager.enqueue("mq:invoices", serde_json::json!({ "id": 1 })).unwrap();
    manager.enqueue("mq:invoices", serde_json::json!({ "id": 2 })).unwrap();

    let first = manager
        .dequeue_to_pending("mq:invoices", &pending, Duration::ZERO)
        .await
        .unwrap()
        .unwrap();
    let second = manager
        .dequeue_to_pending("mq:invoices", &pending, Duration::ZERO)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first, r#"{"id":1}"#);
    assert_eq!(manager.pending_len(&pending), 2);

    assert!(manager.ack_pending(&pending, &second));
    assert!(!manager.ack_pending(&pending, &second));
    assert_eq!(manager.pending_len(&pending), 1);

    let stats = manager.get_all_stats();
    assert_eq!(stats["mq:invoices"].pending, 1);
    assert_eq!(stats["mq:invoices"].dequeued_total, 2);
}

#[tokio::test]
async fn test_dequeue_to_pending_waits_for_new_queue() {
    let manager = Arc::new(QueueManager::new(10, 10));
    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .dequeue_to_pending("late", "late:processing", Duration::from_secs(2))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    manager.enqueue("late", serde_json::json!("hi")).unwrap();

    let body = waiter.await.unwrap().unwrap();
    assert_eq!(body.as_deref(), Some(r#""hi""#));
}

#[tokio::test]
async fn test_delete_queue_requires_empty_queue() {
    let manager = QueueManager::new(10, 10);
    manager.enqueue("jobs", serde_json::json!(1)).unwrap();

    assert!(manager.delete_queue("jobs").is_err());

    manager.dequeue("jobs", Duration::ZERO).await.unwrap();
    assert!(manager.delete_queue("jobs").is_ok());
    assert!(matches!(manager.delete_queue("jobs"), Err(BusError::QueueNotFound(_))));
}

#[tokio::test]
async fn test_purge_drops_queue_with_messages() {
    let manager = QueueManager::new(10, 10);
    manager.enqueue("jobs", serde_json::json!(1)).unwrap();

    assert!(manager.purge("jobs"));
    assert!(!manager.purge("jobs"));
    assert_eq!(manager.queue_count(), 0);
}

#[tokio::test]
async fn test_concurrent_producers_share_one_queue() {
    let manager = Arc::new(QueueManager::new(1000, 10));

    let mut handles = vec![];
    for i in 0..50 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager.enqueue("shared", serde_json::json!({ "id": i }))
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    let summary = manager.get_stats_summary();
    assert_eq!(summary.total_queues, 1);
    assert_eq!(summary.queues["shared"].size, 50);
    assert_eq!(summary.queues["shared"].enqueued_total, 50);
}
