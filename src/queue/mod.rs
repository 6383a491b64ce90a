// In-memory queue store backing MemoryBroker and the embedded RESP server

pub mod message;
pub mod message_queue;
pub mod manager;

pub use message::Message;
pub use message_queue::{MessageQueue, QueueStats};
pub use manager::{processing_list, QueueManager, QueueStatsInfo, StatsSummary};
