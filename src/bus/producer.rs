use std::sync::Arc;

use tokio::sync::Mutex;

use crate::broker::{Broker, Sender};
use crate::error::{BusError, BusResult};

enum SenderState {
    Idle,
    Open(Box<dyn Sender>),
    Closed,
}

/// Producer handle for one event name. The underlying sender is opened on
/// the first send.
pub struct Producer {
    event: String,
    queue: String,
    broker: Arc<dyn Broker>,
    state: Mutex<SenderState>,
}

impl Producer {
    pub(crate) fn new(event: &str, queue: String, broker: Arc<dyn Broker>) -> Self {
        Self {
            event: event.to_string(),
            queue,
            broker,
            state: Mutex::new(SenderState::Idle),
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub(crate) async fn send(&self, body: &str) -> BusResult<()> {
        let mut state = self.state.lock().await;

        if let SenderState::Idle = *state {
            let sender = self.broker.open_sender(&self.queue).await?;
            tracing::debug!("Opened {} producer for '{}'", self.broker.name(), self.queue);
            *state = SenderState::Open(sender);
        }

        match &mut *state {
            SenderState::Open(sender) => sender.send(body).await,
            _ => Err(BusError::Closed),
        }
    }

    pub(crate) async fn shutdown(&self) -> BusResult<()> {
        let mut state = self.state.lock().await;

        match std::mem::replace(&mut *state, SenderState::Closed) {
            SenderState::Open(mut sender) => sender.close().await,
            SenderState::Idle => Ok(()),
            SenderState::Closed => Err(BusError::Closed),
        }
    }
}
