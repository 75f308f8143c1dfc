use async_trait::async_trait;
use swarmville_core::{EventSink, OrchestrationEvent, SwarmResult};
use tokio::sync::broadcast;

/// In-process event fan-out.
/// Events published with no subscriber are dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OrchestrationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestrationEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl EventSink for EventBus {
    async fn publish(&self, event: OrchestrationEvent) -> SwarmResult<()> {
        // A send error only means nobody is listening right now.
        let _ = self.tx.send(event);
        Ok(())
    }
}
