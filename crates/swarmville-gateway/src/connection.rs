use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Outbound queue of one dashboard client.
pub type ClientSender = mpsc::UnboundedSender<String>;

/// Dashboard clients currently attached to `/ws`, keyed by connection id.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<Uuid, ClientSender>>,
}

impl ClientRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn register(&self, id: Uuid, tx: ClientSender) {
        self.clients.write().await.insert(id, tx);
        debug!(connection_id = %id, "Client registered");
    }

    pub async fn unregister(&self, id: Uuid) {
        self.clients.write().await.remove(&id);
        debug!(connection_id = %id, "Client unregistered");
    }

    /// Queue a frame for one client. Returns false if it is gone.
    pub async fn send_to(&self, id: Uuid, frame: &str) -> bool {
        self.clients
            .read()
            .await
            .get(&id)
            .is_some_and(|tx| tx.send(frame.to_owned()).is_ok())
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Queue a frame for every client and drop the ones whose socket task
    /// has ended. Returns how many clients received it.
    pub async fn broadcast(&self, frame: &str) -> usize {
        let mut clients = self.clients.write().await;
        clients.retain(|_, tx| tx.send(frame.to_owned()).is_ok());
        clients.len()
    }
}
