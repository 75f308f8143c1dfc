use crate::connection::ClientRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use swarmville_core::SwarmResult;
use swarmville_orchestrator::Orchestrator;
use tracing::{info, warn};
use uuid::Uuid;

/// A frame sent by a dashboard client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    RequestAgentStates,
    ApprovalResponse { approval_id: Uuid, approved: bool },
}

impl InboundMessage {
    /// Parse a text frame. A bare `request_agent_states` is accepted too.
    pub fn parse(text: &str) -> Option<Self> {
        if text.trim() == "request_agent_states" {
            return Some(InboundMessage::RequestAgentStates);
        }
        serde_json::from_str(text).ok()
    }
}

#[derive(Debug, Serialize)]
pub struct OutboundError {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub content: String,
}

impl OutboundError {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            msg_type: "error",
            content: content.into(),
        }
    }
}

/// Routes inbound WebSocket frames to the orchestrator.
pub struct MessageRouter {
    orchestrator: Arc<Orchestrator>,
    connections: Arc<ClientRegistry>,
}

impl MessageRouter {
    pub fn new(orchestrator: Arc<Orchestrator>, connections: Arc<ClientRegistry>) -> Self {
        Self {
            orchestrator,
            connections,
        }
    }

    /// The `agent_states` snapshot sent on connect and on request.
    pub async fn agent_states(&self) -> serde_json::Value {
        let mut snapshot = self.orchestrator.monitor().to_json().await;
        if let Some(obj) = snapshot.as_object_mut() {
            obj.insert("type".to_string(), serde_json::json!("agent_states"));
        }
        snapshot
    }

    pub async fn send_agent_states(&self, connection_id: Uuid) {
        let snapshot = self.agent_states().await;
        self.connections
            .send_to(connection_id, &snapshot.to_string())
            .await;
    }

    pub async fn handle_message(&self, text: &str, connection_id: Uuid) -> SwarmResult<()> {
        let Some(message) = InboundMessage::parse(text) else {
            warn!(connection_id = %connection_id, "Unrecognized frame");
            self.reply_error(connection_id, "Unrecognized message").await?;
            return Ok(());
        };

        match message {
            InboundMessage::RequestAgentStates => self.send_agent_states(connection_id).await,
            InboundMessage::ApprovalResponse {
                approval_id,
                approved,
            } => {
                info!(connection_id = %connection_id, approval_id = %approval_id, approved, "Approval via WebSocket");
                if let Err(e) = self.orchestrator.decide_approval(approval_id, approved).await {
                    self.reply_error(connection_id, &e.to_string()).await?;
                }
            }
        }
        Ok(())
    }

    async fn reply_error(&self, connection_id: Uuid, content: &str) -> SwarmResult<()> {
        let json = serde_json::to_string(&OutboundError::new(content))?;
        self.connections.send_to(connection_id, &json).await;
        Ok(())
    }
}
