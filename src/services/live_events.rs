use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::message::Direction;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    MessageReceived {
        conversation_id: Uuid,
        /// Tenant owning the conversation; `None` for unowned instances.
        company_id: Option<Uuid>,
        phone: String,
        content: String,
        direction: Direction,
        instance: String,
    },
}

impl LiveEvent {
    pub fn company_id(&self) -> Option<Uuid> {
        match self {
            LiveEvent::MessageReceived { company_id, .. } => *company_id,
        }
    }

    /// Tenant-bound viewers only see their own company's events; viewers
    /// without a tenant see everything.
    pub fn visible_to(&self, viewer_company: Option<Uuid>) -> bool {
        match viewer_company {
            Some(own) => self.company_id() == Some(own),
            None => true,
        }
    }
}

/// In-process fan-out of inbox events. Delivery is best effort: a lagging or
/// absent subscriber just misses events.
#[derive(Clone)]
pub struct LiveEvents {
    tx: broadcast::Sender<LiveEvent>,
}

impl LiveEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: LiveEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }
}

impl Default for LiveEvents {
    fn default() -> Self {
        Self::new(1024)
    }
}
