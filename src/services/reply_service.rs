use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::message::{CreateMessage, Direction, Message, MessageStatus};
use crate::services::company_service::CompanyService;
use crate::services::conversation_service::ConversationService;
use crate::services::gateway_service::{GatewayCredentials, MessageGateway};

/// Operator replies typed in the inbox.
#[derive(Clone)]
pub struct ReplyService {
    conversations: ConversationService,
    companies: CompanyService,
    gateway: Arc<dyn MessageGateway>,
    default_credentials: GatewayCredentials,
}

impl ReplyService {
    pub fn new(
        conversations: ConversationService,
        companies: CompanyService,
        gateway: Arc<dyn MessageGateway>,
        default_credentials: GatewayCredentials,
    ) -> Self {
        Self {
            conversations,
            companies,
            gateway,
            default_credentials,
        }
    }

    /// Sends through the conversation's own instance and stores the outbound
    /// message either way; a gateway failure is kept as a `failed` message and
    /// reported to the caller.
    pub async fn reply(&self, conversation_id: Uuid, text: &str) -> Result<Message> {
        let conversation = self.conversations.get(conversation_id).await?;
        if conversation.is_group {
            return Err(Error::BadRequest("Group conversations are read-only".into()));
        }

        let company = match conversation.company_id {
            Some(id) => self.companies.get(id).await?,
            None => None,
        };
        let mut credentials = GatewayCredentials::resolve(company.as_ref(), &self.default_credentials);
        credentials.instance = conversation.instance.clone();

        let sent = self
            .gateway
            .send_text(&credentials, &conversation.phone, text)
            .await;
        let (status, external_id) = match &sent {
            Ok(sent) => (MessageStatus::Sent, sent.external_id.clone()),
            Err(e) => {
                warn!(%conversation_id, error = %e, "Operator reply failed at gateway");
                (MessageStatus::Failed, None)
            }
        };

        let message = self
            .conversations
            .insert_message(CreateMessage {
                conversation_id,
                direction: Direction::Outbound,
                content: text.to_string(),
                external_message_id: external_id,
                message_type: "conversation".into(),
                status,
            })
            .await?
            .ok_or_else(|| Error::Internal("Reply was stored twice".into()))?;

        if let Err(e) = sent {
            return Err(e);
        }

        self.conversations
            .touch_summary(conversation_id, text, Utc::now(), Direction::Outbound)
            .await?;
        self.conversations.open(conversation_id).await?;
        Ok(message)
    }
}
