use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dto::webhook_dto::{EventKind, GatewayPayload, MessageBody, UpsertData};
use crate::error::Result;
use crate::models::message::{CreateMessage, Direction, MessageStatus};
use crate::services::company_service::CompanyService;
use crate::services::conversation_service::{ConversationKey, ConversationService};
use crate::services::lead_service::{LeadOutcome, LeadService};
use crate::services::live_events::{LiveEvent, LiveEvents};
use crate::utils::phone::{is_broadcast_jid, is_group_jid, phone_from_jid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Unrecognized,
    UnhandledEvent,
    MissingKey,
    Group,
    Broadcast,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::Unrecognized => "unrecognized_payload",
            IgnoreReason::UnhandledEvent => "unhandled_event",
            IgnoreReason::MissingKey => "missing_message_key",
            IgnoreReason::Group => "group_chat",
            IgnoreReason::Broadcast => "broadcast",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Ignored(IgnoreReason),
    Duplicate { conversation_id: Uuid },
    Stored { conversation_id: Uuid, message_id: Uuid },
}

/// A message event reduced to what the inbox stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    pub instance: String,
    pub remote_jid: String,
    pub phone: String,
    pub direction: Direction,
    pub external_message_id: Option<String>,
    pub push_name: Option<String>,
    pub message_type: String,
    pub content: String,
}

pub fn normalize(
    payload: &GatewayPayload,
    default_instance: &str,
) -> std::result::Result<NormalizedMessage, IgnoreReason> {
    let event = payload.event().ok_or(IgnoreReason::Unrecognized)?;
    if event.kind != EventKind::MessagesUpsert {
        return Err(IgnoreReason::UnhandledEvent);
    }

    let data = UpsertData::from_event_data(&event.data).ok_or(IgnoreReason::MissingKey)?;
    let key = data.key.as_ref().ok_or(IgnoreReason::MissingKey)?;
    let remote_jid = key.remote_jid.trim();
    if remote_jid.is_empty() {
        return Err(IgnoreReason::MissingKey);
    }
    if is_broadcast_jid(remote_jid) {
        return Err(IgnoreReason::Broadcast);
    }
    if is_group_jid(remote_jid) {
        return Err(IgnoreReason::Group);
    }

    let direction = Direction::from_me(key.from_me.unwrap_or(false));
    // On our own messages pushName is the operator's name, not the contact's.
    let push_name = match direction {
        Direction::Inbound => data
            .push_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        Direction::Outbound => None,
    };
    let message_type = data
        .message_type
        .clone()
        .unwrap_or_else(|| "conversation".to_string());
    let content = extract_content(data.message.as_ref(), &message_type);

    Ok(NormalizedMessage {
        instance: event
            .instance
            .clone()
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| default_instance.to_string()),
        remote_jid: remote_jid.to_string(),
        phone: phone_from_jid(remote_jid),
        direction,
        external_message_id: key.id.clone().filter(|id| !id.is_empty()),
        push_name,
        message_type,
        content,
    })
}

/// Text first, then quoted/extended text, then an image caption; anything else
/// becomes a placeholder tag naming the media kind.
pub fn extract_content(body: Option<&MessageBody>, message_type: &str) -> String {
    if let Some(body) = body {
        let non_empty = |t: &&str| !t.trim().is_empty();
        let text = body
            .conversation
            .as_deref()
            .filter(non_empty)
            .or_else(|| {
                body.extended_text_message
                    .as_ref()
                    .and_then(|m| m.text.as_deref())
                    .filter(non_empty)
            })
            .or_else(|| {
                body.image_message
                    .as_ref()
                    .and_then(|m| m.caption.as_deref())
                    .filter(non_empty)
            });
        if let Some(text) = text {
            return text.to_string();
        }
        let tag = if body.image_message.is_some() {
            "[image]"
        } else if body.audio_message.is_some() {
            "[audio]"
        } else if body.video_message.is_some() {
            "[video]"
        } else if body.document_message.is_some() {
            "[document]"
        } else if body.sticker_message.is_some() {
            "[sticker]"
        } else if body.location_message.is_some() {
            "[location]"
        } else if body.contact_message.is_some() {
            "[contact]"
        } else {
            placeholder_for_type(message_type)
        };
        return tag.to_string();
    }
    placeholder_for_type(message_type).to_string()
}

fn placeholder_for_type(message_type: &str) -> &'static str {
    match message_type {
        "imageMessage" => "[image]",
        "audioMessage" | "pttMessage" => "[audio]",
        "videoMessage" => "[video]",
        "documentMessage" | "documentWithCaptionMessage" => "[document]",
        "stickerMessage" => "[sticker]",
        "locationMessage" | "liveLocationMessage" => "[location]",
        "contactMessage" | "contactsArrayMessage" => "[contact]",
        _ => "[unsupported]",
    }
}

/// Webhook-to-inbox pipeline: conversation upsert, message append, summary,
/// live notification and CRM lead bookkeeping.
#[derive(Clone)]
pub struct IngestService {
    conversations: ConversationService,
    companies: CompanyService,
    leads: LeadService,
    events: LiveEvents,
    default_instance: String,
}

impl IngestService {
    pub fn new(
        conversations: ConversationService,
        companies: CompanyService,
        leads: LeadService,
        events: LiveEvents,
        default_instance: String,
    ) -> Self {
        Self {
            conversations,
            companies,
            leads,
            events,
            default_instance,
        }
    }

    pub async fn ingest(&self, payload: &GatewayPayload) -> Result<IngestOutcome> {
        let message = match normalize(payload, &self.default_instance) {
            Ok(message) => message,
            Err(reason) => {
                debug!(reason = reason.as_str(), "Ignoring gateway webhook");
                return Ok(IngestOutcome::Ignored(reason));
            }
        };

        let company_id = self
            .companies
            .find_by_instance(&message.instance)
            .await?
            .map(|c| c.id);

        let conversation = self
            .conversations
            .upsert(&ConversationKey {
                external_id: &message.remote_jid,
                instance: &message.instance,
                phone: &message.phone,
                contact_name: message.push_name.as_deref(),
                company_id,
                direction: message.direction,
            })
            .await?;

        let status = match message.direction {
            Direction::Inbound => MessageStatus::Received,
            Direction::Outbound => MessageStatus::Sent,
        };
        let Some(stored) = self
            .conversations
            .insert_message(CreateMessage {
                conversation_id: conversation.id,
                direction: message.direction,
                content: message.content.clone(),
                external_message_id: message.external_message_id.clone(),
                message_type: message.message_type.clone(),
                status,
            })
            .await?
        else {
            info!(
                conversation_id = %conversation.id,
                external_message_id = ?message.external_message_id,
                "Duplicate gateway delivery, message already stored"
            );
            return Ok(IngestOutcome::Duplicate {
                conversation_id: conversation.id,
            });
        };

        self.conversations
            .touch_summary(conversation.id, &message.content, Utc::now(), message.direction)
            .await?;

        let receivers = self.events.publish(LiveEvent::MessageReceived {
            conversation_id: conversation.id,
            company_id: conversation.company_id,
            phone: message.phone.clone(),
            content: message.content.clone(),
            direction: message.direction,
            instance: message.instance.clone(),
        });
        debug!(conversation_id = %conversation.id, receivers, "Published live message event");

        if message.direction == Direction::Inbound {
            if let Some(company_id) = conversation.company_id {
                match self
                    .leads
                    .ensure_lead(company_id, &message.phone, message.push_name.as_deref())
                    .await
                {
                    Ok(LeadOutcome::Touched(lead)) => {
                        debug!(lead_id = %lead.id, "Existing lead touched");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = ?e, %company_id, phone = %message.phone, "Lead bookkeeping failed");
                    }
                }
            }
        }

        Ok(IngestOutcome::Stored {
            conversation_id: conversation.id,
            message_id: stored.id,
        })
    }
}
