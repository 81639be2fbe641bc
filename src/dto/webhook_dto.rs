use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

/// The shapes the WhatsApp gateway is known to post. Decoding never fails:
/// anything without an event name ends up as `Unrecognized`.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayPayload {
    /// `[ { ...event... } ]`, only the first element is considered.
    ArrayWrapped(GatewayEvent),
    /// `{ "type": "...", "data": { ... } }`
    DataWrapped(GatewayEvent),
    /// `{ "event": "...", "instance": "...", "data": { ... } }` or the data inline.
    Flat(GatewayEvent),
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayEvent {
    pub kind: EventKind,
    pub instance: Option<String>,
    pub data: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    MessagesUpsert,
    Other(String),
}

impl EventKind {
    /// `MESSAGES_UPSERT`, `messages.upsert` and `messages-upsert` are one event.
    pub fn parse(raw: &str) -> Self {
        let canonical = raw.trim().to_lowercase().replace(['_', '-'], ".");
        match canonical.as_str() {
            "messages.upsert" => EventKind::MessagesUpsert,
            _ => EventKind::Other(canonical),
        }
    }
}

impl GatewayPayload {
    pub fn decode(value: JsonValue) -> Self {
        Self::decode_with_hint(value, None)
    }

    /// `event_hint` comes from a per-event webhook path and is used when the body
    /// itself carries no event name.
    pub fn decode_with_hint(value: JsonValue, event_hint: Option<&str>) -> Self {
        let wrapped = value.get("type").and_then(JsonValue::as_str).is_some()
            && value.get("data").is_some();
        match value {
            JsonValue::Array(items) => match items.into_iter().next() {
                Some(first) => match Self::decode_object(first, event_hint) {
                    Some(event) => GatewayPayload::ArrayWrapped(event),
                    None => GatewayPayload::Unrecognized,
                },
                None => GatewayPayload::Unrecognized,
            },
            object @ JsonValue::Object(_) => match Self::decode_object(object, event_hint) {
                Some(event) if wrapped => GatewayPayload::DataWrapped(event),
                Some(event) => GatewayPayload::Flat(event),
                None => GatewayPayload::Unrecognized,
            },
            _ => GatewayPayload::Unrecognized,
        }
    }

    fn decode_object(value: JsonValue, event_hint: Option<&str>) -> Option<GatewayEvent> {
        let JsonValue::Object(mut map) = value else {
            return None;
        };

        let instance_of = |v: &JsonValue| -> Option<String> {
            v.get("instance")
                .or_else(|| v.get("instanceName"))
                .and_then(JsonValue::as_str)
                .map(str::to_string)
        };

        let type_name = map.get("type").and_then(JsonValue::as_str).map(str::to_string);
        if let (Some(kind), true) = (type_name, map.contains_key("data")) {
            let data = map.remove("data").unwrap_or(JsonValue::Null);
            let instance = instance_of(&JsonValue::Object(map.clone())).or_else(|| instance_of(&data));
            return Some(GatewayEvent {
                kind: EventKind::parse(&kind),
                instance,
                data,
            });
        }

        let event_name = map
            .get("event")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .or_else(|| event_hint.map(str::to_string))?;
        map.remove("event");
        let instance = instance_of(&JsonValue::Object(map.clone()));
        let data = match map.remove("data") {
            Some(data) => data,
            None => JsonValue::Object(map),
        };
        Some(GatewayEvent {
            kind: EventKind::parse(&event_name),
            instance,
            data,
        })
    }

    pub fn event(&self) -> Option<&GatewayEvent> {
        match self {
            GatewayPayload::ArrayWrapped(event)
            | GatewayPayload::DataWrapped(event)
            | GatewayPayload::Flat(event) => Some(event),
            GatewayPayload::Unrecognized => None,
        }
    }
}

/// Body of a `messages.upsert` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertData {
    pub key: Option<MessageKey>,
    pub push_name: Option<String>,
    pub message_type: Option<String>,
    pub message: Option<MessageBody>,
}

impl UpsertData {
    /// Some gateway versions send `data: { messages: [...] }` or a bare array.
    pub fn from_event_data(data: &JsonValue) -> Option<Self> {
        let item = match data {
            JsonValue::Array(items) => items.first()?,
            JsonValue::Object(map) => match map.get("messages") {
                Some(JsonValue::Array(items)) => items.first()?,
                _ => data,
            },
            _ => return None,
        };
        match serde_json::from_value(item.clone()) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(error = %e, "Could not decode messages.upsert data");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    pub remote_jid: String,
    /// Some gateway builds send `null` instead of `false`.
    #[serde(default)]
    pub from_me: Option<bool>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    pub conversation: Option<String>,
    pub extended_text_message: Option<ExtendedText>,
    pub image_message: Option<MediaMessage>,
    pub video_message: Option<JsonValue>,
    pub audio_message: Option<JsonValue>,
    pub document_message: Option<JsonValue>,
    pub sticker_message: Option<JsonValue>,
    pub location_message: Option<JsonValue>,
    pub contact_message: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedText {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaMessage {
    pub caption: Option<String>,
}
