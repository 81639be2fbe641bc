use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value as JsonValue};
use subtle::ConstantTimeEq;
use tracing::{error, warn};

use crate::{
    dto::webhook_dto::GatewayPayload, services::ingest_service::IngestOutcome, AppState,
};

type Ack = (StatusCode, Json<JsonValue>);

fn ack(status: &str) -> Ack {
    (StatusCode::OK, Json(json!({ "status": status })))
}

/// Gateway webhook. Always answers 200 so the gateway never retries;
/// failures are logged instead.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Ack {
    process(&state, &headers, &body, None).await
}

/// Same as [`handle_webhook`] for gateways configured with one URL per event,
/// e.g. `/api/webhook/whatsapp/messages-upsert`.
pub async fn handle_webhook_event(
    State(state): State<AppState>,
    Path(event): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Ack {
    process(&state, &headers, &body, Some(&event)).await
}

async fn process(state: &AppState, headers: &HeaderMap, body: &[u8], event_hint: Option<&str>) -> Ack {
    if !token_matches(state.webhook_token.as_deref(), headers) {
        warn!("Webhook call with missing or wrong apikey, ignoring");
        return ack("ignored");
    }

    let value: JsonValue = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Webhook body is not JSON, ignoring");
            return ack("ignored");
        }
    };

    let payload = GatewayPayload::decode_with_hint(value, event_hint);
    match state.ingest_service.ingest(&payload).await {
        Ok(IngestOutcome::Stored { .. }) => ack("stored"),
        Ok(IngestOutcome::Duplicate { .. }) => ack("duplicate"),
        Ok(IngestOutcome::Ignored(_)) => ack("ignored"),
        Err(e) => {
            error!(error = ?e, "Webhook ingestion failed");
            ack("error")
        }
    }
}

fn token_matches(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    let Some(provided) = headers.get("apikey").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    ConstantTimeEq::ct_eq(provided.as_bytes(), expected.as_bytes()).into()
}
