use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::conversation_dto::{ConversationListQuery, ReplyPayload},
    error::Result,
    middleware::auth::Claims,
    models::conversation::{Conversation, ConversationStatus},
    models::message::Message,
    AppState,
};

const DEFAULT_LIST_LIMIT: i64 = 100;

async fn owned_conversation(state: &AppState, claims: &Claims, id: Uuid) -> Result<Conversation> {
    let conversation = state.conversation_service.get(id).await?;
    claims.ensure_company(conversation.company_id)?;
    Ok(conversation)
}

#[utoipa::path(
    get,
    path = "/api/conversations",
    params(
        ("instance" = Option<String>, Query, description = "Gateway instance"),
        ("status" = Option<String>, Query, description = "pending | open | closed"),
        ("limit" = Option<i64>, Query, description = "Max rows, default 100")
    ),
    responses(
        (status = 200, description = "Conversations by last activity", body = Json<Vec<Conversation>>),
        (status = 400, description = "Unknown status")
    )
)]
#[axum::debug_handler]
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ConversationListQuery>,
) -> Result<Json<Vec<Conversation>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<ConversationStatus>)
        .transpose()?;
    let conversations = state
        .conversation_service
        .list(
            claims.company_id,
            query.instance.as_deref(),
            status.map(|s| s.as_str()),
            query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        )
        .await?;
    Ok(Json(conversations))
}

#[utoipa::path(
    get,
    path = "/api/conversations/{id}/messages",
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    ),
    responses(
        (status = 200, description = "Messages in chronological order", body = Json<Vec<Message>>),
        (status = 404, description = "Conversation not found")
    )
)]
#[axum::debug_handler]
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>> {
    owned_conversation(&state, &claims, id).await?;
    let messages = state.conversation_service.messages(id).await?;
    Ok(Json(messages))
}

#[utoipa::path(
    post,
    path = "/api/conversations/{id}/read",
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    ),
    responses(
        (status = 200, description = "Unread counter reset"),
        (status = 404, description = "Conversation not found")
    )
)]
#[axum::debug_handler]
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    owned_conversation(&state, &claims, id).await?;
    state.conversation_service.mark_read(id).await?;
    Ok(Json(json!({ "status": "ok" })))
}

#[utoipa::path(
    post,
    path = "/api/conversations/{id}/messages",
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    ),
    request_body = ReplyPayload,
    responses(
        (status = 201, description = "Reply sent and stored", body = Json<Message>),
        (status = 400, description = "Invalid payload or group conversation"),
        (status = 502, description = "Gateway rejected the message")
    )
)]
#[axum::debug_handler]
pub async fn reply(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReplyPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    owned_conversation(&state, &claims, id).await?;
    let message = state.reply_service.reply(id, payload.text.trim()).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
