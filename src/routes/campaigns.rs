use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::campaign_dto::{
        AddContactsPayload, AddContactsResponse, CampaignResponse, CreateCampaignPayload,
        ScheduleCampaignPayload,
    },
    error::Result,
    middleware::auth::Claims,
    models::campaign::{Campaign, CampaignContact, CampaignStatus},
    AppState,
};

async fn owned_campaign(state: &AppState, claims: &Claims, id: Uuid) -> Result<Campaign> {
    let campaign = state.campaign_service.get(id).await?;
    claims.ensure_company(campaign.company_id)?;
    Ok(campaign)
}

#[utoipa::path(
    post,
    path = "/api/campaigns",
    request_body = CreateCampaignPayload,
    responses(
        (status = 201, description = "Draft campaign created", body = Json<CampaignResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Company mismatch")
    )
)]
#[axum::debug_handler]
pub async fn create_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(mut payload): Json<CreateCampaignPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    if payload.company_id.is_none() {
        payload.company_id = claims.company_id;
    }
    claims.ensure_company(payload.company_id)?;

    let campaign = state.campaign_service.create(&payload).await?;
    info!(campaign_id = %campaign.id, contacts = campaign.total_contacts, "Campaign created");
    Ok((StatusCode::CREATED, Json(CampaignResponse::from(campaign))))
}

#[utoipa::path(
    get,
    path = "/api/campaigns/{id}",
    params(
        ("id" = Uuid, Path, description = "Campaign ID")
    ),
    responses(
        (status = 200, description = "Campaign with counters", body = Json<CampaignResponse>),
        (status = 404, description = "Campaign not found")
    )
)]
#[axum::debug_handler]
pub async fn get_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let campaign = owned_campaign(&state, &claims, id).await?;
    Ok(Json(CampaignResponse::from(campaign)))
}

#[axum::debug_handler]
pub async fn list_campaign_contacts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CampaignContact>>> {
    owned_campaign(&state, &claims, id).await?;
    let contacts = state.campaign_service.contacts(id).await?;
    Ok(Json(contacts))
}

#[utoipa::path(
    post,
    path = "/api/campaigns/{id}/contacts",
    params(
        ("id" = Uuid, Path, description = "Campaign ID")
    ),
    request_body = AddContactsPayload,
    responses(
        (status = 200, description = "Contacts appended", body = Json<AddContactsResponse>),
        (status = 400, description = "Campaign no longer accepts contacts"),
        (status = 404, description = "Campaign not found")
    )
)]
#[axum::debug_handler]
pub async fn add_contacts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddContactsPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    owned_campaign(&state, &claims, id).await?;

    let (campaign, added, skipped) = state
        .campaign_service
        .add_contacts(id, &payload.contacts)
        .await?;
    info!(campaign_id = %id, added, skipped, "Campaign contacts added");
    Ok(Json(AddContactsResponse {
        added,
        skipped,
        campaign: CampaignResponse::from(campaign),
    }))
}

#[utoipa::path(
    post,
    path = "/api/campaigns/{id}/schedule",
    params(
        ("id" = Uuid, Path, description = "Campaign ID")
    ),
    request_body = ScheduleCampaignPayload,
    responses(
        (status = 200, description = "Campaign scheduled", body = Json<CampaignResponse>),
        (status = 400, description = "Illegal transition")
    )
)]
#[axum::debug_handler]
pub async fn schedule_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScheduleCampaignPayload>,
) -> Result<impl IntoResponse> {
    owned_campaign(&state, &claims, id).await?;
    let campaign = state
        .campaign_service
        .schedule(id, payload.scheduled_at)
        .await?;
    info!(campaign_id = %id, scheduled_at = %payload.scheduled_at, "Campaign scheduled");
    Ok(Json(CampaignResponse::from(campaign)))
}

#[utoipa::path(
    post,
    path = "/api/campaigns/{id}/start",
    params(
        ("id" = Uuid, Path, description = "Campaign ID")
    ),
    responses(
        (status = 202, description = "Campaign running, dispatch started", body = Json<CampaignResponse>),
        (status = 400, description = "Illegal transition")
    )
)]
#[axum::debug_handler]
pub async fn start_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    owned_campaign(&state, &claims, id).await?;
    let campaign = state
        .campaign_service
        .transition(id, CampaignStatus::Running)
        .await?;
    let started = state.dispatcher.start_dispatch(id);
    info!(campaign_id = %id, started, "Campaign started");
    Ok((StatusCode::ACCEPTED, Json(CampaignResponse::from(campaign))))
}

#[utoipa::path(
    post,
    path = "/api/campaigns/{id}/pause",
    params(
        ("id" = Uuid, Path, description = "Campaign ID")
    ),
    responses(
        (status = 200, description = "Campaign paused", body = Json<CampaignResponse>),
        (status = 400, description = "Illegal transition")
    )
)]
#[axum::debug_handler]
pub async fn pause_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    owned_campaign(&state, &claims, id).await?;
    let campaign = state
        .campaign_service
        .transition(id, CampaignStatus::Paused)
        .await?;
    info!(campaign_id = %id, "Campaign paused");
    Ok(Json(CampaignResponse::from(campaign)))
}

#[utoipa::path(
    post,
    path = "/api/campaigns/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Campaign ID")
    ),
    responses(
        (status = 200, description = "Campaign cancelled", body = Json<CampaignResponse>),
        (status = 400, description = "Illegal transition")
    )
)]
#[axum::debug_handler]
pub async fn cancel_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    owned_campaign(&state, &claims, id).await?;
    let campaign = state
        .campaign_service
        .transition(id, CampaignStatus::Cancelled)
        .await?;
    info!(campaign_id = %id, "Campaign cancelled");
    Ok(Json(CampaignResponse::from(campaign)))
}
