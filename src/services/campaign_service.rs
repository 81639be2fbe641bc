use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::campaign_dto::{ContactInput, CreateCampaignPayload};
use crate::error::{Error, Result};
use crate::models::campaign::{Campaign, CampaignContact, CampaignStatus};
use crate::services::campaign_store::{CAMPAIGN_COLUMNS, CONTACT_COLUMNS};
use crate::utils::phone::normalize_phone;

/// Contacts whose phone normalizes to fewer digits than this are rejected.
const MIN_PHONE_DIGITS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedContact {
    pub phone: String,
    pub name: Option<String>,
    pub variables: JsonValue,
}

/// Normalizes phones and drops unusable or repeated numbers.
/// Returns the kept contacts and how many were skipped.
pub fn prepare_contacts(contacts: &[ContactInput]) -> (Vec<PreparedContact>, usize) {
    let mut seen = std::collections::HashSet::new();
    let mut kept = Vec::with_capacity(contacts.len());
    for contact in contacts {
        let phone = normalize_phone(&contact.phone);
        if phone.len() < MIN_PHONE_DIGITS || !seen.insert(phone.clone()) {
            continue;
        }
        let variables = JsonValue::Object(
            contact
                .variables
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        kept.push(PreparedContact {
            phone,
            name: contact
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            variables,
        });
    }
    let skipped = contacts.len() - kept.len();
    (kept, skipped)
}

#[derive(Clone)]
pub struct CampaignService {
    pool: PgPool,
}

impl CampaignService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, payload: &CreateCampaignPayload) -> Result<Campaign> {
        if payload.delay_min > payload.delay_max {
            return Err(Error::BadRequest(
                "delay_min must not be greater than delay_max".into(),
            ));
        }
        let sql = format!(
            r#"
            INSERT INTO whatsapp_campaigns (company_id, name, message_template, start_time, end_time, delay_min, delay_max, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'draft')
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        );
        let campaign = sqlx::query_as::<_, Campaign>(&sql)
            .bind(payload.company_id)
            .bind(payload.name.trim())
            .bind(&payload.message_template)
            .bind(payload.start_time)
            .bind(payload.end_time)
            .bind(payload.delay_min)
            .bind(payload.delay_max)
            .fetch_one(&self.pool)
            .await?;

        if payload.contacts.is_empty() {
            return Ok(campaign);
        }
        let (campaign, _, _) = self.add_contacts(campaign.id, &payload.contacts).await?;
        Ok(campaign)
    }

    pub async fn get(&self, id: Uuid) -> Result<Campaign> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM whatsapp_campaigns WHERE id = $1");
        let campaign = sqlx::query_as::<_, Campaign>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Campaign not found".into()))?;
        Ok(campaign)
    }

    pub async fn contacts(&self, campaign_id: Uuid) -> Result<Vec<CampaignContact>> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM whatsapp_campaign_contacts WHERE campaign_id = $1 ORDER BY created_at ASC, id ASC"
        );
        let contacts = sqlx::query_as::<_, CampaignContact>(&sql)
            .bind(campaign_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(contacts)
    }

    /// Appends contacts and recomputes `total_contacts`. Returns the updated
    /// campaign, the number added and the number skipped.
    pub async fn add_contacts(
        &self,
        campaign_id: Uuid,
        contacts: &[ContactInput],
    ) -> Result<(Campaign, usize, usize)> {
        let campaign = self.get(campaign_id).await?;
        let status = campaign.status()?;
        if !status.accepts_contacts() {
            return Err(Error::BadRequest(format!(
                "Cannot add contacts to a {} campaign",
                status.as_str()
            )));
        }

        let (prepared, skipped) = prepare_contacts(contacts);
        let phones: Vec<String> = prepared.iter().map(|c| c.phone.clone()).collect();
        let names: Vec<Option<String>> = prepared.iter().map(|c| c.name.clone()).collect();
        let variables: Vec<JsonValue> = prepared.iter().map(|c| c.variables.clone()).collect();

        let mut tx = self.pool.begin().await?;
        let added = sqlx::query(
            r#"
            INSERT INTO whatsapp_campaign_contacts (campaign_id, phone, name, variables)
            SELECT $1, t.phone, t.name, t.variables
            FROM UNNEST($2::text[], $3::text[], $4::jsonb[]) WITH ORDINALITY AS t(phone, name, variables, ord)
            WHERE NOT EXISTS (
                SELECT 1 FROM whatsapp_campaign_contacts c
                WHERE c.campaign_id = $1 AND c.phone = t.phone
            )
            ORDER BY t.ord
            "#,
        )
        .bind(campaign_id)
        .bind(&phones)
        .bind(&names)
        .bind(&variables)
        .execute(&mut *tx)
        .await?
        .rows_affected() as usize;

        let sql = format!(
            r#"
            UPDATE whatsapp_campaigns
            SET total_contacts = (SELECT COUNT(*) FROM whatsapp_campaign_contacts WHERE campaign_id = $1),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        );
        let campaign = sqlx::query_as::<_, Campaign>(&sql)
            .bind(campaign_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        let skipped = skipped + (prepared.len() - added);
        Ok((campaign, added, skipped))
    }

    /// Moves a campaign along its lifecycle. The update is conditional on the
    /// status read beforehand, so a concurrent change surfaces as an error
    /// instead of being overwritten.
    pub async fn transition(&self, id: Uuid, next: CampaignStatus) -> Result<Campaign> {
        self.transition_with(id, next, None).await
    }

    pub async fn schedule(&self, id: Uuid, at: DateTime<Utc>) -> Result<Campaign> {
        self.transition_with(id, CampaignStatus::Scheduled, Some(at))
            .await
    }

    async fn transition_with(
        &self,
        id: Uuid,
        next: CampaignStatus,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Campaign> {
        let campaign = self.get(id).await?;
        let current = campaign.status()?;
        if !current.can_transition_to(next) {
            return Err(Error::BadRequest(format!(
                "Cannot move campaign from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }

        let sql = format!(
            r#"
            UPDATE whatsapp_campaigns
            SET status = $3,
                scheduled_at = COALESCE($4, scheduled_at),
                started_at = CASE WHEN $3 = 'running' THEN COALESCE(started_at, NOW()) ELSE started_at END,
                completed_at = CASE WHEN $3 IN ('completed', 'cancelled') THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Campaign>(&sql)
            .bind(id)
            .bind(current.as_str())
            .bind(next.as_str())
            .bind(scheduled_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::BadRequest("Campaign status changed concurrently".into()))
    }

    /// scheduled -> running for every campaign whose time has come.
    pub async fn promote_due(&self) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE whatsapp_campaigns
            SET status = 'running', started_at = COALESCE(started_at, NOW()), updated_at = NOW()
            WHERE status = 'scheduled' AND scheduled_at IS NOT NULL AND scheduled_at <= NOW()
            RETURNING id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn running_ids(&self) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM whatsapp_campaigns WHERE status = 'running' ORDER BY started_at ASC NULLS LAST",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
