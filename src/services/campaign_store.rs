use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::campaign::{Campaign, CampaignContact, CampaignStatus, ContactStatus};
use crate::models::company::Company;

pub(crate) const CAMPAIGN_COLUMNS: &str = "id, company_id, name, message_template, start_time, end_time, delay_min, delay_max, status, scheduled_at, total_contacts, sent_count, failed_count, started_at, completed_at, created_at, updated_at";

pub(crate) const CONTACT_COLUMNS: &str =
    "id, campaign_id, phone, name, variables, status, error_message, retry_count, sent_at, created_at";

/// Persistence the dispatcher loop needs. Every method is a single statement;
/// nothing here spans a transaction.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn campaign(&self, id: Uuid) -> Result<Option<Campaign>>;

    async fn campaign_status(&self, id: Uuid) -> Result<Option<CampaignStatus>>;

    async fn company(&self, id: Uuid) -> Result<Option<Company>>;

    /// Pending contacts in creation order.
    async fn pending_contacts(&self, campaign_id: Uuid) -> Result<Vec<CampaignContact>>;

    /// pending -> sent plus `sent_count + 1`. Returns whether the counter
    /// moved; a contact that is no longer pending is left untouched.
    async fn mark_sent(&self, campaign_id: Uuid, contact_id: Uuid) -> Result<bool>;

    /// pending -> failed plus `failed_count + 1`.
    async fn mark_failed(&self, campaign_id: Uuid, contact_id: Uuid, error: &str)
        -> Result<bool>;

    async fn count_pending(&self, campaign_id: Uuid) -> Result<i64>;

    /// running -> completed. Returns false when the campaign left `running`
    /// in the meantime.
    async fn complete(&self, campaign_id: Uuid) -> Result<bool>;
}

#[derive(Clone)]
pub struct PgCampaignStore {
    pool: PgPool,
}

impl PgCampaignStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignStore for PgCampaignStore {
    async fn campaign(&self, id: Uuid) -> Result<Option<Campaign>> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM whatsapp_campaigns WHERE id = $1");
        let campaign = sqlx::query_as::<_, Campaign>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(campaign)
    }

    async fn campaign_status(&self, id: Uuid) -> Result<Option<CampaignStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM whatsapp_campaigns WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        status.map(|s| s.parse()).transpose()
    }

    async fn company(&self, id: Uuid) -> Result<Option<Company>> {
        let company = sqlx::query_as::<_, Company>(
            r#"SELECT id, name, whatsapp_instance, whatsapp_api_key, created_at FROM companies WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(company)
    }

    async fn pending_contacts(&self, campaign_id: Uuid) -> Result<Vec<CampaignContact>> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM whatsapp_campaign_contacts WHERE campaign_id = $1 AND status = $2 ORDER BY created_at ASC, id ASC"
        );
        let contacts = sqlx::query_as::<_, CampaignContact>(&sql)
            .bind(campaign_id)
            .bind(ContactStatus::Pending.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(contacts)
    }

    async fn mark_sent(&self, campaign_id: Uuid, contact_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            WITH updated AS (
                UPDATE whatsapp_campaign_contacts
                SET status = $3, sent_at = NOW(), error_message = NULL
                WHERE id = $1 AND campaign_id = $2 AND status = $4
                RETURNING id
            )
            UPDATE whatsapp_campaigns
            SET sent_count = sent_count + 1, updated_at = NOW()
            WHERE id = $2
              AND EXISTS (SELECT 1 FROM updated)
              AND sent_count + failed_count < total_contacts
            "#,
        )
        .bind(contact_id)
        .bind(campaign_id)
        .bind(ContactStatus::Sent.as_str())
        .bind(ContactStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(
        &self,
        campaign_id: Uuid,
        contact_id: Uuid,
        error: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            WITH updated AS (
                UPDATE whatsapp_campaign_contacts
                SET status = $4, error_message = $3, retry_count = retry_count + 1
                WHERE id = $1 AND campaign_id = $2 AND status = $5
                RETURNING id
            )
            UPDATE whatsapp_campaigns
            SET failed_count = failed_count + 1, updated_at = NOW()
            WHERE id = $2
              AND EXISTS (SELECT 1 FROM updated)
              AND sent_count + failed_count < total_contacts
            "#,
        )
        .bind(contact_id)
        .bind(campaign_id)
        .bind(error)
        .bind(ContactStatus::Failed.as_str())
        .bind(ContactStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_pending(&self, campaign_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM whatsapp_campaign_contacts WHERE campaign_id = $1 AND status = $2",
        )
        .bind(campaign_id)
        .bind(ContactStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn complete(&self, campaign_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE whatsapp_campaigns
            SET status = 'completed', completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
