use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::lead::{Lead, Stage};

const LEAD_COLUMNS: &str = "id, company_id, stage_id, name, phone, source, created_at, updated_at";

#[derive(Debug, Clone)]
pub enum LeadOutcome {
    Created(Lead),
    Touched(Lead),
    /// The tenant has no pipeline stages to put a lead in.
    NoStage,
}

#[derive(sqlx::FromRow)]
struct UpsertedLead {
    #[sqlx(flatten)]
    lead: Lead,
    inserted: bool,
}

#[derive(Clone)]
pub struct LeadService {
    pool: PgPool,
}

impl LeadService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn first_stage(&self, company_id: Uuid) -> Result<Option<Stage>> {
        let stage = sqlx::query_as::<_, Stage>(
            r#"
            SELECT id, company_id, name, position, created_at
            FROM crm_stages
            WHERE company_id = $1
            ORDER BY position ASC, created_at ASC
            LIMIT 1
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stage)
    }

    /// Creates a lead in the tenant's first stage for a phone seen for the first
    /// time, or bumps `updated_at` on the existing one. The unique
    /// `(company_id, phone)` index makes concurrent first messages converge on
    /// one row.
    pub async fn ensure_lead(
        &self,
        company_id: Uuid,
        phone: &str,
        name: Option<&str>,
    ) -> Result<LeadOutcome> {
        let sql = format!(
            r#"
            UPDATE crm_leads SET updated_at = NOW()
            WHERE company_id = $1 AND phone = $2
            RETURNING {LEAD_COLUMNS}
            "#
        );
        let touched = sqlx::query_as::<_, Lead>(&sql)
            .bind(company_id)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(lead) = touched {
            return Ok(LeadOutcome::Touched(lead));
        }

        let Some(stage) = self.first_stage(company_id).await? else {
            warn!(%company_id, "No CRM stage configured, skipping lead creation");
            return Ok(LeadOutcome::NoStage);
        };

        let display_name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(phone);
        let sql = format!(
            r#"
            INSERT INTO crm_leads (company_id, stage_id, name, phone, source)
            VALUES ($1, $2, $3, $4, 'whatsapp')
            ON CONFLICT (company_id, phone) DO UPDATE SET updated_at = NOW()
            RETURNING {LEAD_COLUMNS}, (xmax = 0) AS inserted
            "#
        );
        let upserted = sqlx::query_as::<_, UpsertedLead>(&sql)
            .bind(company_id)
            .bind(stage.id)
            .bind(display_name)
            .bind(phone)
            .fetch_one(&self.pool)
            .await?;

        if !upserted.inserted {
            return Ok(LeadOutcome::Touched(upserted.lead));
        }
        info!(%company_id, lead_id = %upserted.lead.id, stage = %stage.name, "Created lead from WhatsApp contact");
        Ok(LeadOutcome::Created(upserted.lead))
    }
}
