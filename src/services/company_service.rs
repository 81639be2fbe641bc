use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::company::Company;

#[derive(Clone)]
pub struct CompanyService {
    pool: PgPool,
}

impl CompanyService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Company>> {
        let company = sqlx::query_as::<_, Company>(
            r#"SELECT id, name, whatsapp_instance, whatsapp_api_key, created_at FROM companies WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(company)
    }

    /// Tenant owning a gateway instance, if any company claims it.
    pub async fn find_by_instance(&self, instance: &str) -> Result<Option<Company>> {
        let company = sqlx::query_as::<_, Company>(
            r#"SELECT id, name, whatsapp_instance, whatsapp_api_key, created_at FROM companies WHERE whatsapp_instance = $1"#,
        )
        .bind(instance)
        .fetch_optional(&self.pool)
        .await?;
        Ok(company)
    }
}
