use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub whatsapp_instance: Option<String>,
    #[serde(skip_serializing)]
    pub whatsapp_api_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
