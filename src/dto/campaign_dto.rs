use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::models::campaign::Campaign;

fn default_start_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default()
}

fn default_end_time() -> NaiveTime {
    NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default()
}

fn default_delay_min() -> i32 {
    5
}

fn default_delay_max() -> i32 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCampaignPayload {
    pub company_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 4096))]
    pub message_template: String,
    #[serde(default = "default_start_time")]
    pub start_time: NaiveTime,
    #[serde(default = "default_end_time")]
    pub end_time: NaiveTime,
    #[serde(default = "default_delay_min")]
    #[validate(range(min = 0, max = 3600))]
    pub delay_min: i32,
    #[serde(default = "default_delay_max")]
    #[validate(range(min = 0, max = 3600))]
    pub delay_max: i32,
    #[serde(default)]
    pub contacts: Vec<ContactInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInput {
    pub phone: String,
    pub name: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddContactsPayload {
    #[validate(length(min = 1, max = 10000))]
    pub contacts: Vec<ContactInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleCampaignPayload {
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignResponse {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub pending_count: i32,
}

impl From<Campaign> for CampaignResponse {
    fn from(campaign: Campaign) -> Self {
        let pending_count =
            (campaign.total_contacts - campaign.sent_count - campaign.failed_count).max(0);
        Self {
            campaign,
            pending_count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddContactsResponse {
    pub added: usize,
    pub skipped: usize,
    pub campaign: CampaignResponse,
}
