use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationListQuery {
    pub instance: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReplyPayload {
    #[validate(length(min = 1, max = 4096))]
    pub text: String,
}
