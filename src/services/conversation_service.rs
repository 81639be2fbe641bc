use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::conversation::{Conversation, ConversationStatus};
use crate::models::message::{CreateMessage, Direction, Message};

const CONVERSATION_COLUMNS: &str = "id, company_id, external_id, instance, phone, contact_name, is_group, status, assigned_user_id, last_message, last_message_at, unread_count, created_at, updated_at";

/// Identity and metadata of the chat an event belongs to.
#[derive(Debug, Clone)]
pub struct ConversationKey<'a> {
    pub external_id: &'a str,
    pub instance: &'a str,
    pub phone: &'a str,
    pub contact_name: Option<&'a str>,
    pub company_id: Option<Uuid>,
    pub direction: Direction,
}

#[derive(Clone)]
pub struct ConversationService {
    pool: PgPool,
}

impl ConversationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One row per `(external_id, instance)`. New rows start `open` when the
    /// first event is outbound and `pending` otherwise; outbound traffic on an
    /// existing row opens it.
    pub async fn upsert(&self, key: &ConversationKey<'_>) -> Result<Conversation> {
        let outbound = key.direction == Direction::Outbound;
        let initial_status = if outbound {
            ConversationStatus::Open
        } else {
            ConversationStatus::Pending
        };

        let sql = format!(
            r#"
            INSERT INTO whatsapp_conversations (company_id, external_id, instance, phone, contact_name, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (external_id, instance) DO UPDATE SET
                contact_name = COALESCE(EXCLUDED.contact_name, whatsapp_conversations.contact_name),
                company_id = COALESCE(whatsapp_conversations.company_id, EXCLUDED.company_id),
                status = CASE WHEN $7 THEN 'open' ELSE whatsapp_conversations.status END,
                updated_at = NOW()
            RETURNING {CONVERSATION_COLUMNS}
            "#
        );
        let conversation = sqlx::query_as::<_, Conversation>(&sql)
            .bind(key.company_id)
            .bind(key.external_id)
            .bind(key.instance)
            .bind(key.phone)
            .bind(key.contact_name)
            .bind(initial_status.as_str())
            .bind(outbound)
            .fetch_one(&self.pool)
            .await?;
        Ok(conversation)
    }

    /// `None` when the gateway already delivered a message with the same id
    /// for this conversation.
    pub async fn insert_message(&self, msg: CreateMessage) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO whatsapp_messages (conversation_id, direction, content, external_message_id, message_type, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (conversation_id, external_message_id) DO NOTHING
            RETURNING id, conversation_id, direction, content, external_message_id, message_type, status, sent_at, created_at
            "#,
        )
        .bind(msg.conversation_id)
        .bind(msg.direction.as_str())
        .bind(&msg.content)
        .bind(&msg.external_message_id)
        .bind(&msg.message_type)
        .bind(msg.status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    pub async fn touch_summary(
        &self,
        conversation_id: Uuid,
        content: &str,
        at: DateTime<Utc>,
        direction: Direction,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE whatsapp_conversations
            SET last_message = $2,
                last_message_at = $3,
                unread_count = unread_count + CASE WHEN $4 THEN 1 ELSE 0 END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(content)
        .bind(at)
        .bind(direction == Direction::Inbound)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Conversation> {
        let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM whatsapp_conversations WHERE id = $1");
        let conversation = sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(conversation)
    }

    /// `company_id` scopes the listing to one tenant; `None` lists every tenant.
    pub async fn list(
        &self,
        company_id: Option<Uuid>,
        instance: Option<&str>,
        status: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Conversation>> {
        let sql = format!(
            r#"
            SELECT {CONVERSATION_COLUMNS} FROM whatsapp_conversations
            WHERE ($1::text IS NULL OR instance = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($4::uuid IS NULL OR company_id = $4)
            ORDER BY last_message_at DESC NULLS LAST, created_at DESC
            LIMIT $3
            "#
        );
        let conversations = sqlx::query_as::<_, Conversation>(&sql)
            .bind(instance)
            .bind(status)
            .bind(limit.clamp(1, 500))
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(conversations)
    }

    pub async fn messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, direction, content, external_message_id, message_type, status, sent_at, created_at
            FROM whatsapp_messages
            WHERE conversation_id = $1
            ORDER BY sent_at ASC, created_at ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    pub async fn mark_read(&self, conversation_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"UPDATE whatsapp_conversations SET unread_count = 0, updated_at = NOW() WHERE id = $1"#,
        )
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn open(&self, conversation_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"UPDATE whatsapp_conversations SET status = 'open', updated_at = NOW() WHERE id = $1 AND status <> 'open'"#,
        )
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
