pub mod campaign_dto;
pub mod conversation_dto;
pub mod webhook_dto;
