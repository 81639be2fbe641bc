pub mod campaign_dispatcher;
pub mod campaign_scheduler;
pub mod campaign_service;
pub mod campaign_store;
pub mod company_service;
pub mod conversation_service;
pub mod gateway_service;
pub mod ingest_service;
pub mod lead_service;
pub mod live_events;
pub mod reply_service;
