pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    campaign_dispatcher::CampaignDispatcher,
    campaign_scheduler::CampaignScheduler,
    campaign_service::CampaignService,
    campaign_store::PgCampaignStore,
    company_service::CompanyService,
    conversation_service::ConversationService,
    gateway_service::{EvolutionGateway, GatewayCredentials, MessageGateway},
    ingest_service::IngestService,
    lead_service::LeadService,
    live_events::LiveEvents,
    reply_service::ReplyService,
};
use crate::utils::time::{Clock, LocalClock};
use reqwest::Client;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub conversation_service: ConversationService,
    pub ingest_service: IngestService,
    pub reply_service: ReplyService,
    pub campaign_service: CampaignService,
    pub dispatcher: CampaignDispatcher,
    pub live_events: LiveEvents,
    pub webhook_token: Option<String>,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let gateway = EvolutionGateway::new(&config.evolution_api_url, http_client)?;
        Ok(Self::with_parts(
            pool,
            config,
            Arc::new(gateway),
            Arc::new(LocalClock::new(config.campaign_utc_offset)),
        ))
    }

    /// Wires the services around a given gateway and clock.
    pub fn with_parts(
        pool: PgPool,
        config: &Config,
        gateway: Arc<dyn MessageGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let default_credentials = GatewayCredentials {
            instance: config.evolution_instance.clone(),
            api_key: config.evolution_api_key.clone(),
        };
        let live_events = LiveEvents::default();
        let conversation_service = ConversationService::new(pool.clone());
        let company_service = CompanyService::new(pool.clone());
        let ingest_service = IngestService::new(
            conversation_service.clone(),
            company_service.clone(),
            LeadService::new(pool.clone()),
            live_events.clone(),
            config.evolution_instance.clone(),
        );
        let reply_service = ReplyService::new(
            conversation_service.clone(),
            company_service,
            gateway.clone(),
            default_credentials.clone(),
        );
        let dispatcher = CampaignDispatcher::new(
            Arc::new(PgCampaignStore::new(pool.clone())),
            gateway,
            clock,
            default_credentials,
        );

        Self {
            conversation_service,
            ingest_service,
            reply_service,
            campaign_service: CampaignService::new(pool.clone()),
            dispatcher,
            live_events,
            webhook_token: config.webhook_token.clone(),
            pool,
        }
    }

    pub fn scheduler(&self) -> CampaignScheduler {
        CampaignScheduler::new(self.campaign_service.clone(), self.dispatcher.clone())
    }
}
