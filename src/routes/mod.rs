pub mod campaigns;
pub mod conversations;
pub mod events;
pub mod health;
pub mod whatsapp_webhook;

use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    config::Config,
    middleware::{
        auth::{require_bearer_auth, require_campaign_manager},
        rate_limit::{rps_middleware, RateLimiter},
    },
    AppState,
};

/// Full HTTP surface: public health and webhook routes, the bearer-protected
/// inbox and the manager-only campaign routes.
pub fn router(state: AppState, config: &Config) -> Router {
    let base_routes = Router::new().route("/health", get(health::health));

    let webhook_api = Router::new()
        .route(
            "/api/webhook/whatsapp",
            post(whatsapp_webhook::handle_webhook),
        )
        .route(
            "/api/webhook/whatsapp/:event",
            post(whatsapp_webhook::handle_webhook_event),
        )
        .layer(axum::middleware::from_fn_with_state(
            RateLimiter::new(config.webhook_rps),
            rps_middleware,
        ));

    let api_limiter = RateLimiter::new(config.api_rps);

    let inbox_api = Router::new()
        .route("/api/conversations", get(conversations::list_conversations))
        .route(
            "/api/conversations/:id/messages",
            get(conversations::list_messages).post(conversations::reply),
        )
        .route("/api/conversations/:id/read", post(conversations::mark_read))
        .route("/api/events", get(events::stream_events))
        .layer(axum::middleware::from_fn(require_bearer_auth))
        .layer(axum::middleware::from_fn_with_state(
            api_limiter.clone(),
            rps_middleware,
        ));

    let campaign_api = Router::new()
        .route("/api/campaigns", post(campaigns::create_campaign))
        .route("/api/campaigns/:id", get(campaigns::get_campaign))
        .route(
            "/api/campaigns/:id/contacts",
            get(campaigns::list_campaign_contacts).post(campaigns::add_contacts),
        )
        .route(
            "/api/campaigns/:id/schedule",
            post(campaigns::schedule_campaign),
        )
        .route("/api/campaigns/:id/start", post(campaigns::start_campaign))
        .route("/api/campaigns/:id/pause", post(campaigns::pause_campaign))
        .route("/api/campaigns/:id/cancel", post(campaigns::cancel_campaign))
        .layer(axum::middleware::from_fn(require_campaign_manager))
        .layer(axum::middleware::from_fn_with_state(
            api_limiter,
            rps_middleware,
        ));

    base_routes
        .merge(webhook_api)
        .merge(inbox_api)
        .merge(campaign_api)
        .with_state(state)
}
