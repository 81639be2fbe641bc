use std::time::Duration;

use tracing::{debug, error, info};

use crate::error::Result;
use crate::services::campaign_dispatcher::CampaignDispatcher;
use crate::services::campaign_service::CampaignService;

/// Periodic trigger that starts due scheduled campaigns and re-enters running
/// ones, e.g. after a pass stopped at the end of the sending window.
#[derive(Clone)]
pub struct CampaignScheduler {
    campaigns: CampaignService,
    dispatcher: CampaignDispatcher,
}

impl CampaignScheduler {
    pub fn new(campaigns: CampaignService, dispatcher: CampaignDispatcher) -> Self {
        Self {
            campaigns,
            dispatcher,
        }
    }

    /// Returns how many dispatch tasks were started.
    pub async fn tick(&self) -> Result<usize> {
        let promoted = self.campaigns.promote_due().await?;
        for id in &promoted {
            info!(campaign_id = %id, "Scheduled campaign is due, now running");
        }

        let mut started = 0;
        for id in self.campaigns.running_ids().await? {
            if self.dispatcher.start_dispatch(id) {
                started += 1;
            }
        }
        if started > 0 {
            debug!(started, "Scheduler started campaign dispatches");
        }
        Ok(started)
    }

    pub async fn run(self, interval: Duration) {
        loop {
            if let Err(e) = self.tick().await {
                error!(error = ?e, "Campaign scheduler tick failed");
            }
            tokio::time::sleep(interval).await;
        }
    }
}
