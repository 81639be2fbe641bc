use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::campaign::{Campaign, CampaignContact, CampaignStatus};
use crate::services::campaign_store::CampaignStore;
use crate::services::gateway_service::{GatewayCredentials, MessageGateway};
use crate::utils::phone::normalize_phone;
use crate::utils::template::render_template;
use crate::utils::time::{random_delay, within_window, Clock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every pending contact was attempted.
    Exhausted,
    /// The campaign was paused or cancelled while sending.
    NotRunning,
    /// The local time left the sending window; a later tick resumes.
    OutsideWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: u32,
    pub failed: u32,
    pub stop: StopReason,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Another task in this process is already sending this campaign.
    AlreadyActive,
    /// The campaign is not in `running`; nothing was sent.
    Skipped(CampaignStatus),
    Ran(DispatchReport),
}

type ActiveSet = Arc<Mutex<HashSet<Uuid>>>;

/// Holds a campaign id in the active set and releases it on drop, whatever
/// way the dispatch loop ends.
struct ActiveGuard {
    active: ActiveSet,
    campaign_id: Uuid,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.campaign_id);
        }
    }
}

/// Sends campaign messages one contact at a time. The active set only guards
/// against concurrent loops inside this process.
#[derive(Clone)]
pub struct CampaignDispatcher {
    store: Arc<dyn CampaignStore>,
    gateway: Arc<dyn MessageGateway>,
    clock: Arc<dyn Clock>,
    default_credentials: GatewayCredentials,
    active: ActiveSet,
}

impl CampaignDispatcher {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        gateway: Arc<dyn MessageGateway>,
        clock: Arc<dyn Clock>,
        default_credentials: GatewayCredentials,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            default_credentials,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_active(&self, campaign_id: Uuid) -> bool {
        self.active
            .lock()
            .map(|active| active.contains(&campaign_id))
            .unwrap_or(false)
    }

    fn try_acquire(&self, campaign_id: Uuid) -> Option<ActiveGuard> {
        let mut active = self.active.lock().ok()?;
        if !active.insert(campaign_id) {
            return None;
        }
        Some(ActiveGuard {
            active: self.active.clone(),
            campaign_id,
        })
    }

    /// Starts a detached dispatch task. Returns false when one is already
    /// running for this campaign.
    pub fn start_dispatch(&self, campaign_id: Uuid) -> bool {
        let Some(guard) = self.try_acquire(campaign_id) else {
            debug!(%campaign_id, "Dispatch already active, not starting another");
            return false;
        };
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            match dispatcher.dispatch_loop(campaign_id).await {
                Ok(outcome) => debug!(%campaign_id, ?outcome, "Dispatch task finished"),
                Err(e) => error!(%campaign_id, error = ?e, "Campaign dispatch failed"),
            }
        });
        true
    }

    /// Runs the loop on the current task.
    pub async fn run_dispatch(&self, campaign_id: Uuid) -> Result<DispatchOutcome> {
        let Some(_guard) = self.try_acquire(campaign_id) else {
            return Ok(DispatchOutcome::AlreadyActive);
        };
        self.dispatch_loop(campaign_id).await
    }

    async fn dispatch_loop(&self, campaign_id: Uuid) -> Result<DispatchOutcome> {
        let campaign = self
            .store
            .campaign(campaign_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Campaign {} not found", campaign_id)))?;
        let status = campaign.status()?;
        if status != CampaignStatus::Running {
            debug!(%campaign_id, status = status.as_str(), "Campaign not running, skipping dispatch");
            return Ok(DispatchOutcome::Skipped(status));
        }

        let company = match campaign.company_id {
            Some(company_id) => self.store.company(company_id).await?,
            None => None,
        };
        let credentials = GatewayCredentials::resolve(company.as_ref(), &self.default_credentials);

        let contacts = self.store.pending_contacts(campaign_id).await?;
        info!(
            %campaign_id,
            pending = contacts.len(),
            instance = %credentials.instance,
            "Starting campaign dispatch"
        );

        let mut report = DispatchReport {
            sent: 0,
            failed: 0,
            stop: StopReason::Exhausted,
            completed: false,
        };

        let total = contacts.len();
        for (index, contact) in contacts.iter().enumerate() {
            match self.store.campaign_status(campaign_id).await? {
                Some(CampaignStatus::Running) => {}
                other => {
                    info!(%campaign_id, status = ?other, "Campaign left running, stopping dispatch");
                    report.stop = StopReason::NotRunning;
                    break;
                }
            }

            let now = self.clock.time_of_day();
            if !within_window(now, campaign.start_time, campaign.end_time) {
                info!(
                    %campaign_id,
                    %now,
                    start = %campaign.start_time,
                    end = %campaign.end_time,
                    "Outside sending window, pausing until next tick"
                );
                report.stop = StopReason::OutsideWindow;
                break;
            }

            match self.send_one(&campaign, &credentials, contact).await {
                Ok(()) => {
                    // Delivered already; a store error here must not count the contact as failed.
                    if let Err(e) = self.store.mark_sent(campaign_id, contact.id).await {
                        error!(%campaign_id, contact_id = %contact.id, error = ?e, "Could not record sent contact, stopping dispatch");
                        return Err(e);
                    }
                    report.sent += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    let reason = e.to_string();
                    warn!(%campaign_id, contact_id = %contact.id, error = %reason, "Campaign message failed");
                    if let Err(e) = self.store.mark_failed(campaign_id, contact.id, &reason).await {
                        error!(%campaign_id, contact_id = %contact.id, error = ?e, "Could not record failed contact");
                    }
                }
            }

            if index + 1 < total {
                let delay = random_delay(campaign.delay_min, campaign.delay_max);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        let remaining = self.store.count_pending(campaign_id).await?;
        if remaining == 0 {
            report.completed = self.store.complete(campaign_id).await?;
            if report.completed {
                info!(%campaign_id, sent = report.sent, failed = report.failed, "Campaign completed");
            }
        } else {
            debug!(%campaign_id, remaining, stop = ?report.stop, "Dispatch pass ended with contacts pending");
        }

        Ok(DispatchOutcome::Ran(report))
    }

    async fn send_one(
        &self,
        campaign: &Campaign,
        credentials: &GatewayCredentials,
        contact: &CampaignContact,
    ) -> Result<()> {
        let number = normalize_phone(&contact.phone);
        let text = render_template(
            &campaign.message_template,
            contact.name.as_deref(),
            &contact.phone,
            &contact.variables,
        );
        self.gateway.send_text(credentials, &number, &text).await?;
        Ok(())
    }
}
