// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign lifecycle control.
//!
//! Status changes go through compare-and-set updates on the campaign row,
//! so exactly one caller wins a launch/pause/resume race and the loser
//! gets a [`SwitchboardError::CampaignConflict`] naming the actual status.
//! Pausing joins the runner task before returning: once `pause` comes
//! back, the persisted cursor is the exact resume point.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use switchboard_config::model::{CampaignConfig, SwitchboardConfig};
use switchboard_core::{
    Campaign, CampaignProgress, CampaignStatus, ChannelKind, SwitchboardError,
};
use switchboard_engine::ConversationEngine;
use switchboard_store::{now_rfc3339, SqliteStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatch::run_dispatch;

/// Everything needed to create a campaign; the recipient list is frozen
/// into a snapshot at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSpec {
    pub name: String,
    pub template: String,
    pub channel: ChannelKind,
    pub rate_per_second: u32,
    pub recipients: Vec<String>,
}

/// A campaign row together with its per-status recipient counts.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignReport {
    pub campaign: Campaign,
    pub progress: CampaignProgress,
}

pub(crate) struct RunnerHandle {
    pub(crate) token: CancellationToken,
    pub(crate) handle: JoinHandle<()>,
}

/// Owns the running dispatch tasks and the campaign status machine.
pub struct CampaignManager {
    store: Arc<SqliteStore>,
    engine: Arc<ConversationEngine>,
    config: CampaignConfig,
    runners: Arc<DashMap<String, RunnerHandle>>,
}

impl CampaignManager {
    pub fn new(
        store: Arc<SqliteStore>,
        engine: Arc<ConversationEngine>,
        config: &SwitchboardConfig,
    ) -> Self {
        Self {
            store,
            engine,
            config: config.campaign.clone(),
            runners: Arc::new(DashMap::new()),
        }
    }

    /// Create a draft campaign with a frozen recipient snapshot.
    pub async fn create(&self, spec: CampaignSpec) -> Result<Campaign, SwitchboardError> {
        if spec.recipients.is_empty() {
            return Err(SwitchboardError::Config(
                "campaign needs at least one recipient".to_string(),
            ));
        }
        if spec.template.trim().is_empty() {
            return Err(SwitchboardError::Config(
                "campaign template must not be empty".to_string(),
            ));
        }
        if spec.rate_per_second == 0 {
            return Err(SwitchboardError::Config(
                "campaign rate_per_second must be at least 1".to_string(),
            ));
        }

        let campaign = Campaign {
            id: Uuid::new_v4().to_string(),
            name: spec.name,
            template: spec.template,
            channel: spec.channel,
            status: CampaignStatus::Draft,
            rate_per_second: spec.rate_per_second,
            cursor: 0,
            created_at: now_rfc3339(),
        };
        self.store
            .create_campaign(&campaign, &spec.recipients)
            .await?;
        info!(
            campaign_id = %campaign.id,
            recipients = spec.recipients.len(),
            channel = %campaign.channel,
            "campaign created"
        );
        Ok(campaign)
    }

    /// Start dispatching a draft campaign.
    pub async fn launch(&self, id: &str) -> Result<(), SwitchboardError> {
        self.start(id, CampaignStatus::Draft, "campaign launched").await
    }

    /// Continue a paused campaign from its persisted cursor.
    pub async fn resume(&self, id: &str) -> Result<(), SwitchboardError> {
        self.start(id, CampaignStatus::Paused, "campaign resumed").await
    }

    async fn start(
        &self,
        id: &str,
        expected: CampaignStatus,
        log_line: &'static str,
    ) -> Result<(), SwitchboardError> {
        if !self
            .store
            .set_campaign_status_if(id, expected, CampaignStatus::Running)
            .await?
        {
            return Err(self.conflict_or_missing(id, expected).await);
        }
        let campaign = self.fetch(id).await?;
        info!(campaign_id = %id, cursor = campaign.cursor, "{log_line}");
        self.spawn_runner(campaign);
        Ok(())
    }

    /// Stop a running campaign at the next send boundary.
    ///
    /// Joins the runner before returning; after `pause` the cursor on the
    /// campaign row is final.
    pub async fn pause(&self, id: &str) -> Result<(), SwitchboardError> {
        if !self
            .store
            .set_campaign_status_if(id, CampaignStatus::Running, CampaignStatus::Paused)
            .await?
        {
            return Err(self.conflict_or_missing(id, CampaignStatus::Running).await);
        }
        if let Some((_, runner)) = self.runners.remove(id) {
            runner.token.cancel();
            if let Err(e) = runner.handle.await {
                warn!(campaign_id = %id, error = %e, "campaign runner join failed");
            }
        }
        info!(campaign_id = %id, "campaign paused");
        Ok(())
    }

    /// Flip every `failed` recipient back to `pending` and rewind the
    /// cursor; a `finished` campaign reopens as `paused` for relaunch.
    ///
    /// Refused while the campaign is running: the dispatch loop walks
    /// forward from its live cursor and would skip the rewound rows.
    pub async fn requeue_failed(&self, id: &str) -> Result<u64, SwitchboardError> {
        let campaign = self.fetch(id).await?;
        if campaign.status == CampaignStatus::Running {
            return Err(SwitchboardError::CampaignConflict {
                campaign_id: id.to_string(),
                expected: CampaignStatus::Paused,
                actual: CampaignStatus::Running,
            });
        }
        let requeued = self.store.requeue_failed(id).await?;
        info!(campaign_id = %id, requeued, "failed recipients requeued");
        Ok(requeued)
    }

    /// The campaign row plus its recipient counts.
    pub async fn progress(&self, id: &str) -> Result<CampaignReport, SwitchboardError> {
        let campaign = self.fetch(id).await?;
        let progress = self.store.campaign_progress(id).await?;
        Ok(CampaignReport { campaign, progress })
    }

    pub async fn list(&self) -> Result<Vec<Campaign>, SwitchboardError> {
        self.store.list_campaigns().await
    }

    /// Demote campaigns a dead process left `running` back to `paused`.
    ///
    /// Their cursors are intact, so an operator can resume them once the
    /// cause of the crash is understood.
    pub async fn recover(&self) -> Result<Vec<String>, SwitchboardError> {
        let recovered = self.store.recover_running_campaigns().await?;
        for id in &recovered {
            info!(
                campaign_id = %id,
                "campaign left running by previous process; demoted to paused"
            );
        }
        Ok(recovered)
    }

    /// Stop every runner at a clean cursor boundary and persist `paused`.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.runners.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            let Some((_, runner)) = self.runners.remove(&id) else {
                continue;
            };
            runner.token.cancel();
            if let Err(e) = runner.handle.await {
                warn!(campaign_id = %id, error = %e, "campaign runner join failed");
            }
            match self
                .store
                .set_campaign_status_if(&id, CampaignStatus::Running, CampaignStatus::Paused)
                .await
            {
                Ok(true) => info!(campaign_id = %id, "campaign paused for shutdown"),
                Ok(false) => {}
                Err(e) => {
                    warn!(campaign_id = %id, error = %e, "could not pause campaign during shutdown")
                }
            }
        }
    }

    /// Number of live dispatch tasks.
    pub fn running_count(&self) -> usize {
        self.runners.len()
    }

    fn spawn_runner(&self, campaign: Campaign) {
        let rate = effective_rate(campaign.rate_per_second, self.config.max_rate_per_second);
        if rate < campaign.rate_per_second {
            warn!(
                campaign_id = %campaign.id,
                requested = campaign.rate_per_second,
                capped = rate,
                "campaign rate capped by server config"
            );
        }
        let token = CancellationToken::new();
        let id = campaign.id.clone();
        let handle = tokio::spawn(run_dispatch(
            Arc::clone(&self.store),
            Arc::clone(&self.engine),
            Arc::clone(&self.runners),
            campaign,
            rate,
            token.clone(),
        ));
        self.runners.insert(id, RunnerHandle { token, handle });
    }

    async fn fetch(&self, id: &str) -> Result<Campaign, SwitchboardError> {
        self.store
            .get_campaign(id)
            .await?
            .ok_or_else(|| SwitchboardError::NotFound {
                kind: "campaign",
                id: id.to_string(),
            })
    }

    async fn conflict_or_missing(
        &self,
        id: &str,
        expected: CampaignStatus,
    ) -> SwitchboardError {
        match self.store.get_campaign(id).await {
            Ok(Some(campaign)) => SwitchboardError::CampaignConflict {
                campaign_id: id.to_string(),
                expected,
                actual: campaign.status,
            },
            Ok(None) => SwitchboardError::NotFound {
                kind: "campaign",
                id: id.to_string(),
            },
            Err(e) => e,
        }
    }
}

/// The dispatch rate actually used: the campaign's ask, capped by server
/// config, and never zero.
fn effective_rate(requested: u32, max_rate_per_second: u32) -> u32 {
    requested.min(max_rate_per_second).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use switchboard_core::{DeliveryStatus, OutboundChannel, SenderKind};
    use switchboard_hub::PushHub;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingOutbound {
        delivered: StdMutex<Vec<(String, String)>>,
        failing: StdMutex<HashSet<String>>,
    }

    impl RecordingOutbound {
        fn fail_address(&self, address: &str) {
            self.failing.lock().unwrap().insert(address.to_string());
        }

        fn heal(&self) {
            self.failing.lock().unwrap().clear();
        }

        fn delivered(&self) -> Vec<(String, String)> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OutboundChannel for RecordingOutbound {
        fn name(&self) -> &str {
            "mock"
        }

        async fn deliver(
            &self,
            recipient_address: &str,
            content: &str,
        ) -> Result<(), SwitchboardError> {
            if self.failing.lock().unwrap().contains(recipient_address) {
                return Err(SwitchboardError::Channel {
                    message: format!("mock delivery refused for {recipient_address}"),
                    source: None,
                });
            }
            self.delivered
                .lock()
                .unwrap()
                .push((recipient_address.to_string(), content.to_string()));
            Ok(())
        }
    }

    async fn setup() -> (
        Arc<CampaignManager>,
        Arc<ConversationEngine>,
        Arc<SqliteStore>,
        Arc<RecordingOutbound>,
        tempfile::TempDir,
    ) {
        let dir = tempdir().unwrap();
        let mut config = SwitchboardConfig::default();
        config.storage.database_path = dir
            .path()
            .join("campaign.db")
            .to_str()
            .unwrap()
            .to_string();
        let store = Arc::new(SqliteStore::new(config.storage.clone()));
        store.initialize().await.unwrap();
        let engine = Arc::new(ConversationEngine::new(
            store.clone(),
            Arc::new(PushHub::new()),
            &config,
        ));
        let outbound = Arc::new(RecordingOutbound::default());
        engine.register_outbound(ChannelKind::Sms, outbound.clone());
        let manager = Arc::new(CampaignManager::new(store.clone(), engine.clone(), &config));
        (manager, engine, store, outbound, dir)
    }

    fn spec(recipients: &[&str], rate: u32) -> CampaignSpec {
        CampaignSpec {
            name: "turma de agosto".to_string(),
            template: "nova turma aberta, responda para saber mais".to_string(),
            channel: ChannelKind::Sms,
            rate_per_second: rate,
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    async fn await_status(store: &SqliteStore, id: &str, status: CampaignStatus) {
        tokio::time::timeout(Duration::from_secs(300), async {
            loop {
                let campaign = store.get_campaign(id).await.unwrap().unwrap();
                if campaign.status == status {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("campaign never reached {status}"));
    }

    #[tokio::test]
    async fn launch_delivers_to_every_recipient_in_order() {
        let (manager, engine, store, outbound, _dir) = setup().await;
        let campaign = manager
            .create(spec(&["+5511901", "+5511902", "+5511903"], 10))
            .await
            .unwrap();
        assert_eq!(campaign.status, CampaignStatus::Draft);

        manager.launch(&campaign.id).await.unwrap();
        await_status(&store, &campaign.id, CampaignStatus::Finished).await;

        let report = manager.progress(&campaign.id).await.unwrap();
        assert_eq!(report.progress.total, 3);
        assert_eq!(report.progress.sent, 3);
        assert_eq!(report.progress.failed, 0);
        assert_eq!(report.progress.pending, 0);
        assert_eq!(report.campaign.cursor, 3);

        let addresses: Vec<String> = outbound
            .delivered()
            .into_iter()
            .map(|(address, _)| address)
            .collect();
        assert_eq!(addresses, vec!["+5511901", "+5511902", "+5511903"]);

        // The send went through the ordinary append path: it is in the
        // recipient's history as a bot message credited to the campaign.
        let conversation = engine
            .ensure_conversation(ChannelKind::Sms, "+5511901", None)
            .await
            .unwrap();
        let history = engine.catch_up(&conversation.id, 0).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender_kind, SenderKind::Bot);
        assert_eq!(history[0].sender_id.as_deref(), Some(campaign.id.as_str()));
        assert_eq!(history[0].content, "nova turma aberta, responda para saber mais");
        assert_eq!(history[0].delivery_status, Some(DeliveryStatus::Sent));

        let recipient = store
            .get_recipient(&campaign.id, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recipient.conversation_id.as_deref(), Some(conversation.id.as_str()));
    }

    #[tokio::test]
    async fn adapter_failure_marks_that_recipient_and_moves_on() {
        let (manager, _engine, store, outbound, _dir) = setup().await;
        outbound.fail_address("+5511902");
        let campaign = manager
            .create(spec(&["+5511901", "+5511902", "+5511903"], 10))
            .await
            .unwrap();

        manager.launch(&campaign.id).await.unwrap();
        await_status(&store, &campaign.id, CampaignStatus::Finished).await;

        let report = manager.progress(&campaign.id).await.unwrap();
        assert_eq!(report.progress.sent, 2);
        assert_eq!(report.progress.failed, 1);

        let failed = store
            .get_recipient(&campaign.id, 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, DeliveryStatus::Failed);
        assert!(failed.conversation_id.is_some(), "conversation was created before delivery failed");

        let addresses: Vec<String> = outbound
            .delivered()
            .into_iter()
            .map(|(address, _)| address)
            .collect();
        assert_eq!(addresses, vec!["+5511901", "+5511903"]);
    }

    #[tokio::test]
    async fn requeue_failed_reopens_and_resends_only_failures() {
        let (manager, _engine, store, outbound, _dir) = setup().await;
        outbound.fail_address("+5511902");
        let campaign = manager
            .create(spec(&["+5511901", "+5511902", "+5511903"], 10))
            .await
            .unwrap();
        manager.launch(&campaign.id).await.unwrap();
        await_status(&store, &campaign.id, CampaignStatus::Finished).await;

        let requeued = manager.requeue_failed(&campaign.id).await.unwrap();
        assert_eq!(requeued, 1);
        let reopened = store.get_campaign(&campaign.id).await.unwrap().unwrap();
        assert_eq!(reopened.status, CampaignStatus::Paused);
        assert_eq!(reopened.cursor, 0);

        outbound.heal();
        manager.resume(&campaign.id).await.unwrap();
        await_status(&store, &campaign.id, CampaignStatus::Finished).await;

        let report = manager.progress(&campaign.id).await.unwrap();
        assert_eq!(report.progress.sent, 3);
        assert_eq!(report.progress.failed, 0);

        // Already-sent recipients were never re-sent.
        let mut per_address: HashMap<String, usize> = HashMap::new();
        for (address, _) in outbound.delivered() {
            *per_address.entry(address).or_insert(0) += 1;
        }
        assert!(per_address.values().all(|&count| count == 1), "{per_address:?}");
    }

    #[tokio::test]
    async fn pause_joins_the_runner_and_resume_completes_exactly_once() {
        let (manager, _engine, store, outbound, _dir) = setup().await;
        let recipients = ["+55one", "+55two", "+55three", "+55four", "+55five"];
        let campaign = manager.create(spec(&recipients, 1)).await.unwrap();
        manager.launch(&campaign.id).await.unwrap();

        tokio::time::timeout(Duration::from_secs(300), async {
            loop {
                let report = manager.progress(&campaign.id).await.unwrap();
                if report.progress.sent >= 2 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .expect("dispatch never reached two sends");

        manager.pause(&campaign.id).await.unwrap();
        assert_eq!(manager.running_count(), 0);

        let paused = manager.progress(&campaign.id).await.unwrap();
        assert_eq!(paused.campaign.status, CampaignStatus::Paused);
        assert!(
            paused.progress.sent < 5,
            "pause should land before the snapshot is exhausted"
        );
        // The cursor is exactly the number of handled recipients.
        assert_eq!(paused.campaign.cursor, paused.progress.sent);
        let delivered_at_pause = outbound.delivered().len() as i64;
        assert_eq!(delivered_at_pause, paused.progress.sent);

        manager.resume(&campaign.id).await.unwrap();
        await_status(&store, &campaign.id, CampaignStatus::Finished).await;

        let report = manager.progress(&campaign.id).await.unwrap();
        assert_eq!(report.progress.sent, 5);
        let mut seen = HashSet::new();
        for (address, _) in outbound.delivered() {
            assert!(seen.insert(address.clone()), "{address} was sent twice");
        }
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn lifecycle_guards_report_the_actual_status() {
        let (manager, _engine, _store, _outbound, _dir) = setup().await;
        let campaign = manager.create(spec(&["+5511901"], 10)).await.unwrap();

        let err = manager.resume(&campaign.id).await.unwrap_err();
        assert!(matches!(
            err,
            SwitchboardError::CampaignConflict {
                expected: CampaignStatus::Paused,
                actual: CampaignStatus::Draft,
                ..
            }
        ));

        let err = manager.pause(&campaign.id).await.unwrap_err();
        assert!(matches!(
            err,
            SwitchboardError::CampaignConflict {
                expected: CampaignStatus::Running,
                actual: CampaignStatus::Draft,
                ..
            }
        ));

        let err = manager.launch("ghost").await.unwrap_err();
        assert!(matches!(
            err,
            SwitchboardError::NotFound { kind: "campaign", .. }
        ));
    }

    #[tokio::test]
    async fn finished_campaign_cannot_be_relaunched() {
        let (manager, _engine, store, _outbound, _dir) = setup().await;
        let campaign = manager.create(spec(&["+5511901"], 30)).await.unwrap();
        manager.launch(&campaign.id).await.unwrap();
        await_status(&store, &campaign.id, CampaignStatus::Finished).await;

        let err = manager.launch(&campaign.id).await.unwrap_err();
        assert!(matches!(
            err,
            SwitchboardError::CampaignConflict {
                actual: CampaignStatus::Finished,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn recover_demotes_crash_leftovers_to_paused() {
        let (manager, _engine, store, _outbound, _dir) = setup().await;
        let campaign = manager.create(spec(&["+5511901"], 10)).await.unwrap();
        // Simulate a crash: the row says running but no task exists.
        assert!(
            store
                .set_campaign_status_if(&campaign.id, CampaignStatus::Draft, CampaignStatus::Running)
                .await
                .unwrap()
        );

        let recovered = manager.recover().await.unwrap();
        assert_eq!(recovered, vec![campaign.id.clone()]);
        let row = store.get_campaign(&campaign.id).await.unwrap().unwrap();
        assert_eq!(row.status, CampaignStatus::Paused);
        assert_eq!(row.cursor, 0, "recovery keeps the cursor untouched");
    }

    #[tokio::test]
    async fn shutdown_pauses_running_campaigns() {
        let (manager, _engine, store, _outbound, _dir) = setup().await;
        let recipients: Vec<String> = (0..50).map(|i| format!("+55bulk{i}")).collect();
        let refs: Vec<&str> = recipients.iter().map(|s| s.as_str()).collect();
        let campaign = manager.create(spec(&refs, 1)).await.unwrap();
        manager.launch(&campaign.id).await.unwrap();

        tokio::time::timeout(Duration::from_secs(300), async {
            loop {
                if manager.progress(&campaign.id).await.unwrap().progress.sent >= 1 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .expect("dispatch never started");

        manager.shutdown().await;
        assert_eq!(manager.running_count(), 0);
        let row = store.get_campaign(&campaign.id).await.unwrap().unwrap();
        assert_eq!(row.status, CampaignStatus::Paused);
    }

    #[tokio::test]
    async fn create_rejects_unusable_specs() {
        let (manager, _engine, _store, _outbound, _dir) = setup().await;

        let err = manager.create(spec(&[], 10)).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::Config(_)));

        let mut empty_template = spec(&["+5511901"], 10);
        empty_template.template = "   ".to_string();
        let err = manager.create(empty_template).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::Config(_)));

        let err = manager.create(spec(&["+5511901"], 0)).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::Config(_)));
    }

    #[test]
    fn effective_rate_clamps_to_server_cap() {
        assert_eq!(effective_rate(10, 30), 10);
        assert_eq!(effective_rate(100, 30), 30);
        assert_eq!(effective_rate(1, 0), 1);
    }
}
