//! The notification loop.
//!
//! One run: compute the window, then walk the configured recipient groups in
//! order, mailing each a summary of the agreements expiring for it. A group
//! failing (query or delivery) is recorded and the walk continues; only a
//! failure of the shared upfront query aborts the run. Runs carry no
//! delivery ledger, so a row near its expiry date is reported again on the
//! next run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use col_agreements::Agreement;
use col_core::{Clock, DateWindow, RecipientGroupId};
use col_storage::{StorageError, StorageGateway};

use crate::mailer::{Mailer, OutboundMessage, RecipientGroup};
use crate::schedule::NotifierConfig;

/// What one run did, group by group.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub window: DateWindow,
    /// Rows matched by the shared upfront query, across all groups.
    pub agreements_found: usize,
    pub attempted: Vec<RecipientGroupId>,
    pub delivered: Vec<RecipientGroupId>,
    pub failed: Vec<(RecipientGroupId, String)>,
}

pub struct Notifier {
    gateway: Arc<dyn StorageGateway>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    config: NotifierConfig,
}

impl Notifier {
    pub fn new(
        gateway: Arc<dyn StorageGateway>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        config: NotifierConfig,
    ) -> Self {
        Self {
            gateway,
            mailer,
            clock,
            config,
        }
    }

    /// Execute one notification pass.
    ///
    /// `Err` means storage was unreachable before any group was processed;
    /// the caller's loop survives it and retries on the next tick.
    pub async fn run_once(&self) -> Result<RunReport, StorageError> {
        let run_id = Uuid::now_v7();
        let window = self.config.window.window_from(self.clock.now());

        let all_groups: Vec<RecipientGroupId> =
            self.config.groups.iter().map(|g| g.id).collect();
        let found = self
            .gateway
            .agreements_expiring(&all_groups, window)
            .await?
            .len();

        let mut report = RunReport {
            run_id,
            window,
            agreements_found: found,
            attempted: Vec::new(),
            delivered: Vec::new(),
            failed: Vec::new(),
        };

        for group in &self.config.groups {
            report.attempted.push(group.id);
            match self.notify_group(group, window).await {
                Ok(true) => report.delivered.push(group.id),
                Ok(false) => {}
                Err(reason) => {
                    warn!(run_id = %run_id, group = %group.name, %reason, "group notification failed");
                    report.failed.push((group.id, reason));
                }
            }
        }

        info!(
            run_id = %run_id,
            found = report.agreements_found,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "notification run finished"
        );
        Ok(report)
    }

    /// Notify one group. `Ok(true)` = mail sent, `Ok(false)` = nothing to
    /// report for this group.
    async fn notify_group(
        &self,
        group: &RecipientGroup,
        window: DateWindow,
    ) -> Result<bool, String> {
        let agreements = self
            .gateway
            .agreements_expiring(&[group.id], window)
            .await
            .map_err(|e| e.to_string())?;
        if agreements.is_empty() {
            return Ok(false);
        }
        let message = self.compose(group, &agreements, window);
        self.mailer.send(message).await.map_err(|e| e.to_string())?;
        Ok(true)
    }

    fn compose(
        &self,
        group: &RecipientGroup,
        agreements: &[Agreement],
        window: DateWindow,
    ) -> OutboundMessage {
        let mut body = format!(
            "Agreements expiring between {} and {}:\n\n",
            window.start, window.end
        );
        for agreement in agreements {
            let expiry = agreement
                .expiry
                .as_ref()
                .map(|e| e.date.to_string())
                .unwrap_or_default();
            body.push_str(&format!(
                "- {} (expires {}) {}/?ent=sc&id={}\n",
                agreement.title, expiry, self.config.base_url, agreement.id
            ));
        }
        OutboundMessage {
            recipients: group.recipients.clone(),
            subject: format!("Expiring agreements for {}", group.name),
            body,
        }
    }

    /// Start the periodic loop: one run immediately, then one per period.
    /// Runs never overlap, the next sleep starts after a run completes.
    pub fn spawn(self: Arc<Self>) -> NotifierHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let runs = Arc::new(AtomicU64::new(0));
        let runs_counter = Arc::clone(&runs);
        let period = self.config.period;

        let join = tokio::spawn(async move {
            loop {
                runs_counter.fetch_add(1, Ordering::SeqCst);
                if let Err(e) = self.run_once().await {
                    error!(error = %e, "notification run aborted");
                }
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = shutdown_rx.changed() => {
                        info!("notifier shutting down");
                        break;
                    }
                }
            }
        });

        NotifierHandle {
            shutdown: shutdown_tx,
            join,
            runs,
        }
    }
}

/// Cancellation handle for the running loop.
pub struct NotifierHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
    runs: Arc<AtomicU64>,
}

impl NotifierHandle {
    /// Number of runs started so far.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::InMemoryMailer;
    use crate::schedule::WindowPolicy;
    use chrono::{NaiveDate, TimeZone};
    use col_agreements::Endorsement;
    use col_core::{AgreementId, FixedClock};
    use col_storage::InMemoryGateway;
    use std::time::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn grp(id: i64) -> RecipientGroupId {
        RecipientGroupId::new(id)
    }

    fn expiring(id: i64, title: &str, expiry: NaiveDate) -> Agreement {
        let mut a = Agreement::new(AgreementId::new(id), title).unwrap();
        a.expiry = Some(Endorsement::on(expiry));
        a
    }

    fn group(id: i64, name: &str, address: &str) -> RecipientGroup {
        RecipientGroup::new(grp(id), name, vec![address.to_string()])
    }

    fn clock_2025() -> Arc<FixedClock> {
        Arc::new(FixedClock::at(
            Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
        ))
    }

    fn notifier(
        gateway: Arc<InMemoryGateway>,
        mailer: Arc<InMemoryMailer>,
        groups: Vec<RecipientGroup>,
    ) -> Notifier {
        let config =
            NotifierConfig::new(groups, "http://col.example").window(WindowPolicy::CalendarYearEnd);
        Notifier::new(gateway, mailer, clock_2025(), config)
    }

    #[tokio::test]
    async fn window_scenario_sends_exactly_one_summary() {
        // one agreement inside the window, one outside
        let gateway = Arc::new(
            InMemoryGateway::new()
                .with_agreement(expiring(1, "Radiology", date(2025, 9, 30)), &[grp(1)])
                .with_agreement(expiring(2, "Catering", date(2026, 9, 30)), &[grp(1)]),
        );
        let mailer = Arc::new(InMemoryMailer::new());
        let n = notifier(
            Arc::clone(&gateway),
            Arc::clone(&mailer),
            vec![group(1, "Administration", "admin@example.org")],
        );

        let report = n.run_once().await.unwrap();

        assert_eq!(report.agreements_found, 1);
        assert_eq!(report.delivered, vec![grp(1)]);
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("Radiology"));
        assert!(sent[0].body.contains("2025-09-30"));
        assert!(!sent[0].body.contains("Catering"));
    }

    #[tokio::test]
    async fn failing_group_does_not_stop_later_groups() {
        let gateway = Arc::new(
            InMemoryGateway::new()
                .with_agreement(
                    expiring(1, "Radiology", date(2025, 9, 30)),
                    &[grp(1), grp(2), grp(3)],
                ),
        );
        let mailer = Arc::new(InMemoryMailer::new());
        mailer.fail_for("two@example.org");
        let n = notifier(
            gateway,
            Arc::clone(&mailer),
            vec![
                group(1, "One", "one@example.org"),
                group(2, "Two", "two@example.org"),
                group(3, "Three", "three@example.org"),
            ],
        );

        let report = n.run_once().await.unwrap();

        assert_eq!(report.attempted, vec![grp(1), grp(2), grp(3)]);
        assert_eq!(report.delivered, vec![grp(1), grp(3)]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, grp(2));
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn group_with_nothing_expiring_gets_no_mail() {
        let gateway = Arc::new(
            InMemoryGateway::new()
                .with_agreement(expiring(1, "Radiology", date(2025, 9, 30)), &[grp(1)]),
        );
        let mailer = Arc::new(InMemoryMailer::new());
        let n = notifier(
            gateway,
            Arc::clone(&mailer),
            vec![
                group(1, "One", "one@example.org"),
                group(2, "Two", "two@example.org"),
            ],
        );

        let report = n.run_once().await.unwrap();

        assert_eq!(report.attempted.len(), 2);
        assert_eq!(report.delivered, vec![grp(1)]);
        assert!(report.failed.is_empty());
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn storage_outage_aborts_the_run_only() {
        let gateway = Arc::new(InMemoryGateway::new());
        let mailer = Arc::new(InMemoryMailer::new());
        let n = notifier(
            Arc::clone(&gateway),
            mailer,
            vec![group(1, "One", "one@example.org")],
        );

        gateway.set_failing(true);
        assert!(n.run_once().await.is_err());

        gateway.set_failing(false);
        assert!(n.run_once().await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_summaries_across_runs_are_accepted() {
        let gateway = Arc::new(
            InMemoryGateway::new()
                .with_agreement(expiring(1, "Radiology", date(2025, 9, 30)), &[grp(1)]),
        );
        let mailer = Arc::new(InMemoryMailer::new());
        let n = notifier(
            gateway,
            Arc::clone(&mailer),
            vec![group(1, "One", "one@example.org")],
        );

        n.run_once().await.unwrap();
        n.run_once().await.unwrap();
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn loop_runs_immediately_and_stops_on_shutdown() {
        let gateway = Arc::new(InMemoryGateway::new());
        let mailer = Arc::new(InMemoryMailer::new());
        let config = NotifierConfig::new(vec![], "http://col.example")
            .period(Duration::from_secs(3600));
        let n = Arc::new(Notifier::new(gateway, mailer, clock_2025(), config));

        let handle = n.spawn();
        // zero initial delay: the first run starts without waiting a period
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.runs(), 1);
        handle.shutdown().await;
    }
}
