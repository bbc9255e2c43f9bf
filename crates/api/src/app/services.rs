//! Service construction: gateway, sessions, registry, notifier.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use col_auth::{InMemorySessions, Principal, Role};
use col_core::{
    AgreementId, CommandDescriptor, ContractorId, RecipientGroupId, SystemClock, UserId,
};
use col_dispatch::{builtin_factories, CommandRegistry};
use col_notify::{LoggingMailer, Notifier, NotifierConfig, NotifierHandle, RecipientGroup};
use col_storage::{InMemoryGateway, PostgresGateway, StorageGateway};

use super::AppState;
use crate::config::AppConfig;
use crate::middleware::SessionState;

/// Session id honoured by the in-memory dev deployment.
pub const DEV_SESSION_ID: &str = "dev-session";

pub struct Services {
    pub state: Arc<AppState>,
    pub session_state: SessionState,
    pub notifier: NotifierHandle,
}

/// Wire everything up. Fails (and the process aborts) on an unreachable
/// database or an inconsistent command table.
pub async fn build(config: AppConfig) -> anyhow::Result<Services> {
    let gateway: Arc<dyn StorageGateway> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(8)
                .connect_lazy(url)
                .context("invalid COL_DATABASE_URL")?;
            info!("using postgres-backed storage");
            Arc::new(PostgresGateway::new(pool))
        }
        None => {
            info!("COL_DATABASE_URL not set; using seeded in-memory storage");
            Arc::new(dev_gateway())
        }
    };

    let sessions = Arc::new(InMemorySessions::new());
    if config.database_url.is_none() {
        sessions.open_with_id(DEV_SESSION_ID, dev_principal());
    }

    let registry = CommandRegistry::load(
        Arc::clone(&gateway),
        &builtin_factories(),
        config.home_token.clone(),
    )
    .await
    .context("command registry construction failed")?;

    let notifier_config = NotifierConfig::new(notification_groups(), "http://localhost:8080")
        .period(config.notifier_period)
        .window(config.notifier_window);
    let notifier = Arc::new(Notifier::new(
        Arc::clone(&gateway),
        Arc::new(LoggingMailer),
        Arc::new(SystemClock),
        notifier_config,
    ))
    .spawn();

    let session_state = SessionState {
        sessions: sessions.clone() as Arc<dyn col_auth::SessionManager>,
        gateway: Arc::clone(&gateway),
    };
    let state = Arc::new(AppState { config, registry });

    Ok(Services {
        state,
        session_state,
        notifier,
    })
}

/// Recipient groups for the notification loop.
///
/// `COL_NOTIFY_RECIPIENTS` is a comma-separated address list feeding one
/// operations group; unset means no deliveries (runs still log).
fn notification_groups() -> Vec<RecipientGroup> {
    match std::env::var("COL_NOTIFY_RECIPIENTS") {
        Ok(raw) => {
            let recipients: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect();
            if recipients.is_empty() {
                return Vec::new();
            }
            vec![RecipientGroup::new(
                RecipientGroupId::new(1),
                "Operations",
                recipients,
            )]
        }
        Err(_) => Vec::new(),
    }
}

fn dev_principal() -> Principal {
    Principal::new(
        UserId::new(1),
        "dev",
        Role::user(),
        vec![RecipientGroupId::new(1)],
    )
}

/// Seed data mirroring the minimal command table plus a few rows to click
/// through.
fn dev_gateway() -> InMemoryGateway {
    use chrono::NaiveDate;
    use col_agreements::{Agreement, CodeItem, Contractor, Endorsement};

    let mut radiology = Agreement::new(AgreementId::new(1), "Radiology services").unwrap();
    radiology.expiry = Some(Endorsement::on(
        NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
    ));
    let catering = Agreement::new(AgreementId::new(2), "Catering framework").unwrap();

    InMemoryGateway::new()
        .with_descriptor(CommandDescriptor::new(
            "home",
            "HomeCommand",
            "landing",
            "Home",
            1,
        ))
        .with_descriptor(CommandDescriptor::new(
            "conv",
            "AgreementsCommand",
            "landing",
            "Agreements",
            10,
        ))
        .with_descriptor(CommandDescriptor::new(
            "sc",
            "DeadlinesCommand",
            "deadlines",
            "Deadlines",
            20,
        ))
        .with_agreement(radiology, &[RecipientGroupId::new(1)])
        .with_agreement(catering, &[RecipientGroupId::new(1)])
        .with_contractor(Contractor::new(ContractorId::new(1), "Acme Srl").unwrap())
        .with_contractor(Contractor::new(ContractorId::new(2), "Globex SpA").unwrap())
        .with_kind(CodeItem::new(1, "Framework", 1))
        .with_kind(CodeItem::new(2, "Service", 2))
        .with_scope(CodeItem::new(1, "Research", 1))
        .with_scope(CodeItem::new(2, "Clinical", 2))
}
