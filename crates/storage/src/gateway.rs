//! Storage gateway trait and error model.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use col_agreements::{Agreement, AgreementUpdate, CodeItem, Contractor, SearchCriteria};
use col_auth::Principal;
use col_core::{AgreementId, CommandDescriptor, ContractorId, DateWindow, RecipientGroupId};

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage operation error.
///
/// Infrastructure failures (connection, malformed rows) as opposed to domain
/// errors; `NotFound` is the one overlap, surfaced here because single-row
/// lookups are a storage concern.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connection failure: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("row mapping failed: {0}")]
    Mapping(String),

    #[error("not found")]
    NotFound,

    #[error("constraint violated: {0}")]
    Constraint(String),
}

/// One synchronous-looking method per domain query.
///
/// Callers get complete results, never cursors; result sets in this system
/// are small (hundreds of rows at most). Group scoping is part of the query
/// contract: methods taking a [`Principal`] must only return rows visible to
/// the principal's groups.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// All command descriptors, ordered by ordinal. Feeds registry
    /// construction at startup.
    async fn load_command_descriptors(&self) -> StorageResult<Vec<CommandDescriptor>>;

    /// Active agreements visible to the principal, ordered by ordinal then
    /// expiry date.
    async fn agreements_for(&self, principal: &Principal) -> StorageResult<Vec<Agreement>>;

    /// Single agreement scoped to the principal's groups.
    async fn agreement(
        &self,
        principal: &Principal,
        id: AgreementId,
    ) -> StorageResult<Agreement>;

    /// Active agreements for the given groups whose expiry date lies in
    /// `[window.start, window.end)`, ordered by expiry date then title.
    async fn agreements_expiring(
        &self,
        groups: &[RecipientGroupId],
        window: DateWindow,
    ) -> StorageResult<Vec<Agreement>>;

    /// Title/type/scope filtered search over the principal's agreements.
    async fn search_agreements(
        &self,
        principal: &Principal,
        criteria: &SearchCriteria,
    ) -> StorageResult<Vec<Agreement>>;

    /// Persist an edit, stamping the audit trail with the principal and the
    /// given instant. Returns the updated row.
    async fn update_agreement(
        &self,
        principal: &Principal,
        update: &AgreementUpdate,
        at: DateTime<Utc>,
    ) -> StorageResult<Agreement>;

    /// All contractors, or only those not yet assigned to the given
    /// agreement.
    async fn contractors(
        &self,
        assignable_to: Option<AgreementId>,
    ) -> StorageResult<Vec<Contractor>>;

    /// Contractors currently assigned to an agreement.
    async fn contractors_of(&self, agreement: AgreementId) -> StorageResult<Vec<Contractor>>;

    /// Single contractor by id.
    async fn contractor(&self, id: ContractorId) -> StorageResult<Contractor>;

    /// Record contractor assignments for an agreement, with audit trail.
    async fn assign_contractors(
        &self,
        principal: &Principal,
        agreement: AgreementId,
        contractors: &[ContractorId],
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Agreement type vocabulary, ordered by ordinal.
    async fn agreement_kinds(&self) -> StorageResult<Vec<CodeItem>>;

    /// Agreement scope vocabulary, ordered by ordinal.
    async fn agreement_scopes(&self) -> StorageResult<Vec<CodeItem>>;

    /// Replace the last-access row for a user. Delete-then-insert inside one
    /// transaction, so concurrent logins leave exactly one row.
    async fn record_access(&self, username: &str, at: DateTime<Utc>) -> StorageResult<()>;
}

#[async_trait]
impl<S> StorageGateway for Arc<S>
where
    S: StorageGateway + ?Sized,
{
    async fn load_command_descriptors(&self) -> StorageResult<Vec<CommandDescriptor>> {
        (**self).load_command_descriptors().await
    }

    async fn agreements_for(&self, principal: &Principal) -> StorageResult<Vec<Agreement>> {
        (**self).agreements_for(principal).await
    }

    async fn agreement(
        &self,
        principal: &Principal,
        id: AgreementId,
    ) -> StorageResult<Agreement> {
        (**self).agreement(principal, id).await
    }

    async fn agreements_expiring(
        &self,
        groups: &[RecipientGroupId],
        window: DateWindow,
    ) -> StorageResult<Vec<Agreement>> {
        (**self).agreements_expiring(groups, window).await
    }

    async fn search_agreements(
        &self,
        principal: &Principal,
        criteria: &SearchCriteria,
    ) -> StorageResult<Vec<Agreement>> {
        (**self).search_agreements(principal, criteria).await
    }

    async fn update_agreement(
        &self,
        principal: &Principal,
        update: &AgreementUpdate,
        at: DateTime<Utc>,
    ) -> StorageResult<Agreement> {
        (**self).update_agreement(principal, update, at).await
    }

    async fn contractors(
        &self,
        assignable_to: Option<AgreementId>,
    ) -> StorageResult<Vec<Contractor>> {
        (**self).contractors(assignable_to).await
    }

    async fn contractors_of(&self, agreement: AgreementId) -> StorageResult<Vec<Contractor>> {
        (**self).contractors_of(agreement).await
    }

    async fn contractor(&self, id: ContractorId) -> StorageResult<Contractor> {
        (**self).contractor(id).await
    }

    async fn assign_contractors(
        &self,
        principal: &Principal,
        agreement: AgreementId,
        contractors: &[ContractorId],
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        (**self)
            .assign_contractors(principal, agreement, contractors, at)
            .await
    }

    async fn agreement_kinds(&self) -> StorageResult<Vec<CodeItem>> {
        (**self).agreement_kinds().await
    }

    async fn agreement_scopes(&self) -> StorageResult<Vec<CodeItem>> {
        (**self).agreement_scopes().await
    }

    async fn record_access(&self, username: &str, at: DateTime<Utc>) -> StorageResult<()> {
        (**self).record_access(username, at).await
    }
}
