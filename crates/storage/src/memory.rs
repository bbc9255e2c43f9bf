//! In-memory gateway for tests and dev mode.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use col_agreements::{Agreement, AgreementUpdate, Audit, CodeItem, Contractor, SearchCriteria};
use col_auth::Principal;
use col_core::{AgreementId, CommandDescriptor, ContractorId, DateWindow, RecipientGroupId};

use crate::gateway::{StorageError, StorageGateway, StorageResult};

#[derive(Debug, Default)]
struct Tables {
    descriptors: Vec<CommandDescriptor>,
    agreements: BTreeMap<AgreementId, Agreement>,
    agreement_groups: HashMap<AgreementId, Vec<RecipientGroupId>>,
    agreement_scope_names: HashMap<AgreementId, Vec<String>>,
    contractors: BTreeMap<ContractorId, Contractor>,
    assignments: HashMap<AgreementId, Vec<ContractorId>>,
    kinds: Vec<CodeItem>,
    scopes: Vec<CodeItem>,
    access_log: HashMap<String, DateTime<Utc>>,
}

/// Gateway backed by process-local tables.
///
/// Seedable through the `with_*` builders; `fail_queries` turns every call
/// into a connection error, for exercising failure paths.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    tables: RwLock<Tables>,
    fail_queries: AtomicBool,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_descriptor(self, descriptor: CommandDescriptor) -> Self {
        self.tables.write().unwrap().descriptors.push(descriptor);
        self
    }

    pub fn with_agreement(self, agreement: Agreement, groups: &[RecipientGroupId]) -> Self {
        {
            let mut tables = self.tables.write().unwrap();
            tables
                .agreement_groups
                .insert(agreement.id, groups.to_vec());
            tables.agreements.insert(agreement.id, agreement);
        }
        self
    }

    pub fn with_agreement_scope(self, agreement: AgreementId, scope: impl Into<String>) -> Self {
        self.tables
            .write()
            .unwrap()
            .agreement_scope_names
            .entry(agreement)
            .or_default()
            .push(scope.into());
        self
    }

    pub fn with_contractor(self, contractor: Contractor) -> Self {
        self.tables
            .write()
            .unwrap()
            .contractors
            .insert(contractor.id, contractor);
        self
    }

    pub fn with_assignment(self, agreement: AgreementId, contractor: ContractorId) -> Self {
        self.tables
            .write()
            .unwrap()
            .assignments
            .entry(agreement)
            .or_default()
            .push(contractor);
        self
    }

    pub fn with_kind(self, kind: CodeItem) -> Self {
        self.tables.write().unwrap().kinds.push(kind);
        self
    }

    pub fn with_scope(self, scope: CodeItem) -> Self {
        self.tables.write().unwrap().scopes.push(scope);
        self
    }

    /// Make every subsequent call fail with a connection error.
    pub fn set_failing(&self, failing: bool) {
        self.fail_queries.store(failing, Ordering::SeqCst);
    }

    /// Last recorded access instant for a user, if any.
    pub fn last_access(&self, username: &str) -> Option<DateTime<Utc>> {
        self.tables
            .read()
            .unwrap()
            .access_log
            .get(username)
            .copied()
    }

    fn guard(&self) -> StorageResult<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("simulated outage".into()));
        }
        Ok(())
    }

    fn visible_to(tables: &Tables, id: AgreementId, groups: &[RecipientGroupId]) -> bool {
        tables
            .agreement_groups
            .get(&id)
            .is_some_and(|gs| gs.iter().any(|g| groups.contains(g)))
    }
}

#[async_trait]
impl StorageGateway for InMemoryGateway {
    async fn load_command_descriptors(&self) -> StorageResult<Vec<CommandDescriptor>> {
        self.guard()?;
        let tables = self.tables.read().unwrap();
        let mut descriptors = tables.descriptors.clone();
        descriptors.sort_by_key(|d| d.ordinal);
        Ok(descriptors)
    }

    async fn agreements_for(&self, principal: &Principal) -> StorageResult<Vec<Agreement>> {
        self.guard()?;
        let tables = self.tables.read().unwrap();
        let mut rows: Vec<Agreement> = tables
            .agreements
            .values()
            .filter(|a| a.is_active() && Self::visible_to(&tables, a.id, principal.groups()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.ordinal.cmp(&b.ordinal).then(
                b.expiry
                    .as_ref()
                    .map(|e| e.date)
                    .cmp(&a.expiry.as_ref().map(|e| e.date)),
            )
        });
        Ok(rows)
    }

    async fn agreement(
        &self,
        principal: &Principal,
        id: AgreementId,
    ) -> StorageResult<Agreement> {
        self.guard()?;
        let tables = self.tables.read().unwrap();
        if !Self::visible_to(&tables, id, principal.groups()) {
            return Err(StorageError::NotFound);
        }
        tables
            .agreements
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn agreements_expiring(
        &self,
        groups: &[RecipientGroupId],
        window: DateWindow,
    ) -> StorageResult<Vec<Agreement>> {
        self.guard()?;
        let tables = self.tables.read().unwrap();
        let mut rows: Vec<Agreement> = tables
            .agreements
            .values()
            .filter(|a| {
                a.is_active()
                    && a.expires_within(window)
                    && Self::visible_to(&tables, a.id, groups)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let da = a.expiry.as_ref().map(|e| e.date);
            let db = b.expiry.as_ref().map(|e| e.date);
            da.cmp(&db).then_with(|| a.title.cmp(&b.title))
        });
        Ok(rows)
    }

    async fn search_agreements(
        &self,
        principal: &Principal,
        criteria: &SearchCriteria,
    ) -> StorageResult<Vec<Agreement>> {
        let rows = self.agreements_for(principal).await?;
        let tables = self.tables.read().unwrap();
        Ok(rows
            .into_iter()
            .filter(|a| {
                let title_ok = criteria.title.as_deref().is_none_or(|t| {
                    a.title.to_lowercase().contains(&t.to_lowercase())
                });
                let kind_ok = criteria
                    .kind
                    .as_deref()
                    .is_none_or(|k| a.kind.as_deref() == Some(k));
                let scope_ok = criteria.scope.as_deref().is_none_or(|s| {
                    tables
                        .agreement_scope_names
                        .get(&a.id)
                        .is_some_and(|names| names.iter().any(|n| n == s))
                });
                title_ok && kind_ok && scope_ok
            })
            .collect())
    }

    async fn update_agreement(
        &self,
        principal: &Principal,
        update: &AgreementUpdate,
        at: DateTime<Utc>,
    ) -> StorageResult<Agreement> {
        self.guard()?;
        update
            .validate()
            .map_err(|e| StorageError::Constraint(e.to_string()))?;
        let mut tables = self.tables.write().unwrap();
        if !Self::visible_to(&tables, update.id, principal.groups()) {
            return Err(StorageError::NotFound);
        }
        let row = tables
            .agreements
            .get_mut(&update.id)
            .ok_or(StorageError::NotFound)?;
        let audit = Audit {
            date: at.date_naive(),
            time: at.time(),
            user_id: principal.id(),
        };
        update.apply_to(row, audit);
        Ok(row.clone())
    }

    async fn contractors(
        &self,
        assignable_to: Option<AgreementId>,
    ) -> StorageResult<Vec<Contractor>> {
        self.guard()?;
        let tables = self.tables.read().unwrap();
        let taken: &[ContractorId] = match assignable_to {
            Some(id) => tables.assignments.get(&id).map_or(&[], Vec::as_slice),
            None => &[],
        };
        let mut rows: Vec<Contractor> = tables
            .contractors
            .values()
            .filter(|c| !taken.contains(&c.id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.name.cmp(&b.name)));
        Ok(rows)
    }

    async fn contractors_of(&self, agreement: AgreementId) -> StorageResult<Vec<Contractor>> {
        self.guard()?;
        let tables = self.tables.read().unwrap();
        let assigned = tables.assignments.get(&agreement).cloned().unwrap_or_default();
        let mut rows: Vec<Contractor> = tables
            .contractors
            .values()
            .filter(|c| assigned.contains(&c.id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.name.cmp(&b.name)));
        Ok(rows)
    }

    async fn contractor(&self, id: ContractorId) -> StorageResult<Contractor> {
        self.guard()?;
        self.tables
            .read()
            .unwrap()
            .contractors
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn assign_contractors(
        &self,
        principal: &Principal,
        agreement: AgreementId,
        contractors: &[ContractorId],
        _at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.guard()?;
        let mut tables = self.tables.write().unwrap();
        if !Self::visible_to(&tables, agreement, principal.groups()) {
            return Err(StorageError::NotFound);
        }
        let assigned = tables.assignments.entry(agreement).or_default();
        for id in contractors {
            if !assigned.contains(id) {
                assigned.push(*id);
            }
        }
        Ok(())
    }

    async fn agreement_kinds(&self) -> StorageResult<Vec<CodeItem>> {
        self.guard()?;
        let mut kinds = self.tables.read().unwrap().kinds.clone();
        kinds.sort_by_key(|k| k.ordinal);
        Ok(kinds)
    }

    async fn agreement_scopes(&self) -> StorageResult<Vec<CodeItem>> {
        self.guard()?;
        let mut scopes = self.tables.read().unwrap().scopes.clone();
        scopes.sort_by_key(|s| s.ordinal);
        Ok(scopes)
    }

    async fn record_access(&self, username: &str, at: DateTime<Utc>) -> StorageResult<()> {
        self.guard()?;
        self.tables
            .write()
            .unwrap()
            .access_log
            .insert(username.to_string(), at);
        Ok(())
    }
}
