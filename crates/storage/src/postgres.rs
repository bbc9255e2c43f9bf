//! Postgres-backed gateway.
//!
//! Every query is scoped the same way the schema is owned: agreement rows
//! join through `agreement_grp` so a principal only ever sees rows shared
//! with one of their groups, and only `ACTIVE` rows surface from list
//! queries.
//!
//! ## Error mapping
//!
//! sqlx errors map onto [`StorageError`] as follows: `RowNotFound` →
//! `NotFound`, unique/foreign-key/check violations (`23505`, `23503`,
//! `23514`) → `Constraint`, pool/io failures → `Connection`, anything else →
//! `Query`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::instrument;

use async_trait::async_trait;

use col_agreements::{
    Agreement, AgreementStatus, AgreementUpdate, Audit, CodeItem, Contractor, Endorsement,
    SearchCriteria,
};
use col_auth::Principal;
use col_core::{AgreementId, CommandDescriptor, ContractorId, DateWindow, RecipientGroupId, UserId};

use crate::gateway::{StorageError, StorageGateway, StorageResult};

/// Gateway over a sqlx connection pool.
#[derive(Debug, Clone)]
pub struct PostgresGateway {
    pool: Arc<PgPool>,
}

impl PostgresGateway {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn map_sqlx_error(operation: &str, error: sqlx::Error) -> StorageError {
    match error {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") | Some("23503") | Some("23514") => {
                StorageError::Constraint(format!("{operation}: {db}"))
            }
            _ => StorageError::Query(format!("{operation}: {db}")),
        },
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            StorageError::Connection(format!("{operation}: {error}"))
        }
        other => StorageError::Query(format!("{operation}: {other}")),
    }
}

fn group_ids(groups: &[RecipientGroupId]) -> Vec<i64> {
    groups.iter().map(|g| g.as_i64()).collect()
}

fn endorsement(
    row: &PgRow,
    date_col: &str,
    note_col: &str,
) -> Result<Option<Endorsement>, sqlx::Error> {
    let date: Option<NaiveDate> = row.try_get(date_col)?;
    let note: Option<String> = row.try_get(note_col)?;
    Ok(date.map(|date| Endorsement { date, note }))
}

fn map_agreement(row: &PgRow) -> StorageResult<Agreement> {
    let build = || -> Result<Agreement, sqlx::Error> {
        let audit_date: Option<NaiveDate> = row.try_get("last_modified_date")?;
        let audit_time: Option<NaiveTime> = row.try_get("last_modified_time")?;
        let audit_user: Option<i64> = row.try_get("last_modified_user")?;
        let last_modified = match (audit_date, audit_time, audit_user) {
            (Some(date), Some(time), Some(user)) => Some(Audit {
                date,
                time,
                user_id: UserId::new(user),
            }),
            _ => None,
        };

        Ok(Agreement {
            id: AgreementId::new(row.try_get::<i64, _>("id")?),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            ordinal: row.try_get("ordinal")?,
            notes: row.try_get("notes")?,
            approval: endorsement(row, "approval_date", "approval_note")?,
            second_approval: endorsement(row, "second_approval_date", "second_approval_note")?,
            signing: endorsement(row, "signing_date", "signing_note")?,
            expiry: endorsement(row, "expiry_date", "expiry_note")?,
            registry_number: row.try_get("registry_number")?,
            stamp_duty_charge: row.try_get("stamp_duty_charge")?,
            stamp_duty_paid: row.try_get("stamp_duty_paid")?,
            kind: row.try_get("kind")?,
            status: AgreementStatus::Active,
            last_modified,
        })
    };
    build().map_err(|e| StorageError::Mapping(format!("agreement row: {e}")))
}

fn map_contractor(row: &PgRow) -> StorageResult<Contractor> {
    let build = || -> Result<Contractor, sqlx::Error> {
        Ok(Contractor {
            id: ContractorId::new(row.try_get::<i64, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            ordinal: row.try_get("ordinal")?,
            tax_code: row.try_get("tax_code")?,
            vat_number: row.try_get("vat_number")?,
            email: row.try_get("email")?,
            kind: row.try_get("kind")?,
        })
    };
    build().map_err(|e| StorageError::Mapping(format!("contractor row: {e}")))
}

fn map_code_item(row: &PgRow) -> StorageResult<CodeItem> {
    let build = || -> Result<CodeItem, sqlx::Error> {
        Ok(CodeItem {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            ordinal: row.try_get("ordinal")?,
        })
    };
    build().map_err(|e| StorageError::Mapping(format!("vocabulary row: {e}")))
}

const AGREEMENT_COLUMNS: &str = r#"
        A.id                    AS id,
        A.title                 AS title,
        A.description           AS description,
        A.ordinal               AS ordinal,
        A.notes                 AS notes,
        A.approval_date         AS approval_date,
        A.approval_note         AS approval_note,
        A.second_approval_date  AS second_approval_date,
        A.second_approval_note  AS second_approval_note,
        A.signing_date          AS signing_date,
        A.signing_note          AS signing_note,
        A.expiry_date           AS expiry_date,
        A.expiry_note           AS expiry_note,
        A.registry_number       AS registry_number,
        A.stamp_duty_charge     AS stamp_duty_charge,
        A.stamp_duty_paid       AS stamp_duty_paid,
        A.last_modified_date    AS last_modified_date,
        A.last_modified_time    AS last_modified_time,
        A.last_modified_user    AS last_modified_user,
        (SELECT name FROM agreement_kind WHERE id = A.kind_id) AS kind
"#;

#[async_trait]
impl StorageGateway for PostgresGateway {
    #[instrument(skip(self), err)]
    async fn load_command_descriptors(&self) -> StorageResult<Vec<CommandDescriptor>> {
        let rows = sqlx::query(
            r#"
            SELECT token, handler_name, default_view, label, informative, ordinal
            FROM command
            ORDER BY ordinal
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_command_descriptors", e))?;

        let mut descriptors = Vec::with_capacity(rows.len());
        for row in rows {
            let build = || -> Result<CommandDescriptor, sqlx::Error> {
                Ok(CommandDescriptor {
                    token: row.try_get("token")?,
                    handler_name: row.try_get("handler_name")?,
                    default_view: row.try_get("default_view")?,
                    label: row.try_get("label")?,
                    informative: row.try_get("informative")?,
                    ordinal: row.try_get("ordinal")?,
                })
            };
            descriptors
                .push(build().map_err(|e| StorageError::Mapping(format!("command row: {e}")))?);
        }
        Ok(descriptors)
    }

    #[instrument(skip(self, principal), fields(user = %principal.username()), err)]
    async fn agreements_for(&self, principal: &Principal) -> StorageResult<Vec<Agreement>> {
        let sql = format!(
            r#"
            SELECT DISTINCT {AGREEMENT_COLUMNS}
            FROM agreement A
            WHERE A.status_id = (SELECT id FROM agreement_status WHERE name = 'ATTIVO')
              AND A.id IN (SELECT G.agreement_id FROM agreement_grp G WHERE G.grp_id = ANY($1))
            ORDER BY A.ordinal, A.expiry_date DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(group_ids(principal.groups()))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("agreements_for", e))?;
        rows.iter().map(map_agreement).collect()
    }

    #[instrument(skip(self, principal), fields(user = %principal.username(), id = %id), err)]
    async fn agreement(
        &self,
        principal: &Principal,
        id: AgreementId,
    ) -> StorageResult<Agreement> {
        let sql = format!(
            r#"
            SELECT {AGREEMENT_COLUMNS}
            FROM agreement A
            WHERE A.id = $1
              AND A.id IN (SELECT G.agreement_id FROM agreement_grp G WHERE G.grp_id = ANY($2))
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .bind(group_ids(principal.groups()))
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("agreement", e))?;
        map_agreement(&row)
    }

    #[instrument(skip(self, groups), fields(groups = groups.len()), err)]
    async fn agreements_expiring(
        &self,
        groups: &[RecipientGroupId],
        window: DateWindow,
    ) -> StorageResult<Vec<Agreement>> {
        let sql = format!(
            r#"
            SELECT DISTINCT {AGREEMENT_COLUMNS}
            FROM agreement A
            WHERE A.status_id = (SELECT id FROM agreement_status WHERE name = 'ATTIVO')
              AND A.id IN (SELECT G.agreement_id FROM agreement_grp G WHERE G.grp_id = ANY($1))
              AND A.expiry_date >= $2
              AND A.expiry_date < $3
            ORDER BY A.expiry_date, A.title
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(group_ids(groups))
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("agreements_expiring", e))?;
        rows.iter().map(map_agreement).collect()
    }

    #[instrument(skip(self, principal, criteria), fields(user = %principal.username()), err)]
    async fn search_agreements(
        &self,
        principal: &Principal,
        criteria: &SearchCriteria,
    ) -> StorageResult<Vec<Agreement>> {
        let sql = format!(
            r#"
            SELECT DISTINCT {AGREEMENT_COLUMNS}
            FROM agreement A
            WHERE A.status_id = (SELECT id FROM agreement_status WHERE name = 'ATTIVO')
              AND A.id IN (SELECT G.agreement_id FROM agreement_grp G WHERE G.grp_id = ANY($1))
              AND ($2::text IS NULL OR lower(A.title) LIKE '%' || lower($2) || '%')
              AND ($3::text IS NULL
                   OR A.kind_id = (SELECT id FROM agreement_kind WHERE name = $3))
              AND ($4::text IS NULL
                   OR A.id IN (SELECT L.agreement_id
                               FROM agreement_scope_link L
                               JOIN agreement_scope S ON S.id = L.scope_id
                               WHERE S.name = $4))
            ORDER BY A.ordinal, A.title
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(group_ids(principal.groups()))
            .bind(criteria.title.as_deref())
            .bind(criteria.kind.as_deref())
            .bind(criteria.scope.as_deref())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("search_agreements", e))?;
        rows.iter().map(map_agreement).collect()
    }

    #[instrument(skip(self, principal, update), fields(user = %principal.username(), id = %update.id), err)]
    async fn update_agreement(
        &self,
        principal: &Principal,
        update: &AgreementUpdate,
        at: DateTime<Utc>,
    ) -> StorageResult<Agreement> {
        update
            .validate()
            .map_err(|e| StorageError::Constraint(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE agreement
            SET title = $1,
                registry_number = $2,
                description = $3,
                notes = $4,
                approval_date = $5,
                approval_note = $6,
                second_approval_date = $7,
                second_approval_note = $8,
                signing_date = $9,
                signing_note = $10,
                expiry_date = $11,
                expiry_note = $12,
                stamp_duty_charge = $13,
                stamp_duty_paid = $14,
                last_modified_date = $15,
                last_modified_time = $16,
                last_modified_user = $17
            WHERE id = $18
              AND id IN (SELECT G.agreement_id FROM agreement_grp G WHERE G.grp_id = ANY($19))
            "#,
        )
        .bind(&update.title)
        .bind(update.registry_number.as_deref())
        .bind(update.description.as_deref())
        .bind(update.notes.as_deref())
        .bind(update.approval.as_ref().map(|e| e.date))
        .bind(update.approval.as_ref().and_then(|e| e.note.as_deref()))
        .bind(update.second_approval.as_ref().map(|e| e.date))
        .bind(update.second_approval.as_ref().and_then(|e| e.note.as_deref()))
        .bind(update.signing.as_ref().map(|e| e.date))
        .bind(update.signing.as_ref().and_then(|e| e.note.as_deref()))
        .bind(update.expiry.as_ref().map(|e| e.date))
        .bind(update.expiry.as_ref().and_then(|e| e.note.as_deref()))
        .bind(update.stamp_duty_charge.as_deref())
        .bind(update.stamp_duty_paid)
        .bind(at.date_naive())
        .bind(at.time())
        .bind(principal.id().as_i64())
        .bind(update.id.as_i64())
        .bind(group_ids(principal.groups()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_agreement", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        self.agreement(principal, update.id).await
    }

    #[instrument(skip(self), err)]
    async fn contractors(
        &self,
        assignable_to: Option<AgreementId>,
    ) -> StorageResult<Vec<Contractor>> {
        // The sentinel mirrors the register semantics: with no agreement id
        // the NOT IN filter is disabled and every contractor comes back.
        let agreement_id = assignable_to.map_or(-1, |id| id.as_i64());
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT
                P.id            AS id,
                P.name          AS name,
                P.description   AS description,
                P.ordinal       AS ordinal,
                P.tax_code      AS tax_code,
                P.vat_number    AS vat_number,
                P.email         AS email,
                (SELECT name FROM contractor_kind WHERE id = P.kind_id) AS kind
            FROM contractor P
            WHERE P.id NOT IN
                  (SELECT C.contractor_id FROM agreement_contractor C WHERE C.agreement_id = $1)
               OR -1 = $1
            ORDER BY P.ordinal, P.name
            "#,
        )
        .bind(agreement_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("contractors", e))?;
        rows.iter().map(map_contractor).collect()
    }

    #[instrument(skip(self), fields(agreement = %agreement), err)]
    async fn contractors_of(&self, agreement: AgreementId) -> StorageResult<Vec<Contractor>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT
                P.id            AS id,
                P.name          AS name,
                P.description   AS description,
                P.ordinal       AS ordinal,
                P.tax_code      AS tax_code,
                P.vat_number    AS vat_number,
                P.email         AS email,
                (SELECT name FROM contractor_kind WHERE id = P.kind_id) AS kind
            FROM contractor P
            JOIN agreement_contractor C ON C.contractor_id = P.id
            WHERE C.agreement_id = $1
            ORDER BY P.ordinal, P.name
            "#,
        )
        .bind(agreement.as_i64())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("contractors_of", e))?;
        rows.iter().map(map_contractor).collect()
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn contractor(&self, id: ContractorId) -> StorageResult<Contractor> {
        let row = sqlx::query(
            r#"
            SELECT
                P.id            AS id,
                P.name          AS name,
                P.description   AS description,
                P.ordinal       AS ordinal,
                P.tax_code      AS tax_code,
                P.vat_number    AS vat_number,
                P.email         AS email,
                (SELECT name FROM contractor_kind WHERE id = P.kind_id) AS kind
            FROM contractor P
            WHERE P.id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("contractor", e))?;
        map_contractor(&row)
    }

    #[instrument(
        skip(self, principal, contractors),
        fields(user = %principal.username(), agreement = %agreement, count = contractors.len()),
        err
    )]
    async fn assign_contractors(
        &self,
        principal: &Principal,
        agreement: AgreementId,
        contractors: &[ContractorId],
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("assign_contractors", e))?;

        for contractor in contractors {
            sqlx::query(
                r#"
                INSERT INTO agreement_contractor
                    (agreement_id, contractor_id,
                     last_modified_date, last_modified_time, last_modified_user)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(agreement.as_i64())
            .bind(contractor.as_i64())
            .bind(at.date_naive())
            .bind(at.time())
            .bind(principal.id().as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("assign_contractors", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("assign_contractors", e))
    }

    #[instrument(skip(self), err)]
    async fn agreement_kinds(&self) -> StorageResult<Vec<CodeItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, ordinal
            FROM agreement_kind
            ORDER BY ordinal, name
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("agreement_kinds", e))?;
        rows.iter().map(map_code_item).collect()
    }

    #[instrument(skip(self), err)]
    async fn agreement_scopes(&self) -> StorageResult<Vec<CodeItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, ordinal
            FROM agreement_scope
            ORDER BY ordinal, name
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("agreement_scopes", e))?;
        rows.iter().map(map_code_item).collect()
    }

    #[instrument(skip(self), fields(user = username), err)]
    async fn record_access(&self, username: &str, at: DateTime<Utc>) -> StorageResult<()> {
        // Delete-then-insert in one transaction: concurrent logins leave
        // exactly one row per user.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("record_access", e))?;

        sqlx::query("DELETE FROM access_log WHERE login = $1")
            .bind(username)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("record_access", e))?;

        sqlx::query(
            r#"
            INSERT INTO access_log (login, last_access_date, last_access_time)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(username)
        .bind(at.date_naive())
        .bind(at.time())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("record_access", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("record_access", e))
    }
}
