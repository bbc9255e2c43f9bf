//! Agreement aggregate.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use col_core::{AgreementId, DateWindow, DomainError, DomainResult, UserId};

use crate::vocab::AgreementStatus;

/// A dated milestone with an optional free-text note (approval, signing,
/// expiry all share this shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorsement {
    pub date: NaiveDate,
    pub note: Option<String>,
}

impl Endorsement {
    pub fn on(date: NaiveDate) -> Self {
        Self { date, note: None }
    }

    pub fn with_note(date: NaiveDate, note: impl Into<String>) -> Self {
        Self {
            date,
            note: Some(note.into()),
        }
    }
}

/// Last-modification audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub user_id: UserId,
}

/// An agreement (convention) between the institution and its contractors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: AgreementId,
    pub title: String,
    pub description: Option<String>,
    pub ordinal: i32,
    pub notes: Option<String>,
    pub approval: Option<Endorsement>,
    pub second_approval: Option<Endorsement>,
    pub signing: Option<Endorsement>,
    pub expiry: Option<Endorsement>,
    pub registry_number: Option<String>,
    pub stamp_duty_charge: Option<String>,
    pub stamp_duty_paid: bool,
    pub kind: Option<String>,
    pub status: AgreementStatus,
    pub last_modified: Option<Audit>,
}

impl Agreement {
    /// Minimal constructor used by storage mappers and tests; optional
    /// fields start empty.
    pub fn new(id: AgreementId, title: impl Into<String>) -> DomainResult<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::missing("agreement title"));
        }
        Ok(Self {
            id,
            title,
            description: None,
            ordinal: 0,
            notes: None,
            approval: None,
            second_approval: None,
            signing: None,
            expiry: None,
            registry_number: None,
            stamp_duty_charge: None,
            stamp_duty_paid: false,
            kind: None,
            status: AgreementStatus::Active,
            last_modified: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == AgreementStatus::Active
    }

    /// Whether the expiry date falls inside the half-open window. An
    /// agreement with no expiry date never matches.
    pub fn expires_within(&self, window: DateWindow) -> bool {
        self.expiry
            .as_ref()
            .is_some_and(|e| window.contains(e.date))
    }
}

/// Editable fields of an agreement, applied as a whole.
///
/// Mirrors the columns of the update statement: everything the edit form
/// can change, keyed by the agreement id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementUpdate {
    pub id: AgreementId,
    pub title: String,
    pub registry_number: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub approval: Option<Endorsement>,
    pub second_approval: Option<Endorsement>,
    pub signing: Option<Endorsement>,
    pub expiry: Option<Endorsement>,
    pub stamp_duty_charge: Option<String>,
    pub stamp_duty_paid: bool,
}

impl AgreementUpdate {
    pub fn validate(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::missing("agreement title"));
        }
        Ok(())
    }

    /// Apply the edit to an existing row, stamping the audit trail.
    pub fn apply_to(&self, agreement: &mut Agreement, audit: Audit) {
        agreement.title = self.title.clone();
        agreement.registry_number = self.registry_number.clone();
        agreement.description = self.description.clone();
        agreement.notes = self.notes.clone();
        agreement.approval = self.approval.clone();
        agreement.second_approval = self.second_approval.clone();
        agreement.signing = self.signing.clone();
        agreement.expiry = self.expiry.clone();
        agreement.stamp_duty_charge = self.stamp_duty_charge.clone();
        agreement.stamp_duty_paid = self.stamp_duty_paid;
        agreement.last_modified = Some(audit);
    }
}

/// Search filter for the agreements register.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Case-insensitive fragment matched against the title.
    pub title: Option<String>,
    /// Agreement type name, exact match.
    pub kind: Option<String>,
    /// Scope name, exact match.
    pub scope: Option<String>,
}

impl SearchCriteria {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.kind.is_none() && self.scope.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use col_core::DateWindow;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn agreement(id: i64, title: &str) -> Agreement {
        Agreement::new(AgreementId::new(id), title).unwrap()
    }

    #[test]
    fn blank_title_is_rejected() {
        let err = Agreement::new(AgreementId::new(1), "   ").unwrap_err();
        assert!(matches!(err, DomainError::MissingAttribute(_)));
    }

    #[test]
    fn expiry_matching_uses_half_open_window() {
        let window = DateWindow::new(date(2025, 1, 1), date(2026, 1, 1));

        let mut inside = agreement(1, "Radiology services");
        inside.expiry = Some(Endorsement::on(date(2025, 6, 30)));
        assert!(inside.expires_within(window));

        let mut boundary = agreement(2, "Legal counsel");
        boundary.expiry = Some(Endorsement::on(date(2026, 1, 1)));
        assert!(!boundary.expires_within(window));

        let undated = agreement(3, "Facility upkeep");
        assert!(!undated.expires_within(window));
    }

    #[test]
    fn update_applies_fields_and_audit() {
        let mut row = agreement(9, "Old title");
        let update = AgreementUpdate {
            id: row.id,
            title: "New title".into(),
            registry_number: Some("2025/17".into()),
            description: None,
            notes: Some("renegotiated".into()),
            approval: None,
            second_approval: None,
            signing: None,
            expiry: Some(Endorsement::on(date(2027, 3, 1))),
            stamp_duty_charge: None,
            stamp_duty_paid: true,
        };
        let audit = Audit {
            date: date(2025, 8, 26),
            time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            user_id: UserId::new(5),
        };

        update.apply_to(&mut row, audit);

        assert_eq!(row.title, "New title");
        assert_eq!(row.registry_number.as_deref(), Some("2025/17"));
        assert!(row.stamp_duty_paid);
        assert_eq!(row.last_modified.unwrap().user_id, UserId::new(5));
    }

    #[test]
    fn update_with_blank_title_fails_validation() {
        let update = AgreementUpdate {
            id: AgreementId::new(1),
            title: "".into(),
            registry_number: None,
            description: None,
            notes: None,
            approval: None,
            second_approval: None,
            signing: None,
            expiry: None,
            stamp_duty_charge: None,
            stamp_duty_paid: false,
        };
        assert!(update.validate().is_err());
    }
}
