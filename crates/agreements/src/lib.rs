//! `col-agreements` — agreement and contractor domain model.
//!
//! Pure data + invariants; persistence lives in `col-storage`.

pub mod agreement;
pub mod contractor;
pub mod vocab;

pub use agreement::{Agreement, AgreementUpdate, Audit, Endorsement, SearchCriteria};
pub use contractor::Contractor;
pub use vocab::{AgreementStatus, CodeItem};
