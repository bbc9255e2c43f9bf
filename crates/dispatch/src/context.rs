//! Request context and tolerant parameter access.
//!
//! Handlers never touch the HTTP layer directly; they see a flattened
//! parameter map plus the authenticated principal. Parameter accessors are
//! deliberately forgiving: absent or malformed values fall back to the
//! documented defaults instead of failing the request.

use std::collections::HashMap;

use chrono::NaiveDate;

use col_auth::Principal;
use col_core::AgreementId;

/// Read operations.
pub const OP_SELECT: &str = "sel";
/// Creation / link operations.
pub const OP_INSERT: &str = "ins";
/// Edit operations.
pub const OP_UPDATE: &str = "upd";
/// Removal operations.
pub const OP_DELETE: &str = "del";
/// Filtered search.
pub const OP_SEARCH: &str = "src";

/// Sentinel meaning "no secondary object involved".
pub const DEFAULT_OBJECT: &str = "-";

/// Date floor used when a start-date parameter is absent.
pub const UNIX_EPOCH_DATE: &str = "1970-01-01";
/// Date ceiling used when an end-date parameter is absent.
pub const END_OF_TIME_DATE: &str = "2106-02-07";

/// Everything a command handler may inspect about the current request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    write: bool,
    params: HashMap<String, String>,
    query_string: String,
    referer: Option<String>,
    principal: Principal,
}

impl RequestContext {
    pub fn new(
        write: bool,
        params: HashMap<String, String>,
        query_string: impl Into<String>,
        referer: Option<String>,
        principal: Principal,
    ) -> Self {
        Self {
            write,
            params,
            query_string: query_string.into(),
            referer,
            principal,
        }
    }

    /// Whether the request arrived over a mutating method.
    pub fn is_write(&self) -> bool {
        self.write
    }

    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Raw parameter, `None` when absent or blank.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn param_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.param(name).unwrap_or(default)
    }

    /// Requested operation; defaults to a plain read.
    pub fn op(&self) -> &str {
        self.param_or("op", OP_SELECT)
    }

    /// Secondary object the operation applies to; defaults to the sentinel.
    pub fn object(&self) -> &str {
        self.param_or("obj", DEFAULT_OBJECT)
    }

    /// Entity id; `None` when absent or not a number.
    pub fn id(&self) -> Option<AgreementId> {
        self.param("id").and_then(|v| v.parse().ok())
    }

    /// Numeric parameter with a fallback for garbage input.
    pub fn int_param_or(&self, name: &str, default: i64) -> i64 {
        self.param(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// ISO date parameter with a fallback for garbage input.
    pub fn date_param_or(&self, name: &str, default: &str) -> NaiveDate {
        self.param(name)
            .and_then(|v| NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").ok())
            .unwrap_or_else(|| {
                NaiveDate::parse_from_str(default, "%Y-%m-%d")
                    .unwrap_or(NaiveDate::MIN)
            })
    }

    /// Repeated-value parameter flattened as a separator-joined list
    /// (multi-select form fields arrive this way).
    pub fn id_list(&self, name: &str) -> Vec<i64> {
        self.param(name)
            .map(|v| {
                v.split(',')
                    .filter_map(|part| part.trim().parse().ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use col_auth::Role;
    use col_core::UserId;
    use proptest::prelude::*;

    fn ctx(pairs: &[(&str, &str)]) -> RequestContext {
        let params = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RequestContext::new(
            false,
            params,
            "",
            None,
            Principal::new(UserId::new(1), "mrossi", Role::user(), vec![]),
        )
    }

    #[test]
    fn op_and_object_defaults() {
        let c = ctx(&[]);
        assert_eq!(c.op(), OP_SELECT);
        assert_eq!(c.object(), DEFAULT_OBJECT);
        assert!(c.id().is_none());
    }

    #[test]
    fn blank_values_count_as_absent() {
        let c = ctx(&[("op", "  "), ("id", "")]);
        assert_eq!(c.op(), OP_SELECT);
        assert!(c.id().is_none());
    }

    #[test]
    fn id_parses_or_is_none() {
        assert_eq!(ctx(&[("id", "42")]).id(), Some(AgreementId::new(42)));
        assert!(ctx(&[("id", "forty-two")]).id().is_none());
    }

    #[test]
    fn date_defaults_cover_all_time() {
        let c = ctx(&[]);
        let start = c.date_param_or("start", UNIX_EPOCH_DATE);
        let end = c.date_param_or("end", END_OF_TIME_DATE);
        assert_eq!(start, NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2106, 2, 7).unwrap());
    }

    #[test]
    fn id_list_skips_garbage() {
        let c = ctx(&[("contractors", "1, 2, x, 4")]);
        assert_eq!(c.id_list("contractors"), vec![1, 2, 4]);
    }

    proptest! {
        #[test]
        fn int_param_never_panics(value in "\\PC*") {
            let c = ctx(&[("n", value.as_str())]);
            let _ = c.int_param_or("n", -1);
        }

        #[test]
        fn date_param_never_panics(value in "\\PC*") {
            let c = ctx(&[("d", value.as_str())]);
            let _ = c.date_param_or("d", UNIX_EPOCH_DATE);
        }

        #[test]
        fn garbage_ids_become_none(value in "[^0-9]*[a-zA-Z][^0-9]*") {
            let c = ctx(&[("id", value.as_str())]);
            prop_assert!(c.id().is_none());
        }
    }
}
