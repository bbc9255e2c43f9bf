use serde::{Deserialize, Serialize};

use col_core::{RecipientGroupId, UserId};

use crate::Role;

/// Identity of an authenticated principal.
///
/// Group membership drives data visibility: agreement queries are scoped to
/// the groups the principal belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    id: UserId,
    username: String,
    role: Role,
    groups: Vec<RecipientGroupId>,
}

impl Principal {
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        role: Role,
        groups: Vec<RecipientGroupId>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            role,
            groups,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn groups(&self) -> &[RecipientGroupId] {
        &self.groups
    }

    pub fn is_member_of(&self, group: RecipientGroupId) -> bool {
        self.groups.contains(&group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_check() {
        let p = Principal::new(
            UserId::new(1),
            "mrossi",
            Role::new("user"),
            vec![RecipientGroupId::new(2), RecipientGroupId::new(5)],
        );
        assert!(p.is_member_of(RecipientGroupId::new(5)));
        assert!(!p.is_member_of(RecipientGroupId::new(3)));
    }
}
