// src/model/approval.rs

use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use crate::model::job::JobId;
use crate::types::Role;

/// One approve/disapprove decision, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    pub job: JobId,
    pub approved: bool,
    pub description: String,
    pub username: String,
    pub date: NaiveDateTime,
}

/// The user making an approval decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub username: String,
    pub roles: BTreeSet<Role>,
}

impl Actor {
    pub fn new(username: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            username: username.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}
