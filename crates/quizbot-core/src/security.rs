use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;

use crate::{
    domain::{Role, UserId},
    store::QuizRepository,
    Result,
};

// ============== Authorization ==============

/// Policy predicate consulted before a gated command runs.
#[async_trait]
pub trait AuthorizationGate: Send + Sync {
    async fn allows(&self, caller: UserId, required: Role) -> Result<bool>;
}

/// Role lookup through the repository. Configured bootstrap ids always count
/// as super-admins.
pub struct RoleGate {
    repo: Arc<dyn QuizRepository>,
    super_admins: HashSet<i64>,
}

impl RoleGate {
    pub fn new(repo: Arc<dyn QuizRepository>, super_admins: &[i64]) -> Self {
        Self {
            repo,
            super_admins: super_admins.iter().copied().collect(),
        }
    }

    pub async fn effective_role(&self, caller: UserId) -> Result<Role> {
        if self.super_admins.contains(&caller.0) {
            return Ok(Role::SuperAdmin);
        }
        self.repo.role_of(caller).await
    }
}

#[async_trait]
impl AuthorizationGate for RoleGate {
    async fn allows(&self, caller: UserId, required: Role) -> Result<bool> {
        if required == Role::User {
            return Ok(true);
        }
        Ok(self.effective_role(caller).await? >= required)
    }
}
