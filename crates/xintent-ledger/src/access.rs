//! Role-based capabilities administered by a single admin address.

use std::collections::{HashMap, HashSet};

use xintent_core::{Address, Journal, LedgerEvent, Result, Role, XIntentError};

/// Admin plus role membership for one chain.
#[derive(Debug, Clone)]
pub struct AccessControl {
    admin: Address,
    members: HashMap<Role, HashSet<Address>>,
}

impl AccessControl {
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            members: HashMap::new(),
        }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn ensure_admin(&self, caller: Address) -> Result<()> {
        if caller != self.admin {
            return Err(XIntentError::unauthorized(caller, "admin"));
        }
        Ok(())
    }

    pub fn has_role(&self, role: Role, account: Address) -> bool {
        self.members
            .get(&role)
            .is_some_and(|set| set.contains(&account))
    }

    /// Succeeds if `caller` holds any of `roles`.
    pub fn ensure_any(&self, caller: Address, roles: &[Role]) -> Result<()> {
        if roles.iter().any(|role| self.has_role(*role, caller)) {
            return Ok(());
        }
        let required = roles
            .iter()
            .map(Role::to_string)
            .collect::<Vec<_>>()
            .join(" or ");
        Err(XIntentError::unauthorized(caller, required))
    }

    pub fn grant(
        &mut self,
        caller: Address,
        role: Role,
        account: Address,
        journal: &mut Journal,
    ) -> Result<()> {
        self.ensure_admin(caller)?;
        if self.members.entry(role).or_default().insert(account) {
            journal.record(LedgerEvent::RoleGranted { role, account });
        }
        Ok(())
    }

    pub fn revoke(
        &mut self,
        caller: Address,
        role: Role,
        account: Address,
        journal: &mut Journal,
    ) -> Result<()> {
        self.ensure_admin(caller)?;
        if self
            .members
            .get_mut(&role)
            .is_some_and(|set| set.remove(&account))
        {
            journal.record(LedgerEvent::RoleRevoked { role, account });
        }
        Ok(())
    }
}
