//! In-process implementations of the deadline slot and identity source.

use std::sync::Mutex;

use super::traits::{Account, DeadlineStore, IdentitySource};
use crate::error::GatewayError;

/// Deadline slot that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryDeadlineStore {
    slot: Mutex<Option<u64>>,
}

impl DeadlineStore for MemoryDeadlineStore {
    fn load(&self) -> Result<Option<u64>, GatewayError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| GatewayError::persistence("deadline slot poisoned"))?;
        Ok(*slot)
    }

    fn save(&self, deadline_ms: u64) -> Result<(), GatewayError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| GatewayError::persistence("deadline slot poisoned"))?;
        *slot = Some(deadline_ms);
        Ok(())
    }

    fn clear(&self) -> Result<(), GatewayError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| GatewayError::persistence("deadline slot poisoned"))?;
        *slot = None;
        Ok(())
    }
}

/// Identity source that always reports the same account.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    account: Account,
}

impl StaticIdentity {
    pub fn new(account: Account) -> Self {
        Self { account }
    }
}

impl IdentitySource for StaticIdentity {
    fn account(&self) -> Account {
        self.account.clone()
    }
}
