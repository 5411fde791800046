use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as GroupMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::ResultEngine;

mod access;
mod balances;
mod expenses;
mod groups;
mod members;
mod settlements;

pub use balances::GroupBalances;
pub use members::JoinOutcome;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Behaviour toggles that differ between deployments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    /// When set, only the group admin may edit expenses. Deleting is always
    /// admin-only.
    #[serde(default)]
    pub expense_edit_requires_admin: bool,
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    policy: LedgerPolicy,
    group_locks: Mutex<HashMap<Uuid, Arc<GroupMutex<()>>>>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    /// Serialize mutations of one group. Held across the whole DB
    /// transaction; different groups never wait on each other.
    async fn lock_group(&self, group_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .group_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on are dropped.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(group_id).or_default())
        };
        lock.lock_owned().await
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    policy: LedgerPolicy,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    pub fn policy(mut self, policy: LedgerPolicy) -> EngineBuilder {
        self.policy = policy;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            policy: self.policy,
            group_locks: Mutex::new(HashMap::new()),
        })
    }
}
