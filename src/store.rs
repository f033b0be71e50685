use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::model::{Alert, AlertId, OwnerId, StoredAlert};

/// In-memory alert registry shared between command handlers and the evaluator.
///
/// Every mutation takes the write lock for its whole read-modify-write, so an
/// alert can only ever be handed out by one remover. The lock is never held
/// across an `.await`.
#[derive(Debug, Default)]
pub struct AlertStore {
    alerts: RwLock<Vec<StoredAlert>>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `alert` and return the identity assigned to it.
    pub fn add(&self, alert: Alert) -> AlertId {
        let id = AlertId::new();
        self.write().push(StoredAlert {
            id,
            created_at: Utc::now(),
            alert,
        });
        id
    }

    /// Alerts owned by `owner`, in insertion order.
    pub fn list_by_owner(&self, owner: OwnerId) -> Vec<Alert> {
        self.read()
            .iter()
            .filter(|s| s.alert.owner == owner)
            .map(|s| s.alert.clone())
            .collect()
    }

    /// Remove every alert owned by `owner`; returns how many were removed.
    pub fn remove_by_owner(&self, owner: OwnerId) -> usize {
        self.remove_matching(|s| s.alert.owner == owner).len()
    }

    /// Remove and return exactly the alerts for which `predicate` holds.
    pub fn remove_matching<F>(&self, mut predicate: F) -> Vec<StoredAlert>
    where
        F: FnMut(&StoredAlert) -> bool,
    {
        let mut alerts = self.write();
        let mut removed = Vec::new();
        alerts.retain(|s| {
            if predicate(s) {
                removed.push(s.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Point-in-time copy of every alert.
    pub fn snapshot(&self) -> Vec<StoredAlert> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // `retain` and `push` cannot leave the vector half-updated, so a guard
    // poisoned by a panicking predicate is still safe to reuse.
    fn read(&self) -> RwLockReadGuard<'_, Vec<StoredAlert>> {
        self.alerts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<StoredAlert>> {
        self.alerts.write().unwrap_or_else(PoisonError::into_inner)
    }
}
