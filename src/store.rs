use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::types::{ProbeOutcome, Status, TargetRow};

/// Faults in store usage. These are programming errors on the caller's
/// side, fatal to the offending target's probe only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0}: already registered for this round")]
    AlreadyRegistered(String),
    #[error("{0}: not registered for this round")]
    Unknown(String),
    #[error("{0}: reachability already recorded for this round")]
    AlreadyResolved(String),
    #[error("{0}: port classified before reachability was recorded")]
    NotReachable(String),
}

#[derive(Debug, Clone)]
struct Slot {
    address: String,
    outcome: ProbeOutcome,
}

#[derive(Debug, Default)]
struct Entries {
    order: Vec<String>,
    slots: HashMap<String, Slot>,
}

/// Concurrency-safe map target-name -> probe outcome for one round.
///
/// One coarse async mutex guards the whole map, so every update is atomic
/// with respect to `snapshot` and a reader never observes a half-written
/// port set. Rows keep submission order. Handles are cheap clones sharing
/// the same map.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    inner: Arc<Mutex<Entries>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a `Pending` entry. Must happen before the target's probe
    /// task starts.
    pub async fn register(&self, name: &str, address: &str) -> Result<(), StoreError> {
        let mut entries = self.inner.lock().await;
        if entries.slots.contains_key(name) {
            return Err(StoreError::AlreadyRegistered(name.to_string()));
        }
        entries.order.push(name.to_string());
        entries.slots.insert(
            name.to_string(),
            Slot {
                address: address.to_string(),
                outcome: ProbeOutcome::pending(),
            },
        );
        Ok(())
    }

    /// Advance `Pending` to `Reachable` or `Unreachable`. A second call
    /// for the same target within a round is a fault.
    pub async fn set_reachability(&self, name: &str, reachable: bool) -> Result<(), StoreError> {
        let mut entries = self.inner.lock().await;
        let slot = entries
            .slots
            .get_mut(name)
            .ok_or_else(|| StoreError::Unknown(name.to_string()))?;
        if slot.outcome.status != Status::Pending {
            return Err(StoreError::AlreadyResolved(name.to_string()));
        }
        slot.outcome.status = if reachable {
            Status::Reachable
        } else {
            Status::Unreachable
        };
        Ok(())
    }

    pub async fn add_open_port(&self, name: &str, port: u16) -> Result<(), StoreError> {
        self.add_port(name, port, true).await
    }

    pub async fn add_closed_port(&self, name: &str, port: u16) -> Result<(), StoreError> {
        self.add_port(name, port, false).await
    }

    /// Append-only set update; classifying the same port twice is a no-op.
    async fn add_port(&self, name: &str, port: u16, open: bool) -> Result<(), StoreError> {
        let mut entries = self.inner.lock().await;
        let slot = entries
            .slots
            .get_mut(name)
            .ok_or_else(|| StoreError::Unknown(name.to_string()))?;
        if slot.outcome.status != Status::Reachable {
            return Err(StoreError::NotReachable(name.to_string()));
        }
        let set = if open {
            &mut slot.outcome.open
        } else {
            &mut slot.outcome.closed
        };
        if !set.contains(&port) {
            set.push(port);
        }
        Ok(())
    }

    /// Point-in-time copy in submission order, independently iterable
    /// while other entries keep mutating.
    pub async fn snapshot(&self) -> Vec<TargetRow> {
        let entries = self.inner.lock().await;
        entries
            .order
            .iter()
            .map(|name| {
                let slot = &entries.slots[name.as_str()];
                TargetRow {
                    name: name.clone(),
                    address: slot.address.clone(),
                    outcome: slot.outcome.clone(),
                }
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
