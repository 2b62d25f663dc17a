//! # Private State Adapter
//!
//! In-memory durable private state keyed by state root, with checkout
//! accounting so tests can assert every snapshot was released.

use crate::domain::services::{empty_state_root, keccak256};
use crate::domain::state::WorldState;
use crate::domain::value_objects::Hash;
use crate::errors::StoreError;
use crate::ports::outbound::PrivateStateStorage;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Content-addressed store of committed private states.
#[derive(Debug)]
pub struct InMemoryPrivateStateStorage {
    states: RwLock<BTreeMap<Hash, WorldState>>,
    checked_out: Mutex<HashMap<Hash, usize>>,
    checkouts_served: AtomicUsize,
}

impl Default for InMemoryPrivateStateStorage {
    fn default() -> Self {
        let mut states = BTreeMap::new();
        states.insert(empty_state_root(), WorldState::new());
        Self {
            states: RwLock::new(states),
            checked_out: Mutex::new(HashMap::new()),
            checkouts_served: AtomicUsize::new(0),
        }
    }
}

impl InMemoryPrivateStateStorage {
    /// Creates storage holding only the empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists `state` and returns its root.
    pub fn commit(&self, state: WorldState) -> Hash {
        let root = state.root();
        self.states.write().insert(root, state);
        root
    }

    /// Drops a stored state (simulates pruning).
    pub fn prune(&self, root: &Hash) {
        self.states.write().remove(root);
    }

    /// Number of checkouts not yet released.
    #[must_use]
    pub fn open_snapshots(&self) -> usize {
        self.checked_out.lock().values().sum()
    }

    /// Successful checkouts since creation, released or not.
    #[must_use]
    pub fn checkouts_served(&self) -> usize {
        self.checkouts_served.load(Ordering::Relaxed)
    }

    /// Commitment to everything stored. Changes if any stored state changes.
    #[must_use]
    pub fn checksum(&self) -> Hash {
        let states = self.states.read();
        let mut buf = Vec::with_capacity(states.len() * 64);
        for (root, state) in states.iter() {
            buf.extend_from_slice(root.as_bytes());
            buf.extend_from_slice(state.root().as_bytes());
        }
        keccak256(&buf)
    }
}

#[async_trait]
impl PrivateStateStorage for InMemoryPrivateStateStorage {
    async fn checkout(&self, root: &Hash) -> Result<Option<WorldState>, StoreError> {
        let Some(state) = self.states.read().get(root).cloned() else {
            return Ok(None);
        };
        *self.checked_out.lock().entry(*root).or_insert(0) += 1;
        self.checkouts_served.fetch_add(1, Ordering::Relaxed);
        Ok(Some(state))
    }

    fn release(&self, root: &Hash) {
        let mut checked_out = self.checked_out.lock();
        match checked_out.get_mut(root) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                checked_out.remove(root);
            }
            None => warn!(root = ?root, "Release without matching checkout"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{Address, U256};

    #[tokio::test]
    async fn test_checkout_is_detached() {
        let storage = InMemoryPrivateStateStorage::new();
        let mut state = WorldState::new();
        state.account_mut(Address::new([1; 20])).balance = U256::from(10);
        let root = storage.commit(state);
        let before = storage.checksum();

        let mut copy = storage.checkout(&root).await.unwrap().unwrap();
        copy.account_mut(Address::new([2; 20])).nonce = 3;
        assert_eq!(storage.open_snapshots(), 1);

        storage.release(&root);
        assert_eq!(storage.open_snapshots(), 0);
        assert_eq!(storage.checkouts_served(), 1);
        assert_eq!(storage.checksum(), before);
    }

    #[tokio::test]
    async fn test_missing_root() {
        let storage = InMemoryPrivateStateStorage::new();
        assert!(storage.checkout(&Hash::new([7; 32])).await.unwrap().is_none());
        assert_eq!(storage.open_snapshots(), 0);
        assert!(storage
            .checkout(&empty_state_root())
            .await
            .unwrap()
            .is_some());
    }
}
