//! # Private World State
//!
//! Account state of one privacy group. Accounts and storage are kept in
//! ordered maps so the state root is a deterministic function of content.

use crate::domain::services::{empty_state_root, keccak256};
use crate::domain::value_objects::{Address, Bytes, Hash, U256};
use rlp::RlpStream;
use std::collections::BTreeMap;

/// A single account in a private state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    /// Transaction count.
    pub nonce: u64,
    /// Balance.
    pub balance: U256,
    /// Contract code (empty for externally owned accounts).
    pub code: Bytes,
    /// Contract storage.
    pub storage: BTreeMap<U256, U256>,
}

impl Account {
    /// Returns true if the account carries code.
    #[must_use]
    pub fn is_contract(&self) -> bool {
        !self.code.is_empty()
    }

    fn storage_root(&self) -> Hash {
        if self.storage.is_empty() {
            return empty_state_root();
        }
        let mut stream = RlpStream::new_list(self.storage.len());
        for (key, value) in &self.storage {
            stream.begin_list(2);
            stream.append(key);
            stream.append(value);
        }
        keccak256(&stream.out())
    }
}

/// Private world state of one privacy group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldState {
    accounts: BTreeMap<Address, Account>,
}

impl WorldState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the account at `address`, if it exists.
    #[must_use]
    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Returns the account at `address`, creating an empty one if needed.
    pub fn account_mut(&mut self, address: Address) -> &mut Account {
        self.accounts.entry(address).or_default()
    }

    /// Nonce of `address` (zero if absent).
    #[must_use]
    pub fn nonce(&self, address: &Address) -> u64 {
        self.account(address).map_or(0, |a| a.nonce)
    }

    /// Balance of `address` (zero if absent).
    #[must_use]
    pub fn balance(&self, address: &Address) -> U256 {
        self.account(address).map_or_else(U256::zero, |a| a.balance)
    }

    /// Storage slot of `address` (zero if unset).
    #[must_use]
    pub fn storage(&self, address: &Address, slot: U256) -> U256 {
        self.account(address)
            .and_then(|a| a.storage.get(&slot).copied())
            .unwrap_or_default()
    }

    /// Deterministic commitment to the full state.
    ///
    /// The empty state hashes to [`empty_state_root`].
    #[must_use]
    pub fn root(&self) -> Hash {
        if self.accounts.is_empty() {
            return empty_state_root();
        }
        let mut stream = RlpStream::new_list(self.accounts.len());
        for (address, account) in &self.accounts {
            stream.begin_list(5);
            stream.append(&address.as_bytes().to_vec());
            stream.append(&account.nonce);
            stream.append(&account.balance);
            stream.append(&keccak256(account.code.as_slice()).as_bytes().to_vec());
            stream.append(&account.storage_root().as_bytes().to_vec());
        }
        keccak256(&stream.out())
    }
}

// =============================================================================
// TESTS
// =============================================================================
