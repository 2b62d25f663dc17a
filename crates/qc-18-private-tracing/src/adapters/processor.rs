//! # Reference Message Processor
//!
//! Minimal deterministic private transaction processor used by tests and
//! local tooling. It is not an EVM: deployment stores the payload as code
//! and a call to a contract writes its ABI argument words into storage.
//!
//! | Transaction | Effect |
//! |-------------|--------|
//! | creation | code = payload at `compute_contract_address(sender, nonce)` |
//! | call to contract | slot `i` = i-th 32-byte word after the selector |
//! | call to EOA | value transfer only |
//!
//! A call whose argument data is not word aligned reverts.

use crate::domain::call_tree::{CallKind, TransactionStatus};
use crate::domain::entities::{BlockHeader, PrivateTransaction};
use crate::domain::services::{compute_contract_address, intrinsic_gas};
use crate::domain::state::WorldState;
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::errors::ExecutionError;
use crate::ports::outbound::{FrameEnter, FrameExit, PrivateTransactionProcessor, TracerHook};

const WORD_SIZE: usize = 32;
const SELECTOR_SIZE: usize = 4;

/// Reference processor.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicMessageProcessor;

impl BasicMessageProcessor {
    /// Creates the processor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn validate(state: &WorldState, tx: &PrivateTransaction) -> Option<String> {
        let expected_nonce = state.nonce(&tx.sender);
        if tx.nonce != expected_nonce {
            return Some(format!(
                "nonce mismatch: expected {expected_nonce}, got {}",
                tx.nonce
            ));
        }
        if state.balance(&tx.sender) < tx.value {
            return Some("insufficient balance for value transfer".to_string());
        }
        if tx.is_contract_creation() && tx.payload.is_empty() {
            return Some("contract creation without init code".to_string());
        }
        let required = intrinsic_gas(tx.payload.as_slice(), tx.is_contract_creation());
        if tx.gas_limit < required {
            return Some(format!(
                "intrinsic gas {required} exceeds gas limit {}",
                tx.gas_limit
            ));
        }
        None
    }

    fn transfer(state: &mut WorldState, tx: &PrivateTransaction, to: Address) {
        if tx.value.is_zero() {
            return;
        }
        let sender = state.account_mut(tx.sender);
        sender.balance = sender.balance.saturating_sub(tx.value);
        let recipient = state.account_mut(to);
        recipient.balance = recipient.balance.saturating_add(tx.value);
    }
}

impl PrivateTransactionProcessor for BasicMessageProcessor {
    fn process(
        &self,
        state: &mut WorldState,
        _header: &BlockHeader,
        tx: &PrivateTransaction,
        tracer: &mut dyn TracerHook,
    ) -> Result<TransactionStatus, ExecutionError> {
        if let Some(reason) = Self::validate(state, tx) {
            return Ok(TransactionStatus::Invalid { reason });
        }

        let gas_used = intrinsic_gas(tx.payload.as_slice(), tx.is_contract_creation());
        state.account_mut(tx.sender).nonce += 1;

        let Some(to) = tx.to else {
            let address = compute_contract_address(tx.sender, tx.nonce);
            tracer.on_enter(FrameEnter {
                kind: CallKind::Create,
                from: tx.sender,
                to: None,
                value: tx.value,
                input: tx.payload.clone(),
                gas: tx.gas_limit,
            });

            Self::transfer(state, tx, address);
            let contract = state.account_mut(address);
            contract.nonce = 1;
            contract.code = tx.payload.clone();

            tracer.on_exit(FrameExit {
                output: tx.payload.clone(),
                gas_used,
                created_address: Some(address),
                ..FrameExit::default()
            });
            return Ok(TransactionStatus::Successful);
        };

        tracer.on_enter(FrameEnter {
            kind: CallKind::Call,
            from: tx.sender,
            to: Some(to),
            value: tx.value,
            input: tx.payload.clone(),
            gas: tx.gas_limit,
        });

        let is_contract = state.account(&to).is_some_and(|a| a.is_contract());
        let arguments = tx.payload.as_slice().get(SELECTOR_SIZE..).unwrap_or_default();

        if is_contract && arguments.len() % WORD_SIZE != 0 {
            let reason = Bytes::from_slice(b"calldata not word aligned");
            tracer.on_exit(FrameExit {
                gas_used,
                error: Some("Reverted".to_string()),
                revert_reason: Some(reason.clone()),
                ..FrameExit::default()
            });
            return Ok(TransactionStatus::Reverted { reason });
        }

        Self::transfer(state, tx, to);
        if is_contract {
            let account = state.account_mut(to);
            for (slot, word) in arguments.chunks(WORD_SIZE).enumerate() {
                account
                    .storage
                    .insert(U256::from(slot), U256::from_big_endian(word));
            }
        }

        tracer.on_exit(FrameExit {
            gas_used,
            ..FrameExit::default()
        });
        Ok(TransactionStatus::Successful)
    }
}

// =============================================================================
// TESTS
// =============================================================================
