//! # Call Trees
//!
//! Per-transaction call tree produced by the execution tracer during replay.

use crate::domain::value_objects::{Address, Bytes, Hash, U256};
use serde::{Deserialize, Serialize};

/// Kind of a call frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// Message call.
    Call,
    /// CALLCODE.
    CallCode,
    /// DELEGATECALL.
    DelegateCall,
    /// STATICCALL.
    StaticCall,
    /// Contract creation (CREATE or creation transaction).
    Create,
    /// CREATE2.
    Create2,
    /// SELFDESTRUCT.
    SelfDestruct,
}

impl CallKind {
    /// Flat trace `type` for this kind.
    #[must_use]
    pub const fn trace_type(self) -> &'static str {
        match self {
            Self::Call | Self::CallCode | Self::DelegateCall | Self::StaticCall => "call",
            Self::Create | Self::Create2 => "create",
            Self::SelfDestruct => "suicide",
        }
    }

    /// Flat trace `callType`, present only for message calls.
    #[must_use]
    pub const fn call_type(self) -> Option<&'static str> {
        match self {
            Self::Call => Some("call"),
            Self::CallCode => Some("callcode"),
            Self::DelegateCall => Some("delegatecall"),
            Self::StaticCall => Some("staticcall"),
            Self::Create | Self::Create2 | Self::SelfDestruct => None,
        }
    }

    /// Returns true for CREATE / CREATE2.
    #[must_use]
    pub const fn is_create(self) -> bool {
        matches!(self, Self::Create | Self::Create2)
    }
}

/// One node of a call tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallFrame {
    /// Frame kind.
    pub kind: CallKind,
    /// Caller (or the destroyed contract for self-destruct).
    pub from: Address,
    /// Callee, created contract, or self-destruct beneficiary.
    pub to: Option<Address>,
    /// Value transferred.
    pub value: U256,
    /// Calldata or init code.
    pub input: Bytes,
    /// Return data or deployed code.
    pub output: Bytes,
    /// Gas provided to the frame.
    pub gas: u64,
    /// Gas consumed by the frame.
    pub gas_used: u64,
    /// Failure description, if the frame did not succeed.
    pub error: Option<String>,
    /// Revert data, if the frame reverted.
    pub revert_reason: Option<Bytes>,
    /// Nesting depth (root is 0).
    pub depth: usize,
    /// Child frames in execution order.
    pub sub_frames: Vec<CallFrame>,
}

impl CallFrame {
    /// Total number of frames in this subtree, including self.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        1 + self
            .sub_frames
            .iter()
            .map(CallFrame::frame_count)
            .sum::<usize>()
    }
}

/// Outcome of one replayed private transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Executed and committed its effects.
    Successful,
    /// Executed and reverted.
    Reverted {
        /// Revert data.
        reason: Bytes,
    },
    /// Rejected before execution (bad nonce, insufficient balance, ...).
    /// Historical processing tolerated it, so replay records it and moves on.
    Invalid {
        /// Why the transaction was rejected.
        reason: String,
    },
}

/// Executed trace of one private transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionTrace {
    /// Originating proxy transaction hash.
    pub pmt_hash: Hash,
    /// Execution outcome.
    pub status: TransactionStatus,
    /// Root call frame. None when the transaction never entered execution.
    pub root: Option<CallFrame>,
}

/// Picks the trace of `pmt_hash` out of a replayed block.
///
/// Returns None when replay produced no trace for the hash. Callers treat that
/// as a reconstruction inconsistency, not as an unknown transaction.
#[must_use]
pub fn select_transaction_trace(
    traces: Vec<TransactionTrace>,
    pmt_hash: &Hash,
) -> Option<TransactionTrace> {
    traces.into_iter().find(|trace| &trace.pmt_hash == pmt_hash)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(kind: CallKind, depth: usize, sub_frames: Vec<CallFrame>) -> CallFrame {
        CallFrame {
            kind,
            from: Address::ZERO,
            to: None,
            value: U256::zero(),
            input: Bytes::new(),
            output: Bytes::new(),
            gas: 0,
            gas_used: 0,
            error: None,
            revert_reason: None,
            depth,
            sub_frames,
        }
    }

    #[test]
    fn test_trace_types() {
        assert_eq!(CallKind::Call.trace_type(), "call");
        assert_eq!(CallKind::StaticCall.trace_type(), "call");
        assert_eq!(CallKind::Create2.trace_type(), "create");
        assert_eq!(CallKind::SelfDestruct.trace_type(), "suicide");

        assert_eq!(CallKind::DelegateCall.call_type(), Some("delegatecall"));
        assert_eq!(CallKind::Create.call_type(), None);
    }

    #[test]
    fn test_select_transaction_trace() {
        let trace = |byte: u8| TransactionTrace {
            pmt_hash: Hash::new([byte; 32]),
            status: TransactionStatus::Successful,
            root: Some(frame(CallKind::Call, 0, vec![])),
        };
        let traces = vec![trace(1), trace(2), trace(3)];

        let selected = select_transaction_trace(traces.clone(), &Hash::new([2; 32]));
        assert_eq!(selected, Some(trace(2)));

        assert_eq!(select_transaction_trace(traces, &Hash::ZERO), None);
    }

    #[test]
    fn test_frame_count() {
        let tree = frame(
            CallKind::Call,
            0,
            vec![
                frame(CallKind::StaticCall, 1, vec![]),
                frame(CallKind::Call, 1, vec![frame(CallKind::SelfDestruct, 2, vec![])]),
            ],
        );
        assert_eq!(tree.frame_count(), 4);
    }
}
