//! # Flat Traces
//!
//! Converts a transaction's call tree into the flat, block-explorer shaped
//! record list returned to callers.
//!
//! Records are emitted in depth-first, left-to-right order. Each record's
//! `traceAddress` is the path of child indices from the root: the root is
//! `[]`, its first child `[0]`, that child's second child `[0, 1]`.

use crate::domain::call_tree::{CallFrame, TransactionTrace};
use crate::domain::value_objects::{
    to_hex_quantity, u64_to_hex_quantity, Address, Bytes, Hash,
};
use serde::Serialize;

/// Action part of a flat trace record.
///
/// Field presence depends on the frame kind: calls carry `callType`, `to`
/// and `input`; creations carry `init`; self-destructs carry `address`,
/// `refundAddress` and `balance`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Call flavour (`call`, `delegatecall`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    /// Caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Callee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Gas provided to the frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    /// Calldata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Bytes>,
    /// Init code of a creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<Bytes>,
    /// Value transferred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Self-destructed contract.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Self-destruct beneficiary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_address: Option<Address>,
    /// Balance moved by a self-destruct.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
}

/// Result part of a flat trace record. Absent when the frame failed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceOutput {
    /// Gas consumed by the frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<String>,
    /// Return data of a call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Bytes>,
    /// Created contract.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Deployed code of a creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Bytes>,
}

/// One externally visible flat trace entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatTraceRecord {
    /// What the frame did.
    pub action: Action,
    /// Containing block.
    pub block_hash: Hash,
    /// Containing block number.
    pub block_number: u64,
    /// Outcome, absent for failed frames and self-destructs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TraceOutput>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Revert data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<Bytes>,
    /// Number of direct children.
    pub subtraces: usize,
    /// Child indices from the root frame.
    pub trace_address: Vec<usize>,
    /// Proxy transaction hash.
    pub transaction_hash: Hash,
    /// Index of the proxy transaction in its block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_position: Option<usize>,
    /// `call`, `create` or `suicide`.
    #[serde(rename = "type")]
    pub trace_type: String,
}

/// Block and transaction identity stamped on every record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlatTraceContext {
    /// Hash of the block that contains the proxy transaction.
    pub block_hash: Hash,
    /// Number of that block.
    pub block_number: u64,
    /// Requested proxy transaction hash.
    pub transaction_hash: Hash,
    /// Position of the proxy transaction in the block.
    pub transaction_position: Option<usize>,
}

/// Pure tree-to-list transformation of call trees.
pub struct FlatTraceGenerator;

impl FlatTraceGenerator {
    /// Flattens one transaction trace. A trace without a root frame (a
    /// transaction rejected before execution) yields no records.
    #[must_use]
    pub fn generate(trace: &TransactionTrace, context: &FlatTraceContext) -> Vec<FlatTraceRecord> {
        trace
            .root
            .as_ref()
            .map(|root| Self::generate_from_frame(root, context))
            .unwrap_or_default()
    }

    /// Flattens a call tree rooted at `root`.
    #[must_use]
    pub fn generate_from_frame(
        root: &CallFrame,
        context: &FlatTraceContext,
    ) -> Vec<FlatTraceRecord> {
        let mut records = Vec::with_capacity(root.frame_count());
        let mut pending: Vec<(&CallFrame, Vec<usize>)> = vec![(root, Vec::new())];

        while let Some((frame, trace_address)) = pending.pop() {
            // Reverse push so the first child is visited next.
            for (index, child) in frame.sub_frames.iter().enumerate().rev() {
                let mut child_address = trace_address.clone();
                child_address.push(index);
                pending.push((child, child_address));
            }
            records.push(to_record(frame, trace_address, context));
        }

        records
    }
}

fn to_record(
    frame: &CallFrame,
    trace_address: Vec<usize>,
    context: &FlatTraceContext,
) -> FlatTraceRecord {
    let gas = Some(u64_to_hex_quantity(frame.gas));
    let value = Some(to_hex_quantity(frame.value));

    let (action, result) = if frame.kind.is_create() {
        (
            Action {
                from: Some(frame.from),
                gas,
                init: Some(frame.input.clone()),
                value,
                ..Action::default()
            },
            TraceOutput {
                gas_used: Some(u64_to_hex_quantity(frame.gas_used)),
                address: frame.to,
                code: Some(frame.output.clone()),
                ..TraceOutput::default()
            },
        )
    } else if let Some(call_type) = frame.kind.call_type() {
        (
            Action {
                call_type: Some(call_type.to_string()),
                from: Some(frame.from),
                to: frame.to,
                gas,
                input: Some(frame.input.clone()),
                value,
                ..Action::default()
            },
            TraceOutput {
                gas_used: Some(u64_to_hex_quantity(frame.gas_used)),
                output: Some(frame.output.clone()),
                ..TraceOutput::default()
            },
        )
    } else {
        (
            Action {
                address: Some(frame.from),
                refund_address: frame.to,
                balance: Some(to_hex_quantity(frame.value)),
                ..Action::default()
            },
            TraceOutput::default(),
        )
    };

    let result = if frame.error.is_some() || result == TraceOutput::default() {
        None
    } else {
        Some(result)
    };

    FlatTraceRecord {
        action,
        block_hash: context.block_hash,
        block_number: context.block_number,
        result,
        error: frame.error.clone(),
        revert_reason: frame.revert_reason.clone(),
        subtraces: frame.sub_frames.len(),
        trace_address,
        transaction_hash: context.transaction_hash,
        transaction_position: context.transaction_position,
        trace_type: frame.kind.trace_type().to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
