//! # Execution Tracer
//!
//! Builds a call tree from processor hook events. Records call kind,
//! addresses, value, input/output and nesting. No opcode, stack, memory or
//! storage detail is captured.

use crate::domain::call_tree::{CallFrame, CallKind};
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::ports::outbound::{FrameEnter, FrameExit, TracerHook};
use tracing::warn;

/// Call tree recorder for one transaction.
#[derive(Debug, Default)]
pub struct ExecutionTracer {
    open: Vec<CallFrame>,
    root: Option<CallFrame>,
}

impl ExecutionTracer {
    /// Creates an empty tracer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Completes recording and returns the root frame, if any frame was
    /// entered.
    ///
    /// Frames still open (a processor that never reported their exit) are
    /// closed as-is and attached to their parents.
    #[must_use]
    pub fn finish(mut self) -> Option<CallFrame> {
        if !self.open.is_empty() {
            warn!(open_frames = self.open.len(), "Tracer finished with unclosed frames");
        }
        while let Some(frame) = self.open.pop() {
            self.attach(frame);
        }
        self.root
    }

    fn attach(&mut self, frame: CallFrame) {
        if let Some(parent) = self.open.last_mut() {
            parent.sub_frames.push(frame);
        } else if self.root.is_none() {
            self.root = Some(frame);
        } else {
            warn!(kind = ?frame.kind, "Ignoring second top-level frame");
        }
    }
}

impl TracerHook for ExecutionTracer {
    fn on_enter(&mut self, frame: FrameEnter) {
        self.open.push(CallFrame {
            kind: frame.kind,
            from: frame.from,
            to: frame.to,
            value: frame.value,
            input: frame.input,
            output: Bytes::new(),
            gas: frame.gas,
            gas_used: 0,
            error: None,
            revert_reason: None,
            depth: self.open.len(),
            sub_frames: Vec::new(),
        });
    }

    fn on_exit(&mut self, exit: FrameExit) {
        let Some(mut frame) = self.open.pop() else {
            warn!("Frame exit without matching enter");
            return;
        };
        frame.output = exit.output;
        frame.gas_used = exit.gas_used;
        frame.error = exit.error;
        frame.revert_reason = exit.revert_reason;
        if frame.to.is_none() {
            frame.to = exit.created_address;
        }
        self.attach(frame);
    }

    fn on_self_destruct(&mut self, address: Address, beneficiary: Address, balance: U256) {
        let frame = CallFrame {
            kind: CallKind::SelfDestruct,
            from: address,
            to: Some(beneficiary),
            value: balance,
            input: Bytes::new(),
            output: Bytes::new(),
            gas: 0,
            gas_used: 0,
            error: None,
            revert_reason: None,
            depth: self.open.len(),
            sub_frames: Vec::new(),
        };
        self.attach(frame);
    }
}

// =============================================================================
// TESTS
// =============================================================================
