//! # Quantum-Chain Test Suite
//!
//! Unified test crate for the private tracing subsystem.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # End-to-end priv_traceTransaction flows
//!     └── private_trace.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p qc-tests
//!
//! # With logs
//! RUST_LOG=qc_18_private_tracing=debug cargo test -p qc-tests -- --nocapture
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
