//! # Adapters Layer (Outer Hexagon)
//!
//! In-memory implementations of every outbound port. Production deployments
//! plug in adapters over the node's chain storage, privacy controller and
//! private state database instead.

pub mod chain;
pub mod privacy;
pub mod private_state;
pub mod processor;

pub use chain::*;
pub use privacy::*;
pub use private_state::*;
pub use processor::*;
