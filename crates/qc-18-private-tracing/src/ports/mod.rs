//! # Ports Layer (Middle Hexagon)
//!
//! Trait definitions between the trace pipeline and the outside world.
//!
//! - **Driving Ports (Inbound)**: `PrivateTraceApi`
//! - **Driven Ports (Outbound)**: `ChainIndex`, `PrivateTransactionStore`,
//!   `GroupMetadataStore`, `PrivacyGroupMembership`, `PrivateStateStorage`,
//!   `PrivateTransactionProcessor`, `TracerHook`
//! - No concrete implementations in this module

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
