//! Cross-layer integration flows: JSON-RPC handler, trace service, replay
//! and the in-memory privacy network.

pub mod private_trace;
