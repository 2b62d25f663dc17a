//! # Domain Layer (Inner Hexagon)
//!
//! Pure types and transformations for private trace reconstruction.
//! NO I/O, NO async.

pub mod call_tree;
pub mod entities;
pub mod flat_trace;
pub mod services;
pub mod state;
pub mod value_objects;

pub use call_tree::*;
pub use entities::*;
pub use flat_trace::*;
pub use services::*;
pub use state::*;
pub use value_objects::*;
