//! Messaging and the collective algorithms built on it.

pub mod collective;
pub mod communicator;
pub mod location_deps;
pub mod wire;

pub use collective::{all_gather_u64s, all_reduce_max};
pub use location_deps::{GlobalDependencies, communicate_location_dependencies};
