//! Partitioned mesh view consumed by the sweep builder.

pub mod cell;
pub mod grid;
pub mod structured;
pub mod vector;

pub use cell::{Cell, Face, canonical_node_order};
pub use grid::{LocalGrid, Locality};
pub use vector::Vec3;
