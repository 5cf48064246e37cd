//! Dimension deduplication, foreign-key remapping and bridge expansion.

pub mod bridge;
pub mod store;

pub use bridge::{build_bridges, BridgeRow, BridgeTable};
pub use store::{CanonicalRow, DistinctStore};
