//! Shared identifiers and small utilities used across the framegraph crates.

mod types;

pub use types::{EntityId, SplitMix64};
