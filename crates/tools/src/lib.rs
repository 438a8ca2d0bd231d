//! Developer tooling: store inspector and pass graph listings.
//!
//! # Invariants
//! - Tools only read; they never mutate the store or the graph.

mod graph_view;
mod inspector;

pub use graph_view::{DuplicateSummary, GraphInspector, GraphSummary, PassSummary};
pub use inspector::{EntityComponents, EntityInfo, StoreInspector, StoreSummary};

pub fn crate_info() -> &'static str {
    "framegraph-tools v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("tools"));
    }
}
