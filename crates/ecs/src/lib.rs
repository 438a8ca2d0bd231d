//! Tag-indexed entity/component store.
//!
//! Each component type declares a [`ComponentTag`]; the store keeps one
//! typed, insertion-ordered container per tag and owns entity lifecycle.
//!
//! # Invariants
//! - At most one record per (tag, entity).
//! - Entity ids increase monotonically and are never reused.
//! - Iteration over a tag follows the order records were first added.
//! - Removing an entity purges it from every tag.

pub mod component;
pub mod components;
pub mod store;

pub use component::{Component, ComponentTag};
pub use components::{
    ComputePass, DEFAULT_VERTEX_COUNT, Dependency, ErosionParams, Heightfield, RenderPass, Resource,
    ResourceKind, ResourceUsage, TextureFormat, Topology,
};
pub use framegraph_common::EntityId;
pub use store::{ComponentEntry, ComponentStore, EcsError, StoreSnapshot, StoreStats};

pub fn crate_info() -> &'static str {
    "framegraph-ecs v0.1.0"
}
