//! Render/compute pass graph driven by component store state.
//!
//! Every frame the graph is rebuilt from the store: each entity carrying a
//! `ComputePass` or `RenderPass` becomes a node, its `Dependency` lists the
//! resource entities it reads and writes.
//!
//! # Invariants
//! - A pass is submitted only after every pass producing one of its inputs.
//! - A dependency cycle fails the frame before any backend call is made.
//! - A pass referencing an unresolvable resource, or declaring none at all,
//!   is skipped, never an error.
//! - Backend objects live in a [`ResourceCache`] owned by the caller and are
//!   dropped only by an explicit invalidation.

mod backend;
mod binder;
mod cache;
mod config;
mod executor;
mod graph;
mod recording;
mod runner;
mod schedule;

pub use backend::{
    BackendError, BackendResult, BindingSetDescriptor, BindingSetHandle, BufferDescriptor,
    BufferHandle, GraphicsBackend, PipelineDescriptor, PipelineHandle, ResourceHandle,
    SamplerDescriptor, SamplerHandle, TextureDescriptor, TextureHandle,
};
pub use binder::{Binding, PassBinding, Unresolved, UnresolvedReason, bind_all, bind_pass};
pub use cache::{CachedBinding, CachedResource, ResourceCache};
pub use config::GraphConfig;
pub use executor::{FrameReport, execute};
pub use graph::{DuplicateProducer, PassKind, PassNode, build_graph, duplicate_producers, producer_index};
pub use recording::{BackendCall, RecordingBackend};
pub use runner::{FramePhase, GraphError, RenderGraph, run_graph, run_graph_with};
pub use schedule::{CircularDependency, sort, sort_indices};

pub fn crate_info() -> &'static str {
    "framegraph-render v0.1.0"
}
