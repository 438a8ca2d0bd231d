//! wgpu backend for the pass graph.
//!
//! Opens a headless device and draws render passes into an offscreen
//! `rgba8unorm` target. Shaders are looked up by the names pass components
//! use, in a [`ShaderLibrary`].
//!
//! # Invariants
//! - Every device call runs inside validation and out-of-memory error scopes;
//!   captured errors come back as `BackendError`, never as panics.
//! - Once the device is lost every call fails with `BackendError::DeviceLost`.
//! - Resizing releases every object handed out so far.

mod gpu;
mod shaders;

pub use gpu::{TARGET_FORMAT, WgpuBackend, WgpuConfig, WgpuInitError};
pub use shaders::{
    EROSION_SHADER, FULLSCREEN_VERTEX_SHADER, HEIGHTMAP_FRAGMENT_SHADER, ShaderEntry,
    ShaderLibrary, SlotKind, layout_entries,
};

pub fn crate_info() -> &'static str {
    "framegraph-render-wgpu v0.1.0"
}
