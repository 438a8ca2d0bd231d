//! Scene authoring for the pass graph.
//!
//! Builds the erosion sandbox scene (two ping-pong heightmaps, an erosion
//! compute pass, a fullscreen render pass) and the system that evolves its
//! erosion parameters between frames.
//!
//! # Invariants
//! - Scenes are built in a fresh store; entity ids are deterministic.
//! - The parameter buffer always mirrors the `ErosionParams` component after
//!   a system step.

mod erosion;
mod scene;

pub use erosion::{ErosionSystem, ErosionUniforms, RESET_AFTER_ITERATIONS};
pub use scene::{ErosionScene, WORKGROUP_SIZE, build_erosion_scene};

use framegraph_ecs::EcsError;

#[derive(Debug, thiserror::Error)]
pub enum AuthorError {
    #[error("scene size must be non-zero, got {width}x{height}")]
    EmptyScene { width: u32, height: u32 },
    #[error(transparent)]
    Ecs(#[from] EcsError),
}

pub fn crate_info() -> &'static str {
    "framegraph-author v0.1.0"
}
