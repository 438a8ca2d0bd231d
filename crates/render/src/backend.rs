//! Contract between the pass graph and a graphics backend.
//!
//! The graph never touches GPU objects directly: it asks the backend for
//! opaque handles and passes them back on submission.

use framegraph_ecs::{TextureFormat, Topology};
use glam::UVec3;

/// Backend error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("failed to create texture: {0}")]
    TextureCreation(String),
    #[error("failed to create buffer: {0}")]
    BufferCreation(String),
    #[error("failed to create sampler: {0}")]
    SamplerCreation(String),
    #[error("failed to create pipeline: {0}")]
    PipelineCreation(String),
    #[error("failed to create binding set: {0}")]
    BindingCreation(String),
    #[error("unknown shader: {0}")]
    UnknownShader(String),
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
    #[error("submission failed: {0}")]
    Submission(String),
    #[error("out of memory")]
    OutOfMemory,
    #[error("device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

handle!(
    /// Handle to a backend texture.
    TextureHandle
);
handle!(
    /// Handle to a backend buffer.
    BufferHandle
);
handle!(
    /// Handle to a backend sampler.
    SamplerHandle
);
handle!(
    /// Handle to a compute or render pipeline.
    PipelineHandle
);
handle!(
    /// Handle to a binding set (bind group).
    BindingSetHandle
);

/// Any bindable resource handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceHandle {
    Texture(TextureHandle),
    Buffer(BufferHandle),
    Sampler(SamplerHandle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub label: String,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    /// WebGPU texture usage bits.
    pub usage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    pub label: String,
    pub size: u64,
    /// WebGPU buffer usage bits.
    pub usage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerDescriptor {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineDescriptor {
    Compute {
        label: String,
        shader: String,
        entry_point: String,
    },
    Render {
        label: String,
        vertex_shader: String,
        fragment_shader: String,
        topology: Topology,
    },
}

impl PipelineDescriptor {
    pub fn label(&self) -> &str {
        match self {
            Self::Compute { label, .. } | Self::Render { label, .. } => label,
        }
    }
}

/// Resources wired to a pipeline, bound in slice order starting at binding 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSetDescriptor {
    pub label: String,
    pub group: u32,
    pub resources: Vec<ResourceHandle>,
}

/// Capability surface the pass graph drives.
///
/// Every call either succeeds or returns a [`BackendError`]; the graph treats
/// any error as fatal for the current frame.
pub trait GraphicsBackend {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> BackendResult<()>;

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle>;

    fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> BackendResult<PipelineHandle>;

    fn create_binding_set(
        &mut self,
        pipeline: PipelineHandle,
        desc: &BindingSetDescriptor,
    ) -> BackendResult<BindingSetHandle>;

    /// Record and submit one compute dispatch.
    fn submit_compute(
        &mut self,
        pipeline: PipelineHandle,
        binding: Option<BindingSetHandle>,
        workgroups: UVec3,
    ) -> BackendResult<()>;

    /// Record and submit one draw into the backend's frame target.
    fn submit_draw(
        &mut self,
        pipeline: PipelineHandle,
        binding: Option<BindingSetHandle>,
        vertex_count: u32,
    ) -> BackendResult<()>;

    /// Resize the frame target. Callers invalidate their caches afterwards.
    fn resize(&mut self, _width: u32, _height: u32) -> BackendResult<()> {
        Ok(())
    }
}
