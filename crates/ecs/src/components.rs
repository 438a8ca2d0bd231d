//! Component schemas understood by the render graph and the erosion scene.

use framegraph_common::EntityId;
use glam::{UVec2, UVec3};
use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTag};

/// Vertex count used by render passes that do not declare one.
pub const DEFAULT_VERTEX_COUNT: u32 = 3;

/// A compute dispatch: which shader to run and how many workgroups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputePass {
    pub shader: String,
    #[serde(default = "default_compute_entry")]
    pub entry_point: String,
    pub workgroups: UVec3,
    /// Bind group index the pass's resources are bound at.
    #[serde(default)]
    pub bind_group: u32,
}

fn default_compute_entry() -> String {
    "cs_main".to_string()
}

impl ComputePass {
    pub fn new(shader: impl Into<String>, workgroups: UVec3) -> Self {
        Self {
            shader: shader.into(),
            entry_point: default_compute_entry(),
            workgroups,
            bind_group: 0,
        }
    }
}

impl Component for ComputePass {
    const TAG: ComponentTag = ComponentTag::COMPUTE_PASS;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    #[default]
    TriangleList,
    TriangleStrip,
}

/// A draw call over a vertex/fragment shader pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPass {
    pub vertex_shader: String,
    pub fragment_shader: String,
    #[serde(default)]
    pub topology: Topology,
    #[serde(default)]
    pub vertex_count: Option<u32>,
}

impl RenderPass {
    pub fn new(vertex_shader: impl Into<String>, fragment_shader: impl Into<String>) -> Self {
        Self {
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            topology: Topology::default(),
            vertex_count: None,
        }
    }

    /// Declared vertex count, or [`DEFAULT_VERTEX_COUNT`].
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count.unwrap_or(DEFAULT_VERTEX_COUNT)
    }
}

impl Component for RenderPass {
    const TAG: ComponentTag = ComponentTag::RENDER_PASS;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Texture,
    Buffer,
    Sampler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba16Float,
    Rgba32Float,
    R32Float,
}

/// Usage bits, interpreted per resource kind.
///
/// The values match the WebGPU `GPUTextureUsage` / `GPUBufferUsage` flags, so
/// backends built on WebGPU can pass them straight through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceUsage(pub u32);

impl ResourceUsage {
    pub const TEXTURE_COPY_SRC: Self = Self(1 << 0);
    pub const TEXTURE_COPY_DST: Self = Self(1 << 1);
    pub const TEXTURE_BINDING: Self = Self(1 << 2);
    pub const STORAGE_BINDING: Self = Self(1 << 3);
    pub const RENDER_ATTACHMENT: Self = Self(1 << 4);

    pub const BUFFER_COPY_SRC: Self = Self(1 << 2);
    pub const BUFFER_COPY_DST: Self = Self(1 << 3);
    pub const VERTEX: Self = Self(1 << 5);
    pub const UNIFORM: Self = Self(1 << 6);
    pub const STORAGE: Self = Self(1 << 7);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for ResourceUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Abstract description of a texture, buffer or sampler.
///
/// Passes reference resource entities from their [`Dependency`]; the backend
/// object is created from this description the first time a pass binds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    #[serde(default)]
    pub format: Option<TextureFormat>,
    #[serde(default)]
    pub size: Option<UVec2>,
    #[serde(default)]
    pub usage: Option<ResourceUsage>,
    /// Buffer size in bytes when no contents are given.
    #[serde(default)]
    pub byte_len: Option<u64>,
    /// Initial (and re-uploaded) buffer contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

impl Resource {
    pub fn texture(format: TextureFormat, size: UVec2) -> Self {
        Self {
            kind: ResourceKind::Texture,
            format: Some(format),
            size: Some(size),
            usage: None,
            byte_len: None,
            data: None,
        }
    }

    pub fn buffer(data: Vec<u8>) -> Self {
        Self {
            kind: ResourceKind::Buffer,
            format: None,
            size: None,
            usage: None,
            byte_len: None,
            data: Some(data),
        }
    }

    pub fn sampler() -> Self {
        Self {
            kind: ResourceKind::Sampler,
            format: None,
            size: None,
            usage: None,
            byte_len: None,
            data: None,
        }
    }

    pub fn with_usage(mut self, usage: ResourceUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

impl Component for Resource {
    const TAG: ComponentTag = ComponentTag::RESOURCE;
}

/// Resource entities a pass reads and writes.
///
/// `inputs` and `outputs` drive pass ordering. `uniforms` are bound after
/// them but never order passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub inputs: Vec<EntityId>,
    pub outputs: Vec<EntityId>,
    #[serde(default)]
    pub uniforms: Vec<EntityId>,
}

impl Dependency {
    pub fn new(inputs: Vec<EntityId>, outputs: Vec<EntityId>) -> Self {
        Self {
            inputs,
            outputs,
            uniforms: Vec::new(),
        }
    }

    pub fn with_uniforms(mut self, uniforms: Vec<EntityId>) -> Self {
        self.uniforms = uniforms;
        self
    }
}

impl Component for Dependency {
    const TAG: ComponentTag = ComponentTag::DEPENDENCY;
}

/// Hydraulic erosion tuning fed to the erosion compute shader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErosionParams {
    pub rain_rate: f32,
    pub evaporation_rate: f32,
    pub sediment_capacity: f32,
    pub min_slope: f32,
    pub gravity: f32,
    pub iterations: u32,
}

impl Default for ErosionParams {
    fn default() -> Self {
        Self {
            rain_rate: 0.01,
            evaporation_rate: 0.01,
            sediment_capacity: 4.0,
            min_slope: 0.01,
            gravity: 4.0,
            iterations: 0,
        }
    }
}

impl Component for ErosionParams {
    const TAG: ComponentTag = ComponentTag::EROSION_PARAMS;
}

/// Extent of the simulated terrain grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heightfield {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

impl Component for Heightfield {
    const TAG: ComponentTag = ComponentTag::HEIGHTFIELD;
}
