use std::collections::HashMap;

/// One slot of bind group 0 as a shader declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// `texture_2d<f32>` read with `textureLoad`.
    SampledTexture,
    /// Write-only `texture_storage_2d`.
    StorageTexture(wgpu::TextureFormat),
    UniformBuffer,
    StorageBuffer,
    Sampler,
}

impl SlotKind {
    fn binding_type(self) -> wgpu::BindingType {
        match self {
            Self::SampledTexture => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            Self::StorageTexture(format) => wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            Self::UniformBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            Self::StorageBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            Self::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        }
    }
}

/// A WGSL module plus the bind group 0 layout it expects.
#[derive(Debug, Clone)]
pub struct ShaderEntry {
    pub source: String,
    pub stage: wgpu::ShaderStages,
    /// Entry point for vertex and fragment stages. Compute pipelines take
    /// theirs from the pass component.
    pub entry_point: String,
    pub bindings: Vec<SlotKind>,
}

/// WGSL modules keyed by the names pass components refer to.
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    shaders: HashMap<String, ShaderEntry>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// `erosion.wgsl`, `vertex.wgsl` and `fragment.wgsl`.
    pub fn builtin() -> Self {
        let mut lib = Self::new();
        lib.register(
            "erosion.wgsl",
            ShaderEntry {
                source: EROSION_SHADER.to_string(),
                stage: wgpu::ShaderStages::COMPUTE,
                entry_point: "cs_main".to_string(),
                bindings: vec![
                    SlotKind::SampledTexture,
                    SlotKind::StorageTexture(wgpu::TextureFormat::Rgba32Float),
                    SlotKind::UniformBuffer,
                ],
            },
        );
        lib.register(
            "vertex.wgsl",
            ShaderEntry {
                source: FULLSCREEN_VERTEX_SHADER.to_string(),
                stage: wgpu::ShaderStages::VERTEX,
                entry_point: "vs_main".to_string(),
                bindings: Vec::new(),
            },
        );
        lib.register(
            "fragment.wgsl",
            ShaderEntry {
                source: HEIGHTMAP_FRAGMENT_SHADER.to_string(),
                stage: wgpu::ShaderStages::FRAGMENT,
                entry_point: "fs_main".to_string(),
                bindings: vec![SlotKind::SampledTexture],
            },
        );
        lib
    }

    pub fn register(&mut self, name: impl Into<String>, entry: ShaderEntry) {
        self.shaders.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&ShaderEntry> {
        self.shaders.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.shaders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Merge the group 0 slots of several stages into one layout.
///
/// A binding index declared by more than one stage is visible to all of them;
/// the first declaration decides its type.
pub fn layout_entries(stages: &[&ShaderEntry]) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = Vec::new();
    for stage in stages {
        for (binding, slot) in stage.bindings.iter().enumerate() {
            let binding = binding as u32;
            match entries.iter_mut().find(|e| e.binding == binding) {
                Some(existing) => existing.visibility |= stage.stage,
                None => entries.push(wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility: stage.stage,
                    ty: slot.binding_type(),
                    count: None,
                }),
            }
        }
    }
    entries
}

/// Hydraulic erosion step over an `rgba32float` heightmap.
///
/// Channels: r terrain height, g water, b suspended sediment.
pub const EROSION_SHADER: &str = r#"
struct Params {
    rain_rate: f32,
    evaporation_rate: f32,
    sediment_capacity: f32,
    min_slope: f32,
    gravity: f32,
    iterations: f32,
    _pad0: f32,
    _pad1: f32,
};

@group(0) @binding(0)
var height_in: texture_2d<f32>;

@group(0) @binding(1)
var height_out: texture_storage_2d<rgba32float, write>;

@group(0) @binding(2)
var<uniform> params: Params;

fn terrain_at(p: vec2<i32>, max_p: vec2<i32>) -> f32 {
    return textureLoad(height_in, clamp(p, vec2<i32>(0), max_p), 0).r;
}

@compute @workgroup_size(8, 8, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    let dims = textureDimensions(height_in);
    if (id.x >= dims.x || id.y >= dims.y) {
        return;
    }

    let p = vec2<i32>(id.xy);
    let max_p = vec2<i32>(dims) - vec2<i32>(1);
    let here = textureLoad(height_in, p, 0);

    let left = terrain_at(p - vec2<i32>(1, 0), max_p);
    let right = terrain_at(p + vec2<i32>(1, 0), max_p);
    let down = terrain_at(p - vec2<i32>(0, 1), max_p);
    let up = terrain_at(p + vec2<i32>(0, 1), max_p);

    let gradient = vec2<f32>(right - left, up - down) * 0.5;
    let slope = max(length(gradient), params.min_slope);

    var water = here.g + params.rain_rate;
    var sediment = here.b;
    var terrain = here.r;

    let capacity = params.sediment_capacity * slope * water;
    let exchange = (capacity - sediment) * 0.1;
    terrain = terrain - exchange;
    sediment = sediment + exchange;

    let neighbours = (left + right + up + down) * 0.25;
    terrain = mix(terrain, neighbours, clamp(params.gravity * slope * 0.01, 0.0, 1.0));
    water = water * (1.0 - params.evaporation_rate);

    textureStore(height_out, p, vec4<f32>(terrain, water, sediment, 1.0));
}
"#;

/// Fullscreen triangle from the vertex index; no vertex buffers.
pub const FULLSCREEN_VERTEX_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.clip_position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}
"#;

/// Shades the heightmap's terrain channel with a water tint.
pub const HEIGHTMAP_FRAGMENT_SHADER: &str = r#"
@group(0) @binding(0)
var heightmap: texture_2d<f32>;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let dims = vec2<f32>(textureDimensions(heightmap));
    let texel = vec2<i32>(clamp(uv, vec2<f32>(0.0), vec2<f32>(1.0)) * (dims - 1.0));
    let value = textureLoad(heightmap, texel, 0);
    let ground = vec3<f32>(0.35, 0.3, 0.2) + value.r * vec3<f32>(0.5, 0.55, 0.5);
    let water = clamp(value.g * 10.0, 0.0, 0.6);
    return vec4<f32>(mix(ground, vec3<f32>(0.1, 0.3, 0.7), water), 1.0);
}
"#;
