use framegraph_ecs::{
    ComponentStore, ComputePass, Dependency, EntityId, ErosionParams, Heightfield, RenderPass,
    Resource, ResourceUsage, TextureFormat, Topology,
};
use glam::{UVec2, UVec3};

use crate::AuthorError;
use crate::erosion::ErosionUniforms;

/// Workgroup edge length declared by `erosion.wgsl`.
pub const WORKGROUP_SIZE: u32 = 8;

/// The erosion sandbox: store plus the entities the driver and tools need.
#[derive(Debug)]
pub struct ErosionScene {
    pub store: ComponentStore,
    pub heightmap_a: EntityId,
    pub heightmap_b: EntityId,
    /// Carries `ErosionParams`, `Heightfield` and the uniform buffer.
    pub params: EntityId,
    pub erosion_pass: EntityId,
    pub render_pass: EntityId,
    pub size: UVec2,
}

/// Build the erosion scene for a `width` x `height` heightmap.
///
/// The compute pass reads heightmap A and writes B; the render pass draws B.
pub fn build_erosion_scene(width: u32, height: u32) -> Result<ErosionScene, AuthorError> {
    if width == 0 || height == 0 {
        return Err(AuthorError::EmptyScene { width, height });
    }
    let size = UVec2::new(width, height);
    let mut store = ComponentStore::new();
    let usage = ResourceUsage::TEXTURE_BINDING | ResourceUsage::STORAGE_BINDING;

    let heightmap_a = store.create_entity();
    store.add_component(
        heightmap_a,
        Resource::texture(TextureFormat::Rgba32Float, size).with_usage(usage),
    )?;

    let heightmap_b = store.create_entity();
    store.add_component(
        heightmap_b,
        Resource::texture(TextureFormat::Rgba32Float, size).with_usage(usage),
    )?;

    let params = store.create_entity();
    let erosion = ErosionParams::default();
    store.add_component(params, erosion)?;
    store.add_component(
        params,
        Heightfield {
            width,
            height,
            scale: 1.0,
        },
    )?;
    store.add_component(
        params,
        Resource::buffer(ErosionUniforms::from(&erosion).to_bytes())
            .with_usage(ResourceUsage::UNIFORM | ResourceUsage::BUFFER_COPY_DST),
    )?;

    let erosion_pass = store.create_entity();
    store.add_component(
        erosion_pass,
        ComputePass::new(
            "erosion.wgsl",
            UVec3::new(width.div_ceil(WORKGROUP_SIZE), height.div_ceil(WORKGROUP_SIZE), 1),
        ),
    )?;
    store.add_component(
        erosion_pass,
        Dependency::new(vec![heightmap_a], vec![heightmap_b]).with_uniforms(vec![params]),
    )?;

    let render_pass = store.create_entity();
    store.add_component(
        render_pass,
        RenderPass {
            vertex_shader: "vertex.wgsl".to_string(),
            fragment_shader: "fragment.wgsl".to_string(),
            topology: Topology::TriangleList,
            vertex_count: Some(3),
        },
    )?;
    store.add_component(render_pass, Dependency::new(vec![heightmap_b], Vec::new()))?;

    tracing::debug!(width, height, entities = store.entity_count(), "erosion scene built");
    Ok(ErosionScene {
        store,
        heightmap_a,
        heightmap_b,
        params,
        erosion_pass,
        render_pass,
        size,
    })
}
