//! Resolution of pass nodes to backend pipelines, resources and binding sets.
//!
//! Backend objects are created lazily on first use and cached by entity id.
//! A pass whose resources cannot be resolved is skipped for the frame; backend
//! errors propagate to the caller untouched.

use framegraph_common::EntityId;
use framegraph_ecs::{ComponentStore, ComputePass, RenderPass, Resource, ResourceKind, ResourceUsage};

use crate::backend::{
    BackendResult, BindingSetDescriptor, BindingSetHandle, BufferDescriptor, GraphicsBackend,
    PipelineDescriptor, PipelineHandle, ResourceHandle, SamplerDescriptor, TextureDescriptor,
};
use crate::cache::{CachedBinding, CachedResource, ResourceCache};
use crate::config::GraphConfig;
use crate::graph::{PassKind, PassNode};

/// Why a pass could not be bound this frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnresolvedReason {
    #[error("pass entity has no pass component")]
    MissingPassComponent,
    /// The pass declares no resources, so there is nothing to bind its
    /// pipeline's slots to.
    #[error("pass declares no resources to bind")]
    NoBindings,
    #[error("entity {0} has no Resource component")]
    MissingResource(EntityId),
    #[error("resource {entity} is missing its {missing}")]
    IncompleteResource {
        entity: EntityId,
        missing: &'static str,
    },
}

/// A pass skipped because of an unresolved reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pass {pass} skipped: {reason}")]
pub struct Unresolved {
    pub pass: EntityId,
    pub reason: UnresolvedReason,
}

/// Everything the executor needs to submit one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassBinding {
    pub pipeline: PipelineHandle,
    pub binding_set: BindingSetHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Ready(PassBinding),
    Skipped(Unresolved),
}

enum Resolved {
    Handle(ResourceHandle),
    Unresolved(UnresolvedReason),
}

/// Bind every node, in order. The result lines up index-for-index with `nodes`.
pub fn bind_all<B: GraphicsBackend + ?Sized>(
    nodes: &[PassNode],
    store: &ComponentStore,
    backend: &mut B,
    cache: &mut ResourceCache,
    config: &GraphConfig,
) -> BackendResult<Vec<Binding>> {
    nodes
        .iter()
        .map(|node| bind_pass(node, store, backend, cache, config))
        .collect()
}

/// Resolve one node's resources, pipeline and binding set.
///
/// Resources bind in the order inputs, outputs, uniforms. The binding set is
/// rebuilt only when the resolved handles differ from the cached ones. A pass
/// that declares no resources is skipped: no binding set, no submission.
pub fn bind_pass<B: GraphicsBackend + ?Sized>(
    node: &PassNode,
    store: &ComponentStore,
    backend: &mut B,
    cache: &mut ResourceCache,
    config: &GraphConfig,
) -> BackendResult<Binding> {
    let refs = node.inputs.iter().chain(&node.outputs).chain(&node.uniforms);
    let mut handles = Vec::with_capacity(node.inputs.len() + node.outputs.len() + node.uniforms.len());
    for entity in refs {
        match resolve_resource(*entity, store, backend, cache, config)? {
            Resolved::Handle(handle) => handles.push(handle),
            Resolved::Unresolved(reason) => return Ok(skip(node, reason)),
        }
    }

    if handles.is_empty() {
        let has_pass = match node.kind {
            PassKind::Compute => store.has_component::<ComputePass>(node.entity),
            PassKind::Render => store.has_component::<RenderPass>(node.entity),
        };
        let reason = if has_pass {
            UnresolvedReason::NoBindings
        } else {
            UnresolvedReason::MissingPassComponent
        };
        return Ok(skip(node, reason));
    }

    let (pipeline, group) = match pipeline_for(node, store, backend, cache)? {
        Some(found) => found,
        None => return Ok(skip(node, UnresolvedReason::MissingPassComponent)),
    };

    let binding_set = if let Some(cached) = cache.binding(node.entity).filter(|b| b.resources == handles) {
        cached.handle
    } else {
        let desc = BindingSetDescriptor {
            label: format!("bindings {}", node.entity),
            group,
            resources: handles.clone(),
        };
        let handle = backend.create_binding_set(pipeline, &desc)?;
        tracing::debug!(pass = %node.entity, bindings = handles.len(), "binding set created");
        cache.insert_binding(
            node.entity,
            CachedBinding {
                handle,
                resources: handles,
            },
        );
        handle
    };

    Ok(Binding::Ready(PassBinding {
        pipeline,
        binding_set,
    }))
}

fn skip(node: &PassNode, reason: UnresolvedReason) -> Binding {
    tracing::debug!(pass = %node.entity, %reason, "pass unresolved");
    Binding::Skipped(Unresolved {
        pass: node.entity,
        reason,
    })
}

fn resolve_resource<B: GraphicsBackend + ?Sized>(
    entity: EntityId,
    store: &ComponentStore,
    backend: &mut B,
    cache: &mut ResourceCache,
    config: &GraphConfig,
) -> BackendResult<Resolved> {
    // A removed component unresolves the pass even while a handle is cached.
    let Some(resource) = store.get_component::<Resource>(entity) else {
        return Ok(Resolved::Unresolved(UnresolvedReason::MissingResource(entity)));
    };

    if let Some(cached) = cache.resource_mut(entity)
        && !outgrew(cached, resource)
    {
        if config.reupload_buffers
            && let (ResourceHandle::Buffer(buffer), Some(data)) = (cached.handle, &resource.data)
            && cached.uploaded.as_ref() != Some(data)
        {
            backend.write_buffer(buffer, data)?;
            cached.uploaded = Some(data.clone());
        }
        return Ok(Resolved::Handle(cached.handle));
    }

    let label = format!("resource {entity}");
    let incomplete = |missing| Resolved::Unresolved(UnresolvedReason::IncompleteResource { entity, missing });

    let created = match resource.kind {
        ResourceKind::Texture => {
            let Some(format) = resource.format else {
                return Ok(incomplete("format"));
            };
            let Some(size) = resource.size.filter(|s| s.x > 0 && s.y > 0) else {
                return Ok(incomplete("size"));
            };
            let usage = resource
                .usage
                .unwrap_or(ResourceUsage::TEXTURE_BINDING | ResourceUsage::STORAGE_BINDING);
            let desc = TextureDescriptor {
                label,
                format,
                width: size.x,
                height: size.y,
                usage: usage.bits(),
            };
            CachedResource {
                handle: ResourceHandle::Texture(backend.create_texture(&desc)?),
                capacity: 0,
                uploaded: None,
            }
        }
        ResourceKind::Buffer => {
            let size = match (&resource.data, resource.byte_len) {
                (Some(data), _) => data.len() as u64,
                (None, Some(len)) => len,
                (None, None) => 0,
            };
            if size == 0 {
                return Ok(incomplete("byte length"));
            }
            let mut usage = resource
                .usage
                .unwrap_or(ResourceUsage::UNIFORM | ResourceUsage::BUFFER_COPY_DST);
            if resource.data.is_some() {
                usage = usage | ResourceUsage::BUFFER_COPY_DST;
            }
            let desc = BufferDescriptor {
                label,
                size,
                usage: usage.bits(),
            };
            let buffer = backend.create_buffer(&desc)?;
            if let Some(data) = &resource.data {
                backend.write_buffer(buffer, data)?;
            }
            CachedResource {
                handle: ResourceHandle::Buffer(buffer),
                capacity: size,
                uploaded: resource.data.clone(),
            }
        }
        ResourceKind::Sampler => CachedResource {
            handle: ResourceHandle::Sampler(backend.create_sampler(&SamplerDescriptor { label })?),
            capacity: 0,
            uploaded: None,
        },
    };

    tracing::debug!(%entity, kind = ?resource.kind, "resource created");
    let handle = created.handle;
    cache.insert_resource(entity, created);
    Ok(Resolved::Handle(handle))
}

/// Buffer contents no longer fit the allocation; the buffer is recreated and
/// the old handle is dropped from the cache.
fn outgrew(cached: &CachedResource, resource: &Resource) -> bool {
    matches!(cached.handle, ResourceHandle::Buffer(_))
        && resource
            .data
            .as_ref()
            .is_some_and(|data| data.len() as u64 > cached.capacity)
}

/// Cached or freshly created pipeline plus the bind group index it uses.
fn pipeline_for<B: GraphicsBackend + ?Sized>(
    node: &PassNode,
    store: &ComponentStore,
    backend: &mut B,
    cache: &mut ResourceCache,
) -> BackendResult<Option<(PipelineHandle, u32)>> {
    let (desc, group) = match node.kind {
        PassKind::Compute => {
            let Some(pass) = store.get_component::<ComputePass>(node.entity) else {
                return Ok(None);
            };
            let desc = PipelineDescriptor::Compute {
                label: format!("compute {}", node.entity),
                shader: pass.shader.clone(),
                entry_point: pass.entry_point.clone(),
            };
            (desc, pass.bind_group)
        }
        PassKind::Render => {
            let Some(pass) = store.get_component::<RenderPass>(node.entity) else {
                return Ok(None);
            };
            let desc = PipelineDescriptor::Render {
                label: format!("render {}", node.entity),
                vertex_shader: pass.vertex_shader.clone(),
                fragment_shader: pass.fragment_shader.clone(),
                topology: pass.topology,
            };
            (desc, 0)
        }
    };

    if let Some(pipeline) = cache.pipeline(node.entity) {
        return Ok(Some((pipeline, group)));
    }
    let pipeline = backend.create_pipeline(&desc)?;
    tracing::debug!(pass = %node.entity, label = desc.label(), "pipeline created");
    cache.insert_pipeline(node.entity, pipeline);
    Ok(Some((pipeline, group)))
}
