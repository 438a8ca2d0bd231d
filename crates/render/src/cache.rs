use std::collections::HashMap;

use framegraph_common::EntityId;

use crate::backend::{BindingSetHandle, PipelineHandle, ResourceHandle};

/// A backend resource created for a resource entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResource {
    pub handle: ResourceHandle,
    /// Byte size a buffer was allocated with; zero for textures and samplers.
    pub capacity: u64,
    /// Bytes last written to a buffer, used to skip redundant uploads.
    pub uploaded: Option<Vec<u8>>,
}

/// A binding set together with the resources it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBinding {
    pub handle: BindingSetHandle,
    pub resources: Vec<ResourceHandle>,
}

/// Backend objects keyed by entity id, reused across frames.
///
/// Only the binder writes to the cache. It is dropped wholesale by
/// [`ResourceCache::invalidate`] after a resize or device loss; entries are
/// never evicted one at a time.
#[derive(Debug, Default)]
pub struct ResourceCache {
    resources: HashMap<EntityId, CachedResource>,
    pipelines: HashMap<EntityId, PipelineHandle>,
    bindings: HashMap<EntityId, CachedBinding>,
    generation: u64,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every cached backend object.
    pub fn invalidate(&mut self) {
        self.resources.clear();
        self.pipelines.clear();
        self.bindings.clear();
        self.generation += 1;
        tracing::debug!(generation = self.generation, "resource cache invalidated");
    }

    /// Number of times the cache has been invalidated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.pipelines.is_empty() && self.bindings.is_empty()
    }

    pub fn resource(&self, entity: EntityId) -> Option<&CachedResource> {
        self.resources.get(&entity)
    }

    pub fn resource_mut(&mut self, entity: EntityId) -> Option<&mut CachedResource> {
        self.resources.get_mut(&entity)
    }

    pub fn insert_resource(&mut self, entity: EntityId, resource: CachedResource) {
        self.resources.insert(entity, resource);
    }

    pub fn pipeline(&self, pass: EntityId) -> Option<PipelineHandle> {
        self.pipelines.get(&pass).copied()
    }

    pub fn insert_pipeline(&mut self, pass: EntityId, pipeline: PipelineHandle) {
        self.pipelines.insert(pass, pipeline);
    }

    pub fn binding(&self, pass: EntityId) -> Option<&CachedBinding> {
        self.bindings.get(&pass)
    }

    pub fn insert_binding(&mut self, pass: EntityId, binding: CachedBinding) {
        self.bindings.insert(pass, binding);
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureHandle;

    #[test]
    fn invalidate_clears_everything() {
        let mut cache = ResourceCache::new();
        cache.insert_resource(
            EntityId(1),
            CachedResource {
                handle: ResourceHandle::Texture(TextureHandle(1)),
                capacity: 0,
                uploaded: None,
            },
        );
        cache.insert_pipeline(EntityId(2), PipelineHandle(2));
        cache.insert_binding(
            EntityId(2),
            CachedBinding {
                handle: BindingSetHandle(3),
                resources: vec![ResourceHandle::Texture(TextureHandle(1))],
            },
        );
        assert!(!cache.is_empty());

        cache.invalidate();
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), 1);
        assert!(cache.pipeline(EntityId(2)).is_none());
    }
}
