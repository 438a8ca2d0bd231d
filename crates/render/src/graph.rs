//! Pass graph construction from store state.

use std::collections::HashMap;

use framegraph_common::EntityId;
use framegraph_ecs::{ComponentStore, ComputePass, Dependency, RenderPass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Compute,
    Render,
}

/// One pass and the resource entities it consumes and produces.
///
/// Built fresh every frame and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassNode {
    pub entity: EntityId,
    pub kind: PassKind,
    pub inputs: Vec<EntityId>,
    pub outputs: Vec<EntityId>,
    /// Bound after inputs and outputs; never used for ordering.
    pub uniforms: Vec<EntityId>,
}

impl PassNode {
    pub fn new(entity: EntityId, kind: PassKind) -> Self {
        Self {
            entity,
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            uniforms: Vec::new(),
        }
    }

    pub fn produces(&self, resource: EntityId) -> bool {
        self.outputs.contains(&resource)
    }
}

/// Collect every pass-bearing entity into an unordered node list.
///
/// Compute passes come first, then render passes, each in store insertion
/// order. An entity tagged with both pass kinds only yields its compute node.
pub fn build_graph(store: &ComponentStore) -> Vec<PassNode> {
    let compute = store.components_of_type::<ComputePass>();
    let render = store.components_of_type::<RenderPass>();
    let mut nodes = Vec::with_capacity(compute.len() + render.len());

    for (entity, _) in compute {
        nodes.push(node_for(store, *entity, PassKind::Compute));
    }
    for (entity, _) in render {
        if store.has_component::<ComputePass>(*entity) {
            tracing::warn!(%entity, "entity carries both compute and render pass; using compute");
            continue;
        }
        nodes.push(node_for(store, *entity, PassKind::Render));
    }
    nodes
}

fn node_for(store: &ComponentStore, entity: EntityId, kind: PassKind) -> PassNode {
    let mut node = PassNode::new(entity, kind);
    if let Some(dep) = store.get_component::<Dependency>(entity) {
        node.inputs = dep.inputs.clone();
        node.outputs = dep.outputs.clone();
        node.uniforms = dep.uniforms.clone();
    }
    node
}

/// Map from resource entity to the index of the node producing it.
///
/// When several nodes output the same resource, the first one in `nodes`
/// wins.
pub fn producer_index(nodes: &[PassNode]) -> HashMap<EntityId, usize> {
    let mut index = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        for output in &node.outputs {
            index.entry(*output).or_insert(i);
        }
    }
    index
}

/// A resource declared as output by more than one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateProducer {
    pub resource: EntityId,
    /// Producing passes in node order; the first is the one ordering uses.
    pub passes: Vec<EntityId>,
}

pub fn duplicate_producers(nodes: &[PassNode]) -> Vec<DuplicateProducer> {
    let mut by_resource: Vec<DuplicateProducer> = Vec::new();
    for node in nodes {
        for output in &node.outputs {
            match by_resource.iter_mut().find(|d| d.resource == *output) {
                Some(entry) => {
                    if !entry.passes.contains(&node.entity) {
                        entry.passes.push(node.entity);
                    }
                }
                None => by_resource.push(DuplicateProducer {
                    resource: *output,
                    passes: vec![node.entity],
                }),
            }
        }
    }
    by_resource.retain(|d| d.passes.len() > 1);
    by_resource
}

#[cfg(test)]
mod tests {
    use super::*;
    use framegraph_ecs::{Resource, TextureFormat};
    use glam::{UVec2, UVec3};

    fn texture(store: &mut ComponentStore) -> EntityId {
        let e = store.create_entity();
        store
            .add_component(e, Resource::texture(TextureFormat::Rgba32Float, UVec2::new(4, 4)))
            .unwrap();
        e
    }

    #[test]
    fn empty_store_has_no_nodes() {
        let store = ComponentStore::new();
        assert!(build_graph(&store).is_empty());
    }

    #[test]
    fn nodes_carry_dependencies() {
        let mut store = ComponentStore::new();
        let a = texture(&mut store);
        let b = texture(&mut store);
        let pass = store.create_entity();
        store
            .add_component(pass, ComputePass::new("erosion.wgsl", UVec3::ONE))
            .unwrap();
        store
            .add_component(pass, Dependency::new(vec![a], vec![b]))
            .unwrap();

        let nodes = build_graph(&store);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].entity, pass);
        assert_eq!(nodes[0].kind, PassKind::Compute);
        assert_eq!(nodes[0].inputs, vec![a]);
        assert_eq!(nodes[0].outputs, vec![b]);
    }

    #[test]
    fn missing_dependency_means_empty_lists() {
        let mut store = ComponentStore::new();
        let pass = store.create_entity();
        store
            .add_component(pass, RenderPass::new("vertex.wgsl", "fragment.wgsl"))
            .unwrap();

        let nodes = build_graph(&store);
        assert_eq!(nodes, vec![PassNode::new(pass, PassKind::Render)]);
    }

    #[test]
    fn compute_nodes_precede_render_nodes() {
        let mut store = ComponentStore::new();
        let render = store.create_entity();
        store
            .add_component(render, RenderPass::new("vertex.wgsl", "fragment.wgsl"))
            .unwrap();
        let compute = store.create_entity();
        store
            .add_component(compute, ComputePass::new("erosion.wgsl", UVec3::ONE))
            .unwrap();

        let kinds: Vec<PassKind> = build_graph(&store).iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![PassKind::Compute, PassKind::Render]);
    }

    #[test]
    fn dual_tagged_entity_yields_one_node() {
        let mut store = ComponentStore::new();
        let pass = store.create_entity();
        store
            .add_component(pass, ComputePass::new("erosion.wgsl", UVec3::ONE))
            .unwrap();
        store
            .add_component(pass, RenderPass::new("vertex.wgsl", "fragment.wgsl"))
            .unwrap();

        let nodes = build_graph(&store);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind, PassKind::Compute);
    }

    #[test]
    fn producer_index_first_match_wins() {
        let r = EntityId(100);
        let mut first = PassNode::new(EntityId(1), PassKind::Compute);
        first.outputs.push(r);
        let mut second = PassNode::new(EntityId(2), PassKind::Compute);
        second.outputs.push(r);

        let index = producer_index(&[first.clone(), second.clone()]);
        assert_eq!(index[&r], 0);

        let dups = duplicate_producers(&[first, second]);
        assert_eq!(
            dups,
            vec![DuplicateProducer {
                resource: r,
                passes: vec![EntityId(1), EntityId(2)],
            }]
        );
    }

    #[test]
    fn single_producers_are_not_reported() {
        let mut a = PassNode::new(EntityId(1), PassKind::Compute);
        a.outputs.push(EntityId(10));
        let mut b = PassNode::new(EntityId(2), PassKind::Render);
        b.inputs.push(EntityId(10));
        assert!(duplicate_producers(&[a, b]).is_empty());
    }
}
