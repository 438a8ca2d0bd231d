use std::collections::BTreeMap;

use framegraph_common::EntityId;
use framegraph_ecs::{ComponentStore, ComponentTag, EcsError};
use serde::Serialize;

/// Store inspector for developer tooling.
///
/// Read-only queries against a component store for debugging and the CLI.
pub struct StoreInspector;

impl StoreInspector {
    /// Produce a summary of the store.
    pub fn summary(store: &ComponentStore) -> StoreSummary {
        let stats = store.stats();
        let mut per_tag: BTreeMap<ComponentTag, usize> = BTreeMap::new();
        for entity in store.entities() {
            for tag in store.tags_of(entity) {
                *per_tag.entry(tag).or_default() += 1;
            }
        }
        StoreSummary {
            entity_count: stats.entities,
            component_count: stats.components,
            per_tag,
        }
    }

    /// Tags carried by one entity, or `None` if it is not alive.
    pub fn inspect_entity(store: &ComponentStore, id: EntityId) -> Option<EntityInfo> {
        store.is_alive(id).then(|| EntityInfo {
            id,
            tags: store.tags_of(id),
        })
    }

    /// List all live entity ids in ascending order.
    pub fn list_entities(store: &ComponentStore) -> Vec<EntityId> {
        store.entities().collect()
    }

    /// Every component of one entity, serialized.
    pub fn entity_components(
        store: &ComponentStore,
        id: EntityId,
    ) -> Result<Option<EntityComponents>, EcsError> {
        if !store.is_alive(id) {
            return Ok(None);
        }
        let snapshot = store.snapshot()?;
        let components = snapshot
            .components
            .into_iter()
            .filter_map(|(tag, entries)| {
                entries
                    .into_iter()
                    .find(|entry| entry.entity == id)
                    .map(|entry| (tag, entry.data))
            })
            .collect();
        Ok(Some(EntityComponents { entity: id, components }))
    }
}

/// Summary of store state for the inspector.
#[derive(Debug, Clone)]
pub struct StoreSummary {
    pub entity_count: usize,
    pub component_count: usize,
    pub per_tag: BTreeMap<ComponentTag, usize>,
}

impl std::fmt::Display for StoreSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Store: entities={} components={}",
            self.entity_count, self.component_count
        )?;
        for (tag, count) in &self.per_tag {
            write!(f, " {tag}={count}")?;
        }
        Ok(())
    }
}

/// Tags carried by a single entity.
#[derive(Debug, Clone)]
pub struct EntityInfo {
    pub id: EntityId,
    pub tags: Vec<ComponentTag>,
}

impl std::fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tags: Vec<&str> = self.tags.iter().map(|t| t.as_str()).collect();
        write!(f, "Entity {} [{}]", self.id, tags.join(", "))
    }
}

/// All components of one entity as JSON, keyed by tag.
#[derive(Debug, Clone, Serialize)]
pub struct EntityComponents {
    pub entity: EntityId,
    pub components: BTreeMap<ComponentTag, serde_json::Value>,
}
