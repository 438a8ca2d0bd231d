use std::any::{Any, type_name};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use framegraph_common::EntityId;
use serde::Serialize;

use crate::component::{Component, ComponentTag};

/// Errors from component store operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    #[error("tag {tag} already stores {existing}, cannot store {requested}")]
    TagConflict {
        tag: ComponentTag,
        existing: &'static str,
        requested: &'static str,
    },
    #[error("failed to serialize {tag} of entity {entity}: {source}")]
    Serialize {
        tag: ComponentTag,
        entity: EntityId,
        #[source]
        source: serde_json::Error,
    },
}

/// Homogeneous container for one component type.
///
/// Records stay in the order they were first added; overwriting a record
/// keeps its position.
#[derive(Debug)]
struct Storage<C> {
    records: Vec<(EntityId, C)>,
    index: HashMap<EntityId, usize>,
}

impl<C> Storage<C> {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, entity: EntityId, data: C) {
        match self.index.get(&entity) {
            Some(&slot) => self.records[slot].1 = data,
            None => {
                self.index.insert(entity, self.records.len());
                self.records.push((entity, data));
            }
        }
    }

    fn get(&self, entity: EntityId) -> Option<&C> {
        self.index.get(&entity).map(|&slot| &self.records[slot].1)
    }

    fn get_mut(&mut self, entity: EntityId) -> Option<&mut C> {
        let slot = *self.index.get(&entity)?;
        Some(&mut self.records[slot].1)
    }

    fn take(&mut self, entity: EntityId) -> Option<C> {
        let slot = self.index.remove(&entity)?;
        let (_, data) = self.records.remove(slot);
        for (moved, _) in &self.records[slot..] {
            if let Some(i) = self.index.get_mut(moved) {
                *i -= 1;
            }
        }
        Some(data)
    }
}

/// Object-safe view of a `Storage<C>` used where the concrete type is unknown.
trait ErasedStorage: std::fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn type_name(&self) -> &'static str;
    fn contains(&self, entity: EntityId) -> bool;
    fn remove(&mut self, entity: EntityId) -> bool;
    fn len(&self) -> usize;
    fn to_json(&self, tag: ComponentTag) -> Result<Vec<ComponentEntry>, EcsError>;
}

impl<C: Component> ErasedStorage for Storage<C> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        type_name::<C>()
    }

    fn contains(&self, entity: EntityId) -> bool {
        self.index.contains_key(&entity)
    }

    fn remove(&mut self, entity: EntityId) -> bool {
        self.take(entity).is_some()
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn to_json(&self, tag: ComponentTag) -> Result<Vec<ComponentEntry>, EcsError> {
        self.records
            .iter()
            .map(|(entity, data)| {
                let data = serde_json::to_value(data).map_err(|source| EcsError::Serialize {
                    tag,
                    entity: *entity,
                    source,
                })?;
                Ok(ComponentEntry {
                    entity: *entity,
                    data,
                })
            })
            .collect()
    }
}

/// Counts reported by [`ComponentStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub entities: usize,
    pub components: usize,
}

/// One serialized record inside a [`StoreSnapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct ComponentEntry {
    pub entity: EntityId,
    pub data: serde_json::Value,
}

/// Serializable view of the whole store, for inspection and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub entities: Vec<EntityId>,
    pub next_entity_id: u64,
    pub components: BTreeMap<ComponentTag, Vec<ComponentEntry>>,
}

/// Tag-indexed entity/component store.
///
/// Owns entity lifecycle and every component record. Each tag maps to one
/// typed container; accessors downcast to the concrete type at the boundary.
/// All mutations apply immediately.
#[derive(Debug, Default)]
pub struct ComponentStore {
    entities: BTreeSet<EntityId>,
    storages: BTreeMap<ComponentTag, Box<dyn ErasedStorage>>,
    next_entity_id: u64,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh entity id and register it as live.
    pub fn create_entity(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        self.entities.insert(id);
        id
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.contains(&entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Live entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().copied()
    }

    /// Insert or overwrite the `C` record of `entity`.
    ///
    /// The entity does not have to be live; callers normally create it first.
    pub fn add_component<C: Component>(&mut self, entity: EntityId, data: C) -> Result<(), EcsError> {
        let storage = self
            .storages
            .entry(C::TAG)
            .or_insert_with(|| Box::new(Storage::<C>::new()) as Box<dyn ErasedStorage>);
        let existing = storage.type_name();
        match storage.as_any_mut().downcast_mut::<Storage<C>>() {
            Some(typed) => {
                typed.insert(entity, data);
                Ok(())
            }
            None => Err(EcsError::TagConflict {
                tag: C::TAG,
                existing,
                requested: type_name::<C>(),
            }),
        }
    }

    pub fn get_component<C: Component>(&self, entity: EntityId) -> Option<&C> {
        self.storage::<C>()?.get(entity)
    }

    pub fn get_component_mut<C: Component>(&mut self, entity: EntityId) -> Option<&mut C> {
        self.storages
            .get_mut(&C::TAG)?
            .as_any_mut()
            .downcast_mut::<Storage<C>>()?
            .get_mut(entity)
    }

    /// Every `C` record in insertion order. Empty when none exist.
    pub fn components_of_type<C: Component>(&self) -> &[(EntityId, C)] {
        match self.storage::<C>() {
            Some(storage) => &storage.records,
            None => &[],
        }
    }

    pub fn has_component<C: Component>(&self, entity: EntityId) -> bool {
        self.has_tag(entity, C::TAG)
    }

    pub fn has_tag(&self, entity: EntityId, tag: ComponentTag) -> bool {
        self.storages.get(&tag).is_some_and(|s| s.contains(entity))
    }

    pub fn remove_component<C: Component>(&mut self, entity: EntityId) -> Option<C> {
        self.storages
            .get_mut(&C::TAG)?
            .as_any_mut()
            .downcast_mut::<Storage<C>>()?
            .take(entity)
    }

    /// Remove the record stored under `tag`, whatever its type.
    pub fn remove_tag(&mut self, entity: EntityId, tag: ComponentTag) -> bool {
        self.storages.get_mut(&tag).is_some_and(|s| s.remove(entity))
    }

    /// Destroy an entity and purge its records from every tag.
    ///
    /// Returns `false` if the entity was not live. The id is never handed out
    /// again.
    pub fn remove_entity(&mut self, entity: EntityId) -> bool {
        let was_alive = self.entities.remove(&entity);
        for storage in self.storages.values_mut() {
            storage.remove(entity);
        }
        if was_alive {
            tracing::trace!(%entity, "entity removed");
        }
        was_alive
    }

    /// Tags carried by `entity`, in tag order.
    pub fn tags_of(&self, entity: EntityId) -> Vec<ComponentTag> {
        self.storages
            .iter()
            .filter(|(_, s)| s.contains(entity))
            .map(|(tag, _)| *tag)
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entities: self.entities.len(),
            components: self.storages.values().map(|s| s.len()).sum(),
        }
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot, EcsError> {
        let mut components = BTreeMap::new();
        for (tag, storage) in &self.storages {
            if storage.len() > 0 {
                components.insert(*tag, storage.to_json(*tag)?);
            }
        }
        Ok(StoreSnapshot {
            entities: self.entities.iter().copied().collect(),
            next_entity_id: self.next_entity_id,
            components,
        })
    }

    fn storage<C: Component>(&self) -> Option<&Storage<C>> {
        self.storages.get(&C::TAG)?.as_any().downcast_ref::<Storage<C>>()
    }
}
