use crate::component::{ComponentState, ComponentTypeId};
use crate::entity::Entity;
use crate::value::Value;
use fxhash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// A single component instance as the world sees it: its schema, its
/// lifecycle state, and its (shared, observable) data. `data` is shared by
/// reference so that an `ObservedView` handed to a caller stays backed by
/// the same storage the world reads from.
#[derive(Clone)]
pub struct StoredComponent {
    pub type_id: ComponentTypeId,
    pub state: ComponentState,
    pub data: Rc<RefCell<Value>>,
}

impl StoredComponent {
    pub fn new(type_id: ComponentTypeId, state: ComponentState, value: Value) -> Self {
        StoredComponent {
            type_id,
            state,
            data: Rc::new(RefCell::new(value)),
        }
    }

    pub fn snapshot(&self) -> ComponentSnapshot {
        ComponentSnapshot {
            type_id: self.type_id,
            state: self.state,
            data: self.data.borrow().clone(),
        }
    }
}

/// An owned, detached copy of a component — what `getSnapshot` and
/// `get`/`tryGet` hand back to callers.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ComponentSnapshot {
    pub type_id: ComponentTypeId,
    pub state: ComponentState,
    pub data: Value,
}

/// The storage contract the world consumes. Archetype grouping, signature
/// indexing, and query iteration live on the other side of this trait and
/// are out of scope for this crate — `InMemoryStorage` below is a flat,
/// concrete implementation of just this surface, not an archetype table.
pub trait Storage {
    fn insert(&mut self, entity: Entity, components: Vec<StoredComponent>);
    fn find_component(&self, entity: Entity, type_id: ComponentTypeId) -> Option<&StoredComponent>;
    fn find_component_mut(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Option<&mut StoredComponent>;
    fn get_entity_components(&self, entity: Entity) -> Vec<&StoredComponent>;
    fn has_component(&self, entity: Entity, type_id: ComponentTypeId) -> bool;
    fn remove_by_type_ids(&mut self, entity: Entity, type_ids: &[ComponentTypeId]) -> Vec<StoredComponent>;
    fn destroy(&mut self, entity: Entity) -> Vec<StoredComponent>;
    fn clear_components(&mut self, entity: Entity);
    /// Removes and returns every stored component, for `World::reset`.
    fn drain_all(&mut self) -> Vec<(Entity, StoredComponent)>;
    fn reset(&mut self);
    fn snapshot(&self) -> Vec<(Entity, Vec<ComponentSnapshot>)>;
}

/// Flat `(entity, type_id) -> component` map, plus a per-entity index for
/// `get_entity_components`. This is the concrete side of the storage
/// facade; production storage would group entities into archetypes, but
/// that mechanism is explicitly out of scope for this crate.
#[derive(Default)]
pub struct InMemoryStorage {
    components: FxHashMap<(Entity, ComponentTypeId), StoredComponent>,
    by_entity: FxHashMap<Entity, Vec<ComponentTypeId>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for InMemoryStorage {
    fn insert(&mut self, entity: Entity, components: Vec<StoredComponent>) {
        let entry = self.by_entity.entry(entity).or_default();
        for component in components {
            let type_id = component.type_id;
            if !entry.contains(&type_id) {
                entry.push(type_id);
            }
            self.components.insert((entity, type_id), component);
        }
    }

    fn find_component(&self, entity: Entity, type_id: ComponentTypeId) -> Option<&StoredComponent> {
        self.components.get(&(entity, type_id))
    }

    fn find_component_mut(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Option<&mut StoredComponent> {
        self.components.get_mut(&(entity, type_id))
    }

    fn get_entity_components(&self, entity: Entity) -> Vec<&StoredComponent> {
        self.by_entity
            .get(&entity)
            .map(|type_ids| {
                type_ids
                    .iter()
                    .filter_map(|type_id| self.components.get(&(entity, *type_id)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn has_component(&self, entity: Entity, type_id: ComponentTypeId) -> bool {
        self.components.contains_key(&(entity, type_id))
    }

    fn remove_by_type_ids(&mut self, entity: Entity, type_ids: &[ComponentTypeId]) -> Vec<StoredComponent> {
        let mut removed = Vec::with_capacity(type_ids.len());
        if let Some(entry) = self.by_entity.get_mut(&entity) {
            entry.retain(|t| !type_ids.contains(t));
        }
        for type_id in type_ids {
            if let Some(component) = self.components.remove(&(entity, *type_id)) {
                removed.push(component);
            }
        }
        removed
    }

    fn destroy(&mut self, entity: Entity) -> Vec<StoredComponent> {
        let type_ids = self.by_entity.remove(&entity).unwrap_or_default();
        type_ids
            .into_iter()
            .filter_map(|type_id| self.components.remove(&(entity, type_id)))
            .collect()
    }

    fn clear_components(&mut self, entity: Entity) {
        self.destroy(entity);
    }

    fn drain_all(&mut self) -> Vec<(Entity, StoredComponent)> {
        let entities: Vec<Entity> = self.by_entity.keys().copied().collect();
        let mut out = Vec::new();
        for entity in entities {
            for component in self.destroy(entity) {
                out.push((entity, component));
            }
        }
        out
    }

    fn reset(&mut self) {
        self.components.clear();
        self.by_entity.clear();
    }

    fn snapshot(&self) -> Vec<(Entity, Vec<ComponentSnapshot>)> {
        let mut entities: Vec<Entity> = self.by_entity.keys().copied().collect();
        entities.sort();
        entities
            .into_iter()
            .map(|entity| {
                let components = self
                    .get_entity_components(entity)
                    .into_iter()
                    .map(StoredComponent::snapshot)
                    .collect();
                (entity, components)
            })
            .collect()
    }
}
