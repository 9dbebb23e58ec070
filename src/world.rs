use crate::change::ChangeRecord;
use crate::component::{ComponentState, ComponentTypeId};
use crate::entity::{Entity, EntityAllocator};
use crate::error::{Result, WorldError};
use crate::observed::ObservedView;
use crate::op::DeferredOp;
use crate::op::DeferredOpQueue;
use crate::schema::Schema;
use crate::storage::{ComponentSnapshot, InMemoryStorage, Storage, StoredComponent};
use crate::system::{self, SystemId, SystemPipeline};
use crate::topic::{Topic, TopicRegistry};
use crate::value::Value;
use fxhash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{span, trace, Level};

/// Construction-time tuning for a `World`: pool capacities are fixed once
/// at construction, not adjustable afterward.
#[derive(Copy, Clone, Debug)]
pub struct WorldConfig {
    pub default_pool_capacity: usize,
    pub op_pool_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            default_pool_capacity: 1000,
            op_pool_capacity: 256,
        }
    }
}

/// An opaque value combining a storage snapshot and the entity counter's
/// high-water mark. Round-trippable only with the world that produced it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    pub next_entity_id: u64,
    pub entities: Vec<(Entity, Vec<ComponentSnapshot>)>,
}

/// The transactional coordinator: entity identity, the deferred-op queue,
/// the component lifecycle state machine, the step loop, and observed
/// change tracking, all in one place. `D` is the per-step data passed to
/// every system.
pub struct World<D> {
    entities: EntityAllocator,
    storage: Box<dyn Storage>,
    schemas: crate::schema::SchemaRegistry,
    ops: DeferredOpQueue,
    topics: TopicRegistry,
    systems: SystemPipeline<D>,

    attaching: Vec<(Entity, ComponentTypeId)>,
    finalize_detach: FxHashMap<Entity, Vec<ComponentTypeId>>,
    finalize_destroy: FxHashSet<Entity>,
    destroyed_pending: FxHashSet<Entity>,

    observed_cache: FxHashMap<(Entity, ComponentTypeId), ObservedView>,

    draining_ops: bool,
    applying_external_ops: bool,
    is_first_step: bool,
    latest_step: u64,
    latest_system: Option<SystemId>,
    latest_step_data: Option<D>,
    op_pool_capacity: usize,
}

impl<D> World<D> {
    pub fn new(config: WorldConfig) -> Self {
        World {
            entities: EntityAllocator::new(),
            storage: Box::new(InMemoryStorage::new()),
            schemas: crate::schema::SchemaRegistry::new(config.default_pool_capacity),
            ops: DeferredOpQueue::new(config.op_pool_capacity),
            topics: TopicRegistry::new(),
            systems: SystemPipeline::new(),
            attaching: Vec::new(),
            finalize_detach: FxHashMap::default(),
            finalize_destroy: FxHashSet::default(),
            destroyed_pending: FxHashSet::default(),
            observed_cache: FxHashMap::default(),
            draining_ops: false,
            applying_external_ops: false,
            is_first_step: true,
            latest_step: 0,
            latest_system: None,
            latest_step_data: None,
            op_pool_capacity: config.op_pool_capacity,
        }
    }

    pub fn register_schema(&mut self, schema: Arc<dyn Schema>) -> Result<()> {
        self.schemas.register(schema)
    }

    pub fn register_schema_with_capacity(&mut self, schema: Arc<dyn Schema>, capacity: usize) -> Result<()> {
        self.schemas.register_with_capacity(schema, capacity)
    }

    pub fn register_topic(&mut self, topic: Box<dyn Topic>) {
        self.topics.register(topic);
    }

    pub fn register_system<F>(&mut self, func: F) -> SystemId
    where
        F: FnMut(&mut World<D>, &D) + 'static,
    {
        self.systems.register(func)
    }

    pub fn remove_system(&mut self, id: SystemId) -> bool {
        self.systems.remove(id)
    }

    pub fn latest_step(&self) -> u64 {
        self.latest_step
    }

    pub fn latest_system(&self) -> Option<SystemId> {
        self.latest_system
    }

    pub fn latest_step_data(&self) -> Option<&D> {
        self.latest_step_data.as_ref()
    }

    pub(crate) fn set_latest_system(&mut self, id: Option<SystemId>) {
        self.latest_system = id;
    }

    pub(crate) fn system_pipeline_mut(&mut self) -> &mut SystemPipeline<D> {
        &mut self.systems
    }

    // ---- 4.4.1 entity allocation ------------------------------------------

    /// Allocates a new entity id and, if `components` is non-empty, enqueues
    /// an Attach op carrying them. Returns immediately; the caller may refer
    /// to the entity before it exists in storage.
    pub fn create(&mut self, components: Vec<(ComponentTypeId, Value)>) -> Entity {
        let entity = self.entities.allocate();
        if !components.is_empty() {
            self.attach(entity, components);
        }
        entity
    }

    // ---- 4.4.2 structural API ----------------------------------------------

    /// Enqueues an Attach op carrying `components`. Storage insertion is
    /// deferred to the next drain; `has`/`get` stay false until then.
    pub fn attach(&mut self, entity: Entity, components: Vec<(ComponentTypeId, Value)>) {
        self.ops.enqueue(DeferredOp::Attach(entity, components.into()));
    }

    /// Enqueues a Detach op for the given component types and immediately
    /// flags any matching components already in storage as Detaching.
    pub fn detach(&mut self, entity: Entity, type_ids: Vec<ComponentTypeId>) {
        self.flag_detaching(entity, &type_ids);
        self.ops.enqueue(DeferredOp::Detach(entity, type_ids.into()));
    }

    /// Idempotent within a step: repeated calls for the same entity before
    /// the pending Destroy op is applied enqueue nothing further.
    pub fn destroy(&mut self, entity: Entity) {
        if !self.destroyed_pending.insert(entity) {
            return;
        }
        let type_ids: Vec<ComponentTypeId> = self
            .storage
            .get_entity_components(entity)
            .iter()
            .map(|c| c.type_id)
            .collect();
        self.flag_detaching(entity, &type_ids);
        self.ops.enqueue(DeferredOp::Destroy(entity));
    }

    fn flag_detaching(&mut self, entity: Entity, type_ids: &[ComponentTypeId]) {
        for type_id in type_ids {
            if let Some(component) = self.storage.find_component_mut(entity, *type_id) {
                component.state = ComponentState::Detaching;
            }
        }
    }

    /// Bypasses the queue: inserts components into storage now, as Attached.
    pub fn attach_immediate(&mut self, entity: Entity, components: Vec<(ComponentTypeId, Value)>) {
        let stored = components
            .into_iter()
            .map(|(type_id, value)| StoredComponent::new(type_id, ComponentState::Attached, value))
            .collect();
        self.storage.insert(entity, stored);
    }

    /// Bypasses the queue: removes the given component types from storage
    /// now and releases them to their pools. Errors `NotFound` if any named
    /// type is not present, unlike the deferred path, which silently no-ops.
    pub fn detach_immediate(&mut self, entity: Entity, type_ids: &[ComponentTypeId]) -> Result<()> {
        for type_id in type_ids {
            if !self.storage.has_component(entity, *type_id) {
                return Err(WorldError::NotFound {
                    entity,
                    type_id: *type_id,
                });
            }
        }
        let removed = self.storage.remove_by_type_ids(entity, type_ids);
        for component in removed {
            self.observed_cache.remove(&(entity, component.type_id));
            self.release_to_pool(component);
        }
        Ok(())
    }

    /// Bypasses the queue: removes every component of `entity` from storage
    /// now and releases them to their pools.
    pub fn destroy_immediate(&mut self, entity: Entity) {
        let removed = self.storage.destroy(entity);
        for component in removed {
            self.observed_cache.remove(&(entity, component.type_id));
            self.release_to_pool(component);
        }
    }

    fn release_to_pool(&mut self, component: StoredComponent) {
        let value = Rc::try_unwrap(component.data)
            .map(|cell| cell.into_inner())
            .unwrap_or_else(|rc| rc.borrow().clone());
        if let Some(pool) = self.schemas.pool_mut(component.type_id) {
            pool.release(value);
        }
    }

    // ---- 4.4.3 op application & maintenance ---------------------------------

    fn apply_op(&mut self, op: &DeferredOp) {
        match op {
            DeferredOp::Spawn(entity, components) | DeferredOp::Attach(entity, components) => {
                trace!(?entity, count = components.len(), "applying attach");
                let mut stored = Vec::with_capacity(components.len());
                for (type_id, value) in components {
                    stored.push(StoredComponent::new(*type_id, ComponentState::Attaching, value.clone()));
                    self.attaching.push((*entity, *type_id));
                }
                self.storage.insert(*entity, stored);
            }
            DeferredOp::Detach(entity, type_ids) => {
                trace!(?entity, ?type_ids, "applying detach");
                for type_id in type_ids {
                    if let Some(component) = self.storage.find_component_mut(*entity, *type_id) {
                        component.state = ComponentState::Detached;
                    }
                }
                self.finalize_detach
                    .entry(*entity)
                    .or_default()
                    .extend(type_ids.iter().copied());
            }
            DeferredOp::Destroy(entity) => {
                trace!(?entity, "applying destroy");
                let type_ids: Vec<ComponentTypeId> = self
                    .storage
                    .get_entity_components(*entity)
                    .iter()
                    .map(|c| c.type_id)
                    .collect();
                for type_id in &type_ids {
                    if let Some(component) = self.storage.find_component_mut(*entity, *type_id) {
                        component.state = ComponentState::Detached;
                    }
                }
                self.finalize_destroy.insert(*entity);
            }
        }
    }

    fn maintain(&mut self) {
        for (entity, type_id) in self.attaching.drain(..) {
            if let Some(component) = self.storage.find_component_mut(entity, type_id) {
                if component.state == ComponentState::Attaching {
                    component.state = ComponentState::Attached;
                }
            }
        }

        let finalize_detach = std::mem::take(&mut self.finalize_detach);
        for (entity, type_ids) in finalize_detach {
            let removed = self.storage.remove_by_type_ids(entity, &type_ids);
            for component in removed {
                self.observed_cache.remove(&(entity, component.type_id));
                self.release_to_pool(component);
            }
        }

        let finalize_destroy = std::mem::take(&mut self.finalize_destroy);
        for entity in finalize_destroy {
            let removed = self.storage.destroy(entity);
            for component in removed {
                self.observed_cache.remove(&(entity, component.type_id));
                self.release_to_pool(component);
            }
        }
    }

    fn drain_and_apply(&mut self) {
        self.draining_ops = true;
        let boxed_ops = self.ops.drain();
        for boxed in &boxed_ops {
            self.apply_op(boxed);
        }
        self.ops.recycle(boxed_ops);
        self.maintain();
        self.draining_ops = false;
    }

    // ---- 4.4.4 externally supplied op batches -------------------------------

    /// Injects ops from another actor (e.g. a replication client). Before
    /// enqueuing, the world pre-flags affected components exactly as the
    /// structural API does, then the ops flow through the standard apply
    /// path on the next drain. Rejected with `InvalidState` if called
    /// re-entrantly from within an in-progress `apply_ops` call.
    pub fn apply_ops(&mut self, ops: Vec<DeferredOp>) -> Result<()> {
        if self.applying_external_ops {
            return Err(WorldError::InvalidState("apply_ops invoked reentrantly"));
        }
        self.applying_external_ops = true;
        for op in &ops {
            match op {
                DeferredOp::Detach(entity, type_ids) => self.flag_detaching(*entity, type_ids),
                DeferredOp::Destroy(entity) => {
                    let type_ids: Vec<ComponentTypeId> = self
                        .storage
                        .get_entity_components(*entity)
                        .iter()
                        .map(|c| c.type_id)
                        .collect();
                    self.flag_detaching(*entity, &type_ids);
                }
                _ => {}
            }
        }
        for op in ops {
            self.ops.enqueue(op);
        }
        self.applying_external_ops = false;
        Ok(())
    }

    // ---- 4.4.5 step loop -----------------------------------------------------

    /// Runs one step: drains and applies pending ops, flushes topics, runs
    /// every registered system in registration order, then advances the
    /// step counter. On the very first call, op application runs twice so
    /// that any ops issued before the first step take effect before the
    /// first system runs.
    pub fn step(&mut self, data: D)
    where
        D: Clone,
    {
        let _span = span!(Level::TRACE, "world_step", step = self.latest_step).entered();
        self.latest_step_data = Some(data.clone());

        if self.is_first_step {
            self.drain_and_apply();
            self.is_first_step = false;
        }
        self.drain_and_apply();

        self.topics.flush_all();

        let entries = self.systems.take();
        system::run_all(entries, self, &data);

        self.destroyed_pending.clear();
        self.latest_step += 1;
    }

    // ---- 4.4.6 reads ----------------------------------------------------------

    fn ensure_registered(&mut self, schema: &Arc<dyn Schema>) {
        if !self.schemas.is_registered(schema.type_id()) {
            let _ = self.schemas.register(Arc::clone(schema));
        }
    }

    fn read_value(&self, entity: Entity, type_id: ComponentTypeId) -> Option<Value> {
        self.storage
            .find_component(entity, type_id)
            .map(|c| c.data.borrow().clone())
    }

    /// Registers `schema` if it is not already known, then returns the
    /// component or `NotFound`.
    pub fn get(&mut self, entity: Entity, schema: &Arc<dyn Schema>) -> Result<Value> {
        self.ensure_registered(schema);
        let type_id = schema.type_id();
        self.read_value(entity, type_id).ok_or(WorldError::NotFound { entity, type_id })
    }

    pub fn try_get(&mut self, entity: Entity, schema: &Arc<dyn Schema>) -> Option<Value> {
        self.ensure_registered(schema);
        self.read_value(entity, schema.type_id())
    }

    pub fn has(&mut self, entity: Entity, schema: &Arc<dyn Schema>) -> bool {
        self.ensure_registered(schema);
        self.storage.has_component(entity, schema.type_id())
    }

    /// Returns the memoized observed wrapper for the live component at
    /// `(entity, type_id)`, creating one on first access.
    pub fn get_observed_component(&mut self, entity: Entity, type_id: ComponentTypeId) -> Result<ObservedView> {
        if let Some(view) = self.observed_cache.get(&(entity, type_id)) {
            return Ok(view.clone());
        }
        let data = self
            .storage
            .find_component(entity, type_id)
            .map(|c| Rc::clone(&c.data))
            .ok_or(WorldError::NotFound { entity, type_id })?;
        let changes = {
            let value = data.borrow();
            Rc::new(RefCell::new(ChangeRecord::empty_for(&value)))
        };
        let view = ObservedView::new(data, changes);
        self.observed_cache.insert((entity, type_id), view.clone());
        Ok(view)
    }

    /// True iff a component at `(entity, type_id)` has a memoized observed
    /// view with a non-empty change record. A component never observed
    /// through `get_observed_component` reports unchanged.
    pub fn is_component_changed(&self, entity: Entity, type_id: ComponentTypeId) -> bool {
        self.observed_cache
            .get(&(entity, type_id))
            .map(|view| view.is_changed())
            .unwrap_or(false)
    }

    /// Applies a scalar write at a dotted path, semantically equivalent to
    /// walking observed views down to the leaf and writing it there.
    pub fn patch(&mut self, entity: Entity, type_id: ComponentTypeId, path: &str, value: Value) -> Result<()> {
        let root = self.get_observed_component(entity, type_id)?;
        let segments: Vec<&str> = path.split('.').collect();
        let Some((last, rest)) = segments.split_last() else {
            return Ok(());
        };
        let mut current = root;
        for segment in rest {
            current = current.field_view(segment);
        }
        current.set_field(last, value);
        Ok(())
    }

    // ---- 4.4.7 snapshot & reset -----------------------------------------------

    pub fn get_snapshot(&self) -> Snapshot {
        Snapshot {
            next_entity_id: self.entities.len(),
            entities: self.storage.snapshot(),
        }
    }

    /// Clears deferred ops, systems, topics, and the destroyed-pending set;
    /// rewinds the entity counter; releases every live component to its
    /// pool; resets storage. Fails if called while ops are being drained.
    pub fn reset(&mut self) -> Result<()> {
        if self.draining_ops {
            return Err(WorldError::InvalidState("reset invoked while ops are being drained"));
        }

        for (entity, component) in self.storage.drain_all() {
            self.observed_cache.remove(&(entity, component.type_id));
            self.release_to_pool(component);
        }

        self.ops = DeferredOpQueue::new(self.op_pool_capacity);
        self.systems = SystemPipeline::new();
        self.topics = TopicRegistry::new();
        self.destroyed_pending.clear();
        self.attaching.clear();
        self.finalize_detach.clear();
        self.finalize_destroy.clear();
        self.observed_cache.clear();
        self.entities.reset();
        self.is_first_step = true;
        self.latest_step = 0;
        self.latest_system = None;
        self.latest_step_data = None;
        Ok(())
    }
}
