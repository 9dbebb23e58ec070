use crate::component::ComponentTypeId;
use crate::error::{Result, WorldError};
use crate::pool::ComponentPool;
use crate::value::Value;
use fxhash::FxHashMap;
use std::sync::Arc;
use tracing::error;

/// The external schema contract: every schema exposes a stable `type_id`,
/// a way to construct a fresh zeroed instance, a reset hook invoked on
/// pool release, and an optional initializer.
pub trait Schema: Send + Sync + 'static {
    fn type_id(&self) -> ComponentTypeId;
    fn name(&self) -> &str;

    /// Produces a fresh, zeroed instance of this schema's shape.
    fn construct(&self) -> Value;

    /// Resets `instance` in place back to its zeroed shape; invoked by the
    /// component pool on `release`.
    fn reset(&self, instance: &mut Value) {
        *instance = self.construct();
    }

    /// Optional constructor-time initialization hook, applied on top of a
    /// freshly retained instance.
    fn initialize(&self, _instance: &mut Value, _args: &Value) {}
}

/// Registers schemas and owns one `ComponentPool` per schema. Modeled as an
/// explicit context object rather than a process-wide singleton, so it is
/// constructed once by the caller and threaded into `World::new`.
pub struct SchemaRegistry {
    default_capacity: usize,
    schemas: FxHashMap<ComponentTypeId, Arc<dyn Schema>>,
    pools: FxHashMap<ComponentTypeId, ComponentPool>,
}

impl SchemaRegistry {
    pub fn new(default_capacity: usize) -> Self {
        SchemaRegistry {
            default_capacity,
            schemas: FxHashMap::default(),
            pools: FxHashMap::default(),
        }
    }

    pub fn register(&mut self, schema: Arc<dyn Schema>) -> Result<()> {
        self.register_with_capacity(schema, self.default_capacity)
    }

    pub fn register_with_capacity(&mut self, schema: Arc<dyn Schema>, capacity: usize) -> Result<()> {
        let type_id = schema.type_id();
        if self.schemas.contains_key(&type_id) {
            error!(?type_id, "duplicate schema registration");
            return Err(WorldError::Duplicate { type_id });
        }
        let pool = ComponentPool::new(Arc::clone(&schema), capacity);
        self.schemas.insert(type_id, schema);
        self.pools.insert(type_id, pool);
        Ok(())
    }

    pub fn is_registered(&self, type_id: ComponentTypeId) -> bool {
        self.schemas.contains_key(&type_id)
    }

    pub fn schema(&self, type_id: ComponentTypeId) -> Option<&Arc<dyn Schema>> {
        self.schemas.get(&type_id)
    }

    pub fn pool_mut(&mut self, type_id: ComponentTypeId) -> Option<&mut ComponentPool> {
        self.pools.get_mut(&type_id)
    }

    /// Releases every live instance described by `(type_id, instance)` back
    /// to its pool; used by `World::reset`.
    pub fn release_all(&mut self, type_id: ComponentTypeId, instances: Vec<Value>) {
        if let Some(pool) = self.pools.get_mut(&type_id) {
            for instance in instances {
                pool.release(instance);
            }
        }
    }
}
