use crate::schema::Schema;
use crate::value::Value;
use std::sync::Arc;
use tracing::debug;

/// A bounded stack of free component instances for one schema. Retention
/// pops a free instance (constructing a fresh one if empty) and release
/// resets + pushes one back, discarding it past capacity.
pub struct ComponentPool {
    schema: Arc<dyn Schema>,
    capacity: usize,
    free: Vec<Value>,
}

impl ComponentPool {
    pub fn new(schema: Arc<dyn Schema>, capacity: usize) -> Self {
        ComponentPool {
            schema,
            capacity,
            free: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Pops a free instance, constructing a fresh one if the pool is
    /// empty. An empty pool is not an error.
    pub fn retain(&mut self) -> Value {
        self.free.pop().unwrap_or_else(|| self.schema.construct())
    }

    /// Resets `instance` via the schema's reset hook and pushes it back,
    /// discarding it if the pool is already at capacity.
    pub fn release(&mut self, mut instance: Value) {
        self.schema.reset(&mut instance);
        if self.free.len() < self.capacity {
            self.free.push(instance);
        } else {
            debug!(schema = self.schema.name(), "component pool at capacity, discarding release");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentTypeId;
    use std::collections::BTreeMap;

    struct Counter;
    impl Schema for Counter {
        fn type_id(&self) -> ComponentTypeId {
            ComponentTypeId(7)
        }
        fn name(&self) -> &str {
            "Counter"
        }
        fn construct(&self) -> Value {
            let mut m = BTreeMap::new();
            m.insert("n".to_string(), Value::Leaf(crate::value::Leaf::Int(0)));
            Value::Struct(m)
        }
    }

    #[test]
    fn retain_constructs_when_empty() {
        let mut pool = ComponentPool::new(Arc::new(Counter), 2);
        let v = pool.retain();
        assert!(matches!(v, Value::Struct(_)));
    }

    #[test]
    fn release_then_retain_reuses_instance() {
        let mut pool = ComponentPool::new(Arc::new(Counter), 2);
        let v = pool.retain();
        pool.release(v);
        assert_eq!(pool.free_len(), 1);
        pool.retain();
        assert_eq!(pool.free_len(), 0);
    }

    #[test]
    fn over_capacity_release_is_discarded() {
        let mut pool = ComponentPool::new(Arc::new(Counter), 1);
        pool.release(Counter.construct());
        pool.release(Counter.construct());
        assert_eq!(pool.free_len(), 1);
    }

    #[test]
    fn release_resets_fields() {
        let mut pool = ComponentPool::new(Arc::new(Counter), 2);
        let mut v = pool.retain();
        if let Value::Struct(m) = &mut v {
            m.insert("n".to_string(), Value::Leaf(crate::value::Leaf::Int(99)));
        }
        pool.release(v);
        let reused = pool.retain();
        if let Value::Struct(m) = &reused {
            assert_eq!(m.get("n"), Some(&Value::Leaf(crate::value::Leaf::Int(0))));
        } else {
            panic!("wrong shape");
        }
    }
}
