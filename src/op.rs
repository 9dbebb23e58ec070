use crate::component::ComponentTypeId;
use crate::entity::Entity;
use crate::value::Value;
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Most structural requests touch a handful of components, so the per-op
/// payload is a `SmallVec` rather than a heap-allocated `Vec`.
pub type ComponentList = SmallVec<[(ComponentTypeId, Value); 4]>;
pub type TypeIdList = SmallVec<[ComponentTypeId; 4]>;

/// A deferred structural request. A discriminated union, not a positional
/// tuple, so that a pooled op slot can be reused across variants.
#[derive(Debug)]
pub enum DeferredOp {
    Spawn(Entity, ComponentList),
    Attach(Entity, ComponentList),
    Detach(Entity, TypeIdList),
    Destroy(Entity),
}

/// A fixed-size pool of boxed op slots; ops are allocated from it and
/// returned after application.
struct OpPool {
    capacity: usize,
    free: Vec<Box<DeferredOp>>,
}

impl OpPool {
    fn new(capacity: usize) -> Self {
        OpPool {
            capacity,
            free: Vec::new(),
        }
    }

    fn acquire(&mut self, op: DeferredOp) -> Box<DeferredOp> {
        match self.free.pop() {
            Some(mut slot) => {
                *slot = op;
                slot
            }
            None => Box::new(op),
        }
    }

    fn release(&mut self, op: Box<DeferredOp>) {
        if self.free.len() < self.capacity {
            self.free.push(op);
        }
    }

    fn len(&self) -> usize {
        self.free.len()
    }
}

/// FIFO queue of pending structural operations. Enqueue is O(1); the
/// queue is drained exactly once per step, in enqueue order.
pub struct DeferredOpQueue {
    pool: OpPool,
    queue: VecDeque<Box<DeferredOp>>,
}

impl DeferredOpQueue {
    pub fn new(pool_capacity: usize) -> Self {
        DeferredOpQueue {
            pool: OpPool::new(pool_capacity),
            queue: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, op: DeferredOp) {
        let boxed = self.pool.acquire(op);
        self.queue.push_back(boxed);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Removes every pending op, in enqueue order, handing ownership to the
    /// caller. The caller must pass the result back to `recycle` once each
    /// op has been applied.
    pub fn drain(&mut self) -> Vec<Box<DeferredOp>> {
        self.queue.drain(..).collect()
    }

    /// Returns applied op boxes to the free list (discarding past
    /// capacity, same as a component pool over-capacity release).
    pub fn recycle(&mut self, boxes: Vec<Box<DeferredOp>>) {
        for boxed in boxes {
            self.pool.release(boxed);
        }
    }
}
