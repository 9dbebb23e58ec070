//! A transactional ECS world: entity identity, the deferred structural-op
//! protocol, the component lifecycle state machine, a fixed system
//! pipeline run once per step, and observed-component change tracking.
//!
//! Storage is consumed through the [`Storage`] trait contract; this crate
//! ships a flat, concrete [`InMemoryStorage`] and does not implement
//! archetype tables, signature indexing, or query iteration.
//!
//! ```
//! use ecs_world::{ComponentTypeId, Schema, Value, World, WorldConfig};
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! struct Position;
//! impl Schema for Position {
//!     fn type_id(&self) -> ComponentTypeId {
//!         ComponentTypeId(1)
//!     }
//!     fn name(&self) -> &str {
//!         "Position"
//!     }
//!     fn construct(&self) -> Value {
//!         let mut fields = BTreeMap::new();
//!         fields.insert("x".to_string(), Value::Leaf(ecs_world::Leaf::Int(0)));
//!         Value::Struct(fields)
//!     }
//! }
//!
//! let mut world: World<()> = World::new(WorldConfig::default());
//! let schema: Arc<dyn Schema> = Arc::new(Position);
//! world.register_schema(Arc::clone(&schema)).unwrap();
//!
//! let entity = world.create(vec![(schema.type_id(), schema.construct())]);
//! world.step(());
//! assert!(world.has(entity, &schema));
//! ```

mod change;
mod component;
mod entity;
mod error;
mod observed;
mod op;
mod pool;
mod schema;
mod storage;
mod system;
mod topic;
mod value;
mod world;

pub use crate::change::{ChangeEntry, ChangeRecord};
pub use crate::component::{ComponentState, ComponentTypeId};
pub use crate::entity::Entity;
pub use crate::error::{Result, WorldError};
pub use crate::observed::ObservedView;
pub use crate::op::DeferredOp;
pub use crate::pool::ComponentPool;
pub use crate::schema::{Schema, SchemaRegistry};
pub use crate::storage::{ComponentSnapshot, InMemoryStorage, Storage, StoredComponent};
pub use crate::system::SystemId;
pub use crate::topic::Topic;
pub use crate::value::{Key, Leaf, Value};
pub use crate::world::{Snapshot, World, WorldConfig};
