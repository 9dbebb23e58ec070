use crate::component::ComponentTypeId;
use crate::entity::Entity;
use thiserror::Error;

/// All fallible world operations share this error type. Structural methods
/// (`attach`/`detach`/`destroy`) do not go through this path at enqueue time —
/// per the design, invalid ops are silently dropped during application instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    #[error("component {type_id:?} not found on entity {entity:?}")]
    NotFound {
        entity: Entity,
        type_id: ComponentTypeId,
    },

    #[error("schema with type id {type_id:?} already registered")]
    Duplicate { type_id: ComponentTypeId },

    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}

pub type Result<T> = std::result::Result<T, WorldError>;
