use thiserror::Error;

use crate::core::types::{EntityId, SpellId};

/// Failures that abort a single cast or lookup without touching state.
///
/// Precondition refusals live in [`CastRefusal`](crate::casting::CastRefusal);
/// these are the invariant violations that are logged and fatal to the one
/// cast only, never to the simulation tick.
#[derive(Error, Debug)]
pub enum SpellError {
    #[error("Entity not found: {0:?}")]
    EntityNotFound(EntityId),

    #[error("Unknown spell {1:?} in line '{0}'")]
    UnknownSpell(String, SpellId),

    #[error("Unknown spell line '{0}'")]
    UnknownLine(String),

    #[error("No family handler registered for '{0}'")]
    UnknownFamily(String),

    #[error("No casting session active for {0:?}")]
    NoActiveSession(EntityId),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SpellError>;
