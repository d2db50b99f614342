pub mod config;
pub mod error;
pub mod types;

pub use config::TuningConfig;
pub use error::{Result, SpellError};
pub use types::{
    EffectId, EntityId, GroupId, Position, PowerChangeReason, Property, Realm, SpellId,
    TimerHandle,
};
