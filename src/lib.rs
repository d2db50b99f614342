//! runecast: casting and effect resolution for a live combat simulation.
//!
//! A [`Region`](region::Region) owns combatants, their casting sessions and
//! active effects, and a cooperative timer wheel driving cast windows,
//! effect pulses and expirations. The embedding simulation loop calls
//! [`Region::advance`](region::Region::advance) each tick and drains the
//! resulting [`SpellEvent`](region::SpellEvent) log.
//!
//! Spell behavior is data plus family handlers: a
//! [`SpellDefinition`](spell::SpellDefinition) carries the numbers, its
//! [`FamilyHandler`](family::FamilyHandler) the lifecycle hooks and stacking
//! policy. The numeric damage and resist pipeline lives in [`pipeline`] as
//! pure functions over stat snapshots.

pub mod casting;
pub mod concentration;
pub mod core;
pub mod effect;
pub mod entity;
pub mod family;
pub mod pipeline;
pub mod region;
pub mod spell;
pub mod timer;

pub use casting::{CastOutcome, CastRefusal};
pub use crate::core::config::TuningConfig;
pub use crate::core::error::{Result, SpellError};
pub use crate::core::types::{EffectId, EntityId, GroupId, Position, Property, Realm, SpellId};
pub use entity::Combatant;
pub use region::{Region, SpellEvent};
pub use spell::{SpellCatalog, SpellDefinition, SpellFamily, SpellLine, TargetMode};
