//! Events generated while resolving casts and effects
//!
//! The region is an in-process library; messaging and animation sinks are
//! fire-and-forget, so everything user-visible is pushed onto an event log
//! the embedding simulation loop drains once per tick.

use crate::core::types::{EntityId, SpellId};

/// Routing hint for chat-style messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Spell,
    System,
    Resisted,
}

/// One user-visible consequence of casting or effect processing.
#[derive(Debug, Clone)]
pub enum SpellEvent {
    Message {
        to: EntityId,
        kind: MessageKind,
        text: String,
    },
    CastStarted {
        caster: EntityId,
        spell: SpellId,
        cast_ms: u64,
    },
    CastInterrupted {
        caster: EntityId,
        spell: SpellId,
    },
    CastFinished {
        caster: EntityId,
        spell: SpellId,
    },
    /// Spell/effect animation; `success = false` is the failure flash shown
    /// on resists and refused overwrites.
    EffectAnimation {
        caster: EntityId,
        target: EntityId,
        spell: SpellId,
        success: bool,
    },
    EffectStarted {
        target: EntityId,
        spell: SpellId,
    },
    EffectPulsed {
        target: EntityId,
        spell: SpellId,
    },
    EffectExpired {
        target: EntityId,
        spell: SpellId,
    },
    /// One per commit batch on a target's effect list.
    EffectsChanged {
        target: EntityId,
    },
    /// One per commit batch on an owner's concentration ledger.
    ConcentrationChanged {
        owner: EntityId,
    },
    Damage {
        caster: EntityId,
        target: EntityId,
        spell: SpellId,
        amount: i32,
    },
    Healed {
        caster: EntityId,
        target: EntityId,
        spell: SpellId,
        amount: i32,
    },
    Resisted {
        caster: EntityId,
        target: EntityId,
        spell: SpellId,
    },
    /// Asynchronous sight confirmation round trip: the embedder answers
    /// with [`Region::deliver_sight`](crate::region::Region::deliver_sight).
    SightCheckRequested {
        caster: EntityId,
        target: EntityId,
    },
    Died {
        entity: EntityId,
    },
}
