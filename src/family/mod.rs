//! Spell family handlers.
//!
//! Each family (direct damage, mesmerize, stat buff, ...) is a row of
//! policy data and hook functions rather than a type of its own: the
//! generic effect machinery consults the handler for immunity windows,
//! resist overrides and lifecycle behavior. New families are added by
//! registering a handler, not by touching the resolution code.

pub mod builtin;

use ahash::AHashMap;
use rand_chacha::ChaCha8Rng;

use crate::core::config::TuningConfig;
use crate::core::error::{Result, SpellError};
use crate::core::types::Property;
use crate::entity::Combatant;
use crate::pipeline::{CasterView, TargetView};
use crate::region::SpellEvent;
use crate::spell::{SpellDefinition, SpellFamily, SpellLine};

/// Context handed to family hooks.
///
/// The target combatant is mutably borrowed out of the region while the
/// hook runs; the caster side is a read-only snapshot taken before the
/// borrow, so hooks that need to charge the caster go through the pulse
/// machinery instead.
pub struct EffectCtx<'a> {
    pub now: u64,
    pub cfg: &'a TuningConfig,
    pub spell: &'a SpellDefinition,
    pub line: &'a SpellLine,
    pub effectiveness: f64,
    pub caster: &'a CasterView,
    pub target: &'a mut Combatant,
    /// Property deltas applied so far; start hooks push here so expiry
    /// can revert exactly what was applied.
    pub applied: &'a mut Vec<(Property, i32)>,
    pub events: &'a mut Vec<SpellEvent>,
    pub rng: &'a mut ChaCha8Rng,
    /// Suppresses messaging, for the silent expiry run during overwrite.
    pub silent: bool,
}

/// Resist override signature; returns a percent chance in 0..=100.
pub type ResistFn = fn(&SpellDefinition, &CasterView, &TargetView, &TuningConfig) -> i32;

/// Behavior table for one spell family.
#[derive(Clone, Copy)]
pub struct FamilyHandler {
    pub harmful: bool,
    /// Immunity window granted after natural expiry; 0 for none.
    pub immunity_ms: u64,
    /// Effects of this family end early when the target takes damage.
    pub breaks_on_damage: bool,
    /// Property deltas an effect of this family applies while active.
    pub deltas: Option<fn(&SpellDefinition, f64) -> Vec<(Property, i32)>>,
    pub on_start: Option<fn(&mut EffectCtx)>,
    pub on_pulse: Option<fn(&mut EffectCtx)>,
    pub on_expire: Option<fn(&mut EffectCtx)>,
    /// Action for spells without an effect lifecycle (nukes, heals).
    pub direct: Option<fn(&mut EffectCtx)>,
    pub resist_override: Option<ResistFn>,
    /// Extra condition two same-family spells must meet to contest the
    /// same slot; defaults to always contesting.
    pub overlap_override: Option<fn(&SpellDefinition, &SpellDefinition) -> bool>,
}

impl Default for FamilyHandler {
    fn default() -> Self {
        FamilyHandler {
            harmful: false,
            immunity_ms: 0,
            breaks_on_damage: false,
            deltas: None,
            on_start: None,
            on_pulse: None,
            on_expire: None,
            direct: None,
            resist_override: None,
            overlap_override: None,
        }
    }
}

impl FamilyHandler {
    /// True when two spells of this family contest the same effect slot.
    pub fn overlaps(&self, a: &SpellDefinition, b: &SpellDefinition) -> bool {
        match self.overlap_override {
            Some(f) => f(a, b),
            None => true,
        }
    }
}

/// Family lookup table for a region.
pub struct FamilyRegistry {
    handlers: AHashMap<SpellFamily, FamilyHandler>,
}

impl FamilyRegistry {
    pub fn new() -> Self {
        FamilyRegistry {
            handlers: AHashMap::new(),
        }
    }

    /// Registry preloaded with the standard families.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    pub fn register(&mut self, family: SpellFamily, handler: FamilyHandler) {
        self.handlers.insert(family, handler);
    }

    pub fn get(&self, family: &SpellFamily) -> Result<&FamilyHandler> {
        self.handlers
            .get(family)
            .ok_or_else(|| SpellError::UnknownFamily(family.to_string()))
    }
}

impl Default for FamilyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
