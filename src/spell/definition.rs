//! Immutable spell definitions
//!
//! Each concrete ability from the external catalog parameterizes the generic
//! mechanics with one of these records. Loaded once, shared read-only for
//! the process lifetime.

use serde::{Deserialize, Serialize};

use crate::core::types::SpellId;

/// Family tag keying the pluggable policy table; determines which policy
/// functions drive the effect lifecycle and which effects mutually exclude.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpellFamily(pub String);

impl SpellFamily {
    pub fn new(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl std::fmt::Display for SpellFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the concrete target set is selected at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetMode {
    /// Always the caster
    SelfOnly,
    /// Hostile single target, or radius around it when `radius > 0`;
    /// `range == 0` with a radius is point-blank around the caster
    Enemy,
    /// Caster's group members within range, caster included
    Group,
    /// Ground-targeted radius at the caster's marked position
    Area,
    /// Dead same-realm target
    Corpse,
    /// The caster's controlled pet
    Pet,
    /// Friendly single target, or same-realm radius when `radius > 0`
    Realm,
}

/// Immutable description of one ability's parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpellDefinition {
    pub id: SpellId,
    pub name: String,
    pub family: SpellFamily,
    pub target: TargetMode,
    /// Generic magnitude for non-damage families (buff amount, heal, snare %)
    pub value: f64,
    /// Base damage for damaging families
    pub damage: f64,
    pub level: u32,
    pub range: f32,
    pub radius: f32,
    /// 0 = instant action or unlimited (concentration) duration
    pub duration_ms: u64,
    /// 0 = no pulsing
    pub pulse_ms: u64,
    /// Power drained from the caster on every pulse
    pub pulse_power: i32,
    pub cast_ms: u64,
    pub recast_ms: u64,
    pub power_cost: i32,
    pub concentration_cost: u32,
    /// Nonzero groups overwrite each other regardless of family
    pub effect_group: u32,
    /// Stacking tag: at most one non-immune effect per (target, group)
    pub stacking_group: u32,
    /// May the caster move during the cast window?
    pub move_cast: bool,
    /// Tool that must be equipped to cast (e.g. an instrument)
    pub required_tool: Option<String>,
}

impl SpellDefinition {
    pub fn is_instant(&self) -> bool {
        self.cast_ms == 0
    }

    pub fn is_pulsing(&self) -> bool {
        self.pulse_ms > 0
    }

    pub fn is_concentration(&self) -> bool {
        self.concentration_cost > 0
    }

    /// Duration or concentration spells go through the effect lifecycle;
    /// everything else applies its action directly at resolution.
    pub fn has_effect_lifecycle(&self) -> bool {
        self.duration_ms > 0 || self.is_concentration()
    }
}

impl Default for SpellDefinition {
    fn default() -> Self {
        Self {
            id: SpellId(0),
            name: String::new(),
            family: SpellFamily::new(crate::family::builtin::DIRECT_DAMAGE),
            target: TargetMode::Enemy,
            value: 0.0,
            damage: 0.0,
            level: 1,
            range: 1500.0,
            radius: 0.0,
            duration_ms: 0,
            pulse_ms: 0,
            pulse_power: 0,
            cast_ms: 3000,
            recast_ms: 0,
            power_cost: 0,
            concentration_cost: 0,
            effect_group: 0,
            stacking_group: 0,
            move_cast: false,
            required_tool: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_classification() {
        let instant = SpellDefinition {
            damage: 100.0,
            cast_ms: 0,
            ..Default::default()
        };
        assert!(instant.is_instant());
        assert!(!instant.has_effect_lifecycle());

        let conc = SpellDefinition {
            concentration_cost: 4,
            ..Default::default()
        };
        assert!(conc.has_effect_lifecycle());
    }
}
