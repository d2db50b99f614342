//! Tuning configuration with documented constants
//!
//! Every empirically-derived number in the casting and damage rules is
//! collected here so embedders can retune without touching rule code.
//! Defaults reproduce the classic live-server values.

use serde::{Deserialize, Serialize};

/// Tunable constants for the casting, resist and concentration rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Granularity of the region timer wheel in milliseconds.
    ///
    /// Cast times are rounded up to a multiple of this; nothing shorter
    /// than one tick can be scheduled.
    pub timer_tick_ms: u64,

    /// Hard floor on any cast time, in milliseconds.
    pub min_cast_ms: u64,

    /// Dexterity can never push a cast below this fraction of its base time.
    pub cast_speed_floor: f64,

    /// Baseline chance (percent) that a spell lands before level terms.
    pub base_hit_chance: i32,

    /// Hit-chance points lost per con level the target has over the caster.
    /// Applied against non-player-controlled targets.
    pub con_hit_weight: f64,

    /// Percent damage lost per point of hit chance below 55.
    pub hit_damage_reduction_pct: f64,

    /// Percent damage gained per point of hit chance over 100 (capped at
    /// 100 points over).
    pub hit_damage_bonus_pct: f64,

    /// Resist chances strictly between this cap and 100 are clamped to it.
    pub resist_clamp: i32,

    /// Base chance (percent) that an incoming hit interrupts a cast,
    /// before the con-level term.
    pub base_interrupt_chance: i32,

    /// How long (ms) a resisted or landed hostile spell locks the victim
    /// out of starting a new cast.
    pub spell_interrupt_ms: u64,

    /// Maximum distance a concentration effect's owner may stray from the
    /// caster before the effect is disabled.
    pub conc_range: f32,

    /// Period (ms) of the concentration range sweep.
    pub conc_sweep_ms: u64,

    /// Hard cap on simultaneous concentration ledger entries per caster.
    pub conc_max_entries: usize,

    /// Effect durations are clamped to this multiple of their base value
    /// after bonuses.
    pub max_duration_factor: f64,

    /// Whether hostile single-target resolutions park for an asynchronous
    /// sight confirmation before applying damage.
    pub require_sight_confirmation: bool,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            timer_tick_ms: 100,
            min_cast_ms: 500,
            cast_speed_floor: 0.4,
            base_hit_chance: 85,
            con_hit_weight: 10.0,
            hit_damage_reduction_pct: 2.2,
            hit_damage_bonus_pct: 0.5,
            resist_clamp: 70,
            base_interrupt_chance: 65,
            spell_interrupt_ms: 3000,
            conc_range: 1500.0,
            conc_sweep_ms: 5000,
            conc_max_entries: 20,
            max_duration_factor: 4.0,
            require_sight_confirmation: false,
        }
    }
}
