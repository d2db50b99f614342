//! Damage and resist pipeline
//!
//! Pure functions of (caster stat view, target stat view, RNG draw). No
//! entity or region state is touched here; the casting layer snapshots the
//! views it needs and applies the results.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::core::config::TuningConfig;
use crate::core::types::EntityId;
use crate::spell::definition::SpellDefinition;

/// Caster-side inputs to the pipeline, snapshotted at resolution time.
#[derive(Debug, Clone)]
pub struct CasterView {
    pub id: EntityId,
    pub level: u32,
    /// Spec level in the spell's line; 0 when the caster has no such line
    pub spec_level: u32,
    /// Primary casting stat; None for stat-less casters (monsters, turrets)
    pub casting_stat: Option<i32>,
    pub spell_level_bonus: i32,
    pub to_hit_bonus: i32,
    /// Damage bonus in permille (1000 = +0%)
    pub damage_permille: i32,
    pub is_player: bool,
}

/// Target-side inputs to the pipeline.
#[derive(Debug, Clone)]
pub struct TargetView {
    pub id: EntityId,
    pub level: u32,
    pub is_player_controlled: bool,
}

/// Percentage roll helper; `pct <= 0` never passes, `pct >= 100` always.
pub fn chance(rng: &mut ChaCha8Rng, pct: i32) -> bool {
    if pct <= 0 {
        return false;
    }
    if pct >= 100 {
        return true;
    }
    rng.gen_range(0..100) < pct
}

/// Con-level of `compare_level` as seen from `level`: how many "con steps"
/// the other side is above (+) or below (-).
pub fn con_level(level: u32, compare_level: u32) -> f64 {
    let constep = ((level + 9) / 10).max(1) as f64;
    (compare_level as f64 - level as f64) / constep
}

/// Cast-time multiplier from the caster's speed stat.
///
/// Flat below 60; 0.15% per point from 60 to 250; above 250 each further
/// point is only worth 0.05%. Diminishing returns, never negative here —
/// the floor is applied by [`casting_time`].
pub fn dexterity_cast_reduction(dexterity: i32) -> f64 {
    let dex = f64::from(dexterity);
    if dex < 60.0 {
        1.0
    } else if dex < 250.0 {
        1.0 - (dex - 60.0) * 0.15 * 0.01
    } else {
        1.0 - ((dex - 60.0) * 0.15 + (dex - 250.0) * 0.05) * 0.01
    }
}

/// Effective cast time: base scaled by the dexterity curve and the global
/// cast-speed modifier, floored at a fraction of base and at the absolute
/// minimum, then rounded up to the smallest timer tick.
pub fn casting_time(
    base_ms: u64,
    dexterity: i32,
    cast_speed_bonus_pct: i32,
    cfg: &TuningConfig,
) -> u64 {
    if base_ms == 0 {
        return 0;
    }
    let mut factor = dexterity_cast_reduction(dexterity);
    factor *= 1.0 - f64::from(cast_speed_bonus_pct) * 0.01;
    factor = factor.max(cfg.cast_speed_floor);

    let mut ticks = (base_ms as f64 * factor) as u64;
    if ticks < cfg.min_cast_ms {
        ticks = cfg.min_cast_ms;
    }
    // round up to wheel granularity
    let tick = cfg.timer_tick_ms.max(1);
    ticks.div_ceil(tick) * tick
}

/// Chance that the spell lands, before any per-family override. Can run
/// below 0 or above 100; both tails carry meaning for damage adjustment.
pub fn to_hit_chance(
    caster: &CasterView,
    target: &TargetView,
    spell: &SpellDefinition,
    cfg: &TuningConfig,
) -> i32 {
    let mut spell_level = spell.level as i32 + caster.spell_level_bonus;
    if spell_level > caster.level as i32 {
        spell_level = caster.level as i32;
    }

    let mut hit =
        cfg.base_hit_chance + (spell_level - target.level as i32) / 2 + caster.to_hit_bonus;

    // monsters con harder the higher they are over the caster
    if !target.is_player_controlled {
        hit -= (con_level(caster.level, target.level) * cfg.con_hit_weight) as i32;
    }

    debug!(hit, spell = %spell.name, "to-hit chance");
    hit
}

/// Default resist chance for harmful effects: the inverse of to-hit,
/// clamped into the valid window. Families may override this wholesale.
pub fn resist_chance(
    caster: &CasterView,
    target: &TargetView,
    spell: &SpellDefinition,
    cfg: &TuningConfig,
) -> i32 {
    let mut resist = 100 - to_hit_chance(caster, target, spell, cfg);
    if resist > cfg.resist_clamp && resist < 100 {
        resist = cfg.resist_clamp;
    }
    resist.max(0)
}

/// 100% spell damage before variance: authored damage scaled by the casting
/// stat ratio, or the spec-level path for stat-less casters.
pub fn base_damage(caster: &CasterView, spell: &SpellDefinition) -> f64 {
    let mut dmg = spell.damage;
    match caster.casting_stat {
        Some(stat) => {
            dmg *= (f64::from(stat) + 200.0) / 275.0;
        }
        None => {
            // stat-less casters cap at a per-level budget below max level
            if caster.level < 50 {
                dmg = dmg.min(4.7 * f64::from(caster.level));
            }
            let implied = (2.0 / 3.0 * f64::from(caster.level)) + 1.0;
            dmg *= (implied * 3.0 + 200.0) / 275.0;
        }
    }
    dmg.max(1.0)
}

/// Damage variance window (min, max) as fractions of base damage.
///
/// Baseline lines open at 25%..125% and narrow from below as spec rises
/// toward the spell and target levels; spec lines always roll the top.
/// Over-speccing widens both ends slightly.
pub fn damage_variance(
    caster: &CasterView,
    target: &TargetView,
    spell: &SpellDefinition,
    baseline: bool,
) -> (f64, f64) {
    let mut min = 0.25;
    let mut max = 1.25;

    let spec = caster.spec_level as f64;
    let level = caster.level as f64;
    let spell_level = f64::from(spell.level).max(1.0);

    let overspec = (level.min(spec) - f64::from(spell.level)).max(0.0) * 0.005
        + (spec - level).max(0.0) * 0.004;
    min += overspec;
    max += overspec;

    if baseline {
        let base_var = ((spec - 1.0).max(0.0) / spell_level * 0.75).min(0.5);
        let level_var =
            ((spec - 1.0).max(0.0) / f64::from(target.level).max(1.0) * 1.25 - 0.75).max(0.0);
        min = (min + base_var + level_var).clamp(min, max);
    } else {
        min = max;
    }

    if max < 0.25 {
        max = 0.25;
    }
    if min > max {
        min = max;
    }
    (min.max(0.0), max)
}

/// Shifts damage by hit quality: a poor hit bleeds damage, an overwhelming
/// one gains up to a capped bonus. Never below 1.
pub fn adjust_for_hit_quality(damage: i32, hit_chance: i32, cfg: &TuningConfig) -> i32 {
    let mut adjusted = damage;
    if hit_chance < 55 {
        adjusted +=
            (f64::from(adjusted) * f64::from(hit_chance - 55) * cfg.hit_damage_reduction_pct * 0.01)
                as i32;
    } else if hit_chance > 100 {
        let over = (hit_chance - 100).min(100);
        adjusted +=
            (f64::from(adjusted) * f64::from(over) * cfg.hit_damage_bonus_pct * 0.01) as i32;
    }
    adjusted.max(1)
}

/// Full damage roll: base, hit-quality adjustment, variance draw, caster
/// damage modifier and effect effectiveness.
pub fn roll_damage(
    caster: &CasterView,
    target: &TargetView,
    spell: &SpellDefinition,
    baseline: bool,
    effectiveness: f64,
    cfg: &TuningConfig,
    rng: &mut ChaCha8Rng,
) -> i32 {
    let (min_var, max_var) = damage_variance(caster, target, spell, baseline);
    let spell_damage = base_damage(caster, spell) as i32;
    let adjusted = adjust_for_hit_quality(spell_damage, to_hit_chance(caster, target, spell, cfg), cfg);

    let rolled = if (max_var - min_var).abs() > f64::EPSILON {
        let lo = (min_var * f64::from(adjusted)) as i32;
        let hi = (max_var * f64::from(adjusted)) as i32;
        if hi > lo {
            rng.gen_range(lo..=hi)
        } else {
            hi
        }
    } else {
        (max_var * f64::from(adjusted)) as i32
    };

    let modifier = f64::from(caster.damage_permille) * 0.001;
    let finald = (f64::from(rolled) * modifier * effectiveness) as i32;
    debug!(damage = finald, min_var, max_var, "damage roll");
    finald.max(0)
}

/// Chance that an incoming hit interrupts the victim's cast: base chance
/// shifted by how the attacker cons to the victim; players always land
/// their interrupts.
pub fn interrupt_chance(
    victim_level: u32,
    attacker_level: u32,
    attacker_is_player: bool,
    cfg: &TuningConfig,
) -> i32 {
    if attacker_is_player {
        return 99;
    }
    let mod_ = con_level(victim_level, attacker_level);
    let chance = f64::from(cfg.base_interrupt_chance) + mod_ * 10.0;
    (chance as i32).clamp(1, 99)
}

/// Effect duration after duration bonuses and, for harmful effects,
/// effectiveness scaling. Clamped to [1, max_duration_factor × base].
pub fn effect_duration(
    base_ms: u64,
    duration_bonus_pct: i32,
    effectiveness: f64,
    harmful: bool,
    cfg: &TuningConfig,
) -> u64 {
    if base_ms == 0 {
        return 0;
    }
    let mut duration = base_ms as f64;
    duration *= 1.0 + f64::from(duration_bonus_pct) * 0.01;
    if harmful {
        duration *= effectiveness;
    }
    duration
        .clamp(1.0, base_ms as f64 * cfg.max_duration_factor)
        .round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SpellId;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn caster(level: u32, spec: u32, stat: i32) -> CasterView {
        CasterView {
            id: EntityId::new(),
            level,
            spec_level: spec,
            casting_stat: Some(stat),
            spell_level_bonus: 0,
            to_hit_bonus: 0,
            damage_permille: 1000,
            is_player: true,
        }
    }

    fn target(level: u32) -> TargetView {
        TargetView {
            id: EntityId::new(),
            level,
            is_player_controlled: false,
        }
    }

    fn nuke(level: u32, damage: f64) -> SpellDefinition {
        SpellDefinition {
            id: SpellId(1),
            name: "test nuke".into(),
            level,
            damage,
            ..Default::default()
        }
    }

    #[test]
    fn test_dexterity_bands() {
        assert_eq!(dexterity_cast_reduction(50), 1.0);
        // 100 dex: 40 points into the mid band
        let mid = dexterity_cast_reduction(100);
        assert!((mid - (1.0 - 40.0 * 0.0015)).abs() < 1e-9);
        // above 250 the extra points only count at a third of the rate
        let high = dexterity_cast_reduction(300);
        let expected = 1.0 - ((300.0 - 60.0) * 0.15 + 50.0 * 0.05) * 0.01;
        assert!((high - expected).abs() < 1e-9);
    }

    #[test]
    fn test_casting_time_floor_and_rounding() {
        let cfg = TuningConfig::default();
        // enormous dex cannot push below 40% of base
        let t = casting_time(3000, 500, 0, &cfg);
        assert!(t >= 1200);
        assert_eq!(t % cfg.timer_tick_ms, 0);
        // short casts hit the absolute minimum
        assert_eq!(casting_time(600, 500, 0, &cfg), cfg.min_cast_ms);
        assert_eq!(casting_time(0, 500, 0, &cfg), 0);
    }

    #[test]
    fn test_even_match_hit_chance() {
        let cfg = TuningConfig::default();
        // L50 caster, L50 spell at an even-con L50 monster: 85 flat
        let hit = to_hit_chance(&caster(50, 50, 60), &target(50), &nuke(50, 100.0), &cfg);
        assert_eq!(hit, 85);
    }

    #[test]
    fn test_low_level_spell_hits_less() {
        let cfg = TuningConfig::default();
        let full = to_hit_chance(&caster(50, 50, 60), &target(50), &nuke(50, 100.0), &cfg);
        let low = to_hit_chance(&caster(50, 50, 60), &target(50), &nuke(30, 100.0), &cfg);
        assert_eq!(full - low, 10);
    }

    #[test]
    fn test_resist_clamp_window() {
        let cfg = TuningConfig::default();
        // a red-con target pushes resist into the open window: clamped
        let r = resist_chance(&caster(50, 50, 60), &target(74), &nuke(50, 100.0), &cfg);
        assert_eq!(r, cfg.resist_clamp);
        // a hopeless gap lands at or past 100: a guaranteed resist, unclamped
        let r = resist_chance(&caster(10, 10, 60), &target(50), &nuke(10, 100.0), &cfg);
        assert!(r >= 100);
    }

    #[test]
    fn test_spec_line_rolls_top_of_window() {
        let (min, max) = damage_variance(&caster(50, 50, 60), &target(50), &nuke(50, 100.0), false);
        assert!((min - max).abs() < f64::EPSILON);
    }

    #[test]
    fn test_full_spec_narrows_baseline_variance() {
        let low_spec = damage_variance(&caster(50, 4, 60), &target(50), &nuke(50, 100.0), true);
        let full_spec = damage_variance(&caster(50, 50, 60), &target(50), &nuke(50, 100.0), true);
        assert!(full_spec.0 > low_spec.0);
        assert!(full_spec.0 <= full_spec.1);
    }

    #[test]
    fn test_interrupt_chance_scaling() {
        let cfg = TuningConfig::default();
        assert_eq!(interrupt_chance(50, 50, true, &cfg), 99);
        let even = interrupt_chance(50, 50, false, &cfg);
        assert_eq!(even, cfg.base_interrupt_chance);
        // a grey attacker almost never interrupts
        let grey = interrupt_chance(50, 10, false, &cfg);
        assert!(grey < even);
    }

    #[test]
    fn test_effect_duration_clamps() {
        let cfg = TuningConfig::default();
        assert_eq!(effect_duration(0, 50, 1.0, true, &cfg), 0);
        // effectiveness shortens harmful durations only
        assert_eq!(effect_duration(10_000, 0, 0.5, true, &cfg), 5_000);
        assert_eq!(effect_duration(10_000, 0, 0.5, false, &cfg), 10_000);
        // bonus cannot exceed 4x base
        assert_eq!(effect_duration(10_000, 1000, 1.0, false, &cfg), 40_000);
    }

    proptest! {
        #[test]
        fn prop_variance_window_ordered(
            level in 1u32..=50,
            spec in 0u32..=55,
            spell_level in 1u32..=50,
            target_level in 1u32..=60,
            baseline in proptest::bool::ANY,
        ) {
            let (min, max) = damage_variance(
                &caster(level, spec, 60),
                &target(target_level),
                &nuke(spell_level, 100.0),
                baseline,
            );
            prop_assert!(min >= 0.0);
            prop_assert!(min <= max + 1e-9);
        }

        #[test]
        fn prop_damage_roll_non_negative(
            seed in proptest::num::u64::ANY,
            hit_level in 1u32..=50,
            damage in 0.0f64..500.0,
        ) {
            let cfg = TuningConfig::default();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let d = roll_damage(
                &caster(50, 50, 60),
                &target(hit_level),
                &nuke(50, damage),
                true,
                1.0,
                &cfg,
                &mut rng,
            );
            prop_assert!(d >= 0);
        }

        #[test]
        fn prop_adjusted_damage_at_least_one(hit in -100i32..300, dmg in 1i32..10_000) {
            let cfg = TuningConfig::default();
            prop_assert!(adjust_for_hit_quality(dmg, hit, &cfg) >= 1);
        }
    }
}
