//! Cast validation: the reasons a cast refuses to start or fizzles at fire
//! time. Refusals are gameplay outcomes, not errors; they surface to the
//! caster as chat messages and cost nothing.

use thiserror::Error;

use crate::core::types::EntityId;
use crate::entity::Combatant;
use crate::region::Region;
use crate::spell::{SpellDefinition, TargetMode};

use super::CastingSession;

/// Why a cast cannot start or complete. The display strings are the
/// player-facing chat messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CastRefusal {
    #[error("You are dead and cannot cast!")]
    Dead,
    #[error("You must be standing to cast a spell!")]
    Sitting,
    #[error("You can't cast while mesmerized!")]
    Mesmerized,
    #[error("You can't cast while stunned!")]
    Stunned,
    #[error("You are already casting a spell!")]
    AlreadyCasting,
    #[error("You can't cast while moving!")]
    Moving,
    #[error("You have been attacked recently and must wait to cast!")]
    RecentlyInterrupted,
    #[error("You must wait {0} more seconds to use this spell!")]
    Recovering(u64),
    #[error("You need a {0} to cast this spell!")]
    MissingTool(String),
    #[error("You don't have enough power to cast that!")]
    InsufficientPower,
    #[error("You can only cast {0} concentration spells!")]
    ConcentrationSlots(usize),
    #[error("You lack the concentration to maintain that spell!")]
    ConcentrationPoints,
    #[error("You must select a target for this spell!")]
    NoTarget,
    #[error("Your target is dead!")]
    TargetDead,
    #[error("That target is not dead!")]
    TargetNotDead,
    #[error("Your target is too far away to cast on!")]
    TargetTooFar,
    #[error("You can't cast that on this target!")]
    InvalidTarget,
    #[error("You must set a ground target for this spell!")]
    NoGroundTarget,
    #[error("You don't have a pet to cast that on!")]
    NoPet,
    #[error("You can't see your target!")]
    TargetNotVisible,
}

/// Full pre-cast battery, run once when the cast is requested.
pub(crate) fn validate_begin(
    region: &Region,
    caster: &Combatant,
    spell: &SpellDefinition,
    target: Option<EntityId>,
) -> Result<(), CastRefusal> {
    let now = region.clock;

    if !caster.alive {
        return Err(CastRefusal::Dead);
    }
    if caster.sitting {
        return Err(CastRefusal::Sitting);
    }
    if caster.mezzed {
        return Err(CastRefusal::Mesmerized);
    }
    if caster.stunned {
        return Err(CastRefusal::Stunned);
    }
    if region.sessions.contains_key(&caster.id) {
        return Err(CastRefusal::AlreadyCasting);
    }
    if caster.moving && !spell.move_cast && !spell.is_instant() {
        return Err(CastRefusal::Moving);
    }
    if now < caster.interrupted_until && !spell.is_instant() {
        return Err(CastRefusal::RecentlyInterrupted);
    }
    if let Some(until) = caster.disabled_spells.get(&spell.id) {
        if now < *until {
            return Err(CastRefusal::Recovering((until - now).div_ceil(1000)));
        }
    }
    if let Some(tool) = &spell.required_tool {
        if !caster.has_tool(tool) {
            return Err(CastRefusal::MissingTool(tool.clone()));
        }
    }

    validate_target(region, caster, spell, target)?;
    validate_resources(region, caster, spell)
}

/// Re-validation at fire time, after the cast window (and any sight check)
/// elapsed. Only the conditions that can change under the caster's feet:
/// target state, range and resources.
pub(crate) fn validate_fire(region: &Region, session: &CastingSession) -> Result<(), CastRefusal> {
    let Some(caster) = region.entities.get(&session.caster) else {
        return Err(CastRefusal::Dead);
    };
    if !caster.alive {
        return Err(CastRefusal::Dead);
    }
    validate_target(region, caster, &session.spell, session.target)?;
    validate_resources(region, caster, &session.spell)
}

fn validate_resources(
    region: &Region,
    caster: &Combatant,
    spell: &SpellDefinition,
) -> Result<(), CastRefusal> {
    if spell.power_cost > 0 && caster.power < spell.power_cost {
        return Err(CastRefusal::InsufficientPower);
    }
    if spell.is_concentration() {
        let max_slots = region.config.conc_max_entries;
        if caster.concentration.len() >= max_slots {
            return Err(CastRefusal::ConcentrationSlots(max_slots));
        }
        if caster.concentration.used_points() + spell.concentration_cost > caster.concentration_stat
        {
            return Err(CastRefusal::ConcentrationPoints);
        }
    }
    Ok(())
}

fn validate_target(
    region: &Region,
    caster: &Combatant,
    spell: &SpellDefinition,
    target: Option<EntityId>,
) -> Result<(), CastRefusal> {
    match spell.target {
        TargetMode::SelfOnly | TargetMode::Group => Ok(()),
        TargetMode::Area => {
            let Some(ground) = caster.ground_target else {
                return Err(CastRefusal::NoGroundTarget);
            };
            if spell.range > 0.0 && caster.position.distance(&ground) > max_range(caster, spell) {
                return Err(CastRefusal::TargetTooFar);
            }
            Ok(())
        }
        TargetMode::Pet => {
            let pet = caster
                .pet
                .and_then(|id| region.entities.get(&id))
                .filter(|p| p.alive)
                .ok_or(CastRefusal::NoPet)?;
            check_range(caster, pet, spell)
        }
        TargetMode::Enemy => {
            // point-blank area needs no target at all
            if spell.radius > 0.0 && spell.range == 0.0 {
                return Ok(());
            }
            let t = resolve_target(region, target)?;
            if !t.alive {
                return Err(CastRefusal::TargetDead);
            }
            if t.id == caster.id || !caster.realm.hostile_to(t.realm) {
                return Err(CastRefusal::InvalidTarget);
            }
            check_range(caster, t, spell)
        }
        TargetMode::Corpse => {
            let t = resolve_target(region, target)?;
            if t.alive {
                return Err(CastRefusal::TargetNotDead);
            }
            if caster.realm.hostile_to(t.realm) {
                return Err(CastRefusal::InvalidTarget);
            }
            check_range(caster, t, spell)
        }
        TargetMode::Realm => {
            // friendly spells fall back to the caster
            let Some(id) = target else { return Ok(()) };
            if id == caster.id {
                return Ok(());
            }
            let t = resolve_target(region, Some(id))?;
            if !t.alive {
                return Err(CastRefusal::TargetDead);
            }
            if caster.realm.hostile_to(t.realm) {
                return Err(CastRefusal::InvalidTarget);
            }
            check_range(caster, t, spell)
        }
    }
}

fn resolve_target(region: &Region, target: Option<EntityId>) -> Result<&Combatant, CastRefusal> {
    target
        .and_then(|id| region.entities.get(&id))
        .ok_or(CastRefusal::NoTarget)
}

fn check_range(
    caster: &Combatant,
    target: &Combatant,
    spell: &SpellDefinition,
) -> Result<(), CastRefusal> {
    if spell.range > 0.0 && caster.position.distance(&target.position) > max_range(caster, spell) {
        return Err(CastRefusal::TargetTooFar);
    }
    Ok(())
}

/// Authored spell range stretched by the caster's range bonus.
fn max_range(caster: &Combatant, spell: &SpellDefinition) -> f32 {
    spell.range * (1.0 + caster.bonuses.spell_range_pct as f32 * 0.01)
}
