//! Effect lifecycle: start, pulse, expiry, overwrite and immunity windows.
//!
//! All lifecycle transitions funnel through [`expire_effect`] so "expiry
//! hook runs exactly once" holds no matter which of the racing paths
//! (duration timer, pulse starvation, overwrite, cancel, death) gets there
//! first: the first caller takes the record out of the list and flips its
//! `expired` flag, every later caller finds nothing to do.

pub mod policy;

use std::sync::Arc;

use tracing::warn;

use crate::concentration::{self, ConcEntry};
use crate::core::types::{EffectId, EntityId, PowerChangeReason, Property, TimerHandle};
use crate::family::{EffectCtx, FamilyHandler};
use crate::pipeline::CasterView;
use crate::region::{MessageKind, Region, SpellEvent};
use crate::spell::{SpellDefinition, SpellLine};

/// One effect instance on a target: an active spell effect, or the
/// immunity-window tombstone it leaves behind after natural expiry.
#[derive(Debug)]
pub struct Effect {
    pub id: EffectId,
    pub target: EntityId,
    pub caster: EntityId,
    /// Caster stats frozen at application time; pulses keep using these
    /// even if the caster's stats change or the caster despawns.
    pub caster_view: CasterView,
    pub spell: Arc<SpellDefinition>,
    pub line: SpellLine,
    pub effectiveness: f64,
    pub started_at: u64,
    /// None for concentration effects, which run until cancelled.
    pub expires_at: Option<u64>,
    /// The expiry hook has run; with `immunity` set this is a tombstone.
    pub expired: bool,
    pub immunity: bool,
    /// Concentration effect whose deltas are lifted while the target is
    /// out of the caster's concentration range.
    pub disabled: bool,
    pub timer: Option<TimerHandle>,
    /// Property deltas currently applied to the target.
    pub applied: Vec<(Property, i32)>,
}

impl Effect {
    pub fn remaining_ms(&self, now: u64) -> Option<u64> {
        self.expires_at.map(|t| t.saturating_sub(now))
    }

    /// Expired but still held as an immunity-window tombstone.
    pub fn immunity_state(&self) -> bool {
        self.immunity
    }
}

/// How an effect is ending; drives messaging and the immunity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExpiryKind {
    /// Ran its course; crowd-control families leave an immunity window.
    Natural,
    /// Cut short (cancel, death, pulse starvation); no immunity.
    Cancelled,
    /// Replaced by a stronger same-slot effect; silent, no immunity.
    Overwritten,
}

fn begin_batch(region: &mut Region, target_id: EntityId) {
    if let Some(t) = region.entities.get_mut(&target_id) {
        t.effects.begin();
    }
}

fn commit_batch(region: &mut Region, target_id: EntityId) {
    let notify = region
        .entities
        .get_mut(&target_id)
        .map(|t| t.effects.commit())
        .unwrap_or(false);
    if notify {
        region.events.push(SpellEvent::EffectsChanged { target: target_id });
    }
}

/// Applies a lifecycle spell to one target, honoring the slot policy:
/// an immunity tombstone refuses outright, a holder that is stronger or
/// has longer left to run keeps its slot, a beaten holder is silently
/// replaced. Returns true when a new effect started.
pub(crate) fn apply_or_refuse(
    region: &mut Region,
    caster_view: &CasterView,
    target_id: EntityId,
    spell: &Arc<SpellDefinition>,
    line: &SpellLine,
    handler: FamilyHandler,
    effectiveness: f64,
) -> bool {
    let now = region.clock;
    let duration_pct = region
        .entities
        .get(&caster_view.id)
        .map(|c| c.bonuses.duration_pct)
        .unwrap_or(0);
    let duration_ms = crate::pipeline::effect_duration(
        spell.duration_ms,
        duration_pct,
        effectiveness,
        handler.harmful,
        &region.config,
    );

    let clash = region.entities.get(&target_id).and_then(|t| {
        t.effects
            .iter()
            .find(|e| policy::contests_slot(e, spell, &handler))
            .map(|e| {
                (
                    e.id,
                    e.immunity_state(),
                    policy::is_new_better(e, spell, effectiveness, duration_ms, now),
                )
            })
    });
    let target_name = region
        .entities
        .get(&target_id)
        .map(|t| t.name.clone())
        .unwrap_or_default();

    if let Some((old_id, immune, better)) = clash {
        if immune {
            region.events.push(SpellEvent::Message {
                to: caster_view.id,
                kind: MessageKind::System,
                text: format!("{target_name} is still immune to that effect!"),
            });
            region.events.push(SpellEvent::EffectAnimation {
                caster: caster_view.id,
                target: target_id,
                spell: spell.id,
                success: false,
            });
            return false;
        }
        if !better {
            region.events.push(SpellEvent::Message {
                to: caster_view.id,
                kind: MessageKind::System,
                text: format!("{target_name} already has that effect."),
            });
            region.events.push(SpellEvent::EffectAnimation {
                caster: caster_view.id,
                target: target_id,
                spell: spell.id,
                success: false,
            });
            return false;
        }
        expire_effect(region, target_id, old_id, ExpiryKind::Overwritten);
    }

    start_effect(
        region,
        caster_view,
        target_id,
        Arc::clone(spell),
        line.clone(),
        handler,
        effectiveness,
        duration_ms,
    )
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn start_effect(
    region: &mut Region,
    caster_view: &CasterView,
    target_id: EntityId,
    spell: Arc<SpellDefinition>,
    line: SpellLine,
    handler: FamilyHandler,
    effectiveness: f64,
    duration_ms: u64,
) -> bool {
    let now = region.clock;

    let conflict = region
        .entities
        .get(&target_id)
        .map(|t| !t.alive || t.effects.conflicts_with(spell.stacking_group))
        .unwrap_or(true);
    if conflict {
        warn!(spell = %spell.name, "effect slot conflict survived resolution policy");
        return false;
    }

    let id = region.alloc_effect_id();
    let mut applied: Vec<(Property, i32)> = Vec::new();
    begin_batch(region, target_id);

    if let Some(deltas) = handler.deltas.map(|f| f(&spell, effectiveness)) {
        if let Some(target) = region.entities.get_mut(&target_id) {
            for (prop, delta) in deltas {
                target.apply_delta(prop, delta);
                applied.push((prop, delta));
            }
        }
    }
    if let Some(hook) = handler.on_start {
        if let Some(target) = region.entities.get_mut(&target_id) {
            let mut ctx = EffectCtx {
                now,
                cfg: &region.config,
                spell: &spell,
                line: &line,
                effectiveness,
                caster: caster_view,
                target,
                applied: &mut applied,
                events: &mut region.events,
                rng: &mut region.rng,
                silent: false,
            };
            hook(&mut ctx);
        }
    }

    let timer = if spell.pulse_ms > 0 {
        Some(region.timers.schedule_repeating(
            now,
            spell.pulse_ms,
            Box::new(move |r: &mut Region| pulse_tick(r, target_id, id)),
        ))
    } else if duration_ms > 0 {
        Some(region.timers.schedule(
            now,
            duration_ms,
            Box::new(move |r: &mut Region| expire_effect(r, target_id, id, ExpiryKind::Natural)),
        ))
    } else {
        None
    };

    let spell_id = spell.id;
    let is_conc = spell.is_concentration();
    let conc_cost = spell.concentration_cost;
    let caster_id = caster_view.id;
    let effect = Effect {
        id,
        target: target_id,
        caster: caster_id,
        caster_view: caster_view.clone(),
        spell,
        line,
        effectiveness,
        started_at: now,
        expires_at: (duration_ms > 0).then(|| now + duration_ms),
        expired: false,
        immunity: false,
        disabled: false,
        timer,
        applied,
    };
    if let Some(target) = region.entities.get_mut(&target_id) {
        target.effects.add(effect);
    }

    if is_conc {
        if let Some(caster) = region.entities.get_mut(&caster_id) {
            caster.concentration.begin();
            caster.concentration.add(ConcEntry {
                target: target_id,
                effect: id,
                cost: conc_cost,
                enabled: true,
            });
            if caster.concentration.commit() {
                region
                    .events
                    .push(SpellEvent::ConcentrationChanged { owner: caster_id });
            }
        }
        concentration::ensure_sweep(region, caster_id);
    }

    region.events.push(SpellEvent::EffectStarted {
        target: target_id,
        spell: spell_id,
    });
    commit_batch(region, target_id);
    true
}

/// Periodic tick for a pulsing effect: natural expiry first, then caster
/// upkeep (alive, in range, pulse power), then the family pulse hook.
/// A failed upkeep check cancels the effect before any cost or pulse.
pub(crate) fn pulse_tick(region: &mut Region, target_id: EntityId, effect_id: EffectId) {
    let now = region.clock;
    let Some((spell, caster_id, expires_at, disabled)) = region
        .entities
        .get(&target_id)
        .and_then(|t| t.effects.get(effect_id))
        .map(|e| (Arc::clone(&e.spell), e.caster, e.expires_at, e.disabled))
    else {
        return;
    };

    if expires_at.is_some_and(|end| now >= end) {
        expire_effect(region, target_id, effect_id, ExpiryKind::Natural);
        return;
    }
    if disabled {
        return;
    }

    if spell.pulse_power > 0 {
        let target_pos = match region.entities.get(&target_id) {
            Some(t) => t.position,
            None => return,
        };
        let upkeep = region.entities.get(&caster_id).and_then(|c| {
            if !c.alive {
                return None;
            }
            if spell.range > 0.0 && c.position.distance(&target_pos) > spell.range {
                return None;
            }
            Some(c.power >= spell.pulse_power)
        });
        match upkeep {
            None => {
                expire_effect(region, target_id, effect_id, ExpiryKind::Cancelled);
                return;
            }
            Some(false) => {
                region.events.push(SpellEvent::Message {
                    to: caster_id,
                    kind: MessageKind::System,
                    text: "You are exhausted and your spell fails!".to_string(),
                });
                expire_effect(region, target_id, effect_id, ExpiryKind::Cancelled);
                return;
            }
            Some(true) => {
                if let Some(caster) = region.entities.get_mut(&caster_id) {
                    caster.change_power(-spell.pulse_power, PowerChangeReason::PulseCost);
                }
            }
        }
    }

    let Some(handler) = region.families.get(&spell.family).ok().copied() else {
        return;
    };
    if let Some(hook) = handler.on_pulse {
        let Some(mut eff) = region
            .entities
            .get_mut(&target_id)
            .and_then(|t| t.effects.take(effect_id))
        else {
            return;
        };
        if let Some(target) = region.entities.get_mut(&target_id) {
            let mut ctx = EffectCtx {
                now,
                cfg: &region.config,
                spell: &eff.spell,
                line: &eff.line,
                effectiveness: eff.effectiveness,
                caster: &eff.caster_view,
                target,
                applied: &mut eff.applied,
                events: &mut region.events,
                rng: &mut region.rng,
                silent: false,
            };
            hook(&mut ctx);
        }
        let died = region
            .entities
            .get(&target_id)
            .map(|t| !t.alive)
            .unwrap_or(false);
        if let Some(target) = region.entities.get_mut(&target_id) {
            target.effects.restore(eff);
        }
        region.events.push(SpellEvent::EffectPulsed {
            target: target_id,
            spell: spell.id,
        });
        if died {
            region.handle_death(target_id);
        }
    } else {
        region.events.push(SpellEvent::EffectPulsed {
            target: target_id,
            spell: spell.id,
        });
    }
}

/// Ends an effect. Safe to call from any number of racing paths; only the
/// first reaches the hook. An immunity tombstone is simply dropped.
pub(crate) fn expire_effect(
    region: &mut Region,
    target_id: EntityId,
    effect_id: EffectId,
    kind: ExpiryKind,
) {
    let now = region.clock;
    begin_batch(region, target_id);
    let Some(mut eff) = region
        .entities
        .get_mut(&target_id)
        .and_then(|t| t.effects.take(effect_id))
    else {
        commit_batch(region, target_id);
        return;
    };

    if eff.expired {
        // immunity tombstone running out (or being forced out)
        if let Some(handle) = eff.timer {
            region.timers.cancel(handle);
        }
        if let Some(t) = region.entities.get_mut(&target_id) {
            t.effects.touch();
        }
        commit_batch(region, target_id);
        return;
    }

    eff.expired = true;
    if let Some(handle) = eff.timer.take() {
        region.timers.cancel(handle);
    }

    if !eff.disabled {
        if let Some(target) = region.entities.get_mut(&target_id) {
            for (prop, delta) in &eff.applied {
                target.revert_delta(*prop, *delta);
            }
        }
    }
    eff.applied.clear();

    let handler = region
        .families
        .get(&eff.spell.family)
        .ok()
        .copied()
        .unwrap_or_default();
    if let Some(hook) = handler.on_expire {
        if let Some(target) = region.entities.get_mut(&target_id) {
            let mut applied = Vec::new();
            let mut ctx = EffectCtx {
                now,
                cfg: &region.config,
                spell: &eff.spell,
                line: &eff.line,
                effectiveness: eff.effectiveness,
                caster: &eff.caster_view,
                target,
                applied: &mut applied,
                events: &mut region.events,
                rng: &mut region.rng,
                silent: kind == ExpiryKind::Overwritten,
            };
            hook(&mut ctx);
        }
    }

    if eff.spell.is_concentration() {
        let owner = eff.caster;
        if let Some(caster) = region.entities.get_mut(&owner) {
            caster.concentration.begin();
            caster.concentration.remove(effect_id);
            if caster.concentration.commit() {
                region.events.push(SpellEvent::ConcentrationChanged { owner });
            }
        }
    }

    if kind != ExpiryKind::Overwritten {
        region.events.push(SpellEvent::EffectExpired {
            target: target_id,
            spell: eff.spell.id,
        });
    }

    let target_alive = region
        .entities
        .get(&target_id)
        .map(|t| t.alive)
        .unwrap_or(false);
    if kind == ExpiryKind::Natural && handler.immunity_ms > 0 && target_alive {
        eff.immunity = true;
        eff.expires_at = Some(now + handler.immunity_ms);
        eff.timer = Some(region.timers.schedule(
            now,
            handler.immunity_ms,
            Box::new(move |r: &mut Region| {
                expire_effect(r, target_id, effect_id, ExpiryKind::Natural)
            }),
        ));
        if let Some(target) = region.entities.get_mut(&target_id) {
            target.effects.restore(eff);
            target.effects.touch();
        }
    } else if let Some(t) = region.entities.get_mut(&target_id) {
        t.effects.touch();
    }
    commit_batch(region, target_id);
}

/// Lifts or restores a concentration effect's property deltas as its
/// target leaves and re-enters the caster's concentration range.
pub(crate) fn set_effect_enabled(
    region: &mut Region,
    target_id: EntityId,
    effect_id: EffectId,
    enabled: bool,
) {
    let Some(mut eff) = region
        .entities
        .get_mut(&target_id)
        .and_then(|t| t.effects.take(effect_id))
    else {
        return;
    };
    let toggled = eff.disabled == enabled && !eff.expired;
    if toggled {
        eff.disabled = !enabled;
        if let Some(target) = region.entities.get_mut(&target_id) {
            for (prop, delta) in &eff.applied {
                if enabled {
                    target.apply_delta(*prop, *delta);
                } else {
                    target.revert_delta(*prop, *delta);
                }
            }
        }
    }
    if let Some(target) = region.entities.get_mut(&target_id) {
        target.effects.restore(eff);
        if toggled {
            target.effects.touch();
        }
    }
    if toggled {
        region.events.push(SpellEvent::EffectsChanged { target: target_id });
    }
}

/// Breaks crowd control that cannot survive damage (mez, root).
pub(crate) fn break_on_damage(region: &mut Region, target_id: EntityId) {
    let Some(target) = region.entities.get(&target_id) else {
        return;
    };
    let breakable: Vec<EffectId> = target
        .effects
        .iter()
        .filter(|e| !e.expired)
        .filter(|e| {
            region
                .families
                .get(&e.spell.family)
                .map(|h| h.breaks_on_damage)
                .unwrap_or(false)
        })
        .map(|e| e.id)
        .collect();
    for id in breakable {
        expire_effect(region, target_id, id, ExpiryKind::Cancelled);
    }
}
