//! The casting state machine: validation, the timed cast window,
//! interruption, and resolution against the selected targets.

pub mod validate;

pub use validate::CastRefusal;

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::core::error::{Result, SpellError};
use crate::core::types::{EntityId, Position, PowerChangeReason, TimerHandle};
use crate::effect::{self, ExpiryKind};
use crate::entity::Combatant;
use crate::pipeline;
use crate::region::{MessageKind, Region, SpellEvent};
use crate::spell::{SpellDefinition, SpellLine, TargetMode};

/// Where a cast currently stands. One session per caster at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Inside the timed cast window.
    Casting,
    /// Window elapsed; waiting for the embedder's sight confirmation.
    AwaitingSight,
    /// Being resolved right now.
    Resolving,
}

/// A cast in progress.
#[derive(Debug)]
pub struct CastingSession {
    pub caster: EntityId,
    pub spell: Arc<SpellDefinition>,
    pub line: SpellLine,
    pub target: Option<EntityId>,
    pub state: SessionState,
    pub started_at: u64,
    pub cast_ms: u64,
    pub timer: Option<TimerHandle>,
}

/// What a cast request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastOutcome {
    /// Timed cast began; resolution follows after `cast_ms` unless
    /// interrupted.
    Started { cast_ms: u64 },
    /// Instant spell, resolved within this call.
    Resolved,
    /// Re-casting a running pulsing spell turned it off instead.
    Toggled,
    /// The validation battery said no; nothing was spent.
    Refused(CastRefusal),
}

pub(crate) fn begin_cast(
    region: &mut Region,
    caster_id: EntityId,
    line_key: &str,
    spell_id: crate::core::types::SpellId,
    target: Option<EntityId>,
) -> Result<CastOutcome> {
    if !region.entities.contains_key(&caster_id) {
        return Err(SpellError::EntityNotFound(caster_id));
    }
    let (spell, line) = region.catalog.find(line_key, spell_id)?;
    // fail fast on a definition pointing at an unregistered family
    region.families.get(&spell.family)?;

    // a pulsing cast of a family the caster already keeps running toggles
    // it off instead of stacking, wherever the effect lives
    if spell.is_pulsing() {
        let running = region.entities.values().find_map(|t| {
            t.effects
                .iter()
                .find(|e| {
                    !e.expired
                        && e.caster == caster_id
                        && e.spell.is_pulsing()
                        && e.spell.family == spell.family
                })
                .map(|e| (e.target, e.id))
        });
        if let Some((target_id, effect_id)) = running {
            effect::expire_effect(region, target_id, effect_id, ExpiryKind::Cancelled);
            return Ok(CastOutcome::Toggled);
        }
    }

    {
        let caster = region
            .entities
            .get(&caster_id)
            .ok_or(SpellError::EntityNotFound(caster_id))?;
        if let Err(refusal) = validate::validate_begin(region, caster, &spell, target) {
            region.events.push(SpellEvent::Message {
                to: caster_id,
                kind: MessageKind::System,
                text: refusal.to_string(),
            });
            return Ok(CastOutcome::Refused(refusal));
        }
    }

    let now = region.clock;
    if spell.is_instant() {
        region.sessions.insert(
            caster_id,
            CastingSession {
                caster: caster_id,
                spell,
                line,
                target,
                state: SessionState::Resolving,
                started_at: now,
                cast_ms: 0,
                timer: None,
            },
        );
        resolve(region, caster_id);
        return Ok(CastOutcome::Resolved);
    }

    let (dexterity, speed_bonus) = region
        .entities
        .get(&caster_id)
        .map(|c| (c.effective_dexterity(), c.bonuses.cast_speed_pct))
        .unwrap_or((0, 0));
    let cast_ms = pipeline::casting_time(spell.cast_ms, dexterity, speed_bonus, &region.config);
    let timer = region
        .timers
        .schedule(now, cast_ms, Box::new(move |r: &mut Region| cast_window_elapsed(r, caster_id)));

    debug!(caster = ?caster_id, spell = %spell.name, cast_ms, "cast started");
    region.events.push(SpellEvent::CastStarted {
        caster: caster_id,
        spell: spell.id,
        cast_ms,
    });
    region.events.push(SpellEvent::Message {
        to: caster_id,
        kind: MessageKind::Spell,
        text: format!("You begin casting {}!", spell.name),
    });
    region.sessions.insert(
        caster_id,
        CastingSession {
            caster: caster_id,
            spell,
            line,
            target,
            state: SessionState::Casting,
            started_at: now,
            cast_ms,
            timer: Some(timer),
        },
    );
    Ok(CastOutcome::Started { cast_ms })
}

/// Cast timer callback. A session that was interrupted in the meantime is
/// already gone; the dangling timer finds nothing and backs off.
pub(crate) fn cast_window_elapsed(region: &mut Region, caster_id: EntityId) {
    let ok = match region.sessions.get(&caster_id) {
        Some(s) if s.state == SessionState::Casting => validate::validate_fire(region, s),
        _ => return,
    };
    match ok {
        Err(refusal) => fail_cast(region, caster_id, refusal),
        Ok(()) => resolve(region, caster_id),
    }
}

/// Answers a pending sight check. Not in `AwaitingSight`: ignored.
pub(crate) fn deliver_sight(region: &mut Region, caster_id: EntityId, visible: bool) {
    match region.sessions.get(&caster_id) {
        Some(s) if s.state == SessionState::AwaitingSight => {}
        _ => return,
    }
    if visible {
        finish_resolution(region, caster_id);
    } else {
        fail_cast(region, caster_id, CastRefusal::TargetNotVisible);
    }
}

fn resolve(region: &mut Region, caster_id: EntityId) {
    let needs_sight = {
        let Some(session) = region.sessions.get_mut(&caster_id) else {
            return;
        };
        session.state = SessionState::Resolving;
        let harmful = region
            .families
            .get(&session.spell.family)
            .map(|h| h.harmful)
            .unwrap_or(false);
        region.config.require_sight_confirmation
            && harmful
            && session.spell.target == TargetMode::Enemy
            && session.spell.radius == 0.0
            && session.target.is_some_and(|t| t != caster_id)
    };
    if needs_sight {
        let Some(session) = region.sessions.get_mut(&caster_id) else {
            return;
        };
        session.state = SessionState::AwaitingSight;
        let target = session.target.unwrap_or(caster_id);
        region.events.push(SpellEvent::SightCheckRequested {
            caster: caster_id,
            target,
        });
        return;
    }
    finish_resolution(region, caster_id);
}

/// Pays the cost, locks the recast, selects targets, rolls resists and
/// applies the spell. Everything before this point is free to interrupt.
fn finish_resolution(region: &mut Region, caster_id: EntityId) {
    // the await may have outlived the target or the caster's power
    if let Some(session) = region.sessions.get(&caster_id) {
        if session.state != SessionState::Resolving {
            if let Err(refusal) = validate::validate_fire(region, session) {
                fail_cast(region, caster_id, refusal);
                return;
            }
        }
    }
    let Some(session) = region.sessions.remove(&caster_id) else {
        return;
    };
    let spell = Arc::clone(&session.spell);
    let Some(handler) = region.families.get(&spell.family).ok().copied() else {
        return;
    };
    let now = region.clock;

    let caster_view = {
        let Some(caster) = region.entities.get_mut(&caster_id) else {
            return;
        };
        if spell.power_cost > 0 {
            caster.change_power(-spell.power_cost, PowerChangeReason::CastingCost);
        }
        if spell.recast_ms > 0 {
            caster.disabled_spells.insert(spell.id, now + spell.recast_ms);
        }
        caster.caster_view(&session.line.key)
    };

    let targets = select_targets(region, &session);
    for (target_id, effectiveness) in targets {
        let target_view = match region.entities.get(&target_id) {
            Some(t) => t.target_view(),
            None => continue,
        };

        if handler.harmful && target_id != caster_id {
            let resist = match handler.resist_override {
                Some(f) => f(&spell, &caster_view, &target_view, &region.config),
                None => pipeline::resist_chance(&caster_view, &target_view, &spell, &region.config),
            };
            let resisted = {
                let roll = pipeline::chance(&mut region.rng, resist);
                debug!(?target_id, resist, resisted = roll, "resist roll");
                roll
            };
            if resisted {
                on_spell_resisted(region, caster_id, target_id, &spell);
                continue;
            }
        }

        let health_before = region.entities.get(&target_id).map(|t| t.health);
        if spell.has_effect_lifecycle() {
            let started = effect::apply_or_refuse(
                region,
                &caster_view,
                target_id,
                &spell,
                &session.line,
                handler,
                effectiveness,
            );
            if started {
                region.events.push(SpellEvent::EffectAnimation {
                    caster: caster_id,
                    target: target_id,
                    spell: spell.id,
                    success: true,
                });
            }
        } else if let Some(action) = handler.direct {
            if let Some(target) = region.entities.get_mut(&target_id) {
                let mut applied = Vec::new();
                let mut ctx = crate::family::EffectCtx {
                    now,
                    cfg: &region.config,
                    spell: &spell,
                    line: &session.line,
                    effectiveness,
                    caster: &caster_view,
                    target,
                    applied: &mut applied,
                    events: &mut region.events,
                    rng: &mut region.rng,
                    silent: false,
                };
                action(&mut ctx);
            }
            region.events.push(SpellEvent::EffectAnimation {
                caster: caster_id,
                target: target_id,
                spell: spell.id,
                success: true,
            });
        }

        let damaged = match (health_before, region.entities.get(&target_id)) {
            (Some(before), Some(t)) => t.health < before,
            _ => false,
        };
        if damaged {
            effect::break_on_damage(region, target_id);
        }
        if handler.harmful && target_id != caster_id {
            apply_attack_side_effects(region, target_id, caster_id);
        }
        let died = region
            .entities
            .get(&target_id)
            .map(|t| !t.alive)
            .unwrap_or(false);
        if died && damaged {
            region.handle_death(target_id);
        }
    }

    region.events.push(SpellEvent::CastFinished {
        caster: caster_id,
        spell: spell.id,
    });
}

fn on_spell_resisted(
    region: &mut Region,
    caster_id: EntityId,
    target_id: EntityId,
    spell: &SpellDefinition,
) {
    let target_name = region
        .entities
        .get(&target_id)
        .map(|t| t.name.clone())
        .unwrap_or_default();
    region.events.push(SpellEvent::Resisted {
        caster: caster_id,
        target: target_id,
        spell: spell.id,
    });
    region.events.push(SpellEvent::Message {
        to: caster_id,
        kind: MessageKind::Resisted,
        text: format!("{target_name} resists the effect!"),
    });
    region.events.push(SpellEvent::Message {
        to: target_id,
        kind: MessageKind::Resisted,
        text: "You resist the effect!".to_string(),
    });
    region.events.push(SpellEvent::EffectAnimation {
        caster: caster_id,
        target: target_id,
        spell: spell.id,
        success: false,
    });
    // a resisted harmful spell is still an attack
    apply_attack_side_effects(region, target_id, caster_id);
}

/// Hostile-spell fallout on the victim: aggro and cast interruption.
fn apply_attack_side_effects(region: &mut Region, victim_id: EntityId, attacker_id: EntityId) {
    if let Some(victim) = region.entities.get_mut(&victim_id) {
        if victim.alive && !victim.hostile.contains(&attacker_id) {
            victim.hostile.push(attacker_id);
        }
    }
    region.on_attacked(victim_id, attacker_id);
}

/// Interrupts a running cast window. Returns false once resolution has
/// begun or no session exists; costs are untouched either way since they
/// are only paid inside resolution.
pub(crate) fn interrupt_cast(
    region: &mut Region,
    caster_id: EntityId,
    message: Option<String>,
) -> bool {
    let (spell_id, timer) = match region.sessions.get(&caster_id) {
        Some(s) if matches!(s.state, SessionState::Casting | SessionState::AwaitingSight) => {
            (s.spell.id, s.timer)
        }
        _ => return false,
    };
    if let Some(handle) = timer {
        region.timers.cancel(handle);
    }
    region.sessions.remove(&caster_id);
    region.events.push(SpellEvent::CastInterrupted {
        caster: caster_id,
        spell: spell_id,
    });
    if let Some(text) = message {
        region.events.push(SpellEvent::Message {
            to: caster_id,
            kind: MessageKind::System,
            text,
        });
    }
    true
}

fn fail_cast(region: &mut Region, caster_id: EntityId, refusal: CastRefusal) {
    let taken = match region.sessions.remove(&caster_id) {
        Some(s) => s,
        None => return,
    };
    if let Some(handle) = taken.timer {
        region.timers.cancel(handle);
    }
    region.events.push(SpellEvent::CastInterrupted {
        caster: caster_id,
        spell: taken.spell.id,
    });
    region.events.push(SpellEvent::Message {
        to: caster_id,
        kind: MessageKind::System,
        text: refusal.to_string(),
    });
}

fn select_targets(region: &Region, session: &CastingSession) -> Vec<(EntityId, f64)> {
    let spell = &session.spell;
    let Some(caster) = region.entities.get(&session.caster) else {
        return Vec::new();
    };
    match spell.target {
        TargetMode::SelfOnly => vec![(caster.id, 1.0)],
        TargetMode::Pet => caster
            .pet
            .filter(|id| region.entities.get(id).is_some_and(|p| p.alive))
            .map(|id| vec![(id, 1.0)])
            .unwrap_or_default(),
        TargetMode::Group => {
            let mut out = vec![(caster.id, 1.0)];
            if let Some(gid) = caster.group {
                let mut members: Vec<EntityId> = region
                    .entities
                    .values()
                    .filter(|e| e.id != caster.id && e.alive && e.group == Some(gid))
                    .filter(|e| {
                        spell.range <= 0.0
                            || caster.position.distance(&e.position) <= spell.range
                    })
                    .map(|e| e.id)
                    .collect();
                members.sort();
                out.extend(members.into_iter().map(|id| (id, 1.0)));
            }
            out
        }
        TargetMode::Enemy if spell.radius > 0.0 => {
            let center = if spell.range == 0.0 {
                Some(caster.position)
            } else {
                session
                    .target
                    .and_then(|id| region.entities.get(&id))
                    .map(|t| t.position)
            };
            area_targets(region, caster, center, spell.radius, true)
        }
        TargetMode::Enemy => session
            .target
            .filter(|id| region.entities.get(id).is_some_and(|t| t.alive))
            .map(|id| vec![(id, 1.0)])
            .unwrap_or_default(),
        TargetMode::Area => area_targets(region, caster, caster.ground_target, spell.radius, true),
        TargetMode::Corpse => session
            .target
            .filter(|id| region.entities.get(id).is_some_and(|t| !t.alive))
            .map(|id| vec![(id, 1.0)])
            .unwrap_or_default(),
        TargetMode::Realm if spell.radius > 0.0 => {
            let center = session
                .target
                .and_then(|id| region.entities.get(&id))
                .map(|t| t.position)
                .or(Some(caster.position));
            area_targets(region, caster, center, spell.radius, false)
        }
        TargetMode::Realm => {
            let id = session
                .target
                .filter(|id| {
                    region
                        .entities
                        .get(id)
                        .is_some_and(|t| t.alive && !caster.realm.hostile_to(t.realm))
                })
                .unwrap_or(caster.id);
            vec![(id, 1.0)]
        }
    }
}

/// Entities inside a circle, nearest first, with effectiveness falling off
/// toward the rim: full strength at the center, half at the edge.
fn area_targets(
    region: &Region,
    caster: &Combatant,
    center: Option<Position>,
    radius: f32,
    hostile: bool,
) -> Vec<(EntityId, f64)> {
    let Some(center) = center else {
        return Vec::new();
    };
    if radius <= 0.0 {
        return Vec::new();
    }
    let mut hits: Vec<(f32, EntityId)> = region
        .entities
        .values()
        .filter(|e| e.alive)
        .filter(|e| {
            if hostile {
                e.id != caster.id && caster.realm.hostile_to(e.realm)
            } else {
                !caster.realm.hostile_to(e.realm)
            }
        })
        .map(|e| (center.distance(&e.position), e.id))
        .filter(|(d, _)| *d <= radius)
        .collect();
    hits.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
    hits.into_iter()
        .map(|(d, id)| (id, 1.0 - 0.5 * f64::from(d / radius)))
        .collect()
}
