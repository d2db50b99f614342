//! Standard family handlers.

use crate::core::types::Property;
use crate::pipeline;
use crate::region::{MessageKind, SpellEvent};
use crate::spell::{SpellDefinition, SpellFamily};

use super::{EffectCtx, FamilyHandler, FamilyRegistry};

pub const DIRECT_DAMAGE: &str = "direct-damage";
pub const DAMAGE_OVER_TIME: &str = "damage-over-time";
pub const HEAL: &str = "heal";
pub const DEXTERITY_BUFF: &str = "dexterity-buff";
pub const DEXTERITY_DEBUFF: &str = "dexterity-debuff";
pub const ARMOR_BUFF: &str = "armor-buff";
pub const POWER_REGEN_BUFF: &str = "power-regen-buff";
pub const SNARE: &str = "snare";
pub const ROOT: &str = "root";
pub const MESMERIZE: &str = "mesmerize";

/// Crowd-control immunity window after a mez, root or snare runs out.
const CC_IMMUNITY_MS: u64 = 60_000;

pub(super) fn register(registry: &mut FamilyRegistry) {
    registry.register(
        SpellFamily::new(DIRECT_DAMAGE),
        FamilyHandler {
            harmful: true,
            direct: Some(direct_damage),
            ..Default::default()
        },
    );
    registry.register(
        SpellFamily::new(DAMAGE_OVER_TIME),
        FamilyHandler {
            harmful: true,
            on_start: Some(dot_start),
            on_pulse: Some(dot_pulse),
            on_expire: Some(dot_expire),
            // two poisons only contest a slot when authored with the same
            // running time; a short and a long bleed tick side by side
            overlap_override: Some(equal_duration),
            ..Default::default()
        },
    );
    registry.register(
        SpellFamily::new(HEAL),
        FamilyHandler {
            direct: Some(heal),
            resist_override: Some(never_resisted),
            ..Default::default()
        },
    );
    registry.register(
        SpellFamily::new(DEXTERITY_BUFF),
        FamilyHandler {
            deltas: Some(dexterity_up),
            ..Default::default()
        },
    );
    registry.register(
        SpellFamily::new(DEXTERITY_DEBUFF),
        FamilyHandler {
            harmful: true,
            deltas: Some(dexterity_down),
            ..Default::default()
        },
    );
    registry.register(
        SpellFamily::new(ARMOR_BUFF),
        FamilyHandler {
            deltas: Some(armor_up),
            ..Default::default()
        },
    );
    registry.register(
        SpellFamily::new(POWER_REGEN_BUFF),
        FamilyHandler {
            deltas: Some(power_regen_up),
            ..Default::default()
        },
    );
    registry.register(
        SpellFamily::new(SNARE),
        FamilyHandler {
            harmful: true,
            immunity_ms: CC_IMMUNITY_MS,
            deltas: Some(slow_movement),
            ..Default::default()
        },
    );
    registry.register(
        SpellFamily::new(ROOT),
        FamilyHandler {
            harmful: true,
            immunity_ms: CC_IMMUNITY_MS,
            breaks_on_damage: true,
            deltas: Some(slow_movement),
            ..Default::default()
        },
    );
    registry.register(
        SpellFamily::new(MESMERIZE),
        FamilyHandler {
            harmful: true,
            immunity_ms: CC_IMMUNITY_MS,
            breaks_on_damage: true,
            on_start: Some(mesmerize_start),
            on_expire: Some(mesmerize_expire),
            ..Default::default()
        },
    );
}

fn scaled(spell: &SpellDefinition, effectiveness: f64) -> i32 {
    (spell.value * effectiveness).round() as i32
}

fn direct_damage(ctx: &mut EffectCtx) {
    let target_view = ctx.target.target_view();
    let damage = pipeline::roll_damage(
        ctx.caster,
        &target_view,
        ctx.spell,
        ctx.line.baseline,
        ctx.effectiveness,
        ctx.cfg,
        ctx.rng,
    );
    ctx.target.take_damage(damage);
    ctx.events.push(SpellEvent::Damage {
        caster: ctx.caster.id,
        target: ctx.target.id,
        spell: ctx.spell.id,
        amount: damage,
    });
    ctx.events.push(SpellEvent::Message {
        to: ctx.caster.id,
        kind: MessageKind::Spell,
        text: format!("You hit {} for {} damage!", ctx.target.name, damage),
    });
}

fn dot_start(ctx: &mut EffectCtx) {
    if !ctx.silent {
        ctx.events.push(SpellEvent::Message {
            to: ctx.target.id,
            kind: MessageKind::Spell,
            text: format!("{} burns through you.", ctx.spell.name),
        });
    }
}

// periodic ticks never vary and never miss once the effect landed
fn dot_pulse(ctx: &mut EffectCtx) {
    let damage = (ctx.spell.damage * ctx.effectiveness).round() as i32;
    ctx.target.take_damage(damage);
    ctx.events.push(SpellEvent::Damage {
        caster: ctx.caster.id,
        target: ctx.target.id,
        spell: ctx.spell.id,
        amount: damage,
    });
}

fn dot_expire(ctx: &mut EffectCtx) {
    if !ctx.silent {
        ctx.events.push(SpellEvent::Message {
            to: ctx.target.id,
            kind: MessageKind::Spell,
            text: format!("{} fades.", ctx.spell.name),
        });
    }
}

fn heal(ctx: &mut EffectCtx) {
    let healed = ctx.target.heal(scaled(ctx.spell, ctx.effectiveness));
    ctx.events.push(SpellEvent::Healed {
        caster: ctx.caster.id,
        target: ctx.target.id,
        spell: ctx.spell.id,
        amount: healed,
    });
    let text = if healed == 0 {
        format!("{} is already fully healed.", ctx.target.name)
    } else {
        format!("You heal {} for {} hit points.", ctx.target.name, healed)
    };
    ctx.events.push(SpellEvent::Message {
        to: ctx.caster.id,
        kind: MessageKind::Spell,
        text,
    });
}

fn never_resisted(
    _spell: &SpellDefinition,
    _caster: &crate::pipeline::CasterView,
    _target: &crate::pipeline::TargetView,
    _cfg: &crate::core::config::TuningConfig,
) -> i32 {
    0
}

fn equal_duration(a: &SpellDefinition, b: &SpellDefinition) -> bool {
    a.duration_ms == b.duration_ms
}

fn dexterity_up(spell: &SpellDefinition, effectiveness: f64) -> Vec<(Property, i32)> {
    vec![(Property::Dexterity, scaled(spell, effectiveness))]
}

fn dexterity_down(spell: &SpellDefinition, effectiveness: f64) -> Vec<(Property, i32)> {
    vec![(Property::Dexterity, -scaled(spell, effectiveness))]
}

fn armor_up(spell: &SpellDefinition, effectiveness: f64) -> Vec<(Property, i32)> {
    vec![(Property::ArmorFactor, scaled(spell, effectiveness))]
}

fn power_regen_up(spell: &SpellDefinition, effectiveness: f64) -> Vec<(Property, i32)> {
    vec![(Property::PowerRegen, scaled(spell, effectiveness))]
}

fn slow_movement(spell: &SpellDefinition, effectiveness: f64) -> Vec<(Property, i32)> {
    vec![(Property::MoveSpeed, -scaled(spell, effectiveness))]
}

fn mesmerize_start(ctx: &mut EffectCtx) {
    ctx.target.mezzed = true;
    if !ctx.silent {
        ctx.events.push(SpellEvent::Message {
            to: ctx.target.id,
            kind: MessageKind::Spell,
            text: "You are mesmerized!".to_string(),
        });
    }
}

fn mesmerize_expire(ctx: &mut EffectCtx) {
    ctx.target.mezzed = false;
    if !ctx.silent {
        ctx.events.push(SpellEvent::Message {
            to: ctx.target.id,
            kind: MessageKind::Spell,
            text: "You snap out of your trance.".to_string(),
        });
    }
}
