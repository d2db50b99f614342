//! Overwrite policy: which effects contest a slot and which side wins.

use crate::family::FamilyHandler;
use crate::spell::SpellDefinition;

use super::Effect;

/// True when a new spell contests the slot an existing effect occupies.
///
/// Nonzero effect groups are authoritative when both sides carry one;
/// otherwise same-family spells contest subject to the family's overlap
/// rule, and finally a shared nonzero stacking group forces contest across
/// families (delve-flagged exclusives like different snare lines).
pub fn contests_slot(existing: &Effect, incoming: &SpellDefinition, handler: &FamilyHandler) -> bool {
    if existing.spell.effect_group != 0 && incoming.effect_group != 0 {
        return existing.spell.effect_group == incoming.effect_group;
    }
    if existing.spell.family == incoming.family {
        return handler.overlaps(&existing.spell, incoming);
    }
    existing.spell.stacking_group != 0
        && existing.spell.stacking_group == incoming.stacking_group
}

/// Whether the incoming spell beats the effect currently in the slot.
///
/// Concentration effects are never overwritten while maintained. An effect
/// sitting in its immunity window has already run out and never blocks.
/// Otherwise the incoming side loses if either its damage or its value is
/// strictly weaker, and an incoming non-concentration effect must also
/// outlast what the holder has left; equal strength with a longer duration
/// refreshes the slot.
pub fn is_new_better(
    existing: &Effect,
    incoming: &SpellDefinition,
    effectiveness: f64,
    incoming_duration_ms: u64,
    now: u64,
) -> bool {
    if existing.immunity_state() {
        return true;
    }
    if existing.spell.is_concentration() {
        return false;
    }
    if incoming.damage * effectiveness < existing.spell.damage * existing.effectiveness {
        return false;
    }
    if incoming.value * effectiveness < existing.spell.value * existing.effectiveness {
        return false;
    }
    if !incoming.is_concentration() {
        if let Some(remaining) = existing.remaining_ms(now) {
            if incoming_duration_ms <= remaining {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{EffectId, EntityId, SpellId};
    use crate::pipeline::CasterView;
    use crate::spell::{SpellFamily, SpellLine};
    use std::sync::Arc;

    fn spell(id: u32, family: &str, value: f64) -> SpellDefinition {
        SpellDefinition {
            id: SpellId(id),
            name: format!("spell-{id}"),
            family: SpellFamily::new(family),
            value,
            duration_ms: 20_000,
            ..Default::default()
        }
    }

    fn active(spell: SpellDefinition, effectiveness: f64) -> Effect {
        let caster = EntityId::new();
        Effect {
            id: EffectId(1),
            target: EntityId::new(),
            caster,
            caster_view: CasterView {
                id: caster,
                level: 50,
                spec_level: 50,
                casting_stat: Some(60),
                spell_level_bonus: 0,
                to_hit_bonus: 0,
                damage_permille: 1000,
                is_player: true,
            },
            spell: Arc::new(spell),
            line: SpellLine::baseline("line", "spec"),
            effectiveness,
            started_at: 0,
            expires_at: Some(20_000),
            expired: false,
            immunity: false,
            disabled: false,
            timer: None,
            applied: Vec::new(),
        }
    }

    #[test]
    fn test_effect_group_wins_over_family() {
        let mut a = spell(1, "dexterity-buff", 30.0);
        a.effect_group = 7;
        let mut b = spell(2, "armor-buff", 40.0);
        b.effect_group = 7;
        let mut c = spell(3, "dexterity-buff", 30.0);
        c.effect_group = 8;
        let handler = FamilyHandler::default();
        let existing = active(a, 1.0);
        assert!(contests_slot(&existing, &b, &handler));
        assert!(!contests_slot(&existing, &c, &handler));
    }

    #[test]
    fn test_same_family_contests_by_default() {
        let handler = FamilyHandler::default();
        let existing = active(spell(1, "dexterity-buff", 30.0), 1.0);
        assert!(contests_slot(&existing, &spell(2, "dexterity-buff", 40.0), &handler));
        assert!(!contests_slot(&existing, &spell(2, "armor-buff", 40.0), &handler));
    }

    #[test]
    fn test_weaker_value_never_better() {
        // existing has 20s remaining at now=0
        let existing = active(spell(1, "dexterity-buff", 30.0), 1.0);
        assert!(!is_new_better(&existing, &spell(2, "dexterity-buff", 25.0), 1.0, 60_000, 0));
        assert!(is_new_better(&existing, &spell(2, "dexterity-buff", 31.0), 1.0, 60_000, 0));
    }

    #[test]
    fn test_stronger_but_shorter_never_better() {
        let existing = active(spell(1, "dexterity-buff", 24.0), 1.0);
        assert!(!is_new_better(&existing, &spell(2, "dexterity-buff", 36.0), 1.0, 5_000, 0));
        // same comparison once most of the holder has run out
        assert!(is_new_better(&existing, &spell(2, "dexterity-buff", 36.0), 1.0, 5_000, 16_000));
    }

    #[test]
    fn test_equal_strength_longer_duration_refreshes() {
        let existing = active(spell(1, "dexterity-buff", 24.0), 1.0);
        assert!(is_new_better(&existing, &spell(2, "dexterity-buff", 24.0), 1.0, 30_000, 0));
        assert!(!is_new_better(&existing, &spell(2, "dexterity-buff", 24.0), 1.0, 20_000, 0));
    }

    #[test]
    fn test_effectiveness_scales_strength() {
        // a half-effective big debuff loses to a full-strength smaller one
        let existing = active(spell(1, "dexterity-debuff", 30.0), 1.0);
        assert!(!is_new_better(&existing, &spell(2, "dexterity-debuff", 50.0), 0.5, 60_000, 0));
        assert!(is_new_better(&existing, &spell(2, "dexterity-debuff", 70.0), 0.5, 60_000, 0));
    }

    #[test]
    fn test_concentration_never_overwritten() {
        let mut conc = spell(1, "armor-buff", 10.0);
        conc.concentration_cost = 4;
        conc.duration_ms = 0;
        let mut existing = active(conc, 1.0);
        existing.expires_at = None;
        assert!(!is_new_better(&existing, &spell(2, "armor-buff", 99.0), 1.0, 60_000, 0));
    }

    #[test]
    fn test_immunity_record_always_loses_slot() {
        let mut existing = active(spell(1, "mesmerize", 30.0), 1.0);
        existing.expired = true;
        existing.immunity = true;
        assert!(is_new_better(&existing, &spell(2, "mesmerize", 1.0), 1.0, 4_000, 0));
    }
}
