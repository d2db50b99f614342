//! Combatants: the casters and targets spells operate on.

pub mod effects;

pub use effects::EffectList;

use ahash::AHashMap;

use crate::concentration::ConcentrationLedger;
use crate::core::types::{EntityId, GroupId, Position, PowerChangeReason, Property, Realm, SpellId};
use crate::pipeline::{CasterView, TargetView};

/// Percentage bonuses a combatant carries from gear and realm abilities.
#[derive(Debug, Clone, Default)]
pub struct Bonuses {
    /// Added to the spell's level in the to-hit comparison.
    pub spell_level: i32,
    /// Flat to-hit percentage bonus.
    pub to_hit: i32,
    /// Outgoing spell damage multiplier in permille; 0 means unmodified.
    pub damage_permille: i32,
    /// Percentage added to buff/debuff durations.
    pub duration_pct: i32,
    /// Percentage added to spell cast range.
    pub spell_range_pct: i32,
    /// Percentage cast speed bonus on top of dexterity.
    pub cast_speed_pct: i32,
}

/// One combatant in a region: player character, pet or monster.
///
/// Everything the casting and effect machinery needs lives here; the
/// embedding simulation owns movement, AI and persistence and mirrors the
/// relevant state in through [`Region`](crate::region::Region) calls.
#[derive(Debug)]
pub struct Combatant {
    pub id: EntityId,
    pub name: String,
    pub realm: Realm,
    pub level: i32,
    pub position: Position,
    pub group: Option<GroupId>,
    pub is_player: bool,

    pub alive: bool,
    pub sitting: bool,
    pub moving: bool,
    pub mezzed: bool,
    pub stunned: bool,

    pub health: i32,
    pub max_health: i32,
    pub power: i32,
    pub max_power: i32,

    pub dexterity: i32,
    /// Casting stat (acuity-style) backing damage scaling; monsters that
    /// deal list-caster damage without a stat leave this `None`.
    pub casting_stat: Option<i32>,
    /// Concentration pool size; caps the sum of enabled ledger costs.
    pub concentration_stat: u32,
    /// Trained points per spell line key.
    pub spec_levels: AHashMap<String, u32>,
    pub bonuses: Bonuses,
    pub tools: Vec<String>,

    pub ground_target: Option<Position>,
    /// Controlled pet, the target of [`TargetMode::Pet`](crate::spell::TargetMode) spells.
    pub pet: Option<EntityId>,
    /// Clock time until which attacks keep this combatant from starting
    /// a new cast.
    pub interrupted_until: u64,
    /// Recast locks: spell id to clock time the spell becomes usable again.
    pub disabled_spells: AHashMap<SpellId, u64>,
    /// Entities currently hostile to this combatant, for area target
    /// selection around monsters.
    pub hostile: Vec<EntityId>,

    modifiers: AHashMap<Property, i32>,
    pub effects: EffectList,
    pub concentration: ConcentrationLedger,
}

impl Combatant {
    pub fn new(name: impl Into<String>, realm: Realm, level: i32) -> Self {
        let health = 40 * level.max(1);
        Combatant {
            id: EntityId::new(),
            name: name.into(),
            realm,
            level,
            position: Position::default(),
            group: None,
            is_player: false,
            alive: true,
            sitting: false,
            moving: false,
            mezzed: false,
            stunned: false,
            health,
            max_health: health,
            power: 100,
            max_power: 100,
            dexterity: 60,
            casting_stat: None,
            concentration_stat: 0,
            spec_levels: AHashMap::new(),
            bonuses: Bonuses::default(),
            tools: Vec::new(),
            ground_target: None,
            pet: None,
            interrupted_until: 0,
            disabled_spells: AHashMap::new(),
            hostile: Vec::new(),
            modifiers: AHashMap::new(),
            effects: EffectList::default(),
            concentration: ConcentrationLedger::default(),
        }
    }

    pub fn spec_level(&self, line_key: &str) -> u32 {
        self.spec_levels.get(line_key).copied().unwrap_or(0)
    }

    pub fn modifier(&self, prop: Property) -> i32 {
        self.modifiers.get(&prop).copied().unwrap_or(0)
    }

    pub fn apply_delta(&mut self, prop: Property, delta: i32) {
        *self.modifiers.entry(prop).or_insert(0) += delta;
    }

    pub fn revert_delta(&mut self, prop: Property, delta: i32) {
        *self.modifiers.entry(prop).or_insert(0) -= delta;
    }

    pub fn effective_dexterity(&self) -> i32 {
        self.dexterity + self.modifier(Property::Dexterity)
    }

    /// Clamped power change. Returns the amount actually applied.
    pub fn change_power(&mut self, delta: i32, _reason: PowerChangeReason) -> i32 {
        let before = self.power;
        self.power = (self.power + delta).clamp(0, self.max_power);
        self.power - before
    }

    /// Applies damage; returns true if this killed the combatant.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        if !self.alive {
            return false;
        }
        self.health -= amount.max(0);
        if self.health <= 0 {
            self.health = 0;
            self.alive = false;
            return true;
        }
        false
    }

    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.health;
        self.health = (self.health + amount.max(0)).min(self.max_health);
        self.health - before
    }

    pub fn has_tool(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool)
    }

    /// Snapshot used by the pure damage pipeline while the target side is
    /// mutably borrowed.
    pub fn caster_view(&self, line_key: &str) -> CasterView {
        CasterView {
            id: self.id,
            level: self.level.max(0) as u32,
            spec_level: self.spec_level(line_key),
            casting_stat: self
                .casting_stat
                .map(|s| s + self.modifier(Property::Acuity)),
            spell_level_bonus: self.bonuses.spell_level,
            to_hit_bonus: self.bonuses.to_hit,
            damage_permille: 1000 + self.bonuses.damage_permille,
            is_player: self.is_player,
        }
    }

    pub fn target_view(&self) -> TargetView {
        TargetView {
            id: self.id,
            level: self.level.max(0) as u32,
            is_player_controlled: self.is_player,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_caster() -> Combatant {
        let mut c = Combatant::new("Aldric", Realm::Albion, 50);
        c.is_player = true;
        c.casting_stat = Some(120);
        c.spec_levels.insert("pyromancy".into(), 45);
        c
    }

    #[test]
    fn test_power_change_clamps_at_bounds() {
        let mut c = test_caster();
        c.power = 30;
        let applied = c.change_power(-50, PowerChangeReason::CastingCost);
        assert_eq!(applied, -30);
        assert_eq!(c.power, 0);

        let applied = c.change_power(500, PowerChangeReason::Regeneration);
        assert_eq!(applied, c.max_power);
    }

    #[test]
    fn test_damage_kills_at_zero_health() {
        let mut c = test_caster();
        c.health = 10;
        assert!(!c.take_damage(5));
        assert!(c.alive);
        assert!(c.take_damage(5));
        assert!(!c.alive);
        // already dead, no second kill
        assert!(!c.take_damage(5));
    }

    #[test]
    fn test_modifier_deltas_revert_cleanly() {
        let mut c = test_caster();
        let base = c.effective_dexterity();
        c.apply_delta(Property::Dexterity, 24);
        assert_eq!(c.effective_dexterity(), base + 24);
        c.revert_delta(Property::Dexterity, 24);
        assert_eq!(c.effective_dexterity(), base);
    }

    #[test]
    fn test_caster_view_folds_acuity_modifier() {
        let mut c = test_caster();
        c.apply_delta(Property::Acuity, 15);
        let view = c.caster_view("pyromancy");
        assert_eq!(view.casting_stat, Some(135));
        assert_eq!(view.spec_level, 45);
    }
}
