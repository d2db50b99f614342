//! Concentration ledger: the caster-side record of maintained effects.

use crate::core::types::{EffectId, EntityId, TimerHandle};
use crate::effect;
use crate::region::{Region, SpellEvent};

/// One maintained effect, as seen from the caster.
#[derive(Debug, Clone)]
pub struct ConcEntry {
    pub target: EntityId,
    pub effect: EffectId,
    pub cost: u32,
    /// Cleared by the range sweep while the target is too far away.
    pub enabled: bool,
}

/// Ordered ledger of concentration effects a caster is maintaining.
///
/// Capacity is capped at `TuningConfig::conc_max_entries` slots and the
/// sum of entry costs never exceeds the owner's concentration stat; both
/// limits are enforced at cast validation. Ledger mutation is batched like
/// the effect list so grouped changes notify once.
#[derive(Debug, Default)]
pub struct ConcentrationLedger {
    entries: Vec<ConcEntry>,
    batch_depth: u32,
    changed: bool,
    /// Repeating range-sweep timer, armed while the ledger is non-empty.
    pub sweep_timer: Option<TimerHandle>,
}

impl ConcentrationLedger {
    pub fn begin(&mut self) {
        self.batch_depth += 1;
    }

    /// Ends a batch; true when the outermost batch closes with changes.
    pub fn commit(&mut self) -> bool {
        debug_assert!(self.batch_depth > 0);
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 && self.changed {
            self.changed = false;
            true
        } else {
            false
        }
    }

    /// Total cost of all entries. A range-disabled effect keeps its points
    /// reserved; they come back only when the effect ends.
    pub fn used_points(&self) -> u32 {
        self.entries.iter().map(|e| e.cost).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConcEntry> {
        self.entries.iter()
    }

    /// Adds an entry, keeping a zero-cost trailing entry (the interface
    /// slot some lines reserve) last in the ordering.
    pub fn add(&mut self, entry: ConcEntry) {
        self.changed = true;
        match self.entries.last() {
            Some(last) if last.cost == 0 && entry.cost > 0 => {
                let at = self.entries.len() - 1;
                self.entries.insert(at, entry);
            }
            _ => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, effect: EffectId) -> Option<ConcEntry> {
        let idx = self.entries.iter().position(|e| e.effect == effect)?;
        self.changed = true;
        Some(self.entries.remove(idx))
    }

    pub fn set_enabled(&mut self, effect: EffectId, enabled: bool) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.effect == effect) {
            if entry.enabled != enabled {
                entry.enabled = enabled;
                self.changed = true;
            }
        }
    }
}

/// Periodic range sweep over one caster's ledger: effects on targets beyond
/// the concentration range stop working (their property deltas are
/// reverted) and come back when the target returns. Self-cancels once the
/// ledger empties.
pub(crate) fn sweep(region: &mut Region, owner: EntityId) {
    let Some(caster) = region.entities.get(&owner) else {
        return;
    };
    if caster.concentration.is_empty() {
        let timer = caster.concentration.sweep_timer;
        if let Some(handle) = timer {
            region.timers.cancel(handle);
            if let Some(c) = region.entities.get_mut(&owner) {
                c.concentration.sweep_timer = None;
            }
        }
        return;
    }
    let caster_pos = caster.position;
    let max_range = region.config.conc_range;
    let entries: Vec<ConcEntry> = caster.concentration.iter().cloned().collect();

    if let Some(c) = region.entities.get_mut(&owner) {
        c.concentration.begin();
    }
    for entry in entries {
        let in_range = region
            .entities
            .get(&entry.target)
            .map(|t| caster_pos.distance(&t.position) <= max_range)
            .unwrap_or(false);
        if in_range != entry.enabled {
            effect::set_effect_enabled(region, entry.target, entry.effect, in_range);
            if let Some(c) = region.entities.get_mut(&owner) {
                c.concentration.set_enabled(entry.effect, in_range);
            }
        }
    }
    if let Some(c) = region.entities.get_mut(&owner) {
        if c.concentration.commit() {
            region.events.push(SpellEvent::ConcentrationChanged { owner });
        }
    }
}

/// Arms the sweep timer for a caster that just gained its first entry.
pub(crate) fn ensure_sweep(region: &mut Region, owner: EntityId) {
    let needs_timer = region
        .entities
        .get(&owner)
        .map(|c| c.concentration.sweep_timer.is_none() && !c.concentration.is_empty())
        .unwrap_or(false);
    if !needs_timer {
        return;
    }
    let period = region.config.conc_sweep_ms;
    let now = region.clock;
    let handle =
        region
            .timers
            .schedule_repeating(now, period, Box::new(move |r: &mut Region| sweep(r, owner)));
    if let Some(c) = region.entities.get_mut(&owner) {
        c.concentration.sweep_timer = Some(handle);
    }
}
