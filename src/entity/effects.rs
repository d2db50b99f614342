//! Per-combatant effect list.

use crate::core::types::EffectId;
use crate::effect::Effect;

/// Active and immunity-window effects on one combatant.
///
/// Mutation is batched: callers wrap related changes in `begin`/`commit`
/// and the region emits a single `EffectsChanged` event when a batch that
/// actually changed something commits. Timer callbacks temporarily `take`
/// an effect out of the list while running its hooks so the list stays
/// borrowable; a `take` that returns `None` means another path already
/// removed the effect and the callback must back off.
#[derive(Debug, Default)]
pub struct EffectList {
    effects: Vec<Effect>,
    batch_depth: u32,
    changed: bool,
}

impl EffectList {
    pub fn begin(&mut self) {
        self.batch_depth += 1;
    }

    /// Ends a batch. Returns true when the outermost batch closes and
    /// something changed, i.e. when a notification is due.
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

    /// Inserts an effect. Refuses (returning false) if a non-immune effect
    /// with the same nonzero stacking group is already present; the
    /// resolution policy is supposed to have replaced or rejected it first.
    pub fn add(&mut self, effect: Effect) -> bool {
        if self.conflicts_with(effect.spell.stacking_group) {
            return false;
        }
        self.effects.push(effect);
        self.changed = true;
        true
    }

    /// Moves an effect out of the list so its hooks can run while the
    /// owning combatant stays mutable. Pair with [`EffectList::restore`].
    pub fn take(&mut self, id: EffectId) -> Option<Effect> {
        let idx = self.effects.iter().position(|e| e.id == id)?;
        Some(self.effects.swap_remove(idx))
    }

    /// Inverse of `take`; a take/restore pair is change-neutral, callers
    /// that consumed the record instead call [`EffectList::touch`].
    pub fn restore(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn touch(&mut self) {
        self.changed = true;
    }

    /// True when a non-immune effect with this nonzero stacking group is
    /// present.
    pub fn conflicts_with(&self, stacking_group: u32) -> bool {
        stacking_group != 0
            && self
                .effects
                .iter()
                .any(|e| !e.immunity_state() && e.spell.stacking_group == stacking_group)
    }

    pub fn remove(&mut self, id: EffectId) -> Option<Effect> {
        let idx = self.effects.iter().position(|e| e.id == id)?;
        self.changed = true;
        Some(self.effects.swap_remove(idx))
    }

    pub fn get(&self, id: EffectId) -> Option<&Effect> {
        self.effects.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: EffectId) -> Option<&mut Effect> {
        self.changed = true;
        self.effects.iter_mut().find(|e| e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    pub fn ids(&self) -> Vec<EffectId> {
        self.effects.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
