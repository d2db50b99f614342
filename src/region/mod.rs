//! The region: one independently-simulated zone owning its combatants,
//! casting sessions, effects, timers and RNG.
//!
//! The region has no clock of its own; the embedding simulation loop calls
//! [`Region::advance`] with elapsed milliseconds and drains the event log
//! afterwards. Everything inside is deterministic for a given seed and
//! call sequence.

pub mod events;

pub use events::{MessageKind, SpellEvent};

use ahash::AHashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::casting::{self, CastOutcome, CastingSession, SessionState};
use crate::concentration;
use crate::core::config::TuningConfig;
use crate::core::error::Result;
use crate::core::types::{EffectId, EntityId, SpellId};
use crate::effect::{self, ExpiryKind};
use crate::entity::Combatant;
use crate::family::FamilyRegistry;
use crate::pipeline;
use crate::spell::SpellCatalog;
use crate::timer::TimerWheel;

pub struct Region {
    pub(crate) clock: u64,
    pub(crate) config: TuningConfig,
    pub(crate) catalog: SpellCatalog,
    pub(crate) families: FamilyRegistry,
    pub(crate) entities: AHashMap<EntityId, Combatant>,
    pub(crate) sessions: AHashMap<EntityId, CastingSession>,
    pub(crate) timers: TimerWheel<Region>,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) events: Vec<SpellEvent>,
    next_effect_id: u64,
}

impl Region {
    pub fn new(config: TuningConfig, catalog: SpellCatalog, seed: u64) -> Self {
        Region {
            clock: 0,
            config,
            catalog,
            families: FamilyRegistry::with_builtins(),
            entities: AHashMap::new(),
            sessions: AHashMap::new(),
            timers: TimerWheel::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            events: Vec::new(),
            next_effect_id: 1,
        }
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn config(&self) -> &TuningConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SpellCatalog {
        &self.catalog
    }

    pub fn families_mut(&mut self) -> &mut FamilyRegistry {
        &mut self.families
    }

    /// Advances the clock, firing due timers in schedule order. Each
    /// callback observes the clock at its own fire time.
    pub fn advance(&mut self, dt_ms: u64) {
        let until = self.clock + dt_ms;
        loop {
            let Some(mut due) = self.timers.pop_due(until) else {
                break;
            };
            if due.fire_at > self.clock {
                self.clock = due.fire_at;
            }
            due.fire(self);
            self.timers.reinsert(due);
        }
        self.clock = until;
    }

    /// Takes the accumulated event log.
    pub fn drain_events(&mut self) -> Vec<SpellEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn insert(&mut self, combatant: Combatant) -> EntityId {
        let id = combatant.id;
        info!(?id, name = %combatant.name, "combatant enters region");
        self.entities.insert(id, combatant);
        id
    }

    /// Despawns a combatant, tearing down its session, its effects and the
    /// effects it maintains on others. No death event is emitted.
    pub fn remove(&mut self, id: EntityId) -> Option<Combatant> {
        if self.entities.contains_key(&id) {
            self.teardown(id);
        }
        self.entities.remove(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Combatant> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Combatant> {
        self.entities.get_mut(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Requests a cast of `spell_id` from `line_key` at an optional target.
    pub fn cast(
        &mut self,
        caster: EntityId,
        line_key: &str,
        spell_id: SpellId,
        target: Option<EntityId>,
    ) -> Result<CastOutcome> {
        casting::begin_cast(self, caster, line_key, spell_id, target)
    }

    /// Player-initiated cancel of a cast in progress. True if there was
    /// one to cancel.
    pub fn cancel_cast(&mut self, caster: EntityId) -> bool {
        casting::interrupt_cast(self, caster, Some("You cancel your spell.".to_string()))
    }

    /// Answers an outstanding sight check for `caster`.
    pub fn deliver_sight(&mut self, caster: EntityId, visible: bool) {
        casting::deliver_sight(self, caster, visible);
    }

    /// Mirrors a movement state change in from the embedder. Starting to
    /// move interrupts a cast unless the spell allows it.
    pub fn report_movement(&mut self, id: EntityId, moving: bool) {
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };
        entity.moving = moving;
        if !moving {
            return;
        }
        let interruptible = matches!(
            self.sessions.get(&id),
            Some(s) if !s.spell.move_cast
                && matches!(s.state, SessionState::Casting | SessionState::AwaitingSight)
        );
        if interruptible {
            casting::interrupt_cast(
                self,
                id,
                Some("You move and interrupt your spellcast!".to_string()),
            );
        }
    }

    /// Reports an incoming melee or spell hit on `victim`: opens the
    /// post-attack cast lockout and rolls to interrupt a cast in progress.
    pub fn on_attacked(&mut self, victim: EntityId, attacker: EntityId) {
        let now = self.clock;
        let victim_level = {
            let Some(v) = self.entities.get_mut(&victim) else {
                return;
            };
            if !v.alive {
                return;
            }
            v.interrupted_until = now + self.config.spell_interrupt_ms;
            v.level.max(0) as u32
        };
        let casting_now = matches!(
            self.sessions.get(&victim),
            Some(s) if !s.spell.move_cast
                && matches!(s.state, SessionState::Casting | SessionState::AwaitingSight)
        );
        if !casting_now {
            return;
        }
        let Some((attacker_level, attacker_is_player, attacker_name)) = self
            .entities
            .get(&attacker)
            .map(|a| (a.level.max(0) as u32, a.is_player, a.name.clone()))
        else {
            return;
        };
        let pct = pipeline::interrupt_chance(
            victim_level,
            attacker_level,
            attacker_is_player,
            &self.config,
        );
        if pipeline::chance(&mut self.rng, pct) {
            casting::interrupt_cast(
                self,
                victim,
                Some(format!(
                    "{attacker_name} attacks you and your spell is interrupted!"
                )),
            );
        }
    }

    /// Cancels one effect on a target (a player shrugging off a buff, or a
    /// caster dropping a maintained effect). No immunity window.
    pub fn cancel_effect(&mut self, target: EntityId, effect: EffectId) {
        effect::expire_effect(self, target, effect, ExpiryKind::Cancelled);
    }

    /// Kills a combatant outright and runs the death teardown.
    pub fn kill(&mut self, id: EntityId) {
        let was_alive = match self.entities.get_mut(&id) {
            Some(e) if e.alive => {
                e.alive = false;
                e.health = 0;
                true
            }
            _ => false,
        };
        if was_alive {
            self.handle_death(id);
        }
    }

    /// Death fallout: the cast dies with the caster, every effect on the
    /// corpse ends without immunity, and every effect the deceased was
    /// maintaining collapses.
    pub(crate) fn handle_death(&mut self, id: EntityId) {
        debug!(?id, "death teardown");
        self.teardown(id);
        self.events.push(SpellEvent::Died { entity: id });
    }

    fn teardown(&mut self, id: EntityId) {
        casting::interrupt_cast(self, id, None);
        let own_effects = self
            .entities
            .get(&id)
            .map(|e| e.effects.ids())
            .unwrap_or_default();
        for effect_id in own_effects {
            effect::expire_effect(self, id, effect_id, ExpiryKind::Cancelled);
        }
        let maintained: Vec<(EntityId, EffectId)> = self
            .entities
            .get(&id)
            .map(|e| {
                e.concentration
                    .iter()
                    .map(|entry| (entry.target, entry.effect))
                    .collect()
            })
            .unwrap_or_default();
        for (target, effect_id) in maintained {
            effect::expire_effect(self, target, effect_id, ExpiryKind::Cancelled);
        }
        if let Some(e) = self.entities.get_mut(&id) {
            if let Some(handle) = e.concentration.sweep_timer.take() {
                self.timers.cancel(handle);
            }
        }
    }

    /// Forces one concentration range sweep outside the periodic schedule.
    pub fn sweep_concentration(&mut self, owner: EntityId) {
        concentration::sweep(self, owner);
    }

    pub(crate) fn alloc_effect_id(&mut self) -> EffectId {
        let id = EffectId(self.next_effect_id);
        self.next_effect_id += 1;
        id
    }
}
