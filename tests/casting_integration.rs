//! End-to-end casting flow: begin, cast window, interruption, resolution.

use runecast::family::builtin;
use runecast::region::SpellEvent;
use runecast::{
    CastOutcome, CastRefusal, Combatant, Position, Realm, Region, SpellCatalog, SpellDefinition,
    SpellFamily, SpellId, SpellLine, TargetMode, TuningConfig,
};

const FIREBOLT: SpellId = SpellId(1);
const MEND: SpellId = SpellId(2);
const HASTEN_WITS: SpellId = SpellId(3);
const EMBER_SHELL: SpellId = SpellId(4);

fn catalog() -> SpellCatalog {
    let mut catalog = SpellCatalog::new();
    catalog.add_line(SpellLine::baseline("pyromancy", "fire"));
    catalog.add_spell(
        "pyromancy",
        SpellDefinition {
            id: FIREBOLT,
            name: "Firebolt".into(),
            family: SpellFamily::new(builtin::DIRECT_DAMAGE),
            target: TargetMode::Enemy,
            damage: 60.0,
            level: 50,
            range: 1500.0,
            cast_ms: 3000,
            power_cost: 40,
            ..Default::default()
        },
    );
    catalog.add_spell(
        "pyromancy",
        SpellDefinition {
            id: MEND,
            name: "Mend".into(),
            family: SpellFamily::new(builtin::HEAL),
            target: TargetMode::SelfOnly,
            value: 50.0,
            level: 50,
            power_cost: 10,
            cast_ms: 0,
            ..Default::default()
        },
    );
    catalog.add_spell(
        "pyromancy",
        SpellDefinition {
            id: HASTEN_WITS,
            name: "Hasten Wits".into(),
            family: SpellFamily::new(builtin::DEXTERITY_BUFF),
            target: TargetMode::SelfOnly,
            value: 24.0,
            level: 50,
            duration_ms: 60_000,
            cast_ms: 3000,
            power_cost: 40,
            ..Default::default()
        },
    );
    catalog.add_spell(
        "pyromancy",
        SpellDefinition {
            id: EMBER_SHELL,
            name: "Ember Shell".into(),
            family: SpellFamily::new(builtin::ARMOR_BUFF),
            target: TargetMode::SelfOnly,
            value: 30.0,
            level: 50,
            duration_ms: 30_000,
            cast_ms: 2000,
            power_cost: 20,
            recast_ms: 15_000,
            ..Default::default()
        },
    );
    catalog
}

fn trace_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn region() -> Region {
    trace_init();
    Region::new(TuningConfig::default(), catalog(), 0xCA57)
}

fn pyromancer() -> Combatant {
    let mut c = Combatant::new("Aldric", Realm::Albion, 50);
    c.is_player = true;
    c.casting_stat = Some(100);
    // lands every spell: to-hit 100 means resist chance 0
    c.bonuses.to_hit = 15;
    c.spec_levels.insert("pyromancy".into(), 50);
    c
}

fn training_dummy() -> Combatant {
    Combatant::new("training dummy", Realm::None, 50)
}

#[test]
fn test_timed_cast_pays_power_at_resolution_only() {
    let mut region = region();
    let caster = region.insert(pyromancer());

    let outcome = region
        .cast(caster, "pyromancy", HASTEN_WITS, None)
        .unwrap();
    assert_eq!(outcome, CastOutcome::Started { cast_ms: 3000 });
    // power untouched during the window
    assert_eq!(region.entity(caster).unwrap().power, 100);

    region.advance(3000);
    let c = region.entity(caster).unwrap();
    assert_eq!(c.power, 60);
    assert_eq!(c.effects.len(), 1);
    assert_eq!(c.effective_dexterity(), 60 + 24);

    let events = region.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SpellEvent::CastFinished { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, SpellEvent::EffectStarted { .. })));
}

#[test]
fn test_movement_interrupts_without_cost() {
    let mut region = region();
    let caster = region.insert(pyromancer());

    region.cast(caster, "pyromancy", HASTEN_WITS, None).unwrap();
    region.advance(1000);
    region.report_movement(caster, true);
    region.advance(10_000);

    let c = region.entity(caster).unwrap();
    assert_eq!(c.power, 100);
    assert_eq!(c.effects.len(), 0);
    let events = region.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SpellEvent::CastInterrupted { .. })));
    assert!(!events
        .iter()
        .any(|e| matches!(e, SpellEvent::CastFinished { .. })));
}

#[test]
fn test_cancel_cast_is_free_and_idempotent() {
    let mut region = region();
    let caster = region.insert(pyromancer());

    region.cast(caster, "pyromancy", HASTEN_WITS, None).unwrap();
    assert!(region.cancel_cast(caster));
    assert!(!region.cancel_cast(caster));

    region.advance(10_000);
    assert_eq!(region.entity(caster).unwrap().power, 100);
    assert_eq!(region.entity(caster).unwrap().effects.len(), 0);
}

#[test]
fn test_instant_spell_resolves_in_call() {
    let mut region = region();
    let mut c = pyromancer();
    c.health = 100;
    let caster = region.insert(c);

    let outcome = region.cast(caster, "pyromancy", MEND, None).unwrap();
    assert_eq!(outcome, CastOutcome::Resolved);
    let c = region.entity(caster).unwrap();
    assert_eq!(c.health, 150);
    assert_eq!(c.power, 90);
}

#[test]
fn test_direct_damage_lands_on_enemy() {
    let mut region = region();
    let caster = region.insert(pyromancer());
    let dummy = region.insert(training_dummy());

    region
        .cast(caster, "pyromancy", FIREBOLT, Some(dummy))
        .unwrap();
    region.advance(3000);

    let d = region.entity(dummy).unwrap();
    assert!(d.health < d.max_health);
    assert_eq!(region.entity(caster).unwrap().power, 60);
    let events = region.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SpellEvent::Damage { amount, .. } if *amount > 0)));
}

#[test]
fn test_range_bonus_stretches_cast_range() {
    let mut region = region();
    let caster = region.insert(pyromancer());
    let dummy = region.insert(training_dummy());

    // just past the authored 1500 range
    region.entity_mut(dummy).unwrap().position = Position::new(1600.0, 0.0);
    let outcome = region
        .cast(caster, "pyromancy", FIREBOLT, Some(dummy))
        .unwrap();
    assert_eq!(outcome, CastOutcome::Refused(CastRefusal::TargetTooFar));

    // a 10% range bonus reaches 1650
    region.entity_mut(caster).unwrap().bonuses.spell_range_pct = 10;
    let outcome = region
        .cast(caster, "pyromancy", FIREBOLT, Some(dummy))
        .unwrap();
    assert_eq!(outcome, CastOutcome::Started { cast_ms: 3000 });
}

#[test]
fn test_validation_refusals() {
    let mut region = region();
    let caster = region.insert(pyromancer());
    let dummy = region.insert(training_dummy());

    // no target
    let outcome = region.cast(caster, "pyromancy", FIREBOLT, None).unwrap();
    assert_eq!(outcome, CastOutcome::Refused(CastRefusal::NoTarget));

    // out of range
    region.entity_mut(dummy).unwrap().position = Position::new(5000.0, 0.0);
    let outcome = region
        .cast(caster, "pyromancy", FIREBOLT, Some(dummy))
        .unwrap();
    assert_eq!(outcome, CastOutcome::Refused(CastRefusal::TargetTooFar));
    region.entity_mut(dummy).unwrap().position = Position::new(0.0, 0.0);

    // not enough power
    region.entity_mut(caster).unwrap().power = 39;
    let outcome = region
        .cast(caster, "pyromancy", FIREBOLT, Some(dummy))
        .unwrap();
    assert_eq!(outcome, CastOutcome::Refused(CastRefusal::InsufficientPower));
    region.entity_mut(caster).unwrap().power = 100;

    // sitting
    region.entity_mut(caster).unwrap().sitting = true;
    let outcome = region
        .cast(caster, "pyromancy", FIREBOLT, Some(dummy))
        .unwrap();
    assert_eq!(outcome, CastOutcome::Refused(CastRefusal::Sitting));
    region.entity_mut(caster).unwrap().sitting = false;

    // one session at a time
    region
        .cast(caster, "pyromancy", FIREBOLT, Some(dummy))
        .unwrap();
    let outcome = region
        .cast(caster, "pyromancy", FIREBOLT, Some(dummy))
        .unwrap();
    assert_eq!(outcome, CastOutcome::Refused(CastRefusal::AlreadyCasting));
}

#[test]
fn test_dead_target_fizzles_at_fire_time() {
    let mut region = region();
    let caster = region.insert(pyromancer());
    let dummy = region.insert(training_dummy());

    region
        .cast(caster, "pyromancy", FIREBOLT, Some(dummy))
        .unwrap();
    region.advance(1000);
    region.kill(dummy);
    region.advance(5000);

    // the window elapsed against a corpse: no cost, no damage
    assert_eq!(region.entity(caster).unwrap().power, 100);
    let events = region.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SpellEvent::CastInterrupted { .. })));
}

#[test]
fn test_recast_delay_locks_spell() {
    let mut region = region();
    let caster = region.insert(pyromancer());

    region.cast(caster, "pyromancy", EMBER_SHELL, None).unwrap();
    region.advance(2000);
    assert_eq!(region.entity(caster).unwrap().effects.len(), 1);

    let outcome = region.cast(caster, "pyromancy", EMBER_SHELL, None).unwrap();
    assert!(matches!(
        outcome,
        CastOutcome::Refused(CastRefusal::Recovering(_))
    ));

    region.advance(15_000);
    let outcome = region.cast(caster, "pyromancy", EMBER_SHELL, None).unwrap();
    assert!(matches!(outcome, CastOutcome::Started { .. }));
}

#[test]
fn test_attack_lockout_blocks_new_casts() {
    let mut region = region();
    let caster = region.insert(pyromancer());
    let dummy = region.insert(training_dummy());

    region.on_attacked(caster, dummy);
    let outcome = region.cast(caster, "pyromancy", HASTEN_WITS, None).unwrap();
    assert_eq!(
        outcome,
        CastOutcome::Refused(CastRefusal::RecentlyInterrupted)
    );
    // instants ignore the lockout
    let outcome = region.cast(caster, "pyromancy", MEND, None).unwrap();
    assert_eq!(outcome, CastOutcome::Resolved);

    // lockout expires with the clock
    region.advance(region.config().spell_interrupt_ms);
    let outcome = region.cast(caster, "pyromancy", HASTEN_WITS, None).unwrap();
    assert!(matches!(outcome, CastOutcome::Started { .. }));
}

#[test]
fn test_sight_check_round_trip() {
    let mut cfg = TuningConfig::default();
    cfg.require_sight_confirmation = true;
    let mut region = Region::new(cfg, catalog(), 0xCA57);
    let caster = region.insert(pyromancer());
    let dummy = region.insert(training_dummy());

    region
        .cast(caster, "pyromancy", FIREBOLT, Some(dummy))
        .unwrap();
    region.advance(3000);
    let events = region.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SpellEvent::SightCheckRequested { .. })));
    // nothing paid or applied while waiting
    assert_eq!(region.entity(caster).unwrap().power, 100);
    assert_eq!(region.entity(dummy).unwrap().health, region.entity(dummy).unwrap().max_health);

    region.deliver_sight(caster, true);
    assert_eq!(region.entity(caster).unwrap().power, 60);
    assert!(region.entity(dummy).unwrap().health < region.entity(dummy).unwrap().max_health);
}

#[test]
fn test_sight_denied_fails_without_cost() {
    let mut cfg = TuningConfig::default();
    cfg.require_sight_confirmation = true;
    let mut region = Region::new(cfg, catalog(), 0xCA57);
    let caster = region.insert(pyromancer());
    let dummy = region.insert(training_dummy());

    region
        .cast(caster, "pyromancy", FIREBOLT, Some(dummy))
        .unwrap();
    region.advance(3000);
    region.drain_events();

    region.deliver_sight(caster, false);
    assert_eq!(region.entity(caster).unwrap().power, 100);
    assert_eq!(
        region.entity(dummy).unwrap().health,
        region.entity(dummy).unwrap().max_health
    );
    let events = region.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SpellEvent::CastInterrupted { .. })));
}

#[test]
fn test_dexterity_shortens_cast_window() {
    let mut region = region();
    let mut quick = pyromancer();
    quick.dexterity = 250;
    let caster = region.insert(quick);

    let outcome = region.cast(caster, "pyromancy", HASTEN_WITS, None).unwrap();
    let CastOutcome::Started { cast_ms } = outcome else {
        panic!("expected a timed cast");
    };
    // 250 dex trims 28.5% off the 3s base
    assert!(cast_ms < 3000);
    assert_eq!(cast_ms, 2200);

    region.advance(cast_ms);
    assert_eq!(region.entity(caster).unwrap().effects.len(), 1);
}
