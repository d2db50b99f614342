//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for combat entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a spell definition within its line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpellId(pub u32);

/// Identifier of a live effect on some target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectId(pub u64);

/// Handle to a scheduled timer entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Group membership tag for group-targeted spells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// Realm affiliation; spells with realm rules compare these
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Realm {
    Albion,
    Midgard,
    Hibernia,
    /// Unaligned monsters
    None,
}

impl Realm {
    /// Entities of the same named realm cannot attack each other;
    /// anything involving an unaligned side is fair game.
    pub fn hostile_to(self, other: Realm) -> bool {
        self == Realm::None || other == Realm::None || self != other
    }
}

/// 2D world position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Typed reason attached to every power mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerChangeReason {
    CastingCost,
    PulseCost,
    Regeneration,
    Drain,
    Admin,
}

/// Stat slots that effects may shift up or down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    Dexterity,
    Acuity,
    ArmorFactor,
    MoveSpeed,
    PowerRegen,
    HealthRegen,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_unique() {
        assert_ne!(EntityId::new(), EntityId::new());
    }

    #[test]
    fn test_realm_hostility() {
        assert!(Realm::Albion.hostile_to(Realm::Midgard));
        assert!(!Realm::Albion.hostile_to(Realm::Albion));
        // unaligned monsters can be attacked by everyone, including each other
        assert!(Realm::None.hostile_to(Realm::None));
        assert!(Realm::Hibernia.hostile_to(Realm::None));
    }

    #[test]
    fn test_position_distance() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < f32::EPSILON);
    }
}
