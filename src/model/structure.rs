//! Fortifications, vessels, and siege engines.
//!
//! Structures have Guard and Armor but no Virtues. Each carries an
//! allow-list of damage sources that can hurt it at all.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::encounter::{EntityId, Side};

/// Where a hit's damage comes from, for allow-list purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageSource {
    /// Weapons and fists.
    Ordinary,
    Fire,
    Siege,
    LargeCreature,
    /// Vessel striking vessel.
    Collision,
}

/// Vessel size classes, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VesselClass {
    Skiff,
    Longship,
    Galley,
    Carrack,
    Galleon,
}

impl VesselClass {
    pub const fn rank(self) -> u8 {
        match self {
            VesselClass::Skiff => 0,
            VesselClass::Longship => 1,
            VesselClass::Galley => 2,
            VesselClass::Carrack => 3,
            VesselClass::Galleon => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "class")]
pub enum StructureKind {
    Fortification,
    Gate,
    Wall,
    SiegeEngine,
    Ship(VesselClass),
}

impl StructureKind {
    /// Sources that can damage this kind of structure unless the setup says otherwise.
    pub fn default_allow_list(self) -> BTreeSet<DamageSource> {
        let mut allow: BTreeSet<DamageSource> =
            [DamageSource::Fire, DamageSource::Siege, DamageSource::LargeCreature].into_iter().collect();
        if matches!(self, StructureKind::Ship(_)) {
            allow.insert(DamageSource::Collision);
        }
        allow
    }

    /// Reinforced walls shrug off conventional damage; their gates are the weak point.
    pub const fn default_breachable(self) -> bool {
        !matches!(self, StructureKind::Wall)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub id: EntityId,
    pub name: String,
    /// Owning side, if the structure belongs to a combatant side.
    pub side: Option<Side>,
    pub kind: StructureKind,
    pub guard: u8,
    pub max_guard: u8,
    pub armor: u8,
    pub allow: BTreeSet<DamageSource>,
    pub breachable: bool,
    pub destroyed: bool,
    /// Days of repair accumulated toward the next point of Guard.
    pub repair_days: u32,
}

impl Structure {
    /// Creates an intact structure with its kind's default allow-list.
    pub fn new(id: EntityId, name: impl Into<String>, kind: StructureKind, max_guard: u8, armor: u8) -> Self {
        Structure {
            id,
            name: name.into(),
            side: None,
            kind,
            guard: max_guard,
            max_guard,
            armor,
            allow: kind.default_allow_list(),
            breachable: kind.default_breachable(),
            destroyed: false,
            repair_days: 0,
        }
    }

    pub fn is_ship(&self) -> bool {
        matches!(self.kind, StructureKind::Ship(_))
    }

    pub fn vessel_class(&self) -> Option<VesselClass> {
        match self.kind {
            StructureKind::Ship(class) => Some(class),
            _ => None,
        }
    }

    pub fn accepts(&self, source: DamageSource) -> bool {
        self.breachable && self.allow.contains(&source)
    }
}
