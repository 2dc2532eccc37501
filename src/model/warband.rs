//! Warbands: roughly two dozen fighters acting as one combat entity.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::declaration::WeaponDice;
use super::encounter::{EntityId, Side};
use super::virtue::{derived_conditions, Condition, Vitals};

/// Morale-derived status of a Warband.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarbandStatus {
    Active,
    /// Spirit 0: still on the field, no longer follows orders.
    Broken,
    /// Took a crippling blow and fled; out of the encounter but not destroyed.
    Routed,
    /// Vigour 0: permanently removed.
    WipedOut,
}

impl WarbandStatus {
    /// Still on the field.
    pub const fn is_present(self) -> bool {
        matches!(self, WarbandStatus::Active | WarbandStatus::Broken)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warband {
    pub id: EntityId,
    pub name: String,
    pub side: Side,
    pub vitals: Vitals,
    pub weapon: WeaponDice,
    pub conditions: BTreeSet<Condition>,
    pub status: WarbandStatus,
    /// Officer currently leading from the front.
    pub led_by: Option<EntityId>,
    pub impaired_until: Option<u32>,
    pub unprepared: bool,
    pub surprised: bool,
}

impl Warband {
    pub fn new(id: EntityId, name: impl Into<String>, side: Side, vitals: Vitals, weapon: WeaponDice) -> Self {
        Warband {
            id,
            name: name.into(),
            side,
            vitals,
            weapon,
            conditions: BTreeSet::new(),
            status: WarbandStatus::Active,
            led_by: None,
            impaired_until: None,
            unprepared: false,
            surprised: false,
        }
    }

    pub fn all_conditions(&self) -> BTreeSet<Condition> {
        let mut set = derived_conditions(&self.vitals.virtues);
        set.extend(self.conditions.iter().copied());
        set
    }

    pub fn has_condition(&self, condition: Condition) -> bool {
        self.conditions.contains(&condition) || derived_conditions(&self.vitals.virtues).contains(&condition)
    }
}
