//! Individual combatants.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::declaration::WeaponDice;
use super::encounter::{EntityId, Side};
use super::virtue::{derived_conditions, Condition, Virtue, Vitals};

/// Whether a combatant fights alone or stands in for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Individual,
    WarbandMember,
}

/// Life status. `Slain` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStatus {
    Alive,
    MortallyWounded,
    Slain,
}

/// One of the three special combat feats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feat {
    Smite,
    Focus,
    Deny,
}

impl Feat {
    /// The Virtue that saves against Fatigue when this feat is used.
    pub const fn save_virtue(self) -> Virtue {
        match self {
            Feat::Smite => Virtue::Vigour,
            Feat::Focus => Virtue::Clarity,
            Feat::Deny => Virtue::Spirit,
        }
    }
}

/// Body location struck by a Scar that calls for a location sub-roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyLocation {
    Head,
    Torso,
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
}

impl BodyLocation {
    /// Maps a d6 face to a location.
    pub const fn from_d6(face: u8) -> BodyLocation {
        match face {
            0 | 1 => BodyLocation::Head,
            2 => BodyLocation::Torso,
            3 => BodyLocation::LeftArm,
            4 => BodyLocation::RightArm,
            5 => BodyLocation::LeftLeg,
            _ => BodyLocation::RightLeg,
        }
    }
}

/// The named entries of the Scar table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScarKind {
    Haunted,
    Disfigured,
    Smashed,
    Dazed,
    Ruptured,
    Gouged,
    Hardened,
    Wizened,
    BattleWorn,
    Humbled,
    Tempered,
    LegendMarked,
}

/// A permanent consequence, with every rolled amount already fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scar {
    pub kind: ScarKind,
    /// The face of the die that caused the Scar.
    pub face: u8,
    pub location: Option<BodyLocation>,
    /// Virtue lost and how much was actually removed.
    pub virtue_loss: Option<(Virtue, u8)>,
    pub max_guard_gain: u8,
}

/// An individual combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: EntityId,
    pub name: String,
    pub side: Side,
    pub role: Role,
    pub vitals: Vitals,
    pub weapon: WeaponDice,
    /// Explicitly applied conditions. Virtue-derived ones are computed.
    pub conditions: BTreeSet<Condition>,
    pub scars: Vec<Scar>,
    /// Feats already used since the last rest.
    pub feats_used: BTreeSet<Feat>,
    pub status: LifeStatus,
    /// Days spent Mortally Wounded without aid.
    pub mortal_wound_days: u32,
    /// Round after which an explicit Impaired condition lapses.
    pub impaired_until: Option<u32>,
    /// Not ready when combat starts: must pass a Clarity save or lose the first round.
    pub unprepared: bool,
    pub surprised: bool,
    /// Warband this combatant is leading from the front, if any.
    pub leading: Option<EntityId>,
}

impl Combatant {
    pub fn new(id: EntityId, name: impl Into<String>, side: Side, vitals: Vitals, weapon: WeaponDice) -> Self {
        Combatant {
            id,
            name: name.into(),
            side,
            role: Role::Individual,
            vitals,
            weapon,
            conditions: BTreeSet::new(),
            scars: Vec::new(),
            feats_used: BTreeSet::new(),
            status: LifeStatus::Alive,
            mortal_wound_days: 0,
            impaired_until: None,
            unprepared: false,
            surprised: false,
            leading: None,
        }
    }

    /// Explicit conditions merged with those derived from Virtues.
    pub fn all_conditions(&self) -> BTreeSet<Condition> {
        let mut set = derived_conditions(&self.vitals.virtues);
        set.extend(self.conditions.iter().copied());
        set
    }

    pub fn has_condition(&self, condition: Condition) -> bool {
        self.conditions.contains(&condition) || derived_conditions(&self.vitals.virtues).contains(&condition)
    }

    pub fn is_slain(&self) -> bool {
        self.status == LifeStatus::Slain
    }

    /// Still fighting. Mortally Wounded combatants are down.
    pub fn is_standing(&self) -> bool {
        self.status == LifeStatus::Alive
    }
}
