//! Encounter setup payloads.
//!
//! The content loader describes an encounter as JSON: the combatants, the
//! Warbands, and the structures taking part. [`parse_setup`] validates it and
//! builds the arena the engine fights over.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::RulesConfig;
use crate::model::combatant::{Combatant, Feat, Role, Scar};
use crate::model::declaration::WeaponDice;
use crate::model::encounter::{Encounter, Entity, EntityId, Side};
use crate::model::structure::{DamageSource, Structure, StructureKind};
use crate::model::virtue::{Condition, Virtue, Virtues, Vitals, VIRTUE_MAX};
use crate::model::warband::Warband;

/// Errors that can occur when loading an encounter setup.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("malformed setup payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("handle {0} is used more than once")]
    DuplicateId(EntityId),

    #[error("warband {warband} is led by {officer}, which is not a combatant on its side")]
    DanglingOfficer { warband: EntityId, officer: EntityId },

    #[error("{id} has {virtue:?} {value}, above the maximum of {}", VIRTUE_MAX)]
    VirtueOutOfRange { id: EntityId, virtue: Virtue, value: u8 },

    #[error("{id} starts with guard {guard} above its maximum of {max}")]
    GuardAboveMax { id: EntityId, guard: u8, max: u8 },

    #[error("setup has no combatants or warbands")]
    Empty,
}

fn no_role() -> Role {
    Role::Individual
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantSetup {
    pub id: EntityId,
    pub name: String,
    pub side: Side,
    #[serde(default = "no_role")]
    pub role: Role,
    pub vigour: u8,
    pub clarity: u8,
    pub spirit: u8,
    /// Maximum Guard.
    pub guard: u8,
    /// Current Guard, when it starts below the maximum.
    #[serde(default)]
    pub current_guard: Option<u8>,
    #[serde(default)]
    pub armor: u8,
    pub weapon: WeaponDice,
    #[serde(default)]
    pub unprepared: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub feats_used: Vec<Feat>,
    /// Scars carried in from earlier fights. Their Virtue and Guard changes
    /// are already reflected in the scores above.
    #[serde(default)]
    pub scars: Vec<Scar>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarbandSetup {
    pub id: EntityId,
    pub name: String,
    pub side: Side,
    pub vigour: u8,
    pub clarity: u8,
    pub spirit: u8,
    pub guard: u8,
    #[serde(default)]
    pub armor: u8,
    pub weapon: WeaponDice,
    #[serde(default)]
    pub unprepared: bool,
    /// An officer already leading the unit when battle is joined.
    #[serde(default)]
    pub led_by: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureSetup {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub side: Option<Side>,
    pub kind: StructureKind,
    pub guard: u8,
    #[serde(default)]
    pub armor: u8,
    /// Overrides the kind's default allow-list.
    #[serde(default)]
    pub allow: Option<BTreeSet<DamageSource>>,
    #[serde(default)]
    pub breachable: Option<bool>,
}

/// The whole setup payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterSetup {
    #[serde(default)]
    pub combatants: Vec<CombatantSetup>,
    #[serde(default)]
    pub warbands: Vec<WarbandSetup>,
    #[serde(default)]
    pub structures: Vec<StructureSetup>,
}

fn check_virtues(id: EntityId, vigour: u8, clarity: u8, spirit: u8) -> Result<Virtues, SetupError> {
    for (virtue, value) in [(Virtue::Vigour, vigour), (Virtue::Clarity, clarity), (Virtue::Spirit, spirit)] {
        if value > VIRTUE_MAX {
            return Err(SetupError::VirtueOutOfRange { id, virtue, value });
        }
    }
    Ok(Virtues::new(vigour, clarity, spirit))
}

impl EncounterSetup {
    /// Validates the payload and builds an encounter at the Start phase.
    pub fn build(self, rules: RulesConfig) -> Result<Encounter, SetupError> {
        if self.combatants.is_empty() && self.warbands.is_empty() {
            return Err(SetupError::Empty);
        }
        let mut encounter = Encounter::new(rules);

        for c in &self.combatants {
            let virtues = check_virtues(c.id, c.vigour, c.clarity, c.spirit)?;
            let mut vitals = Vitals::new(virtues, c.guard, c.armor);
            if let Some(guard) = c.current_guard {
                if guard > c.guard {
                    return Err(SetupError::GuardAboveMax { id: c.id, guard, max: c.guard });
                }
                vitals.guard = guard;
            }
            let mut combatant = Combatant::new(c.id, c.name.clone(), c.side, vitals, c.weapon);
            combatant.role = c.role;
            combatant.unprepared = c.unprepared;
            combatant.conditions = c.conditions.iter().copied().collect();
            combatant.feats_used = c.feats_used.iter().copied().collect();
            combatant.scars = c.scars.clone();
            if !encounter.insert(Entity::Combatant(combatant)) {
                return Err(SetupError::DuplicateId(c.id));
            }
        }

        for w in &self.warbands {
            let virtues = check_virtues(w.id, w.vigour, w.clarity, w.spirit)?;
            let mut warband = Warband::new(w.id, w.name.clone(), w.side, Vitals::new(virtues, w.guard, w.armor), w.weapon);
            warband.unprepared = w.unprepared;
            if !encounter.insert(Entity::Warband(warband)) {
                return Err(SetupError::DuplicateId(w.id));
            }
        }

        for s in &self.structures {
            let mut structure = Structure::new(s.id, s.name.clone(), s.kind, s.guard, s.armor);
            structure.side = s.side;
            if let Some(allow) = &s.allow {
                structure.allow = allow.clone();
            }
            if let Some(breachable) = s.breachable {
                structure.breachable = breachable;
            }
            if !encounter.insert(Entity::Structure(structure)) {
                return Err(SetupError::DuplicateId(s.id));
            }
        }

        for w in &self.warbands {
            let Some(officer) = w.led_by else { continue };
            let linked = match encounter.entities.get_mut(&officer) {
                Some(Entity::Combatant(c)) if c.side == w.side && c.leading.is_none() => {
                    c.leading = Some(w.id);
                    true
                }
                _ => false,
            };
            if !linked {
                return Err(SetupError::DanglingOfficer { warband: w.id, officer });
            }
            if let Some(Entity::Warband(unit)) = encounter.entities.get_mut(&w.id) {
                unit.led_by = Some(officer);
            }
        }

        tracing::info!(
            combatants = self.combatants.len(),
            warbands = self.warbands.len(),
            structures = self.structures.len(),
            "encounter set up"
        );
        Ok(encounter)
    }
}

/// Parses and validates a JSON setup payload.
pub fn parse_setup(json: &str, rules: RulesConfig) -> Result<Encounter, SetupError> {
    let setup: EncounterSetup = serde_json::from_str(json)?;
    setup.build(rules)
}
