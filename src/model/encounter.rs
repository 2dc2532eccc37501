//! Encounter state: an arena of combat entities addressed by stable handles.
//!
//! Relations between entities (an officer leading a Warband) are stored as
//! pairs of handles, never as references, so the whole encounter is a plain
//! value that can be cloned, committed, or thrown away.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::combatant::{Combatant, LifeStatus, Scar};
use super::structure::Structure;
use super::warband::Warband;
use crate::config::RulesConfig;
use crate::error::EngineError;

/// Stable handle for an entity within one encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A side of the fight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Side(pub u8);

/// Phases of the combat round state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Start,
    SurpriseCheck,
    ActionDeclaration,
    Resolution,
    PostResolution,
    End,
}

/// Why an encounter ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum EndReason {
    /// At most one side still has fighters on the field.
    Defeat,
    Retreat { side: Side },
    Surrender { side: Side },
}

/// An entity in the encounter arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "entity")]
pub enum Entity {
    Combatant(Combatant),
    Warband(Warband),
    Structure(Structure),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Combatant(c) => c.id,
            Entity::Warband(w) => w.id,
            Entity::Structure(s) => s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Combatant(c) => &c.name,
            Entity::Warband(w) => &w.name,
            Entity::Structure(s) => &s.name,
        }
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            Entity::Combatant(c) => Some(c.side),
            Entity::Warband(w) => Some(w.side),
            Entity::Structure(s) => s.side,
        }
    }

    /// Slain, wiped out, or destroyed: no further mutation is allowed.
    pub fn is_terminal(&self) -> bool {
        match self {
            Entity::Combatant(c) => c.is_slain(),
            Entity::Warband(w) => w.status == super::warband::WarbandStatus::WipedOut,
            Entity::Structure(s) => s.destroyed,
        }
    }

    /// Removed from the active encounter without being destroyed.
    pub fn has_left(&self) -> bool {
        matches!(self, Entity::Warband(w) if w.status == super::warband::WarbandStatus::Routed)
    }

    /// Counts toward its side still being in the fight.
    pub fn is_standing(&self) -> bool {
        match self {
            Entity::Combatant(c) => c.is_standing(),
            Entity::Warband(w) => w.status.is_present(),
            Entity::Structure(_) => false,
        }
    }
}

/// A Scar earned during this encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScarEvent {
    pub round: u32,
    pub entity: EntityId,
    pub scar: Scar,
}

/// The full state of one encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    pub entities: BTreeMap<EntityId, Entity>,
    pub phase: RoundPhase,
    /// Current round, starting at 1 once the surprise check has run.
    pub round: u32,
    /// Days advanced by the outside world during or since this encounter.
    pub day: u32,
    pub rules: RulesConfig,
    pub end: Option<EndReason>,
    pub scars_gained: Vec<ScarEvent>,
}

impl Encounter {
    pub fn new(rules: RulesConfig) -> Self {
        Encounter {
            entities: BTreeMap::new(),
            phase: RoundPhase::Start,
            round: 0,
            day: 0,
            rules,
            end: None,
            scars_gained: Vec::new(),
        }
    }

    /// Adds an entity. Returns false if the handle is already taken.
    pub fn insert(&mut self, entity: Entity) -> bool {
        let id = entity.id();
        if self.entities.contains_key(&id) {
            return false;
        }
        self.entities.insert(id, entity);
        true
    }

    /// Looks up an entity that is still part of the active encounter.
    pub fn get(&self, id: EntityId) -> Result<&Entity, EngineError> {
        match self.entities.get(&id) {
            Some(e) if !e.has_left() => Ok(e),
            _ => Err(EngineError::InvalidReference(id)),
        }
    }

    /// Looks up an entity for mutation, rejecting terminal ones.
    pub fn get_mut(&mut self, id: EntityId) -> Result<&mut Entity, EngineError> {
        match self.entities.get_mut(&id) {
            Some(e) if e.has_left() => Err(EngineError::InvalidReference(id)),
            Some(e) if e.is_terminal() => Err(EngineError::TerminalStateViolation(id)),
            Some(e) => Ok(e),
            None => Err(EngineError::InvalidReference(id)),
        }
    }

    pub fn combatant(&self, id: EntityId) -> Result<&Combatant, EngineError> {
        match self.get(id)? {
            Entity::Combatant(c) => Ok(c),
            _ => Err(EngineError::WrongKind { id, expected: "combatant" }),
        }
    }

    pub fn combatant_mut(&mut self, id: EntityId) -> Result<&mut Combatant, EngineError> {
        match self.get_mut(id)? {
            Entity::Combatant(c) => Ok(c),
            _ => Err(EngineError::WrongKind { id, expected: "combatant" }),
        }
    }

    pub fn warband(&self, id: EntityId) -> Result<&Warband, EngineError> {
        match self.get(id)? {
            Entity::Warband(w) => Ok(w),
            _ => Err(EngineError::WrongKind { id, expected: "warband" }),
        }
    }

    pub fn warband_mut(&mut self, id: EntityId) -> Result<&mut Warband, EngineError> {
        match self.get_mut(id)? {
            Entity::Warband(w) => Ok(w),
            _ => Err(EngineError::WrongKind { id, expected: "warband" }),
        }
    }

    pub fn structure_mut(&mut self, id: EntityId) -> Result<&mut Structure, EngineError> {
        match self.get_mut(id)? {
            Entity::Structure(s) => Ok(s),
            _ => Err(EngineError::WrongKind { id, expected: "structure" }),
        }
    }

    /// Sides that still have a fighter on the field, in ascending order.
    pub fn standing_sides(&self) -> Vec<Side> {
        let mut sides: Vec<Side> = self
            .entities
            .values()
            .filter(|e| e.is_standing())
            .filter_map(|e| e.side())
            .collect();
        sides.sort();
        sides.dedup();
        sides
    }

    /// Every side named by a combatant or Warband.
    pub fn sides(&self) -> Vec<Side> {
        let mut sides: Vec<Side> = self
            .entities
            .values()
            .filter(|e| !matches!(e, Entity::Structure(_)))
            .filter_map(|e| e.side())
            .collect();
        sides.sort();
        sides.dedup();
        sides
    }

    /// Combatants that are neither slain nor fled.
    pub fn survivors(&self) -> impl Iterator<Item = &Combatant> {
        self.entities.values().filter_map(|e| match e {
            Entity::Combatant(c) if c.status != LifeStatus::Slain => Some(c),
            _ => None,
        })
    }

    pub fn is_over(&self) -> bool {
        self.phase == RoundPhase::End
    }
}
