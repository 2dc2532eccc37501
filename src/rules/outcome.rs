//! Structured results handed back to callers.
//!
//! These records are the engine's whole outbound surface: one
//! [`ResolutionOutcome`] per defender per round, rolled up into a
//! [`RoundReport`], and an [`EncounterSummary`] once the fight is over.

use serde::{Deserialize, Serialize};

use super::damage::DamageReport;
use super::siege::StructuralReport;
use crate::dice::{Die, SaveRoll};
use crate::error::Rejection;
use crate::model::combatant::{Feat, LifeStatus, Scar};
use crate::model::declaration::{DieSlot, GambitEffect, StrongGambit};
use crate::model::encounter::{EndReason, EntityId, ScarEvent, Side};
use crate::model::virtue::Condition;
use crate::model::warband::WarbandStatus;

/// One rolled die in an attack pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PooledDie {
    /// Index of the declaration that contributed the die.
    pub declaration: usize,
    /// Who rolled it. Differs from the declaring attacker for an officer's die.
    pub owner: EntityId,
    pub slot: DieSlot,
    pub die: Die,
    pub face: u8,
}

/// A Gambit that was funded and resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GambitOutcome {
    pub owner: EntityId,
    pub effect: GambitEffect,
    /// Face of the funding die; `None` when performed through Focus.
    pub face: Option<u8>,
    pub strong: Option<StrongGambit>,
    pub focused: bool,
    /// The defender's Vigour save, when one was allowed.
    pub save: Option<SaveRoll>,
    /// Whether the effect took hold.
    pub applied: bool,
}

/// The cost roll for a Feat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatOutcome {
    pub feat: Feat,
    pub actor: EntityId,
    pub save: SaveRoll,
    /// The save failed and the actor is now Fatigued.
    pub fatigued: bool,
}

/// A change of status worth narrating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "change", content = "condition")]
pub enum StatusChange {
    MortallyWounded,
    Slain,
    Stabilised,
    Broken,
    Routed,
    WipedOut,
    Destroyed,
    Surprised,
    ConditionGained(Condition),
    ConditionLost(Condition),
}

impl StatusChange {
    /// The morale change that produced a Warband status, if any.
    pub fn from_warband_status(status: WarbandStatus) -> Option<StatusChange> {
        match status {
            WarbandStatus::Active => None,
            WarbandStatus::Broken => Some(StatusChange::Broken),
            WarbandStatus::Routed => Some(StatusChange::Routed),
            WarbandStatus::WipedOut => Some(StatusChange::WipedOut),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub entity: EntityId,
    #[serde(flatten)]
    pub change: StatusChange,
}

impl StatusTransition {
    pub fn new(entity: EntityId, change: StatusChange) -> Self {
        StatusTransition { entity, change }
    }
}

/// Damage an officer took for leading a Warband from the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerShare {
    pub officer: EntityId,
    pub damage: DamageReport,
    /// Face the officer's Scar is keyed on, once one is due.
    pub scar_face: Option<u8>,
    pub scar: Option<Scar>,
}

/// The result of every attack aimed at one defender in one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub round: u32,
    pub defender: EntityId,
    pub attackers: Vec<EntityId>,
    /// Every die rolled against the defender, Gambit-funding dice included.
    pub dice: Vec<PooledDie>,
    /// Dice discarded by Deny.
    pub denied: Vec<PooledDie>,
    pub base_die: Option<PooledDie>,
    pub bolster: u16,
    pub damage_before_armor: u16,
    pub armor: u8,
    pub damage_after_armor: u16,
    pub guard_delta: i16,
    pub vigour_delta: i16,
    pub guard_zeroed: bool,
    /// Face the Scar is keyed on, once one is due.
    pub scar_face: Option<u8>,
    pub scar: Option<Scar>,
    pub gambits: Vec<GambitOutcome>,
    pub feats: Vec<FeatOutcome>,
    /// Per-source breakdown when the defender is a structure.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structural: Vec<StructuralReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub officer: Option<OfficerShare>,
    pub transitions: Vec<StatusTransition>,
    /// Parts of the declarations against this defender that were dropped.
    pub rejections: Vec<Rejection>,
}

impl ResolutionOutcome {
    pub fn new(round: u32, defender: EntityId) -> Self {
        ResolutionOutcome {
            round,
            defender,
            attackers: Vec::new(),
            dice: Vec::new(),
            denied: Vec::new(),
            base_die: None,
            bolster: 0,
            damage_before_armor: 0,
            armor: 0,
            damage_after_armor: 0,
            guard_delta: 0,
            vigour_delta: 0,
            guard_zeroed: false,
            scar_face: None,
            scar: None,
            gambits: Vec::new(),
            feats: Vec::new(),
            structural: Vec::new(),
            officer: None,
            transitions: Vec::new(),
            rejections: Vec::new(),
        }
    }

    /// Folds a Guard/Vigour hit into the totals.
    pub fn record_hit(&mut self, report: &DamageReport) {
        self.armor = report.armor;
        self.damage_after_armor += report.damage;
        self.guard_delta += report.guard_delta;
        self.vigour_delta += report.vigour_delta;
        self.guard_zeroed |= report.guard_zeroed;
    }
}

/// Result of the surprise check that opens an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurpriseCheck {
    pub entity: EntityId,
    pub save: SaveRoll,
    pub surprised: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurpriseReport {
    pub checks: Vec<SurpriseCheck>,
    /// Set when the encounter was already decided before the first round.
    pub end: Option<EndReason>,
}

impl SurpriseReport {
    pub fn surprised(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.checks.iter().filter(|c| c.surprised).map(|c| c.entity)
    }
}

/// Everything one round produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReport {
    pub round: u32,
    pub outcomes: Vec<ResolutionOutcome>,
    /// Declarations dropped from the batch, in declaration order.
    pub rejections: Vec<Rejection>,
    /// Changes found while settling the round (conditions, morale).
    pub transitions: Vec<StatusTransition>,
    pub end: Option<EndReason>,
}

/// Effects of the outside world advancing time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeReport {
    pub day: u32,
    pub bled_out: Vec<EntityId>,
    /// Ships and the Guard each regained.
    pub repaired: Vec<(EntityId, u8)>,
}

/// A surviving combatant's state at the end of an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurvivorState {
    pub id: EntityId,
    pub name: String,
    pub side: Side,
    pub status: LifeStatus,
    pub guard: u8,
    pub max_guard: u8,
    pub vigour: u8,
    pub clarity: u8,
    pub spirit: u8,
    pub conditions: Vec<Condition>,
    pub scars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    pub id: EntityId,
    pub name: String,
    pub side: Side,
    pub status: WarbandStatus,
    pub vigour: u8,
    pub spirit: u8,
}

/// Final record for the progression and reward layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterSummary {
    /// The only side left standing, if exactly one is.
    pub winner: Option<Side>,
    pub reason: Option<EndReason>,
    pub rounds: u32,
    pub survivors: Vec<SurvivorState>,
    pub warbands: Vec<UnitState>,
    pub destroyed_structures: Vec<EntityId>,
    pub scars_gained: Vec<ScarEvent>,
}
