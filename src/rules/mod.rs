//! Combat rules.
//!
//! Damage and Scars, Gambits and Feats, attack resolution, Warband and
//! structure rules, and the round state machine that drives them.

pub mod attack;
pub mod damage;
pub mod feat;
pub mod gambit;
pub mod outcome;
pub mod round;
pub mod scar;
pub mod siege;
pub mod unit;

pub use attack::resolve_attack;
pub use damage::{apply_damage, DamageReport};
pub use gambit::{resolve_gambit, Funding};
pub use outcome::{
    EncounterSummary, FeatOutcome, GambitOutcome, OfficerShare, PooledDie, ResolutionOutcome, RoundReport,
    StatusChange, StatusTransition, SurpriseReport, TimeReport,
};
pub use round::{
    adjust_virtue, advance_days, begin_encounter, conclude, next_phase, resolve_round, rest, summary, tend,
};
pub use scar::{apply_scar, roll_scar, ScarDescriptor};
pub use siege::{apply_structural_damage, collide, repair_ship, CollisionReport, StructuralReport};
pub use unit::apply_unit_damage;
