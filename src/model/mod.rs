//! Combat state types.
//!
//! Combatants, Warbands, Structures, the declarations that act on them, and
//! the encounter arena that holds them all.

pub mod combatant;
pub mod declaration;
pub mod encounter;
pub mod structure;
pub mod virtue;
pub mod warband;

pub use combatant::{BodyLocation, Combatant, Feat, LifeStatus, Role, Scar, ScarKind};
pub use declaration::{
    AttackDeclaration, AttackRange, Declaration, DieSlot, GambitEffect, GambitIntent, SmiteMode,
    StrongGambit, WeaponDice, WithdrawKind,
};
pub use encounter::{EndReason, Encounter, Entity, EntityId, RoundPhase, ScarEvent, Side};
pub use structure::{DamageSource, Structure, StructureKind, VesselClass};
pub use virtue::{Condition, Virtue, Virtues, Vitals, VIRTUE_MAX};
pub use warband::{Warband, WarbandStatus};
