//! Warband combat engine library.
//!
//! Deterministic resolution for tabletop combat: Virtues and Guard, Scars,
//! Gambits and Feats, Warbands, and siege and naval structures, driven one
//! round at a time. Exposes the rules, the line protocol, and batch skirmish
//! simulation to the binaries and integration tests.

pub mod config;
pub mod dice;
pub mod engine;
pub mod error;
pub mod model;
pub mod protocol;
pub mod rules;
pub mod skirmish;
