//! Engine state management.
//!
//! Holds the loaded encounter, the dice, the active rules table and the
//! driver options, and turns each protocol command into a reply line.

use std::collections::HashMap;
use std::io::{self, Write};

use serde::Serialize;

use crate::config::{ConfigError, RulesConfig};
use crate::dice::SeededDice;
use crate::error::EngineError;
use crate::model::declaration::{Declaration, WithdrawKind};
use crate::model::encounter::{Encounter, EntityId, Side};
use crate::model::virtue::Virtue;
use crate::protocol::report::{write_error, write_line, write_reply, OpOutcome};
use crate::protocol::setup::{parse_setup, SetupError};
use crate::rules::outcome::{EncounterSummary, RoundReport};
use crate::rules::{self, siege};

/// Why a command could not be carried out.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("no encounter loaded")]
    NoEncounter,

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("malformed declarations: {0}")]
    Declarations(serde_json::Error),

    #[error("option {name} needs a value")]
    MissingValue { name: String },

    #[error("invalid value {value:?} for option {name}")]
    BadOption { name: String, value: String },
}

/// Holds the mutable state of the engine between commands.
pub struct Engine {
    pub encounter: Option<Encounter>,
    pub options: HashMap<String, String>,
    rules: RulesConfig,
    dice: SeededDice,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an engine with no encounter, default rules and entropy-seeded dice.
    pub fn new() -> Self {
        Engine {
            encounter: None,
            options: HashMap::new(),
            rules: RulesConfig::default(),
            dice: SeededDice::new(0),
        }
    }

    /// Creates an engine whose dice replay from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        let mut engine = Self::new();
        engine.dice = SeededDice::new(seed);
        engine
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// Sets an engine option.
    ///
    /// `Seed` reseeds the dice immediately. `Rules` loads a TOML rules file
    /// that applies to encounters loaded afterwards. Other names are stored
    /// as given.
    pub fn set_option(&mut self, name: String, value: Option<String>) -> Result<(), CommandError> {
        match name.as_str() {
            "Seed" => {
                let raw = value.clone().ok_or_else(|| CommandError::MissingValue { name: name.clone() })?;
                let seed = raw
                    .parse::<u64>()
                    .map_err(|_| CommandError::BadOption { name: name.clone(), value: raw })?;
                self.dice = SeededDice::new(seed);
                tracing::info!(seed, "dice reseeded");
            }
            "Rules" => {
                let path = value.clone().ok_or_else(|| CommandError::MissingValue { name: name.clone() })?;
                self.rules = RulesConfig::load(&path)?;
                tracing::info!(path = %path, "rules loaded");
            }
            other => tracing::debug!(option = other, "storing unrecognised option"),
        }
        self.options.insert(name, value.unwrap_or_default());
        Ok(())
    }

    /// Replaces the current encounter with one built from a setup payload.
    pub fn load_encounter(&mut self, json: &str) -> Result<&Encounter, CommandError> {
        let encounter = parse_setup(json, self.rules.clone())?;
        Ok(self.encounter.insert(encounter))
    }

    fn loaded(&self) -> Result<&Encounter, CommandError> {
        self.encounter.as_ref().ok_or(CommandError::NoEncounter)
    }

    pub fn begin(&mut self) -> Result<OpOutcome, CommandError> {
        let encounter = self.encounter.as_mut().ok_or(CommandError::NoEncounter)?;
        let report = rules::begin_encounter(encounter, &mut self.dice)?;
        Ok(OpOutcome::Begin(report))
    }

    /// Resolves one round from a JSON array of declarations.
    pub fn declare(&mut self, json: &str) -> Result<RoundReport, CommandError> {
        let declarations: Vec<Declaration> = serde_json::from_str(json).map_err(CommandError::Declarations)?;
        let encounter = self.encounter.as_mut().ok_or(CommandError::NoEncounter)?;
        Ok(rules::resolve_round(encounter, &declarations, &mut self.dice)?)
    }

    pub fn conclude(&mut self, kind: WithdrawKind, side: Side) -> Result<OpOutcome, CommandError> {
        let encounter = self.encounter.as_mut().ok_or(CommandError::NoEncounter)?;
        let end = rules::conclude(encounter, kind, side)?;
        Ok(OpOutcome::Conclude { end })
    }

    pub fn advance(&mut self, days: u32) -> Result<OpOutcome, CommandError> {
        let encounter = self.encounter.as_mut().ok_or(CommandError::NoEncounter)?;
        Ok(OpOutcome::Advance(rules::advance_days(encounter, days)?))
    }

    pub fn rest(&mut self, id: EntityId) -> Result<OpOutcome, CommandError> {
        let encounter = self.encounter.as_mut().ok_or(CommandError::NoEncounter)?;
        rules::rest(encounter, id)?;
        Ok(OpOutcome::Rest { id })
    }

    pub fn tend(&mut self, id: EntityId) -> Result<OpOutcome, CommandError> {
        let encounter = self.encounter.as_mut().ok_or(CommandError::NoEncounter)?;
        let stabilised = rules::tend(encounter, id)?;
        Ok(OpOutcome::Tend { id, stabilised })
    }

    pub fn collide(&mut self, first: EntityId, second: EntityId) -> Result<OpOutcome, CommandError> {
        let encounter = self.encounter.as_mut().ok_or(CommandError::NoEncounter)?;
        Ok(OpOutcome::Collide(siege::collide(encounter, first, second, &mut self.dice)?))
    }

    pub fn adjust(&mut self, id: EntityId, virtue: Virtue, delta: i16) -> Result<OpOutcome, CommandError> {
        let encounter = self.encounter.as_mut().ok_or(CommandError::NoEncounter)?;
        let transitions = rules::adjust_virtue(encounter, id, virtue, delta)?;
        Ok(OpOutcome::Adjust { id, transitions })
    }

    pub fn summary(&self) -> Result<EncounterSummary, CommandError> {
        Ok(rules::summary(self.loaded()?))
    }

    /// Handles the handshake: writes id, options and `hellook`.
    pub fn handle_hello<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "id name warband")?;
        writeln!(out, "option name Seed type spin default 0 min 0")?;
        writeln!(out, "option name Rules type string default <builtin>")?;
        write_line(out, "hellook")
    }

    pub fn handle_isready<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_line(out, "readyok")
    }

    /// Applies an option; only failures produce a reply.
    pub fn handle_setoption<W: Write>(&mut self, out: &mut W, name: String, value: Option<String>) -> io::Result<()> {
        match self.set_option(name, value) {
            Ok(()) => Ok(()),
            Err(e) => fail(out, e),
        }
    }

    /// Loads an encounter and echoes its starting state.
    pub fn handle_encounter<W: Write>(&mut self, out: &mut W, json: &str) -> io::Result<()> {
        match self.load_encounter(json) {
            Ok(encounter) => write_reply(out, "state", encounter),
            Err(e) => fail(out, e),
        }
    }

    pub fn handle_begin<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let result = self.begin();
        respond(out, "outcome", result)
    }

    pub fn handle_declare<W: Write>(&mut self, out: &mut W, json: &str) -> io::Result<()> {
        let result = self.declare(json);
        respond(out, "round", result)
    }

    pub fn handle_conclude<W: Write>(&mut self, out: &mut W, kind: WithdrawKind, side: Side) -> io::Result<()> {
        let result = self.conclude(kind, side);
        respond(out, "outcome", result)
    }

    pub fn handle_advance<W: Write>(&mut self, out: &mut W, days: u32) -> io::Result<()> {
        let result = self.advance(days);
        respond(out, "outcome", result)
    }

    pub fn handle_rest<W: Write>(&mut self, out: &mut W, id: EntityId) -> io::Result<()> {
        let result = self.rest(id);
        respond(out, "outcome", result)
    }

    pub fn handle_tend<W: Write>(&mut self, out: &mut W, id: EntityId) -> io::Result<()> {
        let result = self.tend(id);
        respond(out, "outcome", result)
    }

    pub fn handle_collide<W: Write>(&mut self, out: &mut W, first: EntityId, second: EntityId) -> io::Result<()> {
        let result = self.collide(first, second);
        respond(out, "outcome", result)
    }

    pub fn handle_adjust<W: Write>(&mut self, out: &mut W, id: EntityId, virtue: Virtue, delta: i16) -> io::Result<()> {
        let result = self.adjust(id, virtue, delta);
        respond(out, "outcome", result)
    }

    /// Dumps the whole encounter.
    pub fn handle_status<W: Write>(&self, out: &mut W) -> io::Result<()> {
        respond(out, "state", self.loaded())
    }

    pub fn handle_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        respond(out, "summary", self.summary())
    }
}

fn fail<W: Write>(out: &mut W, err: CommandError) -> io::Result<()> {
    tracing::warn!(error = %err, "command failed");
    write_error(out, err)
}

fn respond<W: Write, T: Serialize>(out: &mut W, tag: &str, result: Result<T, CommandError>) -> io::Result<()> {
    match result {
        Ok(value) => write_reply(out, tag, &value),
        Err(e) => fail(out, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::encounter::RoundPhase;

    const DUEL: &str = r#"{"combatants": [
        {"id": 1, "name": "Alda", "side": 0, "vigour": 12, "clarity": 10, "spirit": 9, "guard": 4, "weapon": {"primary": "d8"}},
        {"id": 2, "name": "Bram", "side": 1, "vigour": 10, "clarity": 8, "spirit": 8, "guard": 3, "weapon": {"primary": "d6"}}
    ]}"#;

    fn output(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn new_engine_has_no_state() {
        let engine = Engine::new();
        assert!(engine.encounter.is_none());
        assert!(engine.options.is_empty());
        assert_eq!(engine.rules(), &RulesConfig::default());
    }

    #[test]
    fn hello_lists_options() {
        let engine = Engine::new();
        let text = output(|out| engine.handle_hello(out));
        assert!(text.starts_with("id name warband\n"));
        assert!(text.contains("option name Seed"));
        assert!(text.trim_end().ends_with("hellook"));
    }

    #[test]
    fn isready_replies_readyok() {
        let engine = Engine::new();
        assert_eq!(output(|out| engine.handle_isready(out)), "readyok\n");
    }

    #[test]
    fn seed_option_is_validated() {
        let mut engine = Engine::new();
        assert!(engine.set_option("Seed".into(), Some("17".into())).is_ok());
        assert_eq!(engine.options.get("Seed"), Some(&"17".to_string()));
        assert!(matches!(
            engine.set_option("Seed".into(), Some("many".into())),
            Err(CommandError::BadOption { .. })
        ));
        assert!(matches!(engine.set_option("Rules".into(), None), Err(CommandError::MissingValue { .. })));
    }

    #[test]
    fn missing_rules_file_is_reported() {
        let mut engine = Engine::new();
        let text = output(|out| {
            engine.handle_setoption(out, "Rules".into(), Some("/nonexistent/warband-rules.toml".into()))
        });
        assert!(text.starts_with("error failed to read rules file"));
        assert_eq!(engine.rules(), &RulesConfig::default());
    }

    #[test]
    fn commands_need_an_encounter() {
        let mut engine = Engine::new();
        assert_eq!(output(|out| engine.handle_begin(out)), "error no encounter loaded\n");
        assert_eq!(output(|out| engine.handle_status(out)), "error no encounter loaded\n");
    }

    #[test]
    fn encounter_then_begin() {
        let mut engine = Engine::with_seed(5);
        let text = output(|out| engine.handle_encounter(out, DUEL));
        assert!(text.starts_with("state {"));

        let text = output(|out| engine.handle_begin(out));
        assert!(text.starts_with("outcome {\"op\":\"begin\""), "{}", text);
        let encounter = engine.encounter.as_ref().unwrap();
        assert_eq!(encounter.phase, RoundPhase::ActionDeclaration);
        assert_eq!(encounter.round, 1);
    }

    #[test]
    fn bad_setup_keeps_previous_encounter() {
        let mut engine = Engine::with_seed(5);
        engine.load_encounter(DUEL).unwrap();
        let text = output(|out| engine.handle_encounter(out, "{\"combatants\": 3}"));
        assert!(text.starts_with("error malformed setup payload"));
        assert_eq!(engine.encounter.as_ref().unwrap().entities.len(), 2);
    }

    #[test]
    fn declare_resolves_a_round() {
        let mut engine = Engine::with_seed(9);
        engine.load_encounter(DUEL).unwrap();
        engine.begin().unwrap();
        let json = r#"[
            {"action": "attack", "attacker": 1, "targets": [2], "weapon": {"primary": "d8"}},
            {"action": "attack", "attacker": 2, "targets": [1], "weapon": {"primary": "d6"}}
        ]"#;
        let text = output(|out| engine.handle_declare(out, json));
        assert!(text.starts_with("round {\"round\":1"), "{}", text);
        let encounter = engine.encounter.as_ref().unwrap();
        assert!(encounter.round == 2 || encounter.is_over());
    }

    #[test]
    fn declare_before_begin_is_wrong_phase() {
        let mut engine = Engine::with_seed(9);
        engine.load_encounter(DUEL).unwrap();
        assert!(matches!(engine.declare("[]"), Err(CommandError::Engine(EngineError::WrongPhase { .. }))));
        assert!(matches!(engine.declare("[{]"), Err(CommandError::Declarations(_))));
    }

    #[test]
    fn unknown_handle_is_an_error_reply() {
        let mut engine = Engine::with_seed(1);
        engine.load_encounter(DUEL).unwrap();
        let text = output(|out| engine.handle_tend(out, EntityId(40)));
        assert_eq!(text, "error entity #40 is not part of the active encounter\n");
    }

    #[test]
    fn conclude_and_summarise() {
        let mut engine = Engine::with_seed(3);
        engine.load_encounter(DUEL).unwrap();
        engine.begin().unwrap();
        let text = output(|out| engine.handle_conclude(out, WithdrawKind::Surrender, Side(1)));
        assert!(text.starts_with("outcome {\"op\":\"conclude\""), "{}", text);

        let summary = engine.summary().unwrap();
        assert_eq!(summary.winner, Some(Side(0)));
        assert_eq!(summary.survivors.len(), 2);
    }

    #[test]
    fn adjust_reports_transitions() {
        let mut engine = Engine::with_seed(3);
        engine.load_encounter(DUEL).unwrap();
        let text = output(|out| engine.handle_adjust(out, EntityId(1), Virtue::Spirit, -2));
        assert_eq!(text, "outcome {\"op\":\"adjust\",\"id\":1,\"transitions\":[]}\n");
        let alda = engine.encounter.as_ref().unwrap().combatant(EntityId(1)).unwrap();
        assert_eq!(alda.vitals.virtues.spirit, 7);
    }
}
