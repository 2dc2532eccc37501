//! Batch skirmish simulation.
//!
//! Fights one encounter setup many times over with independently seeded
//! dice and a fixed focus-fire script, and tallies who wins. Useful for
//! balancing a fight before it reaches the table.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::mpsc;

use serde::Serialize;

use crate::config::RulesConfig;
use crate::dice::SeededDice;
use crate::error::EngineError;
use crate::model::declaration::{AttackDeclaration, Declaration};
use crate::model::encounter::{EndReason, Encounter, Entity, EntityId, ScarEvent, Side};
use crate::model::warband::WarbandStatus;
use crate::protocol::setup::{EncounterSetup, SetupError};
use crate::rules::outcome::SurvivorState;
use crate::rules::round::can_act;
use crate::rules::{begin_encounter, resolve_round, summary};

/// Configuration for a batch of skirmishes.
#[derive(Debug, Clone)]
pub struct SkirmishConfig {
    /// Number of encounters to fight.
    pub runs: usize,
    /// Rounds after which an undecided fight is abandoned.
    pub max_rounds: u32,
    /// Number of parallel threads.
    pub threads: usize,
    /// Base seed; run `i` uses `seed + i`. 0 draws every run from entropy.
    pub seed: u64,
}

impl Default for SkirmishConfig {
    fn default() -> Self {
        SkirmishConfig { runs: 100, max_rounds: 50, threads: 4, seed: 0 }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SkirmishError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("run {run} failed: {source}")]
    Engine { run: usize, source: EngineError },

    #[error("failed to build thread pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// The result of one simulated encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub run: usize,
    pub seed: u64,
    pub winner: Option<Side>,
    pub end: Option<EndReason>,
    pub rounds: u32,
    /// False when the fight hit the round limit.
    pub decided: bool,
    pub survivors: Vec<SurvivorState>,
    pub scars: Vec<ScarEvent>,
    pub rejections: usize,
}

/// Win rates across a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkirmishSummary {
    pub runs: usize,
    pub wins: BTreeMap<Side, usize>,
    pub undecided: usize,
    pub avg_rounds: f64,
    pub avg_scars: f64,
}

impl SkirmishSummary {
    pub fn win_rate(&self, side: Side) -> f64 {
        let wins = self.wins.get(&side).copied().unwrap_or(0);
        wins as f64 / self.runs.max(1) as f64
    }
}

/// Declarations for one round: everything able to fight swings at the
/// lowest-handle enemy still standing.
///
/// Broken Warbands no longer take orders and officers leading from the front
/// fight through their unit, so neither declares.
pub fn focus_fire(encounter: &Encounter) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    for entity in encounter.entities.values() {
        let (id, side, weapon) = match entity {
            Entity::Combatant(c) if c.leading.is_none() => (c.id, c.side, c.weapon),
            Entity::Warband(w) if w.status == WarbandStatus::Active => (w.id, w.side, w.weapon),
            _ => continue,
        };
        if !can_act(encounter, id) {
            continue;
        }
        if let Some(target) = first_enemy(encounter, side) {
            declarations.push(Declaration::Attack(AttackDeclaration::melee(id, target, weapon)));
        }
    }
    declarations
}

fn first_enemy(encounter: &Encounter, side: Side) -> Option<EntityId> {
    encounter
        .entities
        .values()
        .find(|e| e.is_standing() && e.side().is_some_and(|s| s != side))
        .map(Entity::id)
}

fn run_seed(base: u64, run: usize) -> u64 {
    if base == 0 {
        0
    } else {
        base.wrapping_add(run as u64)
    }
}

/// Fights a single encounter to its end or the round limit.
pub fn play_run(
    setup: &EncounterSetup,
    rules: &RulesConfig,
    config: &SkirmishConfig,
    run: usize,
) -> Result<RunRecord, SkirmishError> {
    let seed = run_seed(config.seed, run);
    let mut dice = SeededDice::new(seed);
    let mut encounter = setup.clone().build(rules.clone())?;
    let engine_err = |source: EngineError| SkirmishError::Engine { run, source };

    begin_encounter(&mut encounter, &mut dice).map_err(engine_err)?;
    let mut rounds = 0;
    let mut rejections = 0;
    while !encounter.is_over() && rounds < config.max_rounds {
        let declarations = focus_fire(&encounter);
        let report = resolve_round(&mut encounter, &declarations, &mut dice).map_err(engine_err)?;
        rounds += 1;
        rejections += report.rejections.len();
        rejections += report.outcomes.iter().map(|o| o.rejections.len()).sum::<usize>();
    }

    let result = summary(&encounter);
    tracing::debug!(run, seed, rounds, winner = ?result.winner, "skirmish finished");
    Ok(RunRecord {
        run,
        seed,
        winner: result.winner,
        end: result.reason,
        rounds,
        decided: encounter.is_over(),
        survivors: result.survivors,
        scars: result.scars_gained,
        rejections,
    })
}

/// Runs the whole batch and returns records ordered by run index.
pub fn run_skirmishes(
    setup: &EncounterSetup,
    rules: &RulesConfig,
    config: &SkirmishConfig,
) -> Result<Vec<RunRecord>, SkirmishError> {
    // Surface setup errors once instead of from every worker.
    setup.clone().build(rules.clone())?;

    let mut records = if config.threads > 1 {
        run_parallel(setup, rules, config)?
    } else {
        (0..config.runs)
            .map(|run| play_run(setup, rules, config, run))
            .collect::<Result<Vec<_>, _>>()?
    };
    records.sort_by_key(|r| r.run);
    Ok(records)
}

fn run_parallel(
    setup: &EncounterSetup,
    rules: &RulesConfig,
    config: &SkirmishConfig,
) -> Result<Vec<RunRecord>, SkirmishError> {
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new().num_threads(config.threads).build()?;
    let (tx, rx) = mpsc::channel::<Result<RunRecord, SkirmishError>>();
    pool.install(|| {
        (0..config.runs).into_par_iter().for_each_with(tx, |tx, run| {
            // The receiver outlives the pool, so a failed send cannot happen.
            let _ = tx.send(play_run(setup, rules, config, run));
        });
    });
    rx.into_iter().collect()
}

pub fn summarize(records: &[RunRecord]) -> SkirmishSummary {
    let mut wins = BTreeMap::new();
    let mut undecided = 0;
    for record in records {
        match record.winner {
            Some(side) => *wins.entry(side).or_insert(0) += 1,
            None => undecided += 1,
        }
    }
    let runs = records.len();
    let total_rounds: u64 = records.iter().map(|r| r.rounds as u64).sum();
    let total_scars: usize = records.iter().map(|r| r.scars.len()).sum();
    SkirmishSummary {
        runs,
        wins,
        undecided,
        avg_rounds: total_rounds as f64 / runs.max(1) as f64,
        avg_scars: total_scars as f64 / runs.max(1) as f64,
    }
}

/// Writes one JSON object per run, then the summary line.
pub fn write_jsonl<W: Write>(records: &[RunRecord], summary: &SkirmishSummary, out: &mut W) -> std::io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut *out, record)?;
        writeln!(out)?;
    }
    serde_json::to_writer(&mut *out, &serde_json::json!({ "summary": summary }))?;
    writeln!(out)?;
    out.flush()
}

/// Prints win rates to stderr.
pub fn print_summary(summary: &SkirmishSummary) {
    eprintln!("=== Skirmish Summary ===");
    eprintln!("Runs: {}", summary.runs);
    for (side, wins) in &summary.wins {
        eprintln!("Side {}: {} wins ({:.1}%)", side.0, wins, summary.win_rate(*side) * 100.0);
    }
    eprintln!("Undecided: {}", summary.undecided);
    eprintln!("Avg rounds/run: {:.1}", summary.avg_rounds);
    eprintln!("Avg scars/run: {:.2}", summary.avg_scars);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::setup::parse_setup;

    const MISMATCH: &str = r#"{"combatants": [
        {"id": 1, "name": "Champion", "side": 0, "vigour": 18, "clarity": 12, "spirit": 12, "guard": 10, "armor": 3, "weapon": {"primary": "d12"}},
        {"id": 2, "name": "Peasant", "side": 1, "vigour": 3, "clarity": 5, "spirit": 5, "guard": 1, "weapon": {"primary": "d4"}}
    ]}"#;

    fn setup(json: &str) -> EncounterSetup {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn focus_fire_targets_lowest_enemy() {
        let json = r#"{"combatants": [
            {"id": 1, "name": "A", "side": 0, "vigour": 9, "clarity": 9, "spirit": 9, "guard": 3, "weapon": {"primary": "d6"}},
            {"id": 5, "name": "B", "side": 1, "vigour": 9, "clarity": 9, "spirit": 9, "guard": 3, "weapon": {"primary": "d6"}},
            {"id": 7, "name": "C", "side": 1, "vigour": 9, "clarity": 9, "spirit": 9, "guard": 3, "weapon": {"primary": "d8"}}
        ]}"#;
        let encounter = parse_setup(json, RulesConfig::default()).unwrap();
        let declarations = focus_fire(&encounter);
        assert_eq!(declarations.len(), 3);
        let targets: Vec<(EntityId, EntityId)> = declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Attack(a) => Some((a.attacker, a.targets[0])),
                _ => None,
            })
            .collect();
        assert_eq!(
            targets,
            vec![(EntityId(1), EntityId(5)), (EntityId(5), EntityId(1)), (EntityId(7), EntityId(1))]
        );
    }

    #[test]
    fn champion_beats_peasant() {
        let config = SkirmishConfig { runs: 20, max_rounds: 30, threads: 1, seed: 11 };
        let records = run_skirmishes(&setup(MISMATCH), &RulesConfig::default(), &config).unwrap();
        assert_eq!(records.len(), 20);
        let summary = summarize(&records);
        assert!(summary.win_rate(Side(0)) > 0.9, "{:?}", summary);
    }

    #[test]
    fn seeded_batches_repeat() {
        let config = SkirmishConfig { runs: 8, max_rounds: 30, threads: 1, seed: 4 };
        let first = run_skirmishes(&setup(MISMATCH), &RulesConfig::default(), &config).unwrap();
        let second = run_skirmishes(&setup(MISMATCH), &RulesConfig::default(), &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[3].seed, 7);
    }

    #[test]
    fn parallel_matches_sequential() {
        let sequential = SkirmishConfig { runs: 12, max_rounds: 30, threads: 1, seed: 99 };
        let parallel = SkirmishConfig { threads: 3, ..sequential.clone() };
        let rules = RulesConfig::default();
        let a = run_skirmishes(&setup(MISMATCH), &rules, &sequential).unwrap();
        let b = run_skirmishes(&setup(MISMATCH), &rules, &parallel).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bad_setup_fails_before_running() {
        let config = SkirmishConfig { runs: 4, threads: 1, seed: 1, ..SkirmishConfig::default() };
        let err = run_skirmishes(&EncounterSetup::default(), &RulesConfig::default(), &config).unwrap_err();
        assert!(matches!(err, SkirmishError::Setup(SetupError::Empty)));
    }

    #[test]
    fn jsonl_ends_with_summary() {
        let config = SkirmishConfig { runs: 3, max_rounds: 30, threads: 1, seed: 2 };
        let records = run_skirmishes(&setup(MISMATCH), &RulesConfig::default(), &config).unwrap();
        let summary = summarize(&records);
        let mut out = Vec::new();
        write_jsonl(&records, &summary, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("{\"run\":0,"));
        assert!(lines[3].starts_with("{\"summary\":"));
    }
}
