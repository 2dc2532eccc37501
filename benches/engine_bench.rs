use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

use warband::config::RulesConfig;
use warband::dice::{Die, SeededDice};
use warband::model::combatant::Combatant;
use warband::model::declaration::{AttackDeclaration, WeaponDice};
use warband::model::encounter::{Encounter, Entity, EntityId, Side};
use warband::model::virtue::{Virtues, Vitals};
use warband::protocol::setup::{parse_setup, EncounterSetup};
use warband::rules::damage::take_hit;
use warband::rules::{begin_encounter, resolve_attack, resolve_round};
use warband::skirmish::{focus_fire, run_skirmishes, SkirmishConfig};

const MELEE: &str = r#"{
    "combatants": [
        {"id": 1, "name": "Alda", "side": 0, "vigour": 14, "clarity": 10, "spirit": 10, "guard": 6, "armor": 2, "weapon": {"primary": "d8", "secondary": "d6"}},
        {"id": 2, "name": "Bram", "side": 0, "vigour": 12, "clarity": 10, "spirit": 10, "guard": 5, "armor": 1, "weapon": {"primary": "d10"}},
        {"id": 5, "name": "Corr", "side": 1, "vigour": 15, "clarity": 9, "spirit": 11, "guard": 7, "armor": 2, "weapon": {"primary": "d12"}},
        {"id": 6, "name": "Dunn", "side": 1, "vigour": 10, "clarity": 12, "spirit": 9, "guard": 4, "weapon": {"primary": "d6"}}
    ],
    "warbands": [
        {"id": 3, "name": "Spears", "side": 0, "vigour": 14, "clarity": 8, "spirit": 10, "guard": 4, "armor": 1, "weapon": {"primary": "d6"}, "led_by": 2},
        {"id": 7, "name": "Raiders", "side": 1, "vigour": 13, "clarity": 8, "spirit": 9, "guard": 4, "armor": 1, "weapon": {"primary": "d8"}}
    ]
}"#;

fn bench_take_hit(c: &mut Criterion) {
    let vitals = Vitals::new(Virtues::new(12, 10, 10), 6, 2);
    c.bench_function("take_hit", |b| {
        b.iter(|| {
            let mut v = vitals;
            take_hit(&mut v, black_box(11), None, false)
        })
    });
}

fn bench_resolve_attack(c: &mut Criterion) {
    let mut enc = Encounter::new(RulesConfig::default());
    enc.round = 1;
    for (id, side) in [(1, 0), (2, 0), (3, 1)] {
        enc.insert(Entity::Combatant(Combatant::new(
            EntityId(id),
            "Fighter",
            Side(side),
            Vitals::new(Virtues::new(19, 10, 10), 19, 0),
            WeaponDice::single(Die::D8),
        )));
    }
    let attacks = [
        AttackDeclaration::melee(EntityId(1), EntityId(3), WeaponDice::single(Die::D8)),
        AttackDeclaration::melee(EntityId(2), EntityId(3), WeaponDice::paired(Die::D6, Die::D6)),
    ];
    let mut dice = SeededDice::new(7);
    c.bench_function("resolve_attack_pair", |b| {
        b.iter(|| {
            let mut working = enc.clone();
            resolve_attack(&mut working, EntityId(3), black_box(&attacks), &mut dice)
        })
    });
}

fn bench_resolve_round(c: &mut Criterion) {
    let mut enc = parse_setup(MELEE, RulesConfig::default()).unwrap();
    let mut dice = SeededDice::new(11);
    begin_encounter(&mut enc, &mut dice).unwrap();
    let declarations = focus_fire(&enc);
    c.bench_function("resolve_round_six_entities", |b| {
        b.iter(|| {
            let mut working = enc.clone();
            resolve_round(&mut working, black_box(&declarations), &mut dice)
        })
    });
}

fn bench_parse_setup(c: &mut Criterion) {
    c.bench_function("parse_setup", |b| {
        b.iter(|| parse_setup(black_box(MELEE), RulesConfig::default()))
    });
}

fn bench_skirmish_batch(c: &mut Criterion) {
    let setup: EncounterSetup = serde_json::from_str(MELEE).unwrap();
    let rules = RulesConfig::default();
    let config = SkirmishConfig { runs: 64, max_rounds: 30, threads: 1, seed: 3 };
    let mut group = c.benchmark_group("skirmish");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);
    group.bench_function("batch_64_sequential", |b| {
        b.iter(|| run_skirmishes(black_box(&setup), &rules, &config))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_take_hit,
    bench_resolve_attack,
    bench_resolve_round,
    bench_parse_setup,
    bench_skirmish_batch
);
criterion_main!(benches);
