//! Batch skirmish CLI.
//!
//! Fights one encounter setup many times and writes per-run records plus a
//! win-rate summary as JSONL.
//!
//! Usage:
//!   cargo run --release --bin skirmish -- --setup FILE [OPTIONS]
//!
//! Options:
//!   --setup FILE    Encounter setup JSON (required)
//!   --runs N        Number of encounters to fight (default: 100)
//!   --max-rounds N  Abandon a fight after this many rounds (default: 50)
//!   --threads N     Number of parallel threads (default: 4)
//!   --seed N        Base seed, 0 for entropy (default: 0)
//!   --rules FILE    TOML rules table (default: built-in rules)
//!   --output FILE   Output file path (default: stdout)
//!   --quiet         Suppress summary output

use std::env;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::process;
use std::str::FromStr;
use std::time::Instant;

use tracing_subscriber::EnvFilter;
use warband::config::RulesConfig;
use warband::protocol::setup::EncounterSetup;
use warband::skirmish::{self, SkirmishConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let mut config = SkirmishConfig::default();
    let mut setup_path: Option<String> = None;
    let mut rules_path: Option<String> = None;
    let mut output_path: Option<String> = None;
    let mut quiet = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--setup" => setup_path = Some(value(&args, &mut i)),
            "--runs" => config.runs = parsed(&args, &mut i),
            "--max-rounds" => config.max_rounds = parsed(&args, &mut i),
            "--threads" => config.threads = parsed(&args, &mut i),
            "--seed" => config.seed = parsed(&args, &mut i),
            "--rules" => rules_path = Some(value(&args, &mut i)),
            "--output" => output_path = Some(value(&args, &mut i)),
            "--quiet" => quiet = true,
            "--help" | "-h" => {
                print_usage();
                return;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let Some(setup_path) = setup_path else {
        eprintln!("--setup is required");
        print_usage();
        process::exit(1);
    };
    let setup: EncounterSetup = match fs::read_to_string(&setup_path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(setup) => setup,
            Err(e) => die(&format!("invalid setup {}: {}", setup_path, e)),
        },
        Err(e) => die(&format!("failed to read {}: {}", setup_path, e)),
    };
    let rules = match rules_path {
        Some(path) => RulesConfig::load(&path).unwrap_or_else(|e| die(&format!("{}: {}", path, e))),
        None => RulesConfig::default(),
    };

    if !quiet {
        eprintln!(
            "Skirmish: {} runs, max {} rounds, {} threads, seed {}",
            config.runs, config.max_rounds, config.threads, config.seed
        );
    }

    let start = Instant::now();
    let records = skirmish::run_skirmishes(&setup, &rules, &config).unwrap_or_else(|e| die(&e.to_string()));
    let summary = skirmish::summarize(&records);
    let elapsed = start.elapsed();

    if !quiet {
        eprintln!("Completed {} runs in {:.2}s", records.len(), elapsed.as_secs_f64());
        skirmish::print_summary(&summary);
    }

    let written = match &output_path {
        Some(path) => File::create(path).and_then(|file| {
            let mut writer = BufWriter::new(file);
            skirmish::write_jsonl(&records, &summary, &mut writer)
        }),
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            skirmish::write_jsonl(&records, &summary, &mut writer).and_then(|_| writer.flush())
        }
    };
    match (written, output_path) {
        (Err(e), _) => die(&format!("failed to write output: {}", e)),
        (Ok(()), Some(path)) if !quiet => eprintln!("Wrote {} runs to {}", records.len(), path),
        _ => {}
    }
}

fn value(args: &[String], i: &mut usize) -> String {
    *i += 1;
    match args.get(*i) {
        Some(v) => v.clone(),
        None => die(&format!("{} needs a value", args[*i - 1])),
    }
}

fn parsed<T: FromStr>(args: &[String], i: &mut usize) -> T {
    let raw = value(args, i);
    raw.parse()
        .unwrap_or_else(|_| die(&format!("invalid {} value: {}", args[*i - 1], raw)))
}

fn die(message: &str) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}

fn print_usage() {
    eprintln!("Usage: skirmish --setup FILE [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --setup FILE     Encounter setup JSON (required)");
    eprintln!("  --runs N         Number of encounters to fight (default: 100)");
    eprintln!("  --max-rounds N   Abandon a fight after this many rounds (default: 50)");
    eprintln!("  --threads N      Number of parallel threads (default: 4)");
    eprintln!("  --seed N         Base seed, 0 for entropy (default: 0)");
    eprintln!("  --rules FILE     TOML rules table (default: built-in rules)");
    eprintln!("  --output FILE    Output file path (default: stdout)");
    eprintln!("  --quiet          Suppress summary output");
    eprintln!("  --help           Show this help");
}
