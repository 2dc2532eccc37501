//! Warband -- a combat resolution engine driven over a line protocol.
//!
//! This binary reads commands from stdin and writes one reply line per
//! command to stdout. Logs go to stderr; set `RUST_LOG` to see more.

use std::io::{self, BufRead};

use tracing_subscriber::EnvFilter;
use warband::engine::Engine;
use warband::protocol::parser::{parse_command, Command};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut engine = Engine::new();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };

        let cmd = match parse_command(&line) {
            Some(c) => c,
            None => continue,
        };

        let written = match cmd {
            Command::Hello => engine.handle_hello(&mut out),
            Command::IsReady => engine.handle_isready(&mut out),
            Command::SetOption { name, value } => engine.handle_setoption(&mut out, name, value),
            Command::Encounter { json } => engine.handle_encounter(&mut out, &json),
            Command::Begin => engine.handle_begin(&mut out),
            Command::Declare { json } => engine.handle_declare(&mut out, &json),
            Command::Conclude { kind, side } => engine.handle_conclude(&mut out, kind, side),
            Command::Advance { days } => engine.handle_advance(&mut out, days),
            Command::Rest { id } => engine.handle_rest(&mut out, id),
            Command::Tend { id } => engine.handle_tend(&mut out, id),
            Command::Collide { first, second } => engine.handle_collide(&mut out, first, second),
            Command::Adjust { id, virtue, delta } => engine.handle_adjust(&mut out, id, virtue, delta),
            Command::Status => engine.handle_status(&mut out),
            Command::Summary => engine.handle_summary(&mut out),
            Command::Quit => break,
        };

        if let Err(e) = written {
            tracing::error!(error = %e, "stdout closed");
            break;
        }
    }
}
