//! Driver command parser.
//!
//! Turns raw input lines into [`Command`] values for the main loop. JSON
//! arguments are carried through as text; the engine decodes them so that a
//! bad payload gets an `error` reply instead of being silently dropped.

use crate::model::declaration::WithdrawKind;
use crate::model::encounter::{EntityId, Side};
use crate::model::virtue::Virtue;

/// A parsed driver command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Handshake: the engine names itself and lists its options.
    Hello,

    /// Synchronization ping; engine must reply `readyok`.
    IsReady,

    /// `setoption name <id> [value <x>]`.
    SetOption { name: String, value: Option<String> },

    /// Load a new encounter from a JSON setup payload.
    Encounter { json: String },

    /// Run the surprise check and open round 1.
    Begin,

    /// Resolve one round from a JSON array of declarations.
    Declare { json: String },

    /// End the encounter by retreat or surrender of a side.
    Conclude { kind: WithdrawKind, side: Side },

    /// Advance the outside world by whole days.
    Advance { days: u32 },

    Rest { id: EntityId },

    Tend { id: EntityId },

    /// Two ships ram each other.
    Collide { first: EntityId, second: EntityId },

    /// Raise or lower a Virtue outside of damage.
    Adjust { id: EntityId, virtue: Virtue, delta: i16 },

    /// Dump the full encounter state.
    Status,

    /// Emit the end-of-encounter summary.
    Summary,

    Quit,
}

/// Parses a single line of input into a `Command`.
///
/// Returns `None` for empty lines, unknown commands, and malformed arguments.
pub fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    match tokens[0] {
        "hello" => Some(Command::Hello),
        "isready" => Some(Command::IsReady),
        "begin" => Some(Command::Begin),
        "status" => Some(Command::Status),
        "summary" => Some(Command::Summary),
        "quit" => Some(Command::Quit),

        "setoption" => parse_setoption(&tokens),
        "encounter" => rest_of_line(trimmed, "encounter").map(|json| Command::Encounter { json }),
        "declare" => rest_of_line(trimmed, "declare").map(|json| Command::Declare { json }),
        "conclude" => parse_conclude(&tokens),
        "advance" => parse_advance(&tokens),
        "rest" => parse_id(&tokens).map(|id| Command::Rest { id }),
        "tend" => parse_id(&tokens).map(|id| Command::Tend { id }),
        "collide" => parse_collide(&tokens),
        "adjust" => parse_adjust(&tokens),

        other => {
            tracing::warn!(command = other, "unknown command");
            None
        }
    }
}

/// Everything after the command word, for JSON payloads that may contain spaces.
fn rest_of_line(line: &str, command: &str) -> Option<String> {
    let payload = line.strip_prefix(command).unwrap_or("").trim();
    if payload.is_empty() {
        tracing::warn!(command, "missing JSON payload");
        return None;
    }
    Some(payload.to_string())
}

/// Parses `setoption name <id> [value <x>]`.
fn parse_setoption(tokens: &[&str]) -> Option<Command> {
    if tokens.len() < 3 || tokens[1] != "name" {
        tracing::warn!("malformed setoption: expected 'setoption name <id> [value <x>]'");
        return None;
    }

    let (name, value) = match tokens.iter().position(|&t| t == "value") {
        Some(vi) => {
            let name_parts = &tokens[2..vi];
            if name_parts.is_empty() {
                tracing::warn!("malformed setoption: empty name");
                return None;
            }
            let value_parts = &tokens[vi + 1..];
            let value = (!value_parts.is_empty()).then(|| value_parts.join(" "));
            (name_parts.join(" "), value)
        }
        None => (tokens[2..].join(" "), None),
    };

    Some(Command::SetOption { name, value })
}

fn id_token(token: Option<&&str>) -> Option<EntityId> {
    let raw = token?;
    match raw.trim_start_matches('#').parse::<u32>() {
        Ok(n) => Some(EntityId(n)),
        Err(_) => {
            tracing::warn!(token = *raw, "invalid entity handle");
            None
        }
    }
}

/// Parses the handle in `<cmd> <id>`.
fn parse_id(tokens: &[&str]) -> Option<EntityId> {
    if tokens.len() < 2 {
        tracing::warn!(command = tokens[0], "missing entity handle");
        return None;
    }
    id_token(tokens.get(1))
}

/// Parses `conclude <retreat|surrender> <side>`.
fn parse_conclude(tokens: &[&str]) -> Option<Command> {
    if tokens.len() < 3 {
        tracing::warn!("malformed conclude: expected 'conclude <retreat|surrender> <side>'");
        return None;
    }
    let kind = match tokens[1] {
        "retreat" => WithdrawKind::Retreat,
        "surrender" => WithdrawKind::Surrender,
        other => {
            tracing::warn!(kind = other, "unknown conclusion");
            return None;
        }
    };
    match tokens[2].parse::<u8>() {
        Ok(side) => Some(Command::Conclude { kind, side: Side(side) }),
        Err(_) => {
            tracing::warn!(side = tokens[2], "invalid side");
            None
        }
    }
}

/// Parses `advance <days>`.
fn parse_advance(tokens: &[&str]) -> Option<Command> {
    match tokens.get(1).map(|t| t.parse::<u32>()) {
        Some(Ok(days)) => Some(Command::Advance { days }),
        _ => {
            tracing::warn!("malformed advance: expected 'advance <days>'");
            None
        }
    }
}

/// Parses `collide <ship> <ship>`.
fn parse_collide(tokens: &[&str]) -> Option<Command> {
    if tokens.len() < 3 {
        tracing::warn!("malformed collide: expected 'collide <ship> <ship>'");
        return None;
    }
    let first = id_token(tokens.get(1))?;
    let second = id_token(tokens.get(2))?;
    Some(Command::Collide { first, second })
}

/// Parses `adjust <id> <virtue> <delta>`, e.g. `adjust 3 spirit -2`.
fn parse_adjust(tokens: &[&str]) -> Option<Command> {
    if tokens.len() < 4 {
        tracing::warn!("malformed adjust: expected 'adjust <id> <virtue> <delta>'");
        return None;
    }
    let id = id_token(tokens.get(1))?;
    let Some(virtue) = Virtue::from_name(tokens[2]) else {
        tracing::warn!(virtue = tokens[2], "unknown virtue");
        return None;
    };
    match tokens[3].parse::<i16>() {
        Ok(delta) => Some(Command::Adjust { id, virtue, delta }),
        Err(_) => {
            tracing::warn!(delta = tokens[3], "invalid delta");
            None
        }
    }
}
