//! Outbound reply lines.
//!
//! Every reply is one line: a tag word followed by a JSON document, or
//! `error` followed by a plain message.

use std::fmt::Display;
use std::io::{self, Write};

use serde::Serialize;

use crate::model::encounter::{EndReason, EntityId};
use crate::rules::outcome::{StatusTransition, SurpriseReport, TimeReport};
use crate::rules::siege::CollisionReport;

/// Results of the single-step commands, reported as `outcome <json>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OpOutcome {
    Begin(SurpriseReport),
    Conclude { end: EndReason },
    Advance(TimeReport),
    Rest { id: EntityId },
    Tend { id: EntityId, stabilised: bool },
    Collide(CollisionReport),
    Adjust { id: EntityId, transitions: Vec<StatusTransition> },
}

/// Writes `<tag> <json>`.
pub fn write_reply<W: Write, T: Serialize>(out: &mut W, tag: &str, value: &T) -> io::Result<()> {
    match serde_json::to_string(value) {
        Ok(json) => writeln!(out, "{} {}", tag, json)?,
        Err(e) => {
            tracing::error!(tag, error = %e, "reply could not be encoded");
            writeln!(out, "error failed to encode {}: {}", tag, e)?;
        }
    }
    out.flush()
}

/// Writes `error <message>` on a single line.
pub fn write_error<W: Write>(out: &mut W, message: impl Display) -> io::Result<()> {
    let text = message.to_string().replace('\n', " ");
    writeln!(out, "error {}", text)?;
    out.flush()
}

/// Writes a bare acknowledgement line such as `readyok`.
pub fn write_line<W: Write>(out: &mut W, line: &str) -> io::Result<()> {
    writeln!(out, "{}", line)?;
    out.flush()
}
