//! Driver protocol.
//!
//! Command parsing for the line protocol, the JSON encounter setup payload,
//! and the reply lines the engine writes back.

pub mod parser;
pub mod report;
pub mod setup;

pub use parser::{parse_command, Command};
pub use report::{write_error, write_line, write_reply, OpOutcome};
pub use setup::{parse_setup, EncounterSetup, SetupError};
