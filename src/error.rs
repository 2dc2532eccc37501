//! Engine error taxonomy.
//!
//! Hard failures abort the operation and leave state untouched. Recoverable
//! problems with a single declaration are [`Rejection`]s: they are reported
//! alongside the results and the rest of the round proceeds.

use serde::{Deserialize, Serialize};

use crate::model::encounter::{EntityId, RoundPhase};

/// A failure that aborts the whole operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("entity {0} is not part of the active encounter")]
    InvalidReference(EntityId),

    #[error("entity {0} is slain, wiped out, or destroyed and cannot be changed")]
    TerminalStateViolation(EntityId),

    #[error("entity {id} is not a {expected}")]
    WrongKind { id: EntityId, expected: &'static str },

    #[error("operation needs phase {expected:?}, encounter is in {actual:?}")]
    WrongPhase { expected: RoundPhase, actual: RoundPhase },
}

/// How a rejected declaration broke the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// The declaration is not allowed (spent Feat, underpowered die, downed actor).
    IllegalAction,
    /// Allowed, but has no effect under the rules (a sword against a Warband).
    RuleViolation,
}

/// A declaration, or part of one, that was dropped from the round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Index of the declaration within the round's batch.
    pub declaration: usize,
    pub actor: Option<EntityId>,
    pub kind: RejectionKind,
    pub reason: String,
}

impl Rejection {
    pub fn illegal(declaration: usize, actor: Option<EntityId>, reason: impl Into<String>) -> Self {
        Rejection {
            declaration,
            actor,
            kind: RejectionKind::IllegalAction,
            reason: reason.into(),
        }
    }

    pub fn violation(declaration: usize, actor: Option<EntityId>, reason: impl Into<String>) -> Self {
        Rejection {
            declaration,
            actor,
            kind: RejectionKind::RuleViolation,
            reason: reason.into(),
        }
    }
}
