//! The Scar table.
//!
//! Keyed by the face of the die that drove Guard to 0, not by a fresh roll.
//! Entries are fixed data; only the amounts they call for are rolled when
//! the Scar is applied.

use serde::{Deserialize, Serialize};

use crate::dice::{DiceSource, Die};
use crate::error::EngineError;
use crate::model::combatant::{BodyLocation, Combatant, Scar, ScarKind};
use crate::model::virtue::Virtue;

/// A rolled increase to maximum Guard, granted only below a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardGain {
    pub die: Die,
    /// Applies only while maximum Guard is below this value.
    pub below: u8,
}

/// One row of the Scar table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScarDescriptor {
    pub face: u8,
    pub kind: ScarKind,
    pub virtue_loss: Option<(Virtue, Die)>,
    pub guard_gain: Option<GuardGain>,
    pub location: bool,
}

const fn row(
    face: u8,
    kind: ScarKind,
    virtue_loss: Option<(Virtue, Die)>,
    guard_gain: Option<GuardGain>,
    location: bool,
) -> ScarDescriptor {
    ScarDescriptor { face, kind, virtue_loss, guard_gain, location }
}

const fn gain(die: Die, below: u8) -> Option<GuardGain> {
    Some(GuardGain { die, below })
}

/// The twelve Scars, indexed by face - 1.
pub const SCAR_TABLE: [ScarDescriptor; 12] = [
    row(1, ScarKind::Haunted, Some((Virtue::Spirit, Die::D6)), None, false),
    row(2, ScarKind::Disfigured, Some((Virtue::Spirit, Die::D4)), None, true),
    row(3, ScarKind::Smashed, Some((Virtue::Vigour, Die::D6)), None, false),
    row(4, ScarKind::Dazed, Some((Virtue::Clarity, Die::D6)), None, false),
    row(5, ScarKind::Ruptured, Some((Virtue::Vigour, Die::D4)), None, true),
    row(6, ScarKind::Gouged, Some((Virtue::Clarity, Die::D4)), None, true),
    row(7, ScarKind::Hardened, None, gain(Die::D4, 6), false),
    row(8, ScarKind::Wizened, Some((Virtue::Clarity, Die::D4)), gain(Die::D6, 8), false),
    row(9, ScarKind::BattleWorn, None, gain(Die::D6, 10), true),
    row(10, ScarKind::Humbled, Some((Virtue::Spirit, Die::D4)), gain(Die::D6, 12), false),
    row(11, ScarKind::Tempered, None, gain(Die::D8, 14), false),
    row(12, ScarKind::LegendMarked, None, gain(Die::D12, 19), false),
];

/// Looks up the Scar for a die face. Faces outside 1..=12 clamp to the table's ends.
pub fn roll_scar(face: u8) -> ScarDescriptor {
    let idx = face.clamp(1, 12) as usize - 1;
    SCAR_TABLE[idx]
}

/// Rolls the amounts a Scar calls for and records it on the combatant.
///
/// Virtue loss stops at 0 and never kills: a Scar that empties Vigour leaves
/// the combatant Exhausted, not Slain.
pub fn apply_scar(target: &mut Combatant, descriptor: &ScarDescriptor, dice: &mut dyn DiceSource) -> Result<Scar, EngineError> {
    if target.is_slain() {
        return Err(EngineError::TerminalStateViolation(target.id));
    }

    let location = descriptor
        .location
        .then(|| BodyLocation::from_d6(dice.roll_die(Die::D6)));

    let virtue_loss = descriptor.virtue_loss.map(|(virtue, die)| {
        let rolled = dice.roll_die(die);
        (virtue, target.vitals.virtues.lose(virtue, rolled))
    });

    let max_guard_gain = match descriptor.guard_gain {
        Some(g) if target.vitals.max_guard < g.below => {
            let rolled = dice.roll_die(g.die);
            target.vitals.raise_max_guard(rolled)
        }
        _ => 0,
    };

    let scar = Scar {
        kind: descriptor.kind,
        face: descriptor.face,
        location,
        virtue_loss,
        max_guard_gain,
    };
    target.scars.push(scar);
    tracing::info!(target = %target.id, kind = ?scar.kind, face = scar.face, "scar gained");
    Ok(scar)
}
