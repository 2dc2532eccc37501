//! Gambits: attack dice spent on tactical effects instead of damage.

use crate::dice::{save, DiceSource, Die};
use crate::model::declaration::{AttackRange, GambitEffect, GambitIntent, StrongGambit};
use crate::model::encounter::{Entity, EntityId};
use crate::model::virtue::Condition;

use super::outcome::{GambitOutcome, StatusChange, StatusTransition};

/// Lowest face that can fund a Gambit.
pub const GAMBIT_MIN_FACE: u8 = 4;
/// Lowest face that unlocks the Strong options, in melee only.
pub const STRONG_MIN_FACE: u8 = 8;

/// What pays for a Gambit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Funding {
    /// A die from the attacker's pool, with its face.
    Die(u8),
    /// Focus: no die is spent.
    Focus,
}

impl Funding {
    fn face(self) -> Option<u8> {
        match self {
            Funding::Die(face) => Some(face),
            Funding::Focus => None,
        }
    }
}

/// Checks that a Gambit can be paid for. Returns the reason when it cannot.
pub fn fund_gambit(intent: &GambitIntent, funding: Funding, range: AttackRange) -> Result<(), String> {
    if let Funding::Die(face) = funding {
        if face < GAMBIT_MIN_FACE {
            return Err(format!("a {} cannot fund a gambit", face));
        }
    }
    let Some(option) = intent.strong else {
        return Ok(());
    };
    if intent.effect == GambitEffect::Bolster {
        return Err("bolster cannot be strong".to_string());
    }
    match funding {
        Funding::Focus => Err("a focused gambit cannot be strong".to_string()),
        Funding::Die(_) if range != AttackRange::Melee => {
            Err(format!("{:?} needs a melee attack", option))
        }
        Funding::Die(face) if face < STRONG_MIN_FACE => {
            Err(format!("{:?} needs a {} or better, rolled {}", option, STRONG_MIN_FACE, face))
        }
        Funding::Die(_) => Ok(()),
    }
}

/// Applies an already funded Gambit to the defender.
///
/// Effects other than Bolster and Move allow a Vigour save unless the
/// attacker took the Strong "no save" option. A defender who is already down
/// or gone is unaffected and rolls nothing.
pub fn apply_gambit(
    owner: EntityId,
    intent: &GambitIntent,
    funding: Funding,
    defender: &mut Entity,
    round: u32,
    dice: &mut dyn DiceSource,
    save_die: Die,
) -> (GambitOutcome, Option<StatusTransition>) {
    let mut outcome = GambitOutcome {
        owner,
        effect: intent.effect.clone(),
        face: funding.face(),
        strong: intent.strong,
        focused: funding == Funding::Focus,
        save: None,
        applied: false,
    };

    let down = defender.is_terminal()
        || defender.has_left()
        || matches!(defender, Entity::Combatant(c) if !c.is_standing());
    if down {
        return (outcome, None);
    }

    let vigour = match defender {
        Entity::Combatant(c) => Some(c.vitals.virtues.vigour),
        Entity::Warband(w) => Some(w.vitals.virtues.vigour),
        Entity::Structure(_) => None,
    };
    let needs_save = intent.effect.allows_save() && intent.strong != Some(StrongGambit::NoSave);
    outcome.applied = match (needs_save, vigour) {
        (true, Some(v)) => {
            let roll = save(dice, save_die, v);
            outcome.save = Some(roll);
            !roll.passed
        }
        _ => true,
    };

    let mut transition = None;
    if outcome.applied && intent.effect == GambitEffect::Impair {
        transition = impair(defender, round);
    }
    tracing::debug!(
        %owner,
        defender = %defender.id(),
        effect = ?outcome.effect,
        applied = outcome.applied,
        "gambit resolved"
    );
    (outcome, transition)
}

/// Funds and applies a Gambit in one step.
#[allow(clippy::too_many_arguments)]
pub fn resolve_gambit(
    owner: EntityId,
    intent: &GambitIntent,
    funding: Funding,
    range: AttackRange,
    defender: &mut Entity,
    round: u32,
    dice: &mut dyn DiceSource,
    save_die: Die,
) -> Result<GambitOutcome, String> {
    fund_gambit(intent, funding, range)?;
    Ok(apply_gambit(owner, intent, funding, defender, round, dice, save_die).0)
}

/// Impaired through the end of the following round.
fn impair(defender: &mut Entity, round: u32) -> Option<StatusTransition> {
    let id = defender.id();
    let (conditions, until) = match defender {
        Entity::Combatant(c) => (&mut c.conditions, &mut c.impaired_until),
        Entity::Warband(w) => (&mut w.conditions, &mut w.impaired_until),
        Entity::Structure(_) => return None,
    };
    *until = Some(round + 1);
    if conditions.insert(Condition::Impaired) {
        Some(StatusTransition::new(id, StatusChange::ConditionGained(Condition::Impaired)))
    } else {
        None
    }
}
