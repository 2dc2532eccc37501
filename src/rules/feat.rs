//! Smite, Focus, and Deny.
//!
//! Each Feat can be used once between rests. Using one costs a save against
//! the Feat's Virtue; failing it leaves the user Fatigued, which locks out
//! every Feat until the next rest. The Feat's effect stands either way.

use crate::dice::{save, DiceSource, Die};
use crate::model::combatant::{Combatant, Feat};
use crate::model::virtue::Condition;

use super::outcome::FeatOutcome;

/// Checks whether `actor` may use `feat` right now.
pub fn check_feat(actor: &Combatant, feat: Feat) -> Result<(), String> {
    if !actor.is_standing() {
        return Err(format!("{} is down and cannot use {:?}", actor.name, feat));
    }
    if actor.has_condition(Condition::Fatigued) {
        return Err(format!("{} is fatigued", actor.name));
    }
    if actor.has_condition(Condition::Impaired) {
        return Err(format!("{} is impaired", actor.name));
    }
    if actor.feats_used.contains(&feat) {
        return Err(format!("{} has already used {:?} since resting", actor.name, feat));
    }
    Ok(())
}

/// Checks and marks a Feat as used.
pub fn claim_feat(actor: &mut Combatant, feat: Feat) -> Result<(), String> {
    check_feat(actor, feat)?;
    actor.feats_used.insert(feat);
    Ok(())
}

/// Rolls the save a Feat costs and applies Fatigue on failure.
pub fn pay_feat_cost(actor: &mut Combatant, feat: Feat, dice: &mut dyn DiceSource, save_die: Die) -> FeatOutcome {
    let virtue = feat.save_virtue();
    let roll = save(dice, save_die, actor.vitals.virtues.get(virtue));
    let fatigued = !roll.passed;
    if fatigued {
        actor.conditions.insert(Condition::Fatigued);
    }
    tracing::debug!(actor = %actor.id, ?feat, roll = roll.roll, fatigued, "feat cost paid");
    FeatOutcome {
        feat,
        actor: actor.id,
        save: roll,
        fatigued,
    }
}

/// Rest: clears Fatigue and the used-Feat markers and restores Guard.
pub fn rest(actor: &mut Combatant) {
    actor.conditions.remove(&Condition::Fatigued);
    actor.feats_used.clear();
    actor.vitals.restore_guard();
    tracing::info!(actor = %actor.id, name = %actor.name, "rested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDice;
    use crate::model::combatant::LifeStatus;
    use crate::model::declaration::WeaponDice;
    use crate::model::encounter::{EntityId, Side};
    use crate::model::virtue::{Virtues, Vitals};

    fn hero() -> Combatant {
        Combatant::new(
            EntityId(1),
            "Hero",
            Side(0),
            Vitals::new(Virtues::new(12, 8, 6), 6, 1),
            WeaponDice::single(Die::D8),
        )
    }

    #[test]
    fn each_feat_once_per_rest() {
        let mut h = hero();
        assert!(claim_feat(&mut h, Feat::Smite).is_ok());
        assert!(claim_feat(&mut h, Feat::Smite).is_err());
        assert!(claim_feat(&mut h, Feat::Focus).is_ok());
        rest(&mut h);
        assert!(claim_feat(&mut h, Feat::Smite).is_ok());
    }

    #[test]
    fn failed_save_fatigues_and_blocks_feats() {
        let mut h = hero();
        let mut dice = ScriptedDice::new([13]);
        let out = pay_feat_cost(&mut h, Feat::Smite, &mut dice, Die::D20);
        assert!(out.fatigued);
        assert_eq!(out.save.target, 12);
        assert!(check_feat(&h, Feat::Deny).is_err());
    }

    #[test]
    fn cost_uses_the_feat_virtue() {
        let mut h = hero();
        // Spirit 6: a 6 passes, a 7 would not.
        let mut dice = ScriptedDice::new([6]);
        let out = pay_feat_cost(&mut h, Feat::Deny, &mut dice, Die::D20);
        assert!(!out.fatigued);
        assert_eq!(out.save.target, 6);
    }

    #[test]
    fn impaired_and_downed_cannot_use_feats() {
        let mut h = hero();
        h.vitals.virtues.spirit = 0;
        assert!(check_feat(&h, Feat::Focus).is_err());
        let mut h = hero();
        h.status = LifeStatus::MortallyWounded;
        assert!(check_feat(&h, Feat::Focus).is_err());
    }

    #[test]
    fn rest_keeps_scars_and_restores_guard() {
        let mut h = hero();
        h.vitals.guard = 0;
        h.conditions.insert(Condition::Fatigued);
        rest(&mut h);
        assert_eq!(h.vitals.guard, 6);
        assert!(!h.has_condition(Condition::Fatigued));
    }
}
