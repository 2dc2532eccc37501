//! Warband rules: who can hurt a unit, morale, and leading from the front.

use crate::error::EngineError;
use crate::model::combatant::LifeStatus;
use crate::model::declaration::AttackDeclaration;
use crate::model::encounter::{Encounter, Entity, EntityId};
use crate::model::virtue::Condition;
use crate::model::warband::{Warband, WarbandStatus};

use super::damage::{take_hit, DamageReport};
use super::outcome::{StatusChange, StatusTransition};

/// Whether an attack can harm a Warband at all.
///
/// Units trade blows freely. A lone fighter needs a Blast or a large-scale
/// weapon; an ordinary swing just vanishes into the crowd.
pub fn can_strike_warband(attacker_is_warband: bool, decl: &AttackDeclaration) -> bool {
    attacker_is_warband || decl.is_blast() || decl.large_scale
}

/// A hit on a Warband and the morale change it caused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitDamage {
    pub report: DamageReport,
    pub morale: Option<WarbandStatus>,
}

/// Applies a hit to a Warband and checks morale.
///
/// Losing half or more of its Vigour in one hit routs the unit; Vigour 0
/// wipes it out. Warbands take no Scars.
pub fn apply_unit_damage(warband: &mut Warband, raw: u16, armor_override: Option<u8>) -> Result<UnitDamage, EngineError> {
    if !warband.status.is_present() {
        return match warband.status {
            WarbandStatus::WipedOut => Err(EngineError::TerminalStateViolation(warband.id)),
            _ => Err(EngineError::InvalidReference(warband.id)),
        };
    }
    let exposed = warband.has_condition(Condition::Exposed);
    let report = take_hit(&mut warband.vitals, raw, armor_override, exposed);

    let morale = if report.slain {
        Some(WarbandStatus::WipedOut)
    } else if report.mortally_wounded {
        Some(WarbandStatus::Routed)
    } else {
        None
    };
    if let Some(status) = morale {
        warband.status = status;
        tracing::info!(warband = %warband.id, name = %warband.name, ?status, "warband morale collapsed");
    }
    Ok(UnitDamage { report, morale })
}

/// Morale from Virtue thresholds outside of a hit.
///
/// Spirit 0 breaks an Active unit, once. Vigour 0 wipes out any unit still on
/// the field.
pub fn check_morale(warband: &mut Warband) -> Option<WarbandStatus> {
    if !warband.status.is_present() {
        return None;
    }
    let next = if warband.vitals.virtues.vigour == 0 {
        WarbandStatus::WipedOut
    } else if warband.vitals.virtues.spirit == 0 && warband.status == WarbandStatus::Active {
        WarbandStatus::Broken
    } else {
        return None;
    };
    warband.status = next;
    tracing::info!(warband = %warband.id, name = %warband.name, status = ?next, "warband morale changed");
    Some(next)
}

/// Binds an officer to a Warband for this round. Returns the reason on refusal.
pub fn lead_from_front(encounter: &mut Encounter, officer: EntityId, warband: EntityId) -> Result<(), String> {
    let officer_side = match encounter.get(officer) {
        Ok(Entity::Combatant(c)) if c.is_standing() => c.side,
        Ok(Entity::Combatant(c)) => return Err(format!("{} is down", c.name)),
        _ => return Err(format!("{} is not a combatant", officer)),
    };
    match encounter.get(warband) {
        Ok(Entity::Warband(w)) if w.side != officer_side => {
            return Err(format!("{} fights for another side", w.name));
        }
        Ok(Entity::Warband(w)) if w.led_by.is_some() => {
            return Err(format!("{} already has an officer", w.name));
        }
        Ok(Entity::Warband(_)) => {}
        _ => return Err(format!("{} is not a warband", warband)),
    }
    if let Ok(Entity::Combatant(c)) = encounter.get(officer) {
        if c.leading.is_some() {
            return Err(format!("{} is already leading", c.name));
        }
    }

    if let Ok(w) = encounter.warband_mut(warband) {
        w.led_by = Some(officer);
    }
    if let Ok(c) = encounter.combatant_mut(officer) {
        c.leading = Some(warband);
    }
    tracing::debug!(%officer, %warband, "leading from the front");
    Ok(())
}

/// Clears every officer link.
pub fn release_officers(encounter: &mut Encounter) {
    for entity in encounter.entities.values_mut() {
        match entity {
            Entity::Combatant(c) => c.leading = None,
            Entity::Warband(w) => w.led_by = None,
            Entity::Structure(_) => {}
        }
    }
}

/// The officer leading `warband` takes the damage the unit just took.
///
/// `damage` is already past the unit's Armor, so the officer's own Armor is
/// not applied again.
pub fn share_with_officer(
    encounter: &mut Encounter,
    warband: EntityId,
    damage: u16,
) -> Result<Option<(EntityId, DamageReport, Vec<StatusTransition>)>, EngineError> {
    let officer = match encounter.entities.get(&warband) {
        Some(Entity::Warband(w)) => w.led_by,
        _ => None,
    };
    let Some(officer) = officer else {
        return Ok(None);
    };
    let target = match encounter.entities.get_mut(&officer) {
        Some(Entity::Combatant(c)) if !c.is_slain() => c,
        _ => return Ok(None),
    };
    let before = target.status;
    let report = super::damage::apply_damage(target, damage, Some(0))?;
    let mut transitions = Vec::new();
    if target.status != before {
        let change = match target.status {
            LifeStatus::Slain => StatusChange::Slain,
            _ => StatusChange::MortallyWounded,
        };
        transitions.push(StatusTransition::new(officer, change));
    }
    if target.is_slain() {
        if let Some(Entity::Warband(w)) = encounter.entities.get_mut(&warband) {
            w.led_by = None;
        }
    }
    Ok(Some((officer, report, transitions)))
}

/// Unlinks an officer from a unit that has left or fallen.
pub fn release_unit(encounter: &mut Encounter, warband: EntityId) {
    let officer = match encounter.entities.get_mut(&warband) {
        Some(Entity::Warband(w)) => w.led_by.take(),
        _ => None,
    };
    if let Some(Entity::Combatant(c)) = officer.and_then(|id| encounter.entities.get_mut(&id)) {
        c.leading = None;
    }
}
