//! Damage allocation against Guard and Vigour.
//!
//! Damage first strips Guard. A hit that takes a positive Guard to 0 earns a
//! Scar. Whatever Guard cannot absorb comes off Vigour: losing half or more of
//! the Vigour held before the hit is a Mortal Wound, and Vigour 0 is death.
//! Only damage can kill; Virtue loss from Scars or Feats never does.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::combatant::{Combatant, LifeStatus};
use crate::model::virtue::{Condition, Virtue, Vitals};

/// Everything a single hit did to a target's Guard and Vigour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DamageReport {
    pub raw: u16,
    pub armor: u8,
    /// Damage after Armor.
    pub damage: u16,
    pub guard_delta: i16,
    pub vigour_delta: i16,
    /// Guard went from positive to 0 on this hit.
    pub guard_zeroed: bool,
    /// The target was Exposed, so Guard counted as 0.
    pub exposed: bool,
    /// Some damage reached Vigour.
    pub wounded: bool,
    pub mortally_wounded: bool,
    pub slain: bool,
}

impl DamageReport {
    /// A Scar is due when a positive Guard was driven to 0 and the target lived.
    pub fn scar_due(&self) -> bool {
        self.guard_zeroed && !self.slain
    }
}

/// Applies a hit to raw vitals.
///
/// `armor_override` replaces the target's own Armor (use `Some(0)` for damage
/// that has already been reduced). When `exposed` is set, Guard is treated as
/// 0 for this hit only and stored Guard is left alone.
pub fn take_hit(vitals: &mut Vitals, raw: u16, armor_override: Option<u8>, exposed: bool) -> DamageReport {
    let armor = armor_override.unwrap_or(vitals.armor);
    let damage = raw.saturating_sub(armor as u16);
    let mut report = DamageReport {
        raw,
        armor,
        damage,
        exposed,
        ..DamageReport::default()
    };
    if damage == 0 {
        return report;
    }

    let guard = if exposed { 0 } else { vitals.guard as u16 };
    if damage < guard {
        vitals.guard -= damage as u8;
        report.guard_delta = -(damage as i16);
        return report;
    }

    if guard > 0 {
        vitals.guard = 0;
        report.guard_delta = -(guard as i16);
        report.guard_zeroed = true;
    }

    let excess = damage - guard;
    if excess == 0 {
        return report;
    }

    let before = vitals.virtues.vigour;
    let lost = vitals.virtues.lose(Virtue::Vigour, excess.min(u8::MAX as u16) as u8);
    report.vigour_delta = -(lost as i16);
    report.wounded = true;
    if vitals.virtues.vigour == 0 {
        report.slain = true;
    } else if 2 * lost as u16 >= before as u16 {
        report.mortally_wounded = true;
    }
    report
}

/// Applies a hit to a combatant and updates their life status.
///
/// Slain overrides a Mortal Wound computed on the same hit. Hitting a slain
/// combatant is a caller bug and is refused.
pub fn apply_damage(target: &mut Combatant, raw: u16, armor_override: Option<u8>) -> Result<DamageReport, EngineError> {
    if target.is_slain() {
        return Err(EngineError::TerminalStateViolation(target.id));
    }
    let exposed = target.has_condition(Condition::Exposed);
    let report = take_hit(&mut target.vitals, raw, armor_override, exposed);

    if report.slain {
        target.status = LifeStatus::Slain;
        target.leading = None;
        tracing::info!(target = %target.id, name = %target.name, "slain");
    } else if report.mortally_wounded && target.status == LifeStatus::Alive {
        target.status = LifeStatus::MortallyWounded;
        target.mortal_wound_days = 0;
        tracing::info!(target = %target.id, name = %target.name, "mortally wounded");
    }
    tracing::debug!(
        target = %target.id,
        raw,
        damage = report.damage,
        guard_delta = report.guard_delta,
        vigour_delta = report.vigour_delta,
        "damage applied"
    );
    Ok(report)
}

/// Aid: a Mortally Wounded combatant is stabilised and returns to Alive.
///
/// Returns whether anything changed.
pub fn tend(target: &mut Combatant) -> Result<bool, EngineError> {
    if target.is_slain() {
        return Err(EngineError::TerminalStateViolation(target.id));
    }
    if target.status != LifeStatus::MortallyWounded {
        return Ok(false);
    }
    target.status = LifeStatus::Alive;
    target.mortal_wound_days = 0;
    Ok(true)
}

/// Advances an untended Mortal Wound by `days`. Returns true if the
/// combatant died of it.
pub fn bleed_out(target: &mut Combatant, days: u32, window_days: u32) -> bool {
    if target.status != LifeStatus::MortallyWounded {
        return false;
    }
    target.mortal_wound_days = target.mortal_wound_days.saturating_add(days);
    if target.mortal_wound_days >= window_days {
        target.status = LifeStatus::Slain;
        target.leading = None;
        tracing::info!(target = %target.id, name = %target.name, "died of a mortal wound");
        return true;
    }
    false
}
