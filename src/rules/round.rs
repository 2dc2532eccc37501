//! Round sequencing.
//!
//! An encounter moves Start -> SurpriseCheck -> ActionDeclaration ->
//! Resolution -> PostResolution, then loops back to ActionDeclaration or
//! stops at End. A round's whole batch of declarations is vetted before any
//! of it resolves, and the round runs on a copy of the encounter that is only
//! committed once every step has succeeded.

use std::collections::{BTreeMap, BTreeSet};

use crate::dice::{save, DiceSource};
use crate::error::{EngineError, Rejection};
use crate::model::combatant::{Feat, LifeStatus};
use crate::model::declaration::{Declaration, WithdrawKind};
use crate::model::encounter::{EndReason, Encounter, Entity, EntityId, RoundPhase, Side};
use crate::model::virtue::{Condition, Virtue};
use crate::model::warband::WarbandStatus;

use super::attack::{
    apply_pending_scars, arm_attack, arm_deny, check_reference, current_leaders, pay_feat_costs, resolve_group,
    ArmedAttack, Denial,
};
use super::damage;
use super::feat::{self, claim_feat};
use super::outcome::{
    EncounterSummary, RoundReport, StatusChange, StatusTransition, SurpriseCheck, SurpriseReport, SurvivorState,
    TimeReport, UnitState,
};
use super::siege::repair_ship;
use super::unit::{check_morale, lead_from_front, release_officers, release_unit};

/// The phase that follows `phase`.
///
/// `decided` is whether the fight is over: after the surprise check (one side
/// never showed up) or after a round has been settled.
pub fn next_phase(phase: RoundPhase, decided: bool) -> RoundPhase {
    match phase {
        RoundPhase::Start => RoundPhase::SurpriseCheck,
        RoundPhase::SurpriseCheck | RoundPhase::PostResolution if decided => RoundPhase::End,
        RoundPhase::SurpriseCheck | RoundPhase::PostResolution => RoundPhase::ActionDeclaration,
        RoundPhase::ActionDeclaration => RoundPhase::Resolution,
        RoundPhase::Resolution => RoundPhase::PostResolution,
        RoundPhase::End => RoundPhase::End,
    }
}

fn expect_phase(encounter: &Encounter, expected: RoundPhase) -> Result<(), EngineError> {
    if encounter.phase != expected {
        return Err(EngineError::WrongPhase { expected, actual: encounter.phase });
    }
    Ok(())
}

/// Opens the encounter: every unprepared fighter rolls a Clarity save, and
/// those who fail sit out round 1.
pub fn begin_encounter(encounter: &mut Encounter, dice: &mut dyn DiceSource) -> Result<SurpriseReport, EngineError> {
    expect_phase(encounter, RoundPhase::Start)?;
    encounter.phase = next_phase(RoundPhase::Start, false);

    let save_die = encounter.rules.save_die;
    let mut report = SurpriseReport::default();
    for entity in encounter.entities.values_mut() {
        let (id, clarity, surprised) = match entity {
            Entity::Combatant(c) if c.unprepared && c.is_standing() => {
                (c.id, c.vitals.virtues.clarity, &mut c.surprised)
            }
            Entity::Warband(w) if w.unprepared && w.status.is_present() => {
                (w.id, w.vitals.virtues.clarity, &mut w.surprised)
            }
            _ => continue,
        };
        let roll = save(dice, save_die, clarity);
        *surprised = !roll.passed;
        if *surprised {
            tracing::info!(entity = %id, roll = roll.roll, "caught by surprise");
        }
        report.checks.push(SurpriseCheck { entity: id, save: roll, surprised: !roll.passed });
    }

    encounter.round = 1;
    let decided = encounter.standing_sides().len() <= 1;
    if decided {
        report.end = Some(finish(encounter, EndReason::Defeat));
    } else {
        encounter.phase = next_phase(RoundPhase::SurpriseCheck, false);
    }
    tracing::info!(checks = report.checks.len(), "encounter begun");
    Ok(report)
}

/// Resolves one round's batch of declarations.
///
/// Unknown or terminal handles abort the round with nothing committed.
/// Anything else wrong with a declaration is reported as a [`Rejection`] and
/// the rest of the batch proceeds.
pub fn resolve_round(
    encounter: &mut Encounter,
    declarations: &[Declaration],
    dice: &mut dyn DiceSource,
) -> Result<RoundReport, EngineError> {
    expect_phase(encounter, RoundPhase::ActionDeclaration)?;
    let mut working = encounter.clone();
    let report = run_round(&mut working, declarations, dice)?;
    *encounter = working;
    Ok(report)
}

type ConditionMap = BTreeMap<EntityId, BTreeSet<Condition>>;

fn condition_snapshot(encounter: &Encounter) -> ConditionMap {
    encounter
        .entities
        .values()
        .filter_map(|e| match e {
            Entity::Combatant(c) if !c.is_slain() => Some((c.id, c.all_conditions())),
            Entity::Warband(w) if w.status.is_present() => Some((w.id, w.all_conditions())),
            _ => None,
        })
        .collect()
}

fn check_references(encounter: &Encounter, declarations: &[Declaration]) -> Result<(), EngineError> {
    for decl in declarations {
        match decl {
            Declaration::Attack(a) => {
                check_reference(encounter, a.attacker)?;
                for &target in &a.targets {
                    check_reference(encounter, target)?;
                }
            }
            Declaration::Deny { actor, protect } => {
                check_reference(encounter, *actor)?;
                check_reference(encounter, *protect)?;
            }
            Declaration::LeadFromFront { officer, warband } => {
                check_reference(encounter, *officer)?;
                check_reference(encounter, *warband)?;
            }
            Declaration::Withdraw { .. } => {}
        }
    }
    Ok(())
}

fn run_round(
    encounter: &mut Encounter,
    declarations: &[Declaration],
    dice: &mut dyn DiceSource,
) -> Result<RoundReport, EngineError> {
    let round = encounter.round;
    encounter.phase = next_phase(RoundPhase::ActionDeclaration, false);
    // Links made at setup hold for round 1; declared links last one round.
    if round > 1 {
        release_officers(encounter);
    }
    let before = condition_snapshot(encounter);
    check_references(encounter, declarations)?;
    let mut rejections: Vec<Rejection> = Vec::new();

    for (index, decl) in declarations.iter().enumerate() {
        let Declaration::LeadFromFront { officer, warband } = decl else { continue };
        let surprised = round == 1 && matches!(encounter.get(*officer), Ok(Entity::Combatant(c)) if c.surprised);
        let led = if surprised {
            Err(format!("{} is surprised", officer))
        } else {
            lead_from_front(encounter, *officer, *warband)
        };
        if let Err(reason) = led {
            tracing::warn!(%officer, %warband, %reason, "lead from the front refused");
            rejections.push(Rejection::illegal(index, Some(*officer), reason));
        }
    }
    let leaders = current_leaders(encounter);

    let mut armed: Vec<ArmedAttack> = Vec::new();
    let mut attackers = BTreeSet::new();
    for (index, decl) in declarations.iter().enumerate() {
        let Declaration::Attack(attack) = decl else { continue };
        if !attackers.insert(attack.attacker) {
            rejections.push(Rejection::illegal(index, Some(attack.attacker), "already declared an attack this round"));
            continue;
        }
        if let Some(a) = arm_attack(encounter, index, attack, round, &leaders, &mut rejections)? {
            armed.push(a);
        }
    }

    let mut denials: Vec<Denial> = Vec::new();
    for (index, decl) in declarations.iter().enumerate() {
        let Declaration::Deny { actor, protect } = decl else { continue };
        if denials.iter().any(|d| d.protect == *protect) {
            rejections.push(Rejection::illegal(index, Some(*actor), format!("{} is already protected", protect)));
            continue;
        }
        let denial = match arm_deny(encounter, index, *actor, *protect, round)? {
            Ok(denial) => denial,
            Err(rejection) => {
                rejections.push(rejection);
                continue;
            }
        };
        if !armed.iter().any(|a| a.decl.targets.contains(protect)) {
            tracing::debug!(%actor, %protect, "nothing to deny");
            continue;
        }
        if let Err(reason) = claim_feat(encounter.combatant_mut(*actor)?, Feat::Deny) {
            rejections.push(Rejection::illegal(index, Some(*actor), reason));
            continue;
        }
        denials.push(denial);
    }

    let sides = encounter.sides();
    let mut withdrawal: Option<EndReason> = None;
    for (index, decl) in declarations.iter().enumerate() {
        let Declaration::Withdraw { side, kind } = decl else { continue };
        if !sides.contains(side) {
            rejections.push(Rejection::illegal(index, None, format!("side {} is not in this encounter", side.0)));
            continue;
        }
        if withdrawal.is_some() {
            rejections.push(Rejection::illegal(index, None, "another side already withdrew this round"));
            continue;
        }
        withdrawal = Some(match kind {
            WithdrawKind::Retreat => EndReason::Retreat { side: *side },
            WithdrawKind::Surrender => EndReason::Surrender { side: *side },
        });
    }

    let mut groups: BTreeMap<EntityId, Vec<&ArmedAttack>> = BTreeMap::new();
    for attack in &armed {
        for &target in &attack.decl.targets {
            groups.entry(target).or_default().push(attack);
        }
    }
    let mut outcomes = Vec::with_capacity(groups.len());
    for (&defender, group) in &groups {
        // An officer can fall with their unit before their own attackers come up.
        let fallen = encounter.get(defender).map_or(true, |e| e.is_terminal());
        if fallen {
            for attack in group {
                rejections.push(Rejection::violation(
                    attack.index,
                    Some(attack.decl.attacker),
                    format!("{} fell before the blow landed", defender),
                ));
            }
            continue;
        }
        let denial = denials.iter().find(|d| d.protect == defender);
        outcomes.push(resolve_group(encounter, defender, group, denial, round, dice)?);
    }
    pay_feat_costs(encounter, &armed, &denials, &mut outcomes, dice);

    encounter.phase = next_phase(RoundPhase::Resolution, false);
    apply_pending_scars(encounter, round, &mut outcomes, dice)?;
    let mut transitions = settle(encounter, round);

    let reported: BTreeSet<(EntityId, Condition)> = outcomes
        .iter()
        .flat_map(|o| o.transitions.iter())
        .filter_map(|t| match t.change {
            StatusChange::ConditionGained(c) => Some((t.entity, c)),
            _ => None,
        })
        .collect();
    let after = condition_snapshot(encounter);
    for (&id, now) in &after {
        let empty = BTreeSet::new();
        let was = before.get(&id).unwrap_or(&empty);
        for &c in now.difference(was) {
            if !reported.contains(&(id, c)) {
                transitions.push(StatusTransition::new(id, StatusChange::ConditionGained(c)));
            }
        }
        for &c in was.difference(now) {
            transitions.push(StatusTransition::new(id, StatusChange::ConditionLost(c)));
        }
    }

    rejections.sort_by_key(|r| r.declaration);
    let end = if encounter.standing_sides().len() <= 1 { Some(EndReason::Defeat) } else { withdrawal };
    match end {
        Some(reason) => {
            finish(encounter, reason);
        }
        None => {
            encounter.phase = next_phase(RoundPhase::PostResolution, false);
            encounter.round += 1;
        }
    }
    tracing::info!(
        round,
        defenders = outcomes.len(),
        rejected = rejections.len(),
        ended = end.is_some(),
        "round resolved"
    );
    Ok(RoundReport { round, outcomes, rejections, transitions, end })
}

/// PostResolution bookkeeping: morale, Impair expiry, and surprise.
fn settle(encounter: &mut Encounter, round: u32) -> Vec<StatusTransition> {
    let mut transitions = Vec::new();
    let mut fallen = Vec::new();
    for entity in encounter.entities.values_mut() {
        if let Entity::Warband(w) = entity {
            if let Some(status) = check_morale(w) {
                transitions.extend(
                    StatusChange::from_warband_status(status).map(|change| StatusTransition::new(w.id, change)),
                );
                if status == WarbandStatus::WipedOut {
                    fallen.push(w.id);
                }
            }
        }
    }
    for id in fallen {
        release_unit(encounter, id);
    }

    for entity in encounter.entities.values_mut() {
        let (conditions, until, surprised) = match entity {
            Entity::Combatant(c) => (&mut c.conditions, &mut c.impaired_until, &mut c.surprised),
            Entity::Warband(w) => (&mut w.conditions, &mut w.impaired_until, &mut w.surprised),
            Entity::Structure(_) => continue,
        };
        if until.is_some_and(|u| u <= round) {
            *until = None;
            conditions.remove(&Condition::Impaired);
        }
        *surprised = false;
    }
    transitions
}

/// Moves the encounter to End and resets what does not outlast a fight.
///
/// Guard is restored for everyone still on the field. Fatigue is kept: only
/// a rest clears it.
fn finish(encounter: &mut Encounter, reason: EndReason) -> EndReason {
    encounter.phase = RoundPhase::End;
    encounter.end = Some(reason);
    for entity in encounter.entities.values_mut() {
        match entity {
            Entity::Combatant(c) => {
                c.leading = None;
                c.surprised = false;
                c.impaired_until = None;
                c.conditions.remove(&Condition::Impaired);
                if !c.is_slain() {
                    c.vitals.restore_guard();
                }
            }
            Entity::Warband(w) => {
                w.led_by = None;
                w.surprised = false;
                w.impaired_until = None;
                w.conditions.remove(&Condition::Impaired);
                if w.status.is_present() {
                    w.vitals.restore_guard();
                }
            }
            Entity::Structure(_) => {}
        }
    }
    tracing::info!(?reason, rounds = encounter.round, "encounter ended");
    reason
}

/// Ends the encounter on the decision layer's say-so.
pub fn conclude(encounter: &mut Encounter, kind: WithdrawKind, side: Side) -> Result<EndReason, EngineError> {
    if encounter.phase == RoundPhase::End {
        return Err(EngineError::WrongPhase { expected: RoundPhase::ActionDeclaration, actual: RoundPhase::End });
    }
    let reason = match kind {
        WithdrawKind::Retreat => EndReason::Retreat { side },
        WithdrawKind::Surrender => EndReason::Surrender { side },
    };
    Ok(finish(encounter, reason))
}

/// The outside world advancing by `days`: Mortal Wounds run their course and
/// ships in dock make repairs.
pub fn advance_days(encounter: &mut Encounter, days: u32) -> Result<TimeReport, EngineError> {
    let window = encounter.rules.mortal_wound_window_days;
    let per_guard = encounter.rules.ship_repair_days_per_guard;
    encounter.day = encounter.day.saturating_add(days);
    let mut report = TimeReport { day: encounter.day, ..TimeReport::default() };
    for entity in encounter.entities.values_mut() {
        match entity {
            Entity::Combatant(c) => {
                if damage::bleed_out(c, days, window) {
                    report.bled_out.push(c.id);
                }
            }
            Entity::Structure(s) if s.is_ship() && !s.destroyed => {
                let restored = repair_ship(s, days, per_guard)?;
                if restored > 0 {
                    report.repaired.push((s.id, restored));
                }
            }
            _ => {}
        }
    }
    for id in &report.bled_out {
        for entity in encounter.entities.values_mut() {
            if let Entity::Warband(w) = entity {
                if w.led_by == Some(*id) {
                    w.led_by = None;
                }
            }
        }
    }
    tracing::info!(days, day = encounter.day, bled_out = report.bled_out.len(), "time advanced");
    Ok(report)
}

/// A rest for one combatant or Warband.
pub fn rest(encounter: &mut Encounter, id: EntityId) -> Result<(), EngineError> {
    match encounter.get_mut(id)? {
        Entity::Combatant(c) => feat::rest(c),
        Entity::Warband(w) => {
            w.conditions.remove(&Condition::Fatigued);
            w.vitals.restore_guard();
        }
        Entity::Structure(_) => return Err(EngineError::WrongKind { id, expected: "combatant or warband" }),
    }
    Ok(())
}

/// Aid for a Mortally Wounded combatant. Returns whether they were stabilised.
pub fn tend(encounter: &mut Encounter, id: EntityId) -> Result<bool, EngineError> {
    let c = encounter.combatant_mut(id)?;
    let stabilised = damage::tend(c)?;
    if stabilised {
        tracing::info!(%id, name = %c.name, "stabilised");
    }
    Ok(stabilised)
}

/// Raises or lowers a Virtue outside of damage.
///
/// Never wounds or kills, however low the Virtue goes. A Warband whose
/// Spirit or Vigour reaches 0 this way still gets its morale check.
pub fn adjust_virtue(
    encounter: &mut Encounter,
    id: EntityId,
    virtue: Virtue,
    delta: i16,
) -> Result<Vec<StatusTransition>, EngineError> {
    let amount = delta.unsigned_abs().min(u8::MAX as u16) as u8;
    let mut transitions = Vec::new();
    match encounter.get_mut(id)? {
        Entity::Combatant(c) => {
            if delta < 0 {
                c.vitals.virtues.lose(virtue, amount);
            } else {
                c.vitals.virtues.gain(virtue, amount);
            }
        }
        Entity::Warband(w) => {
            if delta < 0 {
                w.vitals.virtues.lose(virtue, amount);
            } else {
                w.vitals.virtues.gain(virtue, amount);
            }
            if let Some(status) = check_morale(w) {
                transitions.extend(StatusChange::from_warband_status(status).map(|c| StatusTransition::new(id, c)));
            }
        }
        Entity::Structure(_) => return Err(EngineError::WrongKind { id, expected: "combatant or warband" }),
    }
    tracing::debug!(%id, ?virtue, delta, "virtue adjusted");
    Ok(transitions)
}

/// The final record of an encounter.
pub fn summary(encounter: &Encounter) -> EncounterSummary {
    let standing = encounter.standing_sides();
    let winner = match encounter.end {
        Some(EndReason::Defeat) if standing.len() == 1 => Some(standing[0]),
        Some(EndReason::Retreat { side }) | Some(EndReason::Surrender { side }) => {
            let others: Vec<Side> = encounter.sides().into_iter().filter(|s| *s != side).collect();
            if others.len() == 1 {
                Some(others[0])
            } else {
                None
            }
        }
        _ => None,
    };

    let survivors = encounter
        .survivors()
        .map(|c| SurvivorState {
            id: c.id,
            name: c.name.clone(),
            side: c.side,
            status: c.status,
            guard: c.vitals.guard,
            max_guard: c.vitals.max_guard,
            vigour: c.vitals.virtues.vigour,
            clarity: c.vitals.virtues.clarity,
            spirit: c.vitals.virtues.spirit,
            conditions: c.all_conditions().into_iter().collect(),
            scars: c.scars.len(),
        })
        .collect();
    let mut warbands = Vec::new();
    let mut destroyed_structures = Vec::new();
    for entity in encounter.entities.values() {
        match entity {
            Entity::Warband(w) => warbands.push(UnitState {
                id: w.id,
                name: w.name.clone(),
                side: w.side,
                status: w.status,
                vigour: w.vitals.virtues.vigour,
                spirit: w.vitals.virtues.spirit,
            }),
            Entity::Structure(s) if s.destroyed => destroyed_structures.push(s.id),
            _ => {}
        }
    }

    EncounterSummary {
        winner,
        reason: encounter.end,
        rounds: encounter.round,
        survivors,
        warbands,
        destroyed_structures,
        scars_gained: encounter.scars_gained.clone(),
    }
}

/// Whether `id` is a combatant still able to act this round.
pub fn can_act(encounter: &Encounter, id: EntityId) -> bool {
    match encounter.get(id) {
        Ok(Entity::Combatant(c)) => c.status == LifeStatus::Alive && !(c.surprised && encounter.round == 1),
        Ok(Entity::Warband(w)) => w.status.is_present() && !(w.surprised && encounter.round == 1),
        _ => false,
    }
}
