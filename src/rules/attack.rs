//! Attack resolution.
//!
//! Every attack aimed at one defender in a round is resolved together: the
//! attackers' dice go into one pool, Deny may strike a die out, Gambits claim
//! the dice they spend, and the single highest remaining die sets the base
//! damage. Each other attacker who funded no Gambit adds +1 Bolster.
//!
//! Vetting ([`arm_attack`]) happens against the state at the start of the
//! round, so an attacker struck down earlier in the same round still swings.

use std::collections::BTreeMap;

use crate::config::RulesConfig;
use crate::dice::{DiceSource, Die};
use crate::error::{EngineError, Rejection};
use crate::model::combatant::{Combatant, Feat, LifeStatus};
use crate::model::declaration::{AttackDeclaration, AttackRange, DieSlot, GambitEffect, GambitIntent, SmiteMode};
use crate::model::encounter::{Encounter, Entity, EntityId, ScarEvent};
use crate::model::structure::DamageSource;
use crate::model::virtue::Condition;

use super::damage::apply_damage;
use super::feat::{check_feat, claim_feat, pay_feat_cost};
use super::gambit::{apply_gambit, fund_gambit, Funding};
use super::outcome::{OfficerShare, PooledDie, ResolutionOutcome, StatusChange, StatusTransition};
use super::scar::{apply_scar, roll_scar};
use super::siege::apply_structural_damage;
use super::unit::{apply_unit_damage, can_strike_warband, release_unit, share_with_officer};

/// An attack that survived vetting.
///
/// `decl` is a copy of the declaration with rejected Feats stripped and
/// targets narrowed to the ones it can actually affect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedAttack {
    pub index: usize,
    pub decl: AttackDeclaration,
    pub warband: bool,
    pub impaired: bool,
    /// An officer leading the attacking unit, and the die they add.
    pub officer: Option<(EntityId, Die)>,
}

impl ArmedAttack {
    /// Dice this attack rolls, in rolling order.
    ///
    /// A Warband only gains its bonus die when `against_individual` is set.
    pub fn pool(&self, rules: &RulesConfig, against_individual: bool) -> Vec<(EntityId, DieSlot, Die)> {
        let attacker = self.decl.attacker;
        if self.impaired {
            return vec![(attacker, DieSlot::Primary, Die::SMALLEST)];
        }
        let mut pool = vec![(attacker, DieSlot::Primary, self.decl.weapon.primary)];
        if let Some(secondary) = self.decl.weapon.secondary {
            pool.push((attacker, DieSlot::Secondary, secondary));
        }
        if self.decl.smite == Some(SmiteMode::BonusDie) {
            pool.push((attacker, DieSlot::Bonus, rules.smite_bonus_die));
        }
        if self.warband && against_individual {
            pool.push((attacker, DieSlot::Bonus, rules.warband_bonus_die));
        }
        if let Some((officer, die)) = self.officer {
            pool.push((officer, DieSlot::Primary, die));
        }
        pool
    }
}

/// A Deny that will discard a die from the attack on `protect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denial {
    pub index: usize,
    pub actor: EntityId,
    pub protect: EntityId,
}

/// Fails hard on handles that are unknown, fled, or terminal.
pub fn check_reference(encounter: &Encounter, id: EntityId) -> Result<(), EngineError> {
    if encounter.get(id)?.is_terminal() {
        return Err(EngineError::TerminalStateViolation(id));
    }
    Ok(())
}

/// Officers currently leading a unit, keyed by the unit.
pub fn current_leaders(encounter: &Encounter) -> BTreeMap<EntityId, (EntityId, Die)> {
    let mut leaders = BTreeMap::new();
    for entity in encounter.entities.values() {
        if let Entity::Warband(w) = entity {
            let Some(officer) = w.led_by else { continue };
            if let Some(Entity::Combatant(c)) = encounter.entities.get(&officer) {
                let die = if c.has_condition(Condition::Impaired) { Die::SMALLEST } else { c.weapon.primary };
                leaders.insert(w.id, (officer, die));
            }
        }
    }
    leaders
}

fn combatant_barred(c: &Combatant, round: u32, decl: &AttackDeclaration) -> Option<String> {
    if c.status != LifeStatus::Alive {
        return Some(format!("{} is down", c.name));
    }
    if c.surprised && round == 1 {
        return Some(format!("{} is surprised", c.name));
    }
    if let Some(unit) = c.leading {
        return Some(format!("{} is leading {} from the front", c.name, unit));
    }
    if decl.moved && c.has_condition(Condition::Exhausted) {
        return Some(format!("{} is exhausted and already moved", c.name));
    }
    None
}

/// Vets one attack declaration.
///
/// Unknown or terminal handles abort with an error. Anything else wrong is
/// pushed to `rejections`: either the whole attack is dropped (`Ok(None)`) or
/// just the offending Feat or target is.
pub fn arm_attack(
    encounter: &mut Encounter,
    index: usize,
    decl: &AttackDeclaration,
    round: u32,
    leaders: &BTreeMap<EntityId, (EntityId, Die)>,
    rejections: &mut Vec<Rejection>,
) -> Result<Option<ArmedAttack>, EngineError> {
    let attacker = decl.attacker;
    let actor = Some(attacker);
    check_reference(encounter, attacker)?;
    for &target in &decl.targets {
        check_reference(encounter, target)?;
    }

    let mut armed = decl.clone();
    let (warband, impaired) = match encounter.get(attacker)? {
        Entity::Combatant(c) => {
            if let Some(reason) = combatant_barred(c, round, decl) {
                rejections.push(Rejection::illegal(index, actor, reason));
                return Ok(None);
            }
            if let Some(mode) = decl.smite {
                let refusal = match check_feat(c, Feat::Smite) {
                    Err(reason) => Some(reason),
                    Ok(()) if decl.range != AttackRange::Melee => {
                        Some("smite needs a melee attack".to_string())
                    }
                    Ok(()) => None,
                };
                if let Some(reason) = refusal {
                    tracing::warn!(%attacker, ?mode, %reason, "smite refused");
                    rejections.push(Rejection::illegal(index, actor, reason));
                    armed.smite = None;
                }
            }
            if let Some(intent) = &decl.focus {
                let refusal = match check_feat(c, Feat::Focus) {
                    Err(reason) => Some(reason),
                    Ok(()) if intent.strong.is_some() => Some("a focused gambit cannot be strong".to_string()),
                    Ok(()) => None,
                };
                if let Some(reason) = refusal {
                    tracing::warn!(%attacker, %reason, "focus refused");
                    rejections.push(Rejection::illegal(index, actor, reason));
                    armed.focus = None;
                }
            }
            (false, c.has_condition(Condition::Impaired))
        }
        Entity::Warband(w) => {
            if w.surprised && round == 1 {
                rejections.push(Rejection::illegal(index, actor, format!("{} is surprised", w.name)));
                return Ok(None);
            }
            if decl.smite.is_some() || decl.focus.is_some() {
                rejections.push(Rejection::illegal(index, actor, "warbands cannot use feats"));
                armed.smite = None;
                armed.focus = None;
            }
            (true, w.has_condition(Condition::Impaired))
        }
        Entity::Structure(s) => {
            rejections.push(Rejection::illegal(index, actor, format!("{} cannot attack", s.name)));
            return Ok(None);
        }
    };

    let mut targets: Vec<EntityId> = Vec::new();
    for &target in &decl.targets {
        if target == attacker || targets.contains(&target) {
            rejections.push(Rejection::illegal(index, actor, format!("cannot target {} again", target)));
            continue;
        }
        let is_unit = matches!(encounter.get(target)?, Entity::Warband(_));
        if is_unit && !can_strike_warband(warband, &armed) {
            rejections.push(Rejection::violation(
                index,
                actor,
                format!("an ordinary attack cannot harm warband {}", target),
            ));
            continue;
        }
        targets.push(target);
    }
    if decl.targets.is_empty() {
        rejections.push(Rejection::illegal(index, actor, "attack names no target"));
    }
    if targets.is_empty() {
        return Ok(None);
    }
    if targets.len() > 1 && !warband && !armed.is_blast() {
        rejections.push(Rejection::illegal(index, actor, "only a blast can strike several targets"));
        return Ok(None);
    }
    armed.targets = targets;

    if !warband {
        let c = encounter.combatant_mut(attacker)?;
        if armed.smite.is_some() {
            if let Err(reason) = claim_feat(c, Feat::Smite) {
                rejections.push(Rejection::illegal(index, actor, reason));
                armed.smite = None;
            }
        }
        if armed.focus.is_some() {
            if let Err(reason) = claim_feat(c, Feat::Focus) {
                rejections.push(Rejection::illegal(index, actor, reason));
                armed.focus = None;
            }
        }
    }

    let officer = if warband && !impaired { leaders.get(&attacker).copied() } else { None };
    Ok(Some(ArmedAttack { index, decl: armed, warband, impaired, officer }))
}

fn vet_deny(encounter: &Encounter, actor: EntityId, protect: EntityId, round: u32) -> Result<(), String> {
    let c = match encounter.get(actor) {
        Ok(Entity::Combatant(c)) => c,
        _ => return Err("only individual combatants can deny".to_string()),
    };
    if c.surprised && round == 1 {
        return Err(format!("{} is surprised", c.name));
    }
    check_feat(c, Feat::Deny)?;
    let side = match encounter.get(protect) {
        Ok(Entity::Combatant(p)) => p.side,
        Ok(Entity::Warband(w)) => w.side,
        _ => return Err(format!("{} cannot be protected", protect)),
    };
    if side != c.side {
        return Err(format!("{} is not an ally of {}", protect, c.name));
    }
    Ok(())
}

/// Vets a Deny declaration. The Feat is not claimed here: a Deny with no
/// incoming attack to answer is skipped without cost.
pub fn arm_deny(
    encounter: &Encounter,
    index: usize,
    actor: EntityId,
    protect: EntityId,
    round: u32,
) -> Result<Result<Denial, Rejection>, EngineError> {
    check_reference(encounter, actor)?;
    check_reference(encounter, protect)?;
    Ok(vet_deny(encounter, actor, protect, round)
        .map(|()| Denial { index, actor, protect })
        .map_err(|reason| Rejection::illegal(index, Some(actor), reason)))
}

/// First index holding the highest face among `candidates`.
fn highest(pool: &[PooledDie], candidates: impl Iterator<Item = usize>) -> Option<usize> {
    let mut best: Option<usize> = None;
    for i in candidates {
        match best {
            Some(b) if pool[b].face >= pool[i].face => {}
            _ => best = Some(i),
        }
    }
    best
}

/// A Gambit that found a die (or Focus) to pay for it.
struct Funded<'a> {
    attack: &'a ArmedAttack,
    intent: &'a GambitIntent,
    funding: Funding,
}

/// Damage from one lane of the pool.
struct Tally {
    source: DamageSource,
    base: Option<PooledDie>,
    bolster: u16,
    raw: u16,
    scar_face: u8,
}

fn tally(source: DamageSource, lane: &[&ArmedAttack], pool: &[PooledDie], spent: &[bool], funded: &[Funded]) -> Tally {
    let in_lane = |declaration: usize| lane.iter().any(|a| a.index == declaration);
    let base = highest(pool, (0..pool.len()).filter(|&i| !spent[i] && in_lane(pool[i].declaration))).map(|i| pool[i]);

    let mut bolster = 0u16;
    let mut bolster_face = None;
    for f in funded.iter().filter(|f| f.intent.effect == GambitEffect::Bolster && in_lane(f.attack.index)) {
        bolster += 1;
        if let Funding::Die(face) = f.funding {
            bolster_face = bolster_face.max(Some(face));
        }
    }
    // Only attackers beyond the one whose die leads add the default +1, and
    // only if none of their Gambits went through.
    if let Some(leader) = base.map(|d| d.declaration) {
        for attack in lane {
            let gambled = funded.iter().any(|f| f.attack.index == attack.index);
            if attack.index != leader && !gambled {
                bolster += 1;
            }
        }
    }

    let raw = base.map_or(0, |d| d.face as u16) + bolster;
    let scar_face = base.map(|d| d.face).or(bolster_face).unwrap_or(1);
    Tally { source, base, bolster, raw, scar_face }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DefenderKind {
    Combatant,
    Warband,
    Structure,
}

fn status_change(status: LifeStatus) -> Option<StatusChange> {
    match status {
        LifeStatus::Alive => None,
        LifeStatus::MortallyWounded => Some(StatusChange::MortallyWounded),
        LifeStatus::Slain => Some(StatusChange::Slain),
    }
}

/// Resolves every armed attack aimed at `defender` as one exchange.
pub fn resolve_group(
    encounter: &mut Encounter,
    defender: EntityId,
    attacks: &[&ArmedAttack],
    denial: Option<&Denial>,
    round: u32,
    dice: &mut dyn DiceSource,
) -> Result<ResolutionOutcome, EngineError> {
    let rules = encounter.rules.clone();
    let kind = match encounter.get(defender)? {
        Entity::Combatant(_) => DefenderKind::Combatant,
        Entity::Warband(_) => DefenderKind::Warband,
        Entity::Structure(_) => DefenderKind::Structure,
    };
    let mut outcome = ResolutionOutcome::new(round, defender);
    outcome.attackers = attacks.iter().map(|a| a.decl.attacker).collect();

    let mut pool: Vec<PooledDie> = Vec::new();
    for attack in attacks {
        for (owner, slot, die) in attack.pool(&rules, kind == DefenderKind::Combatant) {
            let face = dice.roll_die(die);
            pool.push(PooledDie { declaration: attack.index, owner, slot, die, face });
        }
    }
    if let Some(denial) = denial {
        if let Some(i) = highest(&pool, 0..pool.len()) {
            let discarded = pool.remove(i);
            tracing::debug!(actor = %denial.actor, %defender, face = discarded.face, "die denied");
            outcome.denied.push(discarded);
        }
    }
    tracing::debug!(%defender, faces = ?pool.iter().map(|d| d.face).collect::<Vec<_>>(), "pool rolled");

    let mut spent = vec![false; pool.len()];
    let mut funded: Vec<Funded> = Vec::new();
    for &attack in attacks {
        let actor = Some(attack.decl.attacker);
        let range = attack.decl.range;
        for intent in &attack.decl.gambits {
            if kind == DefenderKind::Structure && intent.effect != GambitEffect::Bolster {
                outcome
                    .rejections
                    .push(Rejection::illegal(attack.index, actor, format!("{:?} has no effect on a structure", intent.effect)));
                continue;
            }
            let own = |d: &PooledDie| d.declaration == attack.index && d.owner == attack.decl.attacker && d.slot == intent.die;
            let Some(i) = (0..pool.len()).find(|&i| !spent[i] && own(&pool[i])) else {
                let reason = if outcome.denied.iter().any(own) { "was denied" } else { "is not in the pool" };
                outcome
                    .rejections
                    .push(Rejection::illegal(attack.index, actor, format!("{:?} die {}", intent.die, reason)));
                continue;
            };
            let funding = Funding::Die(pool[i].face);
            match fund_gambit(intent, funding, range) {
                Ok(()) => {
                    spent[i] = true;
                    funded.push(Funded { attack, intent, funding });
                }
                Err(reason) => {
                    tracing::warn!(attacker = %attack.decl.attacker, %reason, "gambit refused");
                    outcome.rejections.push(Rejection::illegal(attack.index, actor, reason));
                }
            }
        }
        if let Some(intent) = &attack.decl.focus {
            // A Blast carries its focused Gambit to the first target only.
            if attack.decl.targets.first() != Some(&defender) {
                continue;
            }
            if kind == DefenderKind::Structure && intent.effect != GambitEffect::Bolster {
                outcome
                    .rejections
                    .push(Rejection::illegal(attack.index, actor, format!("{:?} has no effect on a structure", intent.effect)));
                continue;
            }
            match fund_gambit(intent, Funding::Focus, range) {
                Ok(()) => funded.push(Funded { attack, intent, funding: Funding::Focus }),
                Err(reason) => outcome.rejections.push(Rejection::illegal(attack.index, actor, reason)),
            }
        }
    }
    outcome.dice = pool.clone();

    let mut lanes: BTreeMap<DamageSource, Vec<&ArmedAttack>> = BTreeMap::new();
    for &attack in attacks {
        let key = if kind == DefenderKind::Structure { attack.decl.source } else { DamageSource::Ordinary };
        lanes.entry(key).or_default().push(attack);
    }
    let tallies: Vec<Tally> = lanes
        .iter()
        .map(|(&source, lane)| tally(source, lane, &pool, &spent, &funded))
        .collect();
    outcome.bolster = tallies.iter().map(|t| t.bolster).sum();
    outcome.damage_before_armor = tallies.iter().map(|t| t.raw).sum();
    outcome.base_die = tallies.iter().filter_map(|t| t.base).max_by_key(|d| d.face);

    match (kind, tallies.first()) {
        (_, None) => {}
        (DefenderKind::Combatant, Some(t)) => {
            let c = encounter.combatant_mut(defender)?;
            let before = c.status;
            let report = apply_damage(c, t.raw, None)?;
            outcome.record_hit(&report);
            if c.status != before {
                if let Some(change) = status_change(c.status) {
                    outcome.transitions.push(StatusTransition::new(defender, change));
                }
            }
            if report.scar_due() {
                outcome.scar_face = Some(t.scar_face);
            }
        }
        (DefenderKind::Warband, Some(t)) => {
            let hit = apply_unit_damage(encounter.warband_mut(defender)?, t.raw, None)?;
            outcome.record_hit(&hit.report);
            if let Some(change) = hit.morale.and_then(StatusChange::from_warband_status) {
                outcome.transitions.push(StatusTransition::new(defender, change));
            }
            if let Some((officer, report, transitions)) = share_with_officer(encounter, defender, hit.report.damage)? {
                outcome.officer = Some(OfficerShare {
                    officer,
                    damage: report,
                    scar_face: report.scar_due().then_some(t.scar_face),
                    scar: None,
                });
                outcome.transitions.extend(transitions);
            }
            if hit.morale.is_some() {
                release_unit(encounter, defender);
            }
        }
        (DefenderKind::Structure, Some(_)) => {
            let structure = encounter.structure_mut(defender)?;
            for t in &tallies {
                let report = apply_structural_damage(structure, t.raw, t.source)?;
                if report.ignored {
                    for attack in &lanes[&t.source] {
                        outcome.rejections.push(Rejection::violation(
                            attack.index,
                            Some(attack.decl.attacker),
                            format!("{} ignores {:?} damage", structure.name, t.source),
                        ));
                    }
                }
                outcome.armor = report.armor;
                outcome.damage_after_armor += report.damage;
                outcome.guard_delta += report.guard_delta;
                if report.destroyed {
                    outcome.transitions.push(StatusTransition::new(defender, StatusChange::Destroyed));
                }
                outcome.structural.push(report);
                if structure.destroyed {
                    break;
                }
            }
        }
    }

    for f in &funded {
        let Some(entity) = encounter.entities.get_mut(&defender) else { break };
        let (gambit, transition) = apply_gambit(f.attack.decl.attacker, f.intent, f.funding, entity, round, dice, rules.save_die);
        outcome.gambits.push(gambit);
        outcome.transitions.extend(transition);
    }

    tracing::info!(
        round,
        %defender,
        raw = outcome.damage_before_armor,
        damage = outcome.damage_after_armor,
        guard_delta = outcome.guard_delta,
        vigour_delta = outcome.vigour_delta,
        "attack resolved"
    );
    Ok(outcome)
}

/// Rolls the cost of every Feat used this round, in declaration order.
///
/// Each result is filed with the outcome for the Feat's first target (or the
/// protected ally, for Deny). Actors slain during the round pay nothing.
pub fn pay_feat_costs(
    encounter: &mut Encounter,
    armed: &[ArmedAttack],
    denials: &[Denial],
    outcomes: &mut [ResolutionOutcome],
    dice: &mut dyn DiceSource,
) {
    let save_die = encounter.rules.save_die;
    let mut costs: Vec<(usize, EntityId, Feat, EntityId)> = Vec::new();
    for attack in armed {
        let home = attack.decl.targets.first().copied().unwrap_or(attack.decl.attacker);
        if attack.decl.smite.is_some() {
            costs.push((attack.index, attack.decl.attacker, Feat::Smite, home));
        }
        if attack.decl.focus.is_some() {
            costs.push((attack.index, attack.decl.attacker, Feat::Focus, home));
        }
    }
    for denial in denials {
        costs.push((denial.index, denial.actor, Feat::Deny, denial.protect));
    }
    costs.sort_by_key(|c| c.0);

    for (_, actor, feat, home) in costs {
        let c = match encounter.entities.get_mut(&actor) {
            Some(Entity::Combatant(c)) if !c.is_slain() => c,
            _ => continue,
        };
        let paid = pay_feat_cost(c, feat, dice, save_die);
        if let Some(outcome) = outcomes.iter_mut().find(|o| o.defender == home) {
            outcome.feats.push(paid);
        }
    }
}

/// Applies the Scars earned during resolution, in outcome order.
pub fn apply_pending_scars(
    encounter: &mut Encounter,
    round: u32,
    outcomes: &mut [ResolutionOutcome],
    dice: &mut dyn DiceSource,
) -> Result<(), EngineError> {
    for outcome in outcomes.iter_mut() {
        if let Some(face) = outcome.scar_face {
            if let Some(Entity::Combatant(c)) = encounter.entities.get_mut(&outcome.defender) {
                if !c.is_slain() {
                    let scar = apply_scar(c, &roll_scar(face), dice)?;
                    outcome.scar = Some(scar);
                    encounter.scars_gained.push(ScarEvent { round, entity: outcome.defender, scar });
                }
            }
        }
        if let Some(share) = outcome.officer.as_mut() {
            let Some(face) = share.scar_face else { continue };
            if let Some(Entity::Combatant(c)) = encounter.entities.get_mut(&share.officer) {
                if !c.is_slain() {
                    let scar = apply_scar(c, &roll_scar(face), dice)?;
                    share.scar = Some(scar);
                    encounter.scars_gained.push(ScarEvent { round, entity: share.officer, scar });
                }
            }
        }
    }
    Ok(())
}

/// Resolves a set of attacks against one defender outside the round loop.
///
/// Every declaration is treated as aimed at `defender`. Feat costs and Scars
/// are settled before returning. The encounter is only changed if the whole
/// resolution succeeds.
pub fn resolve_attack(
    encounter: &mut Encounter,
    defender: EntityId,
    attacks: &[AttackDeclaration],
    dice: &mut dyn DiceSource,
) -> Result<ResolutionOutcome, EngineError> {
    let mut working = encounter.clone();
    let round = working.round.max(1);
    check_reference(&working, defender)?;

    let leaders = current_leaders(&working);
    let mut rejections = Vec::new();
    let mut armed = Vec::new();
    for (index, decl) in attacks.iter().enumerate() {
        let mut decl = decl.clone();
        decl.targets = vec![defender];
        if let Some(attack) = arm_attack(&mut working, index, &decl, round, &leaders, &mut rejections)? {
            armed.push(attack);
        }
    }

    let group: Vec<&ArmedAttack> = armed.iter().collect();
    let mut outcome = resolve_group(&mut working, defender, &group, None, round, dice)?;
    rejections.append(&mut outcome.rejections);
    rejections.sort_by_key(|r| r.declaration);
    outcome.rejections = rejections;

    let mut outcomes = [outcome];
    pay_feat_costs(&mut working, &armed, &[], &mut outcomes, dice);
    apply_pending_scars(&mut working, round, &mut outcomes, dice)?;
    *encounter = working;
    let [outcome] = outcomes;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDice;
    use crate::error::RejectionKind;
    use crate::model::combatant::ScarKind;
    use crate::model::declaration::{StrongGambit, WeaponDice};
    use crate::model::encounter::Side;
    use crate::model::structure::{Structure, StructureKind};
    use crate::model::virtue::{Virtues, Vitals};
    use crate::model::warband::{Warband, WarbandStatus};
    use crate::config::RulesConfig;

    const KNIGHT: EntityId = EntityId(1);
    const SQUIRE: EntityId = EntityId(2);
    const BRUTE: EntityId = EntityId(3);
    const MOB: EntityId = EntityId(4);
    const GATE: EntityId = EntityId(5);

    fn fighter(id: EntityId, name: &str, side: u8, guard: u8, armor: u8, weapon: WeaponDice) -> Entity {
        Entity::Combatant(Combatant::new(id, name, Side(side), Vitals::new(Virtues::new(10, 10, 10), guard, armor), weapon))
    }

    fn arena() -> Encounter {
        let mut enc = Encounter::new(RulesConfig::default());
        enc.round = 1;
        enc.insert(fighter(KNIGHT, "Knight", 0, 6, 1, WeaponDice::single(Die::D8)));
        enc.insert(fighter(SQUIRE, "Squire", 0, 4, 0, WeaponDice::single(Die::D6)));
        enc.insert(fighter(BRUTE, "Brute", 1, 5, 2, WeaponDice::single(Die::D10)));
        enc.insert(Entity::Warband(Warband::new(
            MOB,
            "Mob",
            Side(1),
            Vitals::new(Virtues::new(12, 10, 10), 4, 1),
            WeaponDice::single(Die::D6),
        )));
        enc.insert(Entity::Structure(Structure::new(GATE, "Gate", StructureKind::Gate, 5, 2)));
        enc
    }

    fn swing(attacker: EntityId, target: EntityId, weapon: Die) -> AttackDeclaration {
        AttackDeclaration::melee(attacker, target, WeaponDice::single(weapon))
    }

    #[test]
    fn bolstered_pair_breaks_guard_and_scars() {
        let mut enc = arena();
        let attacks = [
            swing(KNIGHT, BRUTE, Die::D8),
            swing(SQUIRE, BRUTE, Die::D6).with_gambit(GambitIntent::new(DieSlot::Primary, GambitEffect::Bolster)),
        ];
        // d8=7, d6=5, then the Hardened guard roll.
        let mut dice = ScriptedDice::new([7, 5, 3]);
        let out = resolve_attack(&mut enc, BRUTE, &attacks, &mut dice).unwrap();
        assert_eq!(out.base_die.unwrap().face, 7);
        assert_eq!(out.bolster, 1);
        assert_eq!(out.damage_before_armor, 8);
        assert_eq!(out.damage_after_armor, 6);
        assert_eq!(out.guard_delta, -5);
        assert_eq!(out.vigour_delta, -1);
        assert_eq!(out.scar_face, Some(7));
        assert_eq!(out.scar.unwrap().kind, ScarKind::Hardened);
        let brute = enc.combatant(BRUTE).unwrap();
        assert_eq!(brute.vitals.guard, 0);
        assert_eq!(brute.vitals.virtues.vigour, 9);
        assert_eq!(brute.vitals.max_guard, 8);
        assert_eq!(enc.scars_gained.len(), 1);
    }

    #[test]
    fn silent_second_attacker_bolsters_by_default() {
        let mut enc = arena();
        let attacks = [swing(KNIGHT, BRUTE, Die::D8), swing(SQUIRE, BRUTE, Die::D6)];
        // Then the Gouged scar: location and Clarity loss.
        let mut dice = ScriptedDice::new([2, 6, 4, 2]);
        let out = resolve_attack(&mut enc, BRUTE, &attacks, &mut dice).unwrap();
        // The squire's 6 is the base; the knight adds +1.
        assert_eq!(out.base_die.unwrap().owner, SQUIRE);
        assert_eq!(out.bolster, 1);
        assert_eq!(out.damage_after_armor, 5);
        assert_eq!(out.guard_delta, -5);
    }

    #[test]
    fn face_three_gambit_is_rejected_and_die_kept() {
        let mut enc = arena();
        let attack = swing(KNIGHT, BRUTE, Die::D8).with_gambit(GambitIntent::new(DieSlot::Primary, GambitEffect::Trap));
        let mut dice = ScriptedDice::new([3]);
        let out = resolve_attack(&mut enc, BRUTE, &[attack], &mut dice).unwrap();
        assert_eq!(out.rejections.len(), 1);
        assert_eq!(out.rejections[0].kind, RejectionKind::IllegalAction);
        assert_eq!(out.base_die.unwrap().face, 3);
        assert!(out.gambits.is_empty());
        assert_eq!(out.damage_after_armor, 1);
    }

    #[test]
    fn strong_gambit_on_eight_skips_save() {
        let mut enc = arena();
        let attack = swing(KNIGHT, BRUTE, Die::D8)
            .with_gambit(GambitIntent::new(DieSlot::Primary, GambitEffect::Trap).strong(StrongGambit::NoSave));
        let mut dice = ScriptedDice::new([8]);
        let out = resolve_attack(&mut enc, BRUTE, &[attack], &mut dice).unwrap();
        assert!(out.rejections.is_empty());
        assert_eq!(out.gambits.len(), 1);
        assert!(out.gambits[0].applied);
        assert!(out.gambits[0].save.is_none());
        // The only die was spent, so nothing hits.
        assert_eq!(out.damage_before_armor, 0);
        assert_eq!(dice.remaining(), 0);
    }

    #[test]
    fn ordinary_swing_at_warband_does_nothing() {
        let mut enc = arena();
        let before = enc.warband(MOB).unwrap().clone();
        let mut dice = ScriptedDice::new([8]);
        let out = resolve_attack(&mut enc, MOB, &[swing(KNIGHT, MOB, Die::D8)], &mut dice).unwrap();
        assert_eq!(out.guard_delta, 0);
        assert_eq!(out.vigour_delta, 0);
        assert_eq!(out.rejections[0].kind, RejectionKind::RuleViolation);
        assert_eq!(enc.warband(MOB).unwrap(), &before);
        assert_eq!(dice.remaining(), 1);
    }

    #[test]
    fn warband_attack_adds_bonus_die() {
        let mut enc = arena();
        // Then the Battle-Worn scar: location and Guard gain.
        let mut dice = ScriptedDice::new([2, 9, 1, 3]);
        let out = resolve_attack(&mut enc, KNIGHT, &[swing(MOB, KNIGHT, Die::D6)], &mut dice).unwrap();
        assert_eq!(out.dice.len(), 2);
        assert_eq!(out.base_die.unwrap().slot, DieSlot::Bonus);
        assert_eq!(out.damage_after_armor, 8);
        assert_eq!(enc.combatant(KNIGHT).unwrap().vitals.virtues.vigour, 8);
    }

    #[test]
    fn warband_rolls_no_bonus_die_against_a_unit() {
        let mut enc = arena();
        let levy = EntityId(6);
        enc.insert(Entity::Warband(Warband::new(
            levy,
            "Levy",
            Side(0),
            Vitals::new(Virtues::new(12, 10, 10), 4, 1),
            WeaponDice::single(Die::D6),
        )));
        let mut dice = ScriptedDice::new([2]);
        let out = resolve_attack(&mut enc, levy, &[swing(MOB, levy, Die::D6)], &mut dice).unwrap();
        assert_eq!(out.dice.len(), 1);
        assert!(out.dice.iter().all(|d| d.slot != DieSlot::Bonus));
        assert_eq!(out.damage_before_armor, 2);
        assert_eq!(out.guard_delta, -1);
        assert_eq!(dice.remaining(), 0);
    }

    #[test]
    fn warband_rolls_no_bonus_die_against_a_structure() {
        let mut enc = arena();
        let torches = swing(MOB, GATE, Die::D6).with_source(DamageSource::Fire);
        let mut dice = ScriptedDice::new([6]);
        let out = resolve_attack(&mut enc, GATE, &[torches], &mut dice).unwrap();
        assert_eq!(out.dice.len(), 1);
        assert_eq!(out.dice[0].die, Die::D6);
        assert_eq!(out.guard_delta, -4);
        assert_eq!(dice.remaining(), 0);
    }

    #[test]
    fn gate_ignores_swords_but_not_fire() {
        let mut enc = arena();
        let mut dice = ScriptedDice::new([8]);
        let out = resolve_attack(&mut enc, GATE, &[swing(KNIGHT, GATE, Die::D8)], &mut dice).unwrap();
        assert_eq!(out.guard_delta, 0);
        assert!(out.structural[0].ignored);

        let torch = swing(KNIGHT, GATE, Die::D8).with_source(DamageSource::Fire);
        let mut dice = ScriptedDice::new([6]);
        let out = resolve_attack(&mut enc, GATE, &[torch], &mut dice).unwrap();
        assert_eq!(out.guard_delta, -4);
    }

    #[test]
    fn smite_bonus_die_costs_a_vigour_save() {
        let mut enc = arena();
        let attack = swing(KNIGHT, BRUTE, Die::D8).with_smite(SmiteMode::BonusDie);
        // d8, smite d12, the Vigour save (10) failing on 15, then the Tempered d8.
        let mut dice = ScriptedDice::new([2, 11, 15, 3]);
        let out = resolve_attack(&mut enc, BRUTE, &[attack], &mut dice).unwrap();
        assert_eq!(out.base_die.unwrap().face, 11);
        assert_eq!(out.feats.len(), 1);
        assert!(out.feats[0].fatigued);
        let knight = enc.combatant(KNIGHT).unwrap();
        assert!(knight.has_condition(Condition::Fatigued));
        assert!(knight.feats_used.contains(&Feat::Smite));
    }

    #[test]
    fn ranged_smite_is_refused_but_attack_lands() {
        let mut enc = arena();
        let attack = swing(KNIGHT, BRUTE, Die::D8).ranged().with_smite(SmiteMode::BonusDie);
        let mut dice = ScriptedDice::new([6]);
        let out = resolve_attack(&mut enc, BRUTE, &[attack], &mut dice).unwrap();
        assert_eq!(out.rejections.len(), 1);
        assert_eq!(out.dice.len(), 1);
        assert!(out.feats.is_empty());
    }

    #[test]
    fn deny_discards_the_highest_die() {
        let mut enc = arena();
        let attacks = [swing(KNIGHT, BRUTE, Die::D8), swing(SQUIRE, BRUTE, Die::D6)];
        let armed: Vec<ArmedAttack> = attacks
            .iter()
            .enumerate()
            .map(|(i, a)| arm_attack(&mut enc, i, a, 1, &BTreeMap::new(), &mut Vec::new()).unwrap().unwrap())
            .collect();
        let group: Vec<&ArmedAttack> = armed.iter().collect();
        let denial = Denial { index: 2, actor: BRUTE, protect: BRUTE };
        let mut dice = ScriptedDice::new([8, 4]);
        let out = resolve_group(&mut enc, BRUTE, &group, Some(&denial), 1, &mut dice).unwrap();
        assert_eq!(out.denied[0].face, 8);
        assert_eq!(out.base_die.unwrap().face, 4);
        // The knight's die was denied, so the knight is the +1.
        assert_eq!(out.damage_before_armor, 5);
    }

    #[test]
    fn terminal_target_aborts_without_change() {
        let mut enc = arena();
        enc.combatant_mut(BRUTE).unwrap().status = LifeStatus::Slain;
        let snapshot = enc.clone();
        let mut dice = ScriptedDice::new([8]);
        let err = resolve_attack(&mut enc, BRUTE, &[swing(KNIGHT, BRUTE, Die::D8)], &mut dice).unwrap_err();
        assert_eq!(err, EngineError::TerminalStateViolation(BRUTE));
        assert_eq!(enc, snapshot);
    }

    #[test]
    fn led_warband_shares_damage_with_officer() {
        let mut enc = arena();
        enc.insert(fighter(EntityId(6), "Sergeant", 1, 4, 0, WeaponDice::single(Die::D6)));
        if let Entity::Combatant(c) = enc.entities.get_mut(&EntityId(6)).unwrap() {
            c.vitals.virtues.vigour = 12;
        }
        crate::rules::unit::lead_from_front(&mut enc, EntityId(6), MOB).unwrap();
        let blast = swing(KNIGHT, MOB, Die::D8).with_smite(SmiteMode::Blast);
        // d8=8, the smite save passes, then the officer's Wizened scar.
        let mut dice = ScriptedDice::new([8, 1, 2]);
        let out = resolve_attack(&mut enc, MOB, &[blast], &mut dice).unwrap();
        let share = out.officer.unwrap();
        assert_eq!(share.officer, EntityId(6));
        assert_eq!(share.damage.guard_delta, out.guard_delta);
        assert_eq!(share.damage.vigour_delta, out.vigour_delta);
        assert_eq!(enc.warband(MOB).unwrap().status, WarbandStatus::Active);
    }

    #[test]
    fn rejected_gambit_still_bolsters() {
        let mut enc = arena();
        let attacks = [
            swing(KNIGHT, BRUTE, Die::D8),
            swing(SQUIRE, BRUTE, Die::D6).with_gambit(GambitIntent::new(DieSlot::Primary, GambitEffect::Trap)),
        ];
        // d8=7, d6=3 cannot pay for the Trap, then the Hardened guard roll.
        let mut dice = ScriptedDice::new([7, 3, 3]);
        let out = resolve_attack(&mut enc, BRUTE, &attacks, &mut dice).unwrap();
        assert_eq!(out.rejections.len(), 1);
        assert_eq!(out.rejections[0].actor, Some(SQUIRE));
        assert!(out.gambits.is_empty());
        assert_eq!(out.bolster, 1);
        assert_eq!(out.damage_before_armor, 8);
    }

    #[test]
    fn focused_trap_spends_no_die() {
        let mut enc = arena();
        let attack = swing(KNIGHT, BRUTE, Die::D8).with_focus(GambitIntent::new(DieSlot::Primary, GambitEffect::Trap));
        // d8=4, the brute's Vigour save fails on 15, the Clarity save passes on 3.
        let mut dice = ScriptedDice::new([4, 15, 3]);
        let out = resolve_attack(&mut enc, BRUTE, &[attack], &mut dice).unwrap();
        assert!(out.rejections.is_empty());
        assert_eq!(out.base_die.unwrap().face, 4);
        assert_eq!(out.damage_before_armor, 4);
        assert_eq!(out.guard_delta, -2);

        assert_eq!(out.gambits.len(), 1);
        let trap = &out.gambits[0];
        assert!(trap.focused);
        assert_eq!(trap.face, None);
        assert!(trap.applied);

        assert_eq!(out.feats.len(), 1);
        assert_eq!(out.feats[0].feat, Feat::Focus);
        assert!(!out.feats[0].fatigued);
        let knight = enc.combatant(KNIGHT).unwrap();
        assert!(knight.feats_used.contains(&Feat::Focus));
        assert!(!knight.has_condition(Condition::Fatigued));
        assert_eq!(dice.remaining(), 0);
    }

    #[test]
    fn failed_focus_save_fatigues() {
        let mut enc = arena();
        let attack = swing(KNIGHT, BRUTE, Die::D8).with_focus(GambitIntent::new(DieSlot::Primary, GambitEffect::Move));
        // Move allows no save; the Clarity save (10) fails on 18.
        let mut dice = ScriptedDice::new([5, 18]);
        let out = resolve_attack(&mut enc, BRUTE, &[attack], &mut dice).unwrap();
        assert!(out.gambits[0].applied);
        assert!(out.gambits[0].save.is_none());
        assert_eq!(out.feats[0].save.roll, 18);
        assert!(out.feats[0].fatigued);
        assert!(enc.combatant(KNIGHT).unwrap().has_condition(Condition::Fatigued));
    }

    #[test]
    fn strong_focus_is_refused() {
        let mut enc = arena();
        let attack = swing(KNIGHT, BRUTE, Die::D8)
            .with_focus(GambitIntent::new(DieSlot::Primary, GambitEffect::Trap).strong(StrongGambit::NoSave));
        let mut dice = ScriptedDice::new([4]);
        let out = resolve_attack(&mut enc, BRUTE, &[attack], &mut dice).unwrap();
        assert_eq!(out.rejections.len(), 1);
        assert_eq!(out.rejections[0].kind, RejectionKind::IllegalAction);
        assert!(out.gambits.is_empty());
        assert!(out.feats.is_empty());
        // The attack itself still lands, and Focus stays available.
        assert_eq!(out.damage_before_armor, 4);
        assert!(!enc.combatant(KNIGHT).unwrap().feats_used.contains(&Feat::Focus));
    }

    #[test]
    fn focus_is_locked_out_by_fatigue_impairment_and_prior_use() {
        let setups: [fn(&mut Combatant); 3] = [
            |c| {
                c.conditions.insert(Condition::Fatigued);
            },
            |c| {
                c.conditions.insert(Condition::Impaired);
            },
            |c| {
                c.feats_used.insert(Feat::Focus);
            },
        ];
        for setup in setups {
            let mut enc = arena();
            setup(enc.combatant_mut(KNIGHT).unwrap());
            let attack = swing(KNIGHT, BRUTE, Die::D8).with_focus(GambitIntent::new(DieSlot::Primary, GambitEffect::Trap));
            let mut dice = ScriptedDice::new([4]);
            let out = resolve_attack(&mut enc, BRUTE, &[attack], &mut dice).unwrap();
            assert_eq!(out.rejections.len(), 1, "{:?}", out.rejections);
            assert_eq!(out.rejections[0].kind, RejectionKind::IllegalAction);
            assert!(out.gambits.is_empty());
            assert!(out.feats.is_empty());
            assert_eq!(dice.remaining(), 0);
        }
    }
}
