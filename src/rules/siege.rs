//! Structures, siege damage, and naval rules.
//!
//! Structures have no Virtues: damage only depletes Guard, and Guard 0 means
//! destroyed. Sources outside a structure's allow-list do nothing at all.

use serde::{Deserialize, Serialize};

use crate::dice::DiceSource;
use crate::error::EngineError;
use crate::model::encounter::{Encounter, EntityId};
use crate::model::structure::{DamageSource, Structure};

/// What a hit did to a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralReport {
    pub source: DamageSource,
    pub raw: u16,
    pub armor: u8,
    pub damage: u16,
    pub guard_delta: i16,
    pub destroyed: bool,
    /// The source could not harm this structure.
    pub ignored: bool,
}

/// Applies damage from `source` to a structure, after its Armor.
pub fn apply_structural_damage(structure: &mut Structure, raw: u16, source: DamageSource) -> Result<StructuralReport, EngineError> {
    let armor = structure.armor;
    strike(structure, raw, source, armor)
}

fn strike(structure: &mut Structure, raw: u16, source: DamageSource, armor: u8) -> Result<StructuralReport, EngineError> {
    if structure.destroyed {
        return Err(EngineError::TerminalStateViolation(structure.id));
    }
    let mut report = StructuralReport {
        source,
        raw,
        armor,
        damage: 0,
        guard_delta: 0,
        destroyed: false,
        ignored: false,
    };
    if !structure.accepts(source) {
        report.ignored = true;
        tracing::debug!(structure = %structure.id, ?source, "source ignored by structure");
        return Ok(report);
    }

    report.damage = raw.saturating_sub(armor as u16);
    let lost = report.damage.min(structure.guard as u16) as u8;
    structure.guard -= lost;
    report.guard_delta = -(lost as i16);
    if lost > 0 && structure.guard == 0 {
        structure.destroyed = true;
        structure.repair_days = 0;
        report.destroyed = true;
        tracing::info!(structure = %structure.id, name = %structure.name, "structure destroyed");
    }
    Ok(report)
}

/// Two vessels ramming each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionReport {
    pub rolls: (u8, u8),
    pub first: (EntityId, StructuralReport),
    pub second: (EntityId, StructuralReport),
}

/// Resolves a collision between two ships.
///
/// Each vessel takes a roll of the collision die, ignoring Armor. A vessel at
/// least `vessel_size_gap` classes larger than the other takes half, rounded
/// down. All-or-nothing: if either ship cannot be struck nothing changes.
pub fn collide(encounter: &mut Encounter, first: EntityId, second: EntityId, dice: &mut dyn DiceSource) -> Result<CollisionReport, EngineError> {
    let class_of = |enc: &mut Encounter, id: EntityId| -> Result<u8, EngineError> {
        let ship = enc.structure_mut(id)?;
        match ship.vessel_class() {
            Some(class) => Ok(class.rank()),
            None => Err(EngineError::WrongKind { id, expected: "ship" }),
        }
    };
    let a_rank = class_of(encounter, first)?;
    let b_rank = class_of(encounter, second)?;
    if first == second {
        return Err(EngineError::WrongKind { id: second, expected: "second ship" });
    }

    let gap = encounter.rules.vessel_size_gap.max(1);
    let die = encounter.rules.collision_die;
    let rolls = (dice.roll_die(die), dice.roll_die(die));
    let mut a_damage = rolls.0 as u16;
    let mut b_damage = rolls.1 as u16;
    if a_rank >= b_rank.saturating_add(gap) {
        a_damage /= 2;
    } else if b_rank >= a_rank.saturating_add(gap) {
        b_damage /= 2;
    }

    let a_report = strike(encounter.structure_mut(first)?, a_damage, DamageSource::Collision, 0)?;
    let b_report = strike(encounter.structure_mut(second)?, b_damage, DamageSource::Collision, 0)?;
    tracing::info!(%first, %second, a_damage, b_damage, "vessels collided");
    Ok(CollisionReport {
        rolls,
        first: (first, a_report),
        second: (second, b_report),
    })
}

/// Adds `days` of repair work to a ship. Returns the Guard restored.
pub fn repair_ship(ship: &mut Structure, days: u32, days_per_guard: u32) -> Result<u8, EngineError> {
    if ship.destroyed {
        return Err(EngineError::TerminalStateViolation(ship.id));
    }
    if !ship.is_ship() {
        return Err(EngineError::WrongKind { id: ship.id, expected: "ship" });
    }
    if ship.guard >= ship.max_guard {
        ship.repair_days = 0;
        return Ok(0);
    }
    let per = days_per_guard.max(1);
    ship.repair_days = ship.repair_days.saturating_add(days);
    let earned = ship.repair_days / per;
    ship.repair_days %= per;
    let missing = ship.max_guard - ship.guard;
    let restored = earned.min(missing as u32) as u8;
    ship.guard += restored;
    if ship.guard == ship.max_guard {
        ship.repair_days = 0;
    }
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::dice::ScriptedDice;
    use crate::model::encounter::Entity;
    use crate::model::structure::{StructureKind, VesselClass};

    fn gate() -> Structure {
        Structure::new(EntityId(1), "Gate", StructureKind::Gate, 5, 2)
    }

    fn harbour() -> Encounter {
        let mut enc = Encounter::new(RulesConfig::default());
        enc.insert(Entity::Structure(Structure::new(EntityId(1), "Skiff", StructureKind::Ship(VesselClass::Skiff), 6, 3)));
        enc.insert(Entity::Structure(Structure::new(EntityId(2), "Galleon", StructureKind::Ship(VesselClass::Galleon), 20, 3)));
        enc.insert(Entity::Structure(gate()));
        enc
    }

    #[test]
    fn gate_ignores_ordinary_damage() {
        let mut g = gate();
        let r = apply_structural_damage(&mut g, 9, DamageSource::Ordinary).unwrap();
        assert!(r.ignored);
        assert_eq!(r.guard_delta, 0);
        assert_eq!(g.guard, 5);
    }

    #[test]
    fn fire_depletes_guard_after_armor() {
        let mut g = gate();
        let r = apply_structural_damage(&mut g, 4, DamageSource::Fire).unwrap();
        assert_eq!(r.damage, 2);
        assert_eq!(g.guard, 3);
        assert!(!r.destroyed);
    }

    #[test]
    fn guard_zero_destroys_and_locks() {
        let mut g = gate();
        let r = apply_structural_damage(&mut g, 12, DamageSource::Siege).unwrap();
        assert!(r.destroyed);
        assert_eq!(r.guard_delta, -5);
        assert!(matches!(
            apply_structural_damage(&mut g, 1, DamageSource::Siege),
            Err(EngineError::TerminalStateViolation(_))
        ));
    }

    #[test]
    fn walls_ignore_even_siege() {
        let mut wall = Structure::new(EntityId(4), "Wall", StructureKind::Wall, 10, 4);
        let r = apply_structural_damage(&mut wall, 30, DamageSource::Siege).unwrap();
        assert!(r.ignored);
        assert_eq!(wall.guard, 10);
    }

    #[test]
    fn larger_vessel_takes_half_and_armor_is_ignored() {
        let mut enc = harbour();
        let mut dice = ScriptedDice::new([5, 9]);
        let r = collide(&mut enc, EntityId(1), EntityId(2), &mut dice).unwrap();
        assert_eq!(r.rolls, (5, 9));
        assert_eq!(r.first.1.guard_delta, -5);
        assert_eq!(r.second.1.guard_delta, -4);
    }

    #[test]
    fn huge_size_gap_means_no_vessel_is_larger() {
        let mut enc = harbour();
        enc.rules = RulesConfig::from_toml_str("vessel_size_gap = 255").unwrap();
        let mut dice = ScriptedDice::new([5, 9]);
        let r = collide(&mut enc, EntityId(1), EntityId(2), &mut dice).unwrap();
        assert_eq!(r.first.1.guard_delta, -5);
        assert_eq!(r.second.1.guard_delta, -9);
    }

    #[test]
    fn only_ships_collide() {
        let mut enc = harbour();
        let mut dice = ScriptedDice::new([5, 9]);
        assert!(matches!(
            collide(&mut enc, EntityId(1), EntityId(3), &mut dice),
            Err(EngineError::WrongKind { .. })
        ));
        // Nothing was rolled or struck.
        assert_eq!(dice.remaining(), 2);
    }

    #[test]
    fn repair_restores_one_guard_per_interval() {
        let mut ship = Structure::new(EntityId(5), "Cog", StructureKind::Ship(VesselClass::Longship), 8, 1);
        ship.guard = 3;
        assert_eq!(repair_ship(&mut ship, 1, 2).unwrap(), 0);
        assert_eq!(repair_ship(&mut ship, 5, 2).unwrap(), 3);
        assert_eq!(ship.guard, 6);
        assert_eq!(repair_ship(&mut ship, 40, 2).unwrap(), 2);
        assert_eq!(ship.guard, 8);
    }

    #[test]
    fn destroyed_ships_cannot_be_repaired() {
        let mut ship = Structure::new(EntityId(5), "Wreck", StructureKind::Ship(VesselClass::Galley), 8, 1);
        ship.guard = 0;
        ship.destroyed = true;
        assert!(repair_ship(&mut ship, 3, 1).is_err());
    }
}
