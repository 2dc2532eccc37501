//! Declared actions for a combat round.
//!
//! A round's declarations are collected in full before any of them is
//! resolved. Each variant carries exactly what the resolver needs.

use serde::{Deserialize, Serialize};

use super::encounter::{EntityId, Side};
use super::structure::DamageSource;
use crate::dice::Die;

/// A weapon's dice: one die, or two for paired weapons or weapon and shield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponDice {
    pub primary: Die,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Die>,
}

impl WeaponDice {
    pub const fn single(primary: Die) -> Self {
        WeaponDice { primary, secondary: None }
    }

    pub const fn paired(primary: Die, secondary: Die) -> Self {
        WeaponDice { primary, secondary: Some(secondary) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackRange {
    #[default]
    Melee,
    Ranged,
}

/// Which die of the attacker's own pool a Gambit spends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DieSlot {
    Primary,
    Secondary,
    /// The extra die from Smite or a Warband's unit bonus.
    Bonus,
}

/// A tactical effect bought with a spent die.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "effect", content = "detail")]
pub enum GambitEffect {
    /// +1 damage; cannot be resisted.
    Bolster,
    Move,
    Repel,
    Stop,
    Impair,
    Trap,
    Dismount,
    Other(String),
}

impl GambitEffect {
    /// Whether the defender gets a Vigour save to negate the effect.
    pub const fn allows_save(&self) -> bool {
        !matches!(self, GambitEffect::Bolster | GambitEffect::Move)
    }
}

/// Options available when a Gambit is funded by a die of 8 or more in melee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrongGambit {
    /// The defender gets no save.
    NoSave,
    /// Disarm, break, or remove a piece of equipment.
    GreaterEffect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GambitIntent {
    pub die: DieSlot,
    #[serde(flatten)]
    pub effect: GambitEffect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strong: Option<StrongGambit>,
}

impl GambitIntent {
    pub fn new(die: DieSlot, effect: GambitEffect) -> Self {
        GambitIntent { die, effect, strong: None }
    }

    pub fn strong(mut self, option: StrongGambit) -> Self {
        self.strong = Some(option);
        self
    }
}

/// What a Smite adds to the attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmiteMode {
    BonusDie,
    Blast,
}

/// One attacker's declared attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackDeclaration {
    pub attacker: EntityId,
    /// One target, or several for a Blast.
    pub targets: Vec<EntityId>,
    pub weapon: WeaponDice,
    #[serde(default)]
    pub range: AttackRange,
    #[serde(default = "ordinary_source")]
    pub source: DamageSource,
    #[serde(default)]
    pub gambits: Vec<GambitIntent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smite: Option<SmiteMode>,
    /// Focus: one extra Gambit performed without spending a die.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<GambitIntent>,
    /// A weapon big enough to hurt a Warband without a Blast.
    #[serde(default)]
    pub large_scale: bool,
    /// The attacker moved this turn before attacking.
    #[serde(default)]
    pub moved: bool,
}

fn ordinary_source() -> DamageSource {
    DamageSource::Ordinary
}

impl AttackDeclaration {
    /// A plain melee attack against a single target.
    pub fn melee(attacker: EntityId, target: EntityId, weapon: WeaponDice) -> Self {
        AttackDeclaration {
            attacker,
            targets: vec![target],
            weapon,
            range: AttackRange::Melee,
            source: DamageSource::Ordinary,
            gambits: Vec::new(),
            smite: None,
            focus: None,
            large_scale: false,
            moved: false,
        }
    }

    pub fn with_gambit(mut self, intent: GambitIntent) -> Self {
        self.gambits.push(intent);
        self
    }

    pub fn with_source(mut self, source: DamageSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_smite(mut self, mode: SmiteMode) -> Self {
        self.smite = Some(mode);
        self
    }

    pub fn with_focus(mut self, intent: GambitIntent) -> Self {
        self.focus = Some(intent);
        self
    }

    pub fn ranged(mut self) -> Self {
        self.range = AttackRange::Ranged;
        self
    }

    pub fn is_blast(&self) -> bool {
        self.smite == Some(SmiteMode::Blast)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawKind {
    Retreat,
    Surrender,
}

/// A single entry in a round's batch of declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum Declaration {
    Attack(AttackDeclaration),
    /// Discard one die from an attack against `protect` (self or an ally).
    Deny { actor: EntityId, protect: EntityId },
    /// An officer adds their die to a Warband's attacks and shares its damage.
    LeadFromFront { officer: EntityId, warband: EntityId },
    /// A side leaves the fight; the encounter ends after this round.
    Withdraw { side: Side, kind: WithdrawKind },
}

impl Declaration {
    /// The acting entity, if the declaration has one.
    pub fn actor(&self) -> Option<EntityId> {
        match self {
            Declaration::Attack(a) => Some(a.attacker),
            Declaration::Deny { actor, .. } => Some(*actor),
            Declaration::LeadFromFront { officer, .. } => Some(*officer),
            Declaration::Withdraw { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bolster_and_move_have_no_save() {
        assert!(!GambitEffect::Bolster.allows_save());
        assert!(!GambitEffect::Move.allows_save());
        assert!(GambitEffect::Trap.allows_save());
        assert!(GambitEffect::Other("blind".into()).allows_save());
    }

    #[test]
    fn builder_sets_fields() {
        let decl = AttackDeclaration::melee(EntityId(1), EntityId(2), WeaponDice::single(Die::D8))
            .with_gambit(GambitIntent::new(DieSlot::Primary, GambitEffect::Trap).strong(StrongGambit::NoSave))
            .with_smite(SmiteMode::Blast)
            .with_source(DamageSource::Fire);
        assert!(decl.is_blast());
        assert_eq!(decl.source, DamageSource::Fire);
        assert_eq!(decl.gambits[0].strong, Some(StrongGambit::NoSave));
    }

    #[test]
    fn declaration_json_shape() {
        let json = r#"{"action":"attack","attacker":1,"targets":[2],"weapon":{"primary":"d8"},
            "gambits":[{"die":"primary","effect":"trap","strong":"no_save"}]}"#;
        let decl: Declaration = serde_json::from_str(json).unwrap();
        match decl {
            Declaration::Attack(a) => {
                assert_eq!(a.attacker, EntityId(1));
                assert_eq!(a.range, AttackRange::Melee);
                assert_eq!(a.source, DamageSource::Ordinary);
                assert_eq!(a.gambits[0].effect, GambitEffect::Trap);
                assert_eq!(a.gambits[0].strong, Some(StrongGambit::NoSave));
            }
            other => panic!("unexpected declaration {:?}", other),
        }
    }

    #[test]
    fn deny_json_shape() {
        let decl: Declaration = serde_json::from_str(r#"{"action":"deny","actor":4,"protect":5}"#).unwrap();
        assert_eq!(decl, Declaration::Deny { actor: EntityId(4), protect: EntityId(5) });
        assert_eq!(decl.actor(), Some(EntityId(4)));
    }
}
