//! Dice and randomness.
//!
//! Every random input to the engine flows through a [`DiceSource`], so a
//! seeded or scripted source makes whole encounters replayable.

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// A polyhedral die size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Die {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
}

impl Die {
    /// The largest die an attack pool can gain as a bonus.
    pub const LARGEST_ATTACK: Die = Die::D12;
    /// The die an Impaired attacker is reduced to.
    pub const SMALLEST: Die = Die::D4;

    /// Number of faces.
    pub const fn sides(self) -> u8 {
        match self {
            Die::D4 => 4,
            Die::D6 => 6,
            Die::D8 => 8,
            Die::D10 => 10,
            Die::D12 => 12,
            Die::D20 => 20,
        }
    }

    /// Parses `d6`, `D12` and similar.
    pub fn from_notation(s: &str) -> Option<Die> {
        let digits = s.strip_prefix('d').or_else(|| s.strip_prefix('D'))?;
        match digits.parse::<u8>().ok()? {
            4 => Some(Die::D4),
            6 => Some(Die::D6),
            8 => Some(Die::D8),
            10 => Some(Die::D10),
            12 => Some(Die::D12),
            20 => Some(Die::D20),
            _ => None,
        }
    }
}

/// A source of uniformly distributed die results.
pub trait DiceSource {
    /// Rolls a single die with `sides` faces, returning a value in `1..=sides`.
    fn roll(&mut self, sides: u8) -> u8;

    fn roll_die(&mut self, die: Die) -> u8 {
        self.roll(die.sides())
    }

    /// Rolls every die in the pool, preserving order.
    fn roll_pool(&mut self, pool: &[Die]) -> Vec<u8> {
        pool.iter().map(|&d| self.roll_die(d)).collect()
    }
}

impl<T: DiceSource + ?Sized> DiceSource for &mut T {
    fn roll(&mut self, sides: u8) -> u8 {
        (**self).roll(sides)
    }
}

/// Pseudo-random dice backed by a small, fast, seedable RNG.
#[derive(Debug, Clone)]
pub struct SeededDice {
    rng: SmallRng,
}

impl SeededDice {
    /// Creates dice from a seed. A seed of 0 draws from OS entropy.
    pub fn new(seed: u64) -> Self {
        let rng = if seed != 0 {
            SmallRng::seed_from_u64(seed)
        } else {
            SmallRng::from_entropy()
        };
        SeededDice { rng }
    }
}

impl DiceSource for SeededDice {
    fn roll(&mut self, sides: u8) -> u8 {
        if sides == 0 {
            return 0;
        }
        self.rng.gen_range(1..=sides)
    }
}

/// Replays a fixed sequence of faces, for tests and recorded sessions.
///
/// Faces larger than the die being rolled are clamped to its maximum.
/// Once the script is exhausted every roll yields 1.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    faces: VecDeque<u8>,
}

impl ScriptedDice {
    pub fn new(faces: impl IntoIterator<Item = u8>) -> Self {
        ScriptedDice { faces: faces.into_iter().collect() }
    }

    /// Appends more faces to the end of the script.
    pub fn extend(&mut self, faces: impl IntoIterator<Item = u8>) {
        self.faces.extend(faces);
    }

    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl DiceSource for ScriptedDice {
    fn roll(&mut self, sides: u8) -> u8 {
        match self.faces.pop_front() {
            Some(face) => face.clamp(1, sides.max(1)),
            None => {
                tracing::warn!(sides, "dice script exhausted, rolling 1");
                1
            }
        }
    }
}

/// The result of a save against a Virtue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRoll {
    pub roll: u8,
    pub target: u8,
    pub passed: bool,
}

/// Rolls a save: the save passes when the roll is at most the Virtue score.
pub fn save<D: DiceSource + ?Sized>(dice: &mut D, save_die: Die, virtue: u8) -> SaveRoll {
    let roll = dice.roll_die(save_die);
    SaveRoll {
        roll,
        target: virtue,
        passed: virtue > 0 && roll <= virtue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn die_notation_roundtrip() {
        for die in [Die::D4, Die::D6, Die::D8, Die::D10, Die::D12, Die::D20] {
            let s = format!("d{}", die.sides());
            assert_eq!(Die::from_notation(&s), Some(die));
        }
        assert_eq!(Die::from_notation("D8"), Some(Die::D8));
        assert_eq!(Die::from_notation("d7"), None);
        assert_eq!(Die::from_notation("8"), None);
    }

    #[test]
    fn die_ordering_follows_size() {
        assert!(Die::D4 < Die::D6);
        assert!(Die::D12 < Die::D20);
        assert_eq!(Die::SMALLEST, Die::D4);
        assert_eq!(Die::LARGEST_ATTACK, Die::D12);
    }

    #[test]
    fn seeded_dice_are_reproducible() {
        let mut a = SeededDice::new(42);
        let mut b = SeededDice::new(42);
        let pool = [Die::D6, Die::D8, Die::D12, Die::D20];
        for _ in 0..50 {
            assert_eq!(a.roll_pool(&pool), b.roll_pool(&pool));
        }
    }

    #[test]
    fn seeded_dice_stay_in_range() {
        let mut dice = SeededDice::new(7);
        for _ in 0..1000 {
            let face = dice.roll_die(Die::D6);
            assert!((1..=6).contains(&face));
        }
    }

    #[test]
    fn scripted_dice_replay_then_fall_back() {
        let mut dice = ScriptedDice::new([7, 5, 30]);
        assert_eq!(dice.roll_die(Die::D8), 7);
        assert_eq!(dice.roll_die(Die::D6), 5);
        // Clamped to the die's range.
        assert_eq!(dice.roll_die(Die::D4), 4);
        assert_eq!(dice.remaining(), 0);
        assert_eq!(dice.roll_die(Die::D20), 1);
    }

    #[test]
    fn save_passes_at_or_below_virtue() {
        let mut dice = ScriptedDice::new([10, 11, 1]);
        assert!(save(&mut dice, Die::D20, 10).passed);
        assert!(!save(&mut dice, Die::D20, 10).passed);
        // Zero Virtue always fails, even on a 1.
        assert!(!save(&mut dice, Die::D20, 0).passed);
    }
}
