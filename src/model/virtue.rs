//! Virtues, Guard, and conditions.
//!
//! Combatants and Warbands share the same defensive shape: three Virtues, a
//! Guard pool, and Armor. That shape is [`Vitals`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Highest value any Virtue may hold.
pub const VIRTUE_MAX: u8 = 19;

/// One of the three core attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Virtue {
    Vigour,
    Clarity,
    Spirit,
}

impl Virtue {
    pub fn from_name(s: &str) -> Option<Virtue> {
        match s {
            "vigour" | "vig" => Some(Virtue::Vigour),
            "clarity" | "cla" => Some(Virtue::Clarity),
            "spirit" | "spi" => Some(Virtue::Spirit),
            _ => None,
        }
    }
}

/// Current Virtue scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Virtues {
    pub vigour: u8,
    pub clarity: u8,
    pub spirit: u8,
}

impl Virtues {
    pub fn new(vigour: u8, clarity: u8, spirit: u8) -> Self {
        Virtues {
            vigour: vigour.min(VIRTUE_MAX),
            clarity: clarity.min(VIRTUE_MAX),
            spirit: spirit.min(VIRTUE_MAX),
        }
    }

    pub fn get(&self, virtue: Virtue) -> u8 {
        match virtue {
            Virtue::Vigour => self.vigour,
            Virtue::Clarity => self.clarity,
            Virtue::Spirit => self.spirit,
        }
    }

    fn slot(&mut self, virtue: Virtue) -> &mut u8 {
        match virtue {
            Virtue::Vigour => &mut self.vigour,
            Virtue::Clarity => &mut self.clarity,
            Virtue::Spirit => &mut self.spirit,
        }
    }

    /// Lowers a Virtue, stopping at 0. Returns the amount actually lost.
    pub fn lose(&mut self, virtue: Virtue, amount: u8) -> u8 {
        let slot = self.slot(virtue);
        let lost = amount.min(*slot);
        *slot -= lost;
        lost
    }

    /// Raises a Virtue, stopping at [`VIRTUE_MAX`]. Returns the amount actually gained.
    pub fn gain(&mut self, virtue: Virtue, amount: u8) -> u8 {
        let slot = self.slot(virtue);
        let gained = amount.min(VIRTUE_MAX - *slot);
        *slot += gained;
        gained
    }
}

/// A combat condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// A Feat save was failed; no Feats until rest.
    Fatigued,
    /// Vigour 0: cannot attack after moving this turn.
    Exhausted,
    /// Clarity 0: Guard counts as 0 against incoming attacks.
    Exposed,
    /// Spirit 0 (or an Impair gambit): smallest die, no bonus dice or Feats.
    Impaired,
}

/// Conditions that follow from Virtues sitting at zero.
pub fn derived_conditions(virtues: &Virtues) -> BTreeSet<Condition> {
    let mut set = BTreeSet::new();
    if virtues.vigour == 0 {
        set.insert(Condition::Exhausted);
    }
    if virtues.clarity == 0 {
        set.insert(Condition::Exposed);
    }
    if virtues.spirit == 0 {
        set.insert(Condition::Impaired);
    }
    set
}

/// The defensive shape shared by individuals and units.
///
/// Invariant: `guard <= max_guard`, every Virtue `<= VIRTUE_MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitals {
    pub virtues: Virtues,
    pub guard: u8,
    pub max_guard: u8,
    pub armor: u8,
}

impl Vitals {
    pub fn new(virtues: Virtues, max_guard: u8, armor: u8) -> Self {
        Vitals {
            virtues,
            guard: max_guard,
            max_guard,
            armor,
        }
    }

    pub fn restore_guard(&mut self) {
        self.guard = self.max_guard;
    }

    /// Raises maximum Guard. Current Guard is left where it is.
    pub fn raise_max_guard(&mut self, amount: u8) -> u8 {
        let before = self.max_guard;
        self.max_guard = self.max_guard.saturating_add(amount);
        self.max_guard - before
    }
}
