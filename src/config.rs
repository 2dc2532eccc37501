//! Tunable rule parameters.
//!
//! The fixed thresholds of the ruleset (Gambit funding, Virtue bounds) are
//! constants in the rules modules. Everything a table might house-rule lives
//! here and can be loaded from TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dice::Die;

/// Errors raised while loading a rules file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read rules file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid rules TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{field} must be at least 1")]
    ZeroField { field: &'static str },
}

/// Rule parameters consulted during resolution and time advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Die rolled for Virtue saves.
    pub save_die: Die,
    /// Days a Mortally Wounded combatant survives without aid.
    pub mortal_wound_window_days: u32,
    /// Days of repair needed to restore one point of ship Guard.
    pub ship_repair_days_per_guard: u32,
    /// Die each vessel rolls for damage in a collision.
    pub collision_die: Die,
    /// Class steps by which a vessel must outsize another to halve its collision damage.
    pub vessel_size_gap: u8,
    /// Bonus die a Warband adds when it attacks an individual.
    pub warband_bonus_die: Die,
    /// Bonus die granted by Smite.
    pub smite_bonus_die: Die,
}

impl Default for RulesConfig {
    fn default() -> Self {
        RulesConfig {
            save_die: Die::D20,
            mortal_wound_window_days: 1,
            ship_repair_days_per_guard: 1,
            collision_die: Die::D12,
            vessel_size_gap: 1,
            warband_bonus_die: Die::LARGEST_ATTACK,
            smite_bonus_die: Die::LARGEST_ATTACK,
        }
    }
}

impl RulesConfig {
    /// Parses a rules table from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RulesConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML rules file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mortal_wound_window_days == 0 {
            return Err(ConfigError::ZeroField { field: "mortal_wound_window_days" });
        }
        if self.ship_repair_days_per_guard == 0 {
            return Err(ConfigError::ZeroField { field: "ship_repair_days_per_guard" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = RulesConfig::from_toml_str("").unwrap();
        assert_eq!(config, RulesConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_keys() {
        let config = RulesConfig::from_toml_str(
            "mortal_wound_window_days = 3\ncollision_die = \"d8\"\n",
        )
        .unwrap();
        assert_eq!(config.mortal_wound_window_days, 3);
        assert_eq!(config.collision_die, Die::D8);
        assert_eq!(config.save_die, Die::D20);
    }

    #[test]
    fn zero_repair_interval_is_rejected() {
        let err = RulesConfig::from_toml_str("ship_repair_days_per_guard = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroField { .. }));
    }

    #[test]
    fn malformed_toml_is_rejected() {
        assert!(matches!(
            RulesConfig::from_toml_str("save_die = 20"),
            Err(ConfigError::Toml(_))
        ));
    }
}
