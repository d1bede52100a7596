//! Named strategy flags.
//!
//! Only `simple-arbitrage` drives execution; the others can be toggled but
//! have no behavior yet.

use std::collections::BTreeMap;

use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Strategies the engine knows by name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Strategy {
    /// Two-leg round trip across fee tiers.
    #[strum(to_string = "simple-arbitrage", serialize = "simple")]
    SimpleArbitrage,
    /// Three-asset cycle.
    Triangular,
    /// Flash-loan funded round trip.
    FlashLoan,
}

impl Strategy {
    /// Whether the engine has an implementation behind this flag.
    pub fn is_implemented(self) -> bool {
        matches!(self, Strategy::SimpleArbitrage)
    }
}

/// Requested toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StrategyAction {
    /// Turn on.
    Enable,
    /// Turn off.
    Disable,
}

/// Public view of one flag.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyStatus {
    /// Strategy name.
    pub name: String,
    /// Whether it is enabled.
    pub enabled: bool,
    /// Whether it does anything when enabled.
    pub implemented: bool,
}

/// Enabled/disabled state of every strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFlags {
    enabled: BTreeMap<Strategy, bool>,
}

impl Default for StrategyFlags {
    fn default() -> Self {
        Self {
            enabled: Strategy::iter().map(|s| (s, s.is_implemented())).collect(),
        }
    }
}

impl StrategyFlags {
    /// Whether `strategy` is enabled.
    pub fn is_enabled(&self, strategy: Strategy) -> bool {
        self.enabled.get(&strategy).copied().unwrap_or(false)
    }

    /// Apply `action`; returns the new state.
    pub fn apply(&mut self, strategy: Strategy, action: StrategyAction) -> bool {
        let enabled = action == StrategyAction::Enable;
        self.enabled.insert(strategy, enabled);
        enabled
    }

    /// Status of every strategy, in declaration order.
    pub fn statuses(&self) -> Vec<StrategyStatus> {
        Strategy::iter()
            .map(|s| StrategyStatus {
                name: s.to_string(),
                enabled: self.is_enabled(s),
                implemented: s.is_implemented(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn names_parse() {
        assert_eq!(Strategy::from_str("simple-arbitrage").unwrap(), Strategy::SimpleArbitrage);
        assert_eq!(Strategy::from_str("simple").unwrap(), Strategy::SimpleArbitrage);
        assert_eq!(Strategy::from_str("Flash-Loan").unwrap(), Strategy::FlashLoan);
        assert!(Strategy::from_str("martingale").is_err());
        assert_eq!(Strategy::SimpleArbitrage.to_string(), "simple-arbitrage");
        assert_eq!(StrategyAction::from_str("ENABLE").unwrap(), StrategyAction::Enable);
    }

    #[test]
    fn only_simple_arbitrage_enabled_by_default() {
        let flags = StrategyFlags::default();
        assert!(flags.is_enabled(Strategy::SimpleArbitrage));
        assert!(!flags.is_enabled(Strategy::Triangular));
        assert!(!flags.is_enabled(Strategy::FlashLoan));
    }

    #[test]
    fn apply_toggles() {
        let mut flags = StrategyFlags::default();
        assert!(!flags.apply(Strategy::SimpleArbitrage, StrategyAction::Disable));
        assert!(!flags.is_enabled(Strategy::SimpleArbitrage));
        assert!(flags.apply(Strategy::Triangular, StrategyAction::Enable));

        let statuses = flags.statuses();
        assert_eq!(statuses.len(), 3);
        assert_eq!(statuses[1].name, "triangular");
        assert!(statuses[1].enabled);
        assert!(!statuses[1].implemented);
    }
}
