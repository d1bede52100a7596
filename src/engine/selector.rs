//! Network selection with per-network scorecards.
//!
//! Selection is round robin over connected networks. Each network also
//! carries a Beta(alpha, beta) arm updated from trade outcomes; the arms are
//! reported but do not influence the pick.

use rust_decimal::Decimal;
use serde::Serialize;

/// Prior successes and failures for a fresh arm.
pub const ARM_PRIOR: u64 = 2;

/// Scorecard for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorArm {
    /// Network id.
    pub network: String,
    /// Successes plus prior.
    pub alpha: u64,
    /// Failures plus prior.
    pub beta: u64,
    /// Recorded outcomes.
    pub attempts: u64,
    /// Successful outcomes.
    pub wins: u64,
    /// Failed outcomes.
    pub losses: u64,
    /// `alpha / (alpha + beta) * 100`.
    #[serde(with = "rust_decimal::serde::str")]
    pub win_rate: Decimal,
    /// Whether this network was picked on the latest tick.
    pub selected: bool,
}

impl SelectorArm {
    fn new(network: String) -> Self {
        let mut arm = Self {
            network,
            alpha: ARM_PRIOR,
            beta: ARM_PRIOR,
            attempts: 0,
            wins: 0,
            losses: 0,
            win_rate: Decimal::ZERO,
            selected: false,
        };
        arm.recompute();
        arm
    }

    fn recompute(&mut self) {
        let total = self.alpha + self.beta;
        self.win_rate = if total == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(self.alpha) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(2)
        };
    }

    fn record(&mut self, won: bool) {
        self.attempts += 1;
        if won {
            self.alpha += 1;
            self.wins += 1;
        } else {
            self.beta += 1;
            self.losses += 1;
        }
        self.recompute();
    }
}

/// Picks the next network and keeps one arm per network.
#[derive(Debug, Clone, Default)]
pub struct ChainSelector {
    arms: Vec<SelectorArm>,
}

impl ChainSelector {
    /// One arm per network, in configuration order.
    pub fn new<I, S>(networks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            arms: networks
                .into_iter()
                .map(|n| SelectorArm::new(n.into()))
                .collect(),
        }
    }

    /// Round robin over `active`: `active[tick_count % active.len()]`.
    pub fn pick(&mut self, tick_count: u64, active: &[String]) -> Option<String> {
        if active.is_empty() {
            for arm in &mut self.arms {
                arm.selected = false;
            }
            return None;
        }
        let index = (tick_count % active.len() as u64) as usize;
        let chosen = active[index].clone();
        for arm in &mut self.arms {
            arm.selected = arm.network == chosen;
        }
        Some(chosen)
    }

    /// Record a trade outcome. Unknown networks are ignored.
    pub fn record_outcome(&mut self, network: &str, won: bool) -> Option<&SelectorArm> {
        let arm = self.arms.iter_mut().find(|a| a.network == network)?;
        arm.record(won);
        Some(arm)
    }

    /// Arm for `network`.
    pub fn arm(&self, network: &str) -> Option<&SelectorArm> {
        self.arms.iter().find(|a| a.network == network)
    }

    /// All arms, in configuration order.
    pub fn arms(&self) -> &[SelectorArm] {
        &self.arms
    }
}
