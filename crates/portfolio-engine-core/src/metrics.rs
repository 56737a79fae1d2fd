use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::linalg::{quad_form, sqrt_decimal, vec_dot};
use crate::types::{Percent, Rate};

/// Annual volatility below this is treated as zero when forming ratios.
pub const VOLATILITY_EPSILON: Decimal = dec!(0.00000001);

/// Risk/return summary of a portfolio, as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    /// Expected annual return (%).
    pub expected_annual_return: Percent,
    /// Annual volatility (%).
    pub annual_volatility: Percent,
    pub sharpe_ratio: Decimal,
    /// 0 (single asset) to 100 (infinitely spread).
    pub diversification_score: Decimal,
}

impl PortfolioMetrics {
    /// Build from fractional annual statistics.
    pub fn from_fractions(
        annual_return: Rate,
        annual_volatility: Rate,
        sharpe: Decimal,
        diversification: Decimal,
    ) -> Self {
        Self {
            expected_annual_return: to_percent(annual_return),
            annual_volatility: to_percent(annual_volatility),
            sharpe_ratio: sharpe.round_dp(3),
            diversification_score: diversification,
        }
    }
}

/// w' * mu
pub fn portfolio_return(weights: &[Decimal], mu: &[Decimal]) -> Rate {
    vec_dot(weights, mu)
}

/// sqrt(w' * Sigma * w)
pub fn portfolio_volatility(weights: &[Decimal], sigma: &[Vec<Decimal>]) -> Rate {
    sqrt_decimal(quad_form(weights, sigma))
}

/// Sharpe ratio with division-by-zero guard: zero when volatility is ~0.
pub fn sharpe_ratio(ret: Rate, rf: Rate, volatility: Rate) -> Decimal {
    if volatility < VOLATILITY_EPSILON {
        Decimal::ZERO
    } else {
        (ret - rf) / volatility
    }
}

/// Herfindahl-Hirschman index: sum of squared weights.
pub fn herfindahl_index(weights: &[Decimal]) -> Decimal {
    weights.iter().map(|w| *w * *w).sum()
}

/// 100 * (1 - HHI), rounded to 2 dp.
pub fn diversification_score(weights: &[Decimal]) -> Decimal {
    let score = dec!(100) * (Decimal::ONE - herfindahl_index(weights));
    score.max(Decimal::ZERO).round_dp(2)
}

/// Fraction to percentage rounded to 2 dp.
pub fn to_percent(value: Rate) -> Percent {
    (value * dec!(100)).round_dp(2)
}
