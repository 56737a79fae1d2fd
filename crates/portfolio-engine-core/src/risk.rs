//! One-day Value-at-Risk and volatility-based risk classification.
//!
//! Parametric VaR assumes normally distributed daily portfolio returns with
//! zero mean. This is a modelling assumption, not a guarantee: fat tails make
//! realised losses beyond VaR more frequent than the confidence level implies.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PortfolioEngineError;
use crate::linalg::{quad_form, sqrt_decimal};
use crate::statistics::{CovarianceMatrix, MarketStatistics};
use crate::types::{validate_portfolio_value, Money, Rate, WeightVector};
use crate::PortfolioEngineResult;

pub const Z_95: Decimal = dec!(1.645);
pub const Z_99: Decimal = dec!(2.326);

pub const VAR_DESCRIPTION: &str = "Maximum expected 1-day loss at given confidence";

/// Coarse risk bucket derived from annual volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// Bucket an annual volatility expressed in percent.
    pub fn from_volatility_pct(volatility_pct: Decimal) -> Self {
        if volatility_pct < dec!(10) {
            RiskLevel::Low
        } else if volatility_pct < dec!(20) {
            RiskLevel::Moderate
        } else {
            RiskLevel::High
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Conservative portfolio",
            RiskLevel::Moderate => "Balanced portfolio",
            RiskLevel::High => "Aggressive portfolio",
        }
    }
}

/// One-day risk of a weighted portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    /// Parametric VaR at 95% (currency, positive loss).
    pub var_95: Money,
    /// Parametric VaR at 99% (currency, positive loss).
    pub var_99: Money,
    pub var_description: String,
    /// Empirical-percentile VaR at 95%, when daily history is available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical_var_95: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical_var_99: Option<Money>,
    pub daily_volatility: Rate,
    pub annual_volatility: Rate,
    pub risk_level: RiskLevel,
    /// Two annual standard deviations of the portfolio value.
    pub max_drawdown_estimate: Money,
}

/// Parametric one-day VaR from an annualised covariance matrix.
pub fn compute_risk(
    weights: &WeightVector,
    covariance: &CovarianceMatrix,
    portfolio_value: Money,
) -> PortfolioEngineResult<RiskReport> {
    validate_portfolio_value(portfolio_value)?;
    weights.validate()?;
    for symbol in weights.symbols() {
        if !covariance.symbols.contains(&symbol) {
            return Err(PortfolioEngineError::InvalidInput {
                field: format!("weights.{}", symbol),
                reason: "Symbol not present in covariance matrix".into(),
            });
        }
    }

    let w = weights.aligned_to(&covariance.symbols);
    let daily_volatility = sqrt_decimal(quad_form(&w, &covariance.daily()));
    let annual_volatility = sqrt_decimal(quad_form(&w, &covariance.values));
    let z_95 = z_score_for_confidence(dec!(0.95));
    let z_99 = z_score_for_confidence(dec!(0.99));

    Ok(RiskReport {
        var_95: parametric_var(portfolio_value, daily_volatility, z_95)?,
        var_99: parametric_var(portfolio_value, daily_volatility, z_99)?,
        var_description: VAR_DESCRIPTION.to_string(),
        historical_var_95: None,
        historical_var_99: None,
        daily_volatility,
        annual_volatility,
        risk_level: RiskLevel::from_volatility_pct(annual_volatility * dec!(100)),
        max_drawdown_estimate: scale_value(dec!(2) * annual_volatility, portfolio_value, "max_drawdown_estimate")?,
    })
}

/// [`compute_risk`] plus historical VaR from the realised daily returns.
pub fn compute_risk_with_history(
    weights: &WeightVector,
    stats: &MarketStatistics,
    portfolio_value: Money,
) -> PortfolioEngineResult<RiskReport> {
    let mut report = compute_risk(weights, &stats.covariance, portfolio_value)?;
    let portfolio_returns = stats.portfolio_daily_returns(&weights.aligned_to(&stats.symbols));
    if !portfolio_returns.is_empty() {
        report.historical_var_95 =
            Some(historical_var(&portfolio_returns, dec!(0.95), portfolio_value)?);
        report.historical_var_99 =
            Some(historical_var(&portfolio_returns, dec!(0.99), portfolio_value)?);
    }
    Ok(report)
}

/// value * z * daily volatility
pub fn parametric_var(
    portfolio_value: Money,
    daily_volatility: Rate,
    z: Decimal,
) -> PortfolioEngineResult<Money> {
    portfolio_value
        .checked_mul(z)
        .and_then(|v| v.checked_mul(daily_volatility))
        .ok_or_else(|| overflow("var"))
}

/// Loss at the (1 - confidence) percentile of realised returns, linearly
/// interpolated between order statistics. Zero when that percentile is a gain.
pub fn historical_var(
    returns: &[Decimal],
    confidence: Rate,
    portfolio_value: Money,
) -> PortfolioEngineResult<Money> {
    if returns.is_empty() {
        return Err(PortfolioEngineError::InvalidInput {
            field: "returns".into(),
            reason: "At least one return observation required".into(),
        });
    }
    if confidence <= Decimal::ZERO || confidence >= Decimal::ONE {
        return Err(PortfolioEngineError::InvalidInput {
            field: "confidence_level".into(),
            reason: "Confidence level must be between 0 and 1 (exclusive)".into(),
        });
    }

    let mut sorted = returns.to_vec();
    sorted.sort();
    let q = percentile(&sorted, Decimal::ONE - confidence);
    scale_value((-q).max(Decimal::ZERO), portfolio_value, "historical_var")
}

fn scale_value(fraction: Decimal, portfolio_value: Money, field: &str) -> PortfolioEngineResult<Money> {
    fraction
        .checked_mul(portfolio_value)
        .ok_or_else(|| overflow(field))
}

fn overflow(field: &str) -> PortfolioEngineError {
    PortfolioEngineError::InvalidInput {
        field: field.into(),
        reason: "Result exceeds the representable range".into(),
    }
}

/// Approximate z-score for common confidence levels.
pub fn z_score_for_confidence(confidence: Decimal) -> Decimal {
    if confidence == dec!(0.90) {
        return dec!(1.282);
    }
    if confidence == dec!(0.95) {
        return Z_95;
    }
    if confidence == dec!(0.975) {
        return dec!(1.960);
    }
    if confidence == dec!(0.99) {
        return Z_99;
    }
    if confidence == dec!(0.995) {
        return dec!(2.576);
    }

    // Linear interpolation between the bracketing table entries
    if confidence > dec!(0.95) && confidence < dec!(0.99) {
        let t = (confidence - dec!(0.95)) / dec!(0.04);
        return Z_95 + t * (Z_99 - Z_95);
    }
    if confidence > dec!(0.90) && confidence < dec!(0.95) {
        let t = (confidence - dec!(0.90)) / dec!(0.05);
        return dec!(1.282) + t * (Z_95 - dec!(1.282));
    }

    Z_95
}

/// Percentile `p` (0..1) of an ascending slice, numpy "linear" method.
fn percentile(sorted: &[Decimal], p: Decimal) -> Decimal {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = p * Decimal::from((n - 1) as i64);
    let lower = rank.floor();
    let frac = rank - lower;
    let idx = lower.to_usize().unwrap_or(0).min(n - 1);
    if idx + 1 >= n {
        return sorted[idx];
    }
    sorted[idx] + frac * (sorted[idx + 1] - sorted[idx])
}
