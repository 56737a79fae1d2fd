//! Plain-language guidance derived from portfolio metrics.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::metrics::PortfolioMetrics;

pub const REBALANCE_NOTE: &str = "Consider rebalancing quarterly";
pub const DEGRADED_NOTE: &str =
    "Optimizer did not converge; showing an equal-weight portfolio instead";

/// Build recommendations from reported (percentage) metrics.
///
/// One line each for risk-adjusted return, diversification and volatility,
/// followed by the standing rebalancing reminder.
pub fn recommendations(metrics: &PortfolioMetrics, degraded: bool) -> Vec<String> {
    let mut out = Vec::with_capacity(5);
    if degraded {
        out.push(DEGRADED_NOTE.to_string());
    }

    out.push(sharpe_note(metrics.sharpe_ratio).to_string());
    out.push(diversification_note(metrics.diversification_score).to_string());
    out.push(volatility_note(metrics.annual_volatility).to_string());
    out.push(REBALANCE_NOTE.to_string());
    out
}

fn sharpe_note(sharpe: Decimal) -> &'static str {
    if sharpe > dec!(1.5) {
        "Excellent risk-adjusted returns"
    } else if sharpe > dec!(1.0) {
        "Good risk-adjusted returns"
    } else {
        "Consider adjusting allocation for better returns"
    }
}

fn diversification_note(score: Decimal) -> &'static str {
    if score > dec!(80) {
        "Well-diversified portfolio"
    } else if score > dec!(60) {
        "Moderate diversification: consider adding more assets"
    } else {
        "Poor diversification: highly concentrated portfolio"
    }
}

fn volatility_note(volatility_pct: Decimal) -> &'static str {
    if volatility_pct < dec!(15) {
        "Low volatility: suitable for conservative investors"
    } else if volatility_pct < dec!(25) {
        "Moderate volatility: balanced risk"
    } else {
        "High volatility: only for aggressive investors"
    }
}
