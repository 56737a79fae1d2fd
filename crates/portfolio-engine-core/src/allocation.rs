use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PortfolioEngineError;
use crate::types::{validate_portfolio_value, Money, Percent, WeightVector};
use crate::PortfolioEngineResult;

/// How a portfolio value is split across symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationBreakdown {
    /// Percent of the portfolio per symbol (2 dp, sums to exactly 100).
    pub weights: BTreeMap<String, Percent>,
    /// Currency amount per symbol (2 dp, sums to exactly the portfolio value).
    pub dollars: BTreeMap<String, Money>,
}

impl AllocationBreakdown {
    pub fn total_dollars(&self) -> Money {
        self.dollars.values().copied().sum()
    }

    pub fn total_percent(&self) -> Percent {
        self.weights.values().copied().sum()
    }
}

/// Split `portfolio_value` according to `weights`.
///
/// Each amount is rounded to cents; whatever rounding leaves over is booked
/// against the largest-weight symbol so nothing is lost or created.
pub fn allocate(
    weights: &WeightVector,
    portfolio_value: Money,
) -> PortfolioEngineResult<AllocationBreakdown> {
    validate_portfolio_value(portfolio_value)?;
    weights.validate()?;

    let anchor = weights
        .largest()
        .map(|(s, _)| s.clone())
        .ok_or_else(|| PortfolioEngineError::InvalidInput {
            field: "weights".into(),
            reason: "Weight vector is empty".into(),
        })?;

    Ok(AllocationBreakdown {
        weights: reconcile(weights, dec!(100), &anchor),
        dollars: reconcile(weights, portfolio_value, &anchor),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn reconcile(weights: &WeightVector, total: Decimal, anchor: &str) -> BTreeMap<String, Decimal> {
    let mut out: BTreeMap<String, Decimal> = weights
        .iter()
        .map(|(s, w)| (s.clone(), (*w * total).round_dp(2)))
        .collect();
    let remainder = total - out.values().copied().sum::<Decimal>();
    if let Some(v) = out.get_mut(anchor) {
        *v += remainder;
    }
    out
}
