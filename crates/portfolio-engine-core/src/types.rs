use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::PortfolioEngineError;
use crate::linalg::equal_weights;
use crate::PortfolioEngineResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Values expressed as percentages (5.0 = 5%). Only used at the response layer.
pub type Percent = Decimal;

/// Tolerance on the sum of a weight vector.
pub const WEIGHT_SUM_TOLERANCE: Decimal = dec!(0.000001);

/// Largest accepted portfolio value. Keeps VaR and drawdown products inside
/// Decimal range.
pub const MAX_PORTFOLIO_VALUE: Money = dec!(1000000000000000);

/// Portfolio values must lie in (0, MAX_PORTFOLIO_VALUE].
pub fn validate_portfolio_value(value: Money) -> PortfolioEngineResult<()> {
    if value <= Decimal::ZERO || value > MAX_PORTFOLIO_VALUE {
        return Err(PortfolioEngineError::InvalidPortfolioValue(value));
    }
    Ok(())
}

/// Objective used to pick portfolio weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMethod {
    /// Maximise (w'mu - rf) / sqrt(w'Sigma w)
    #[default]
    #[serde(alias = "sharpe")]
    MaxSharpe,
    /// Minimise w'Sigma w
    MinVolatility,
}

impl OptimizationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationMethod::MaxSharpe => "max_sharpe",
            OptimizationMethod::MinVolatility => "min_volatility",
        }
    }
}

impl fmt::Display for OptimizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OptimizationMethod {
    type Err = PortfolioEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "max_sharpe" | "sharpe" => Ok(OptimizationMethod::MaxSharpe),
            "min_volatility" => Ok(OptimizationMethod::MinVolatility),
            other => Err(PortfolioEngineError::InvalidInput {
                field: "optimization_method".into(),
                reason: format!(
                    "Unknown optimization method '{}'. Use: max_sharpe, min_volatility",
                    other
                ),
            }),
        }
    }
}

/// Mapping from symbol to a fraction of the portfolio.
///
/// Ordering is by symbol, so two vectors built from the same data always
/// iterate identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector(BTreeMap<String, Decimal>);

impl WeightVector {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build from parallel symbol / weight slices.
    pub fn from_parts(symbols: &[String], weights: &[Decimal]) -> PortfolioEngineResult<Self> {
        if symbols.len() != weights.len() {
            return Err(PortfolioEngineError::InvalidInput {
                field: "weights".into(),
                reason: format!(
                    "Expected {} weights but got {}",
                    symbols.len(),
                    weights.len()
                ),
            });
        }
        let mut map = BTreeMap::new();
        for (s, w) in symbols.iter().zip(weights.iter()) {
            if map.insert(s.clone(), *w).is_some() {
                return Err(PortfolioEngineError::InvalidInput {
                    field: "symbols".into(),
                    reason: format!("Duplicate symbol '{}'", s),
                });
            }
        }
        Ok(Self(map))
    }

    /// Equal 1/N weights over the given symbols.
    pub fn equal(symbols: &[String]) -> PortfolioEngineResult<Self> {
        Self::from_parts(symbols, &equal_weights(symbols.len()))
    }

    pub fn insert(&mut self, symbol: impl Into<String>, weight: Decimal) {
        self.0.insert(symbol.into(), weight);
    }

    pub fn get(&self, symbol: &str) -> Option<Decimal> {
        self.0.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Decimal)> {
        self.0.iter()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn total(&self) -> Decimal {
        self.0.values().copied().sum()
    }

    /// Weights in the order of `symbols`; symbols absent from the vector get zero.
    pub fn aligned_to(&self, symbols: &[String]) -> Vec<Decimal> {
        symbols
            .iter()
            .map(|s| self.get(s).unwrap_or(Decimal::ZERO))
            .collect()
    }

    /// Symbol with the largest weight; ties resolve to the first symbol in order.
    pub fn largest(&self) -> Option<(&String, Decimal)> {
        let mut best: Option<(&String, Decimal)> = None;
        for (s, w) in &self.0 {
            match best {
                Some((_, bw)) if *w <= bw => {}
                _ => best = Some((s, *w)),
            }
        }
        best
    }

    /// Check the long-only, fully-invested invariant.
    pub fn validate(&self) -> PortfolioEngineResult<()> {
        if self.is_empty() {
            return Err(PortfolioEngineError::InvalidInput {
                field: "weights".into(),
                reason: "Weight vector is empty".into(),
            });
        }
        for (s, w) in &self.0 {
            if *w < Decimal::ZERO || *w > Decimal::ONE {
                return Err(PortfolioEngineError::InvalidInput {
                    field: format!("weights.{}", s),
                    reason: format!("Weight {} outside [0, 1]", w),
                });
            }
        }
        let total = self.total();
        if (total - Decimal::ONE).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(PortfolioEngineError::InvalidInput {
                field: "weights".into(),
                reason: format!("Weights sum to {} (expected 1)", total),
            });
        }
        Ok(())
    }
}

impl FromIterator<(String, Decimal)> for WeightVector {
    fn from_iter<I: IntoIterator<Item = (String, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
