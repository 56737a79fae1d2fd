use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PortfolioEngineError;
use crate::types::Rate;
use crate::PortfolioEngineResult;

/// Engine-wide settings. Every field has a default so partial JSON files work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Annual risk-free rate used in Sharpe computations.
    pub risk_free_rate: Rate,
    /// Trading days per year used to annualise daily statistics.
    pub trading_days: u32,
    /// Minimum number of assets per request.
    pub min_assets: usize,
    /// Maximum number of assets per request.
    pub max_assets: usize,
    /// Minimum number of daily prices per asset.
    pub min_history: usize,
    /// Solver iteration budget.
    pub max_iterations: u32,
    /// Solver stops once no weight moves by more than this in one iteration.
    pub tolerance: Decimal,
    /// Default number of efficient frontier points.
    pub frontier_points: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: dec!(0.04),
            trading_days: 252,
            min_assets: 2,
            max_assets: 20,
            min_history: 30,
            max_iterations: 1000,
            tolerance: dec!(0.000000001),
            frontier_points: 20,
        }
    }
}

impl EngineConfig {
    pub fn with_risk_free_rate(mut self, rate: Rate) -> Self {
        self.risk_free_rate = rate;
        self
    }

    pub fn with_max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn trading_days_decimal(&self) -> Decimal {
        Decimal::from(self.trading_days)
    }

    pub fn validate(&self) -> PortfolioEngineResult<()> {
        if self.trading_days == 0 {
            return Err(invalid("trading_days", "Must be positive"));
        }
        if self.min_assets < 2 {
            return Err(invalid(
                "min_assets",
                "Optimization requires at least 2 assets",
            ));
        }
        if self.max_assets < self.min_assets {
            return Err(invalid("max_assets", "Must be >= min_assets"));
        }
        // Three prices give two returns, the minimum for a sample covariance.
        if self.min_history < 3 {
            return Err(invalid("min_history", "At least 3 prices required"));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations", "Must be positive"));
        }
        if self.tolerance <= Decimal::ZERO {
            return Err(invalid("tolerance", "Must be positive"));
        }
        if self.risk_free_rate <= dec!(-1) || self.risk_free_rate >= Decimal::ONE {
            return Err(invalid("risk_free_rate", "Must be between -1 and 1"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> PortfolioEngineError {
    PortfolioEngineError::InvalidInput {
        field: format!("config.{}", field),
        reason: reason.into(),
    }
}
