use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::EngineConfig;
use crate::error::PortfolioEngineError;
use crate::market_data::PriceHistory;
use crate::types::Money;
use crate::PortfolioEngineResult;

/// Square covariance matrix whose rows and columns follow `symbols`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceMatrix {
    pub symbols: Vec<String>,
    pub values: Vec<Vec<Decimal>>,
    /// Factor the daily covariance was multiplied by (1 for daily data).
    pub annualization_factor: Decimal,
}

impl CovarianceMatrix {
    pub fn new(
        symbols: Vec<String>,
        values: Vec<Vec<Decimal>>,
        annualization_factor: Decimal,
    ) -> PortfolioEngineResult<Self> {
        let n = symbols.len();
        if values.len() != n {
            return Err(PortfolioEngineError::InvalidInput {
                field: "covariance".into(),
                reason: format!("Expected {}x{} matrix but got {} rows", n, n, values.len()),
            });
        }
        for (i, row) in values.iter().enumerate() {
            if row.len() != n {
                return Err(PortfolioEngineError::InvalidInput {
                    field: "covariance".into(),
                    reason: format!("Row {} has {} columns, expected {}", i, row.len(), n),
                });
            }
        }
        if annualization_factor <= Decimal::ZERO {
            return Err(PortfolioEngineError::InvalidInput {
                field: "covariance.annualization_factor".into(),
                reason: "Must be positive".into(),
            });
        }
        Ok(Self {
            symbols,
            values,
            annualization_factor,
        })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Covariance scaled back to a single period.
    pub fn daily(&self) -> Vec<Vec<Decimal>> {
        self.values
            .iter()
            .map(|row| row.iter().map(|v| *v / self.annualization_factor).collect())
            .collect()
    }

    pub fn variance(&self, i: usize) -> Decimal {
        self.values[i][i]
    }
}

/// Per-request market statistics derived from aligned price histories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStatistics {
    pub symbols: Vec<String>,
    /// Daily returns, one series per asset, all of equal length.
    pub daily_returns: Vec<Vec<Decimal>>,
    /// Annualised mean returns.
    pub mean_returns: Vec<Decimal>,
    /// Annualised sample covariance.
    pub covariance: CovarianceMatrix,
    /// Number of return observations used.
    pub observations: usize,
    /// True when histories of different lengths were trimmed to a common tail.
    pub truncated: bool,
}

impl MarketStatistics {
    /// Validate, align and annualise a set of price histories.
    pub fn from_histories(
        histories: &[PriceHistory],
        config: &EngineConfig,
    ) -> PortfolioEngineResult<Self> {
        validate_histories(histories, config)?;

        let min_len = histories.iter().map(|h| h.len()).min().unwrap_or(0);
        let truncated = histories.iter().any(|h| h.len() != min_len);

        let mut symbols = Vec::with_capacity(histories.len());
        let mut daily_returns = Vec::with_capacity(histories.len());
        for h in histories {
            // Keep the most recent common window.
            let tail = &h.prices[h.len() - min_len..];
            let rets = simple_returns(tail).map_err(|e| match e {
                PortfolioEngineError::InvalidInput { reason, .. } => {
                    PortfolioEngineError::InvalidInput {
                        field: format!("prices.{}", h.symbol),
                        reason,
                    }
                }
                other => other,
            })?;
            symbols.push(h.symbol.clone());
            daily_returns.push(rets);
        }

        let factor = config.trading_days_decimal();
        let mean_returns: Vec<Decimal> = daily_returns.iter().map(|r| mean(r) * factor).collect();
        let daily_cov = sample_covariance_matrix(&daily_returns);
        let annual: Vec<Vec<Decimal>> = daily_cov
            .iter()
            .map(|row| row.iter().map(|v| *v * factor).collect())
            .collect();

        Ok(Self {
            observations: min_len - 1,
            covariance: CovarianceMatrix::new(symbols.clone(), annual, factor)?,
            symbols,
            daily_returns,
            mean_returns,
            truncated,
        })
    }

    pub fn n_assets(&self) -> usize {
        self.symbols.len()
    }

    /// Daily returns of the portfolio with the given weights (aligned to `symbols`).
    pub fn portfolio_daily_returns(&self, weights: &[Decimal]) -> Vec<Decimal> {
        (0..self.observations)
            .map(|t| {
                weights
                    .iter()
                    .zip(self.daily_returns.iter())
                    .map(|(w, series)| *w * series[t])
                    .sum()
            })
            .collect()
    }
}

fn validate_histories(
    histories: &[PriceHistory],
    config: &EngineConfig,
) -> PortfolioEngineResult<()> {
    if histories.len() < config.min_assets {
        return Err(PortfolioEngineError::InsufficientAssets {
            required: config.min_assets,
            actual: histories.len(),
        });
    }
    if histories.len() > config.max_assets {
        return Err(PortfolioEngineError::TooManyAssets {
            max: config.max_assets,
            actual: histories.len(),
        });
    }
    let mut seen = HashSet::new();
    for h in histories {
        if !seen.insert(h.symbol.as_str()) {
            return Err(PortfolioEngineError::InvalidInput {
                field: "symbols".into(),
                reason: format!("Duplicate symbol '{}'", h.symbol),
            });
        }
        if h.len() < config.min_history {
            return Err(PortfolioEngineError::InsufficientHistory {
                symbol: h.symbol.clone(),
                required: config.min_history,
                actual: h.len(),
            });
        }
    }
    Ok(())
}

/// Simple daily returns: (p[t] - p[t-1]) / p[t-1].
pub fn simple_returns(prices: &[Money]) -> PortfolioEngineResult<Vec<Decimal>> {
    if let Some(p) = prices.iter().find(|p| **p <= Decimal::ZERO) {
        return Err(PortfolioEngineError::InvalidInput {
            field: "prices".into(),
            reason: format!("Non-positive price {}", p),
        });
    }
    Ok(prices
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect())
}

pub fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len() as i64)
}

/// Sample covariance with an (n - 1) denominator.
pub fn sample_covariance(a: &[Decimal], b: &[Decimal]) -> Decimal {
    let n = a.len().min(b.len());
    if n < 2 {
        return Decimal::ZERO;
    }
    let ma = mean(&a[..n]);
    let mb = mean(&b[..n]);
    let sum: Decimal = a[..n]
        .iter()
        .zip(b[..n].iter())
        .map(|(x, y)| (*x - ma) * (*y - mb))
        .sum();
    sum / Decimal::from((n - 1) as i64)
}

#[allow(clippy::needless_range_loop)]
fn sample_covariance_matrix(series: &[Vec<Decimal>]) -> Vec<Vec<Decimal>> {
    let n = series.len();
    let mut cov = vec![vec![Decimal::ZERO; n]; n];
    for i in 0..n {
        for j in i..n {
            let c = sample_covariance(&series[i], &series[j]);
            cov[i][j] = c;
            cov[j][i] = c;
        }
    }
    cov
}
