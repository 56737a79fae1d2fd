use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::PortfolioEngineError;
use crate::linalg::{equal_weights, mat_vec_multiply, quad_form, vec_dot};
use crate::statistics::MarketStatistics;
use crate::types::{Percent, WeightVector};
use crate::PortfolioEngineResult;

use super::mean_variance::{evaluate, finalize_weights, Variance};
use super::solver::{projected_gradient_descent, Objective, SolverSettings};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single point on the efficient frontier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierPoint {
    /// Expected annual return (%).
    pub expected_return: Percent,
    /// Annual volatility (%).
    pub volatility: Percent,
    pub sharpe_ratio: Decimal,
    pub weights: WeightVector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfficientFrontier {
    pub points: Vec<FrontierPoint>,
    pub min_variance: FrontierPoint,
    /// Highest-Sharpe point among the sampled ones.
    pub best_sharpe: FrontierPoint,
    /// Target returns for which the solver did not converge.
    pub skipped_points: usize,
}

/// w' Sigma w - lambda * w' mu
struct RiskAdjustedReturn<'a> {
    sigma: &'a [Vec<Decimal>],
    mu: &'a [Decimal],
    lambda: Decimal,
}

impl Objective for RiskAdjustedReturn<'_> {
    fn value(&self, w: &[Decimal]) -> Decimal {
        quad_form(w, self.sigma) - self.lambda * vec_dot(w, self.mu)
    }

    fn gradient(&self, w: &[Decimal]) -> Vec<Decimal> {
        mat_vec_multiply(self.sigma, w)
            .into_iter()
            .zip(self.mu.iter())
            .map(|(sw, m)| dec!(2) * sw - self.lambda * *m)
            .collect()
    }
}

const RETURN_TOLERANCE: Decimal = dec!(0.000001);
const MAX_BISECTIONS: u32 = 40;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Trace the long-only efficient frontier from the minimum-variance return up
/// to the highest single-asset return.
///
/// Each target return is hit by bisecting the risk-aversion trade-off
/// `min w'Sigma w - lambda * w'mu`, whose optimal return is non-decreasing in
/// lambda.
pub fn efficient_frontier(
    stats: &MarketStatistics,
    num_points: u32,
    config: &EngineConfig,
) -> PortfolioEngineResult<EfficientFrontier> {
    if num_points == 0 {
        return Err(PortfolioEngineError::InvalidInput {
            field: "points".into(),
            reason: "At least one frontier point required".into(),
        });
    }

    let settings = SolverSettings {
        max_iterations: config.max_iterations,
        tolerance: config.tolerance,
    };
    let sigma = &stats.covariance.values;
    let mu = &stats.mean_returns;
    let n = stats.n_assets();

    let gmv = projected_gradient_descent(&Variance { sigma }, &equal_weights(n), &settings);
    if !gmv.converged {
        return Err(PortfolioEngineError::OptimizationDiverged {
            method: "min_variance".into(),
            iterations: gmv.iterations,
            last_delta: gmv.last_delta,
        });
    }
    let gmv_weights = finalize_weights(gmv.weights);
    let min_variance = to_point(stats, &gmv_weights, config)?;
    let min_ret = vec_dot(&gmv_weights, mu);
    let max_ret = mu.iter().copied().fold(min_ret, Decimal::max);
    let lambda_max = lambda_ceiling(mu, sigma) * dec!(1.1);

    let mut points = Vec::with_capacity(num_points as usize);
    let mut skipped = 0usize;

    if num_points == 1 || max_ret <= min_ret || lambda_max.is_zero() {
        points.push(min_variance.clone());
    } else {
        let step = (max_ret - min_ret) / Decimal::from(num_points - 1);
        let mut warm = gmv_weights.clone();
        for i in 0..num_points {
            let target = min_ret + step * Decimal::from(i);
            match solve_target_return(sigma, mu, target, lambda_max, &warm, &settings) {
                Some(w) => {
                    let w = finalize_weights(w);
                    points.push(to_point(stats, &w, config)?);
                    warm = w;
                }
                None => {
                    warn!(%target, "frontier point did not converge; skipping");
                    skipped += 1;
                }
            }
        }
    }

    if points.is_empty() {
        points.push(min_variance.clone());
    }
    let best_sharpe = points
        .iter()
        .max_by(|a, b| a.sharpe_ratio.cmp(&b.sharpe_ratio))
        .cloned()
        .unwrap_or_else(|| min_variance.clone());

    debug!(points = points.len(), skipped, "efficient frontier traced");
    Ok(EfficientFrontier {
        points,
        min_variance,
        best_sharpe,
        skipped_points: skipped,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn solve_target_return(
    sigma: &[Vec<Decimal>],
    mu: &[Decimal],
    target: Decimal,
    lambda_max: Decimal,
    warm: &[Decimal],
    settings: &SolverSettings,
) -> Option<Vec<Decimal>> {
    let mut lo = Decimal::ZERO;
    let mut hi = lambda_max;
    let mut best: Option<Vec<Decimal>> = None;

    for _ in 0..MAX_BISECTIONS {
        let lambda = (lo + hi) / dec!(2);
        let objective = RiskAdjustedReturn { sigma, mu, lambda };
        let start = best.as_deref().unwrap_or(warm);
        let outcome = projected_gradient_descent(&objective, start, settings);
        if !outcome.converged {
            return None;
        }
        let ret = vec_dot(&outcome.weights, mu);
        best = Some(outcome.weights);
        if (ret - target).abs() < RETURN_TOLERANCE {
            break;
        }
        if ret < target {
            lo = lambda;
        } else {
            hi = lambda;
        }
    }

    best
}

/// Smallest lambda at which the highest-return asset alone is optimal:
/// lambda * (mu_j - mu_i) >= 2 * (Sigma_jj - Sigma_ij) for every i.
fn lambda_ceiling(mu: &[Decimal], sigma: &[Vec<Decimal>]) -> Decimal {
    let Some((j, mu_j)) = mu
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.cmp(&b.1))
    else {
        return Decimal::ZERO;
    };

    mu.iter()
        .enumerate()
        .filter(|(i, m)| *i != j && **m < mu_j)
        .map(|(i, m)| dec!(2) * (sigma[j][j] - sigma[i][j]) / (mu_j - *m))
        .fold(Decimal::ZERO, Decimal::max)
}

fn to_point(
    stats: &MarketStatistics,
    weights: &[Decimal],
    config: &EngineConfig,
) -> PortfolioEngineResult<FrontierPoint> {
    let snap = evaluate(stats, weights, config);
    let result = snap.to_result(&stats.symbols)?;
    Ok(FrontierPoint {
        expected_return: result.expected_annual_return,
        volatility: result.annual_volatility,
        sharpe_ratio: result.sharpe_ratio,
        weights: result.weights,
    })
}
