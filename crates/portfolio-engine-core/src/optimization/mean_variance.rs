use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::EngineConfig;
use crate::error::PortfolioEngineError;
use crate::linalg::{equal_weights, mat_vec_multiply, normalize_weights, quad_form, sqrt_decimal, vec_dot};
use crate::market_data::PriceHistory;
use crate::metrics::{
    diversification_score, portfolio_return, portfolio_volatility, sharpe_ratio, to_percent,
    VOLATILITY_EPSILON,
};
use crate::statistics::MarketStatistics;
use crate::types::{validate_portfolio_value, Money, OptimizationMethod, Percent, Rate, WeightVector};
use crate::PortfolioEngineResult;

use super::solver::{projected_gradient_descent, Objective, SolverSettings};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Optimal weights plus the metrics they imply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub weights: WeightVector,
    /// Expected annual return (%).
    pub expected_annual_return: Percent,
    /// Annual volatility (%).
    pub annual_volatility: Percent,
    pub sharpe_ratio: Decimal,
    pub diversification_score: Decimal,
    pub iterations: u32,
    pub converged: bool,
}

/// Weights (aligned to `MarketStatistics::symbols`) with fractional annual metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub weights: Vec<Decimal>,
    pub annual_return: Rate,
    pub annual_volatility: Rate,
    pub sharpe_ratio: Decimal,
    pub diversification_score: Decimal,
    pub iterations: u32,
    pub converged: bool,
}

impl PortfolioSnapshot {
    pub fn to_result(&self, symbols: &[String]) -> PortfolioEngineResult<OptimizationResult> {
        Ok(OptimizationResult {
            weights: WeightVector::from_parts(symbols, &self.weights)?,
            expected_annual_return: to_percent(self.annual_return),
            annual_volatility: to_percent(self.annual_volatility),
            sharpe_ratio: self.sharpe_ratio.round_dp(3),
            diversification_score: self.diversification_score,
            iterations: self.iterations,
            converged: self.converged,
        })
    }
}

// ---------------------------------------------------------------------------
// Objectives
// ---------------------------------------------------------------------------

/// w' Sigma w
pub(crate) struct Variance<'a> {
    pub sigma: &'a [Vec<Decimal>],
}

impl Objective for Variance<'_> {
    fn value(&self, w: &[Decimal]) -> Decimal {
        quad_form(w, self.sigma)
    }

    fn gradient(&self, w: &[Decimal]) -> Vec<Decimal> {
        mat_vec_multiply(self.sigma, w)
            .into_iter()
            .map(|v| dec!(2) * v)
            .collect()
    }
}

/// Negative Sharpe ratio -(w'mu - rf) / sqrt(w' Sigma w).
pub(crate) struct NegativeSharpe<'a> {
    pub sigma: &'a [Vec<Decimal>],
    pub mu: &'a [Decimal],
    pub rf: Rate,
}

impl Objective for NegativeSharpe<'_> {
    fn value(&self, w: &[Decimal]) -> Decimal {
        let vol = portfolio_volatility(w, self.sigma);
        -sharpe_ratio(vec_dot(w, self.mu), self.rf, vol)
    }

    fn gradient(&self, w: &[Decimal]) -> Vec<Decimal> {
        let stationary = vec![Decimal::ZERO; w.len()];
        let sigma_w = mat_vec_multiply(self.sigma, w);
        let variance = vec_dot(w, &sigma_w);
        let vol = sqrt_decimal(variance);
        if vol < VOLATILITY_EPSILON {
            return stationary;
        }
        let excess = vec_dot(w, self.mu) - self.rf;
        // dS/dw_i = (mu_i - excess * (Sigma w)_i / variance) / vol
        let gradient: Option<Vec<Decimal>> = self
            .mu
            .iter()
            .zip(sigma_w.iter())
            .map(|(m, sw)| {
                let tilt = excess.checked_mul(*sw)?.checked_div(variance)?;
                let g = m.checked_sub(tilt)?.checked_div(vol)?;
                (g.abs() <= GRADIENT_LIMIT).then_some(-g)
            })
            .collect();
        gradient.unwrap_or(stationary)
    }
}

/// Sharpe gradients steeper than this only occur next to the zero-volatility
/// boundary; such points are treated as stationary.
const GRADIENT_LIMIT: Decimal = dec!(1000000000000000);

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Optimise a long-only, fully-invested portfolio from raw price histories.
///
/// Returns [`PortfolioEngineError::OptimizationDiverged`] when the solver
/// exhausts its iteration budget; callers decide whether to fall back.
pub fn optimize(
    assets: &[PriceHistory],
    method: OptimizationMethod,
    portfolio_value: Money,
    config: &EngineConfig,
) -> PortfolioEngineResult<OptimizationResult> {
    validate_portfolio_value(portfolio_value)?;
    config.validate()?;
    let stats = MarketStatistics::from_histories(assets, config)?;
    let snapshot = optimize_statistics(&stats, method, config)?;
    snapshot.to_result(&stats.symbols)
}

/// Solve for weights given pre-computed market statistics.
#[instrument(level = "debug", skip(stats, config), fields(n_assets = stats.n_assets()))]
pub fn optimize_statistics(
    stats: &MarketStatistics,
    method: OptimizationMethod,
    config: &EngineConfig,
) -> PortfolioEngineResult<PortfolioSnapshot> {
    let n = stats.n_assets();
    let sigma = &stats.covariance.values;
    let mu = &stats.mean_returns;
    let settings = SolverSettings {
        max_iterations: config.max_iterations,
        tolerance: config.tolerance,
    };
    let seed = equal_weights(n);

    if method == OptimizationMethod::MaxSharpe {
        if let Some(idx) = riskless_asset(stats, config.risk_free_rate) {
            debug!(symbol = %stats.symbols[idx], "riskless asset beats the risk-free rate");
            let mut weights = vec![Decimal::ZERO; n];
            weights[idx] = Decimal::ONE;
            return Ok(evaluate(stats, &weights, config));
        }
    }

    let outcome = match method {
        OptimizationMethod::MinVolatility => {
            projected_gradient_descent(&Variance { sigma }, &seed, &settings)
        }
        OptimizationMethod::MaxSharpe => projected_gradient_descent(
            &NegativeSharpe {
                sigma,
                mu,
                rf: config.risk_free_rate,
            },
            &seed,
            &settings,
        ),
    };

    if !outcome.converged {
        return Err(PortfolioEngineError::OptimizationDiverged {
            method: method.to_string(),
            iterations: outcome.iterations,
            last_delta: outcome.last_delta,
        });
    }

    debug!(iterations = outcome.iterations, "optimization converged");
    let mut snapshot = evaluate(stats, &finalize_weights(outcome.weights), config);
    snapshot.iterations = outcome.iterations;
    snapshot.converged = true;
    Ok(snapshot)
}

/// Metrics of an arbitrary weight vector aligned to `stats.symbols`.
pub fn evaluate(
    stats: &MarketStatistics,
    weights: &[Decimal],
    config: &EngineConfig,
) -> PortfolioSnapshot {
    let annual_return = portfolio_return(weights, &stats.mean_returns);
    let annual_volatility = portfolio_volatility(weights, &stats.covariance.values);
    PortfolioSnapshot {
        weights: weights.to_vec(),
        annual_return,
        annual_volatility,
        sharpe_ratio: sharpe_ratio(annual_return, config.risk_free_rate, annual_volatility),
        diversification_score: diversification_score(weights),
        iterations: 0,
        converged: true,
    }
}

/// Index of the zero-variance asset with the highest return above `rf`.
///
/// With such an asset in the universe the Sharpe ratio has no finite maximum:
/// it grows without bound as weight moves onto the riskless asset. Max-Sharpe
/// then holds that asset outright, and its Sharpe is reported as zero.
pub fn riskless_asset(stats: &MarketStatistics, rf: Rate) -> Option<usize> {
    let variance_floor = VOLATILITY_EPSILON * VOLATILITY_EPSILON;
    let mut best: Option<usize> = None;
    for (i, row) in stats.covariance.values.iter().enumerate() {
        let mean = stats.mean_returns[i];
        if row[i] >= variance_floor || mean <= rf {
            continue;
        }
        if best.map_or(true, |b| mean > stats.mean_returns[b]) {
            best = Some(i);
        }
    }
    best
}

/// Equal-weight portfolio, used when the solver cannot be trusted.
pub fn equal_weight_snapshot(stats: &MarketStatistics, config: &EngineConfig) -> PortfolioSnapshot {
    let mut snapshot = evaluate(stats, &equal_weights(stats.n_assets()), config);
    snapshot.converged = false;
    snapshot
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Clamp solver noise to zero, renormalise, and push the rounding residue
/// into the largest weight so the vector sums to exactly one.
pub(crate) fn finalize_weights(mut w: Vec<Decimal>) -> Vec<Decimal> {
    let floor = dec!(0.000000000001);
    for wi in w.iter_mut() {
        if *wi < floor {
            *wi = Decimal::ZERO;
        }
    }
    normalize_weights(&mut w);
    if w.iter().all(|wi| wi.is_zero()) {
        return equal_weights(w.len());
    }
    let residue = Decimal::ONE - w.iter().copied().sum::<Decimal>();
    if !residue.is_zero() {
        let mut idx = 0;
        for (i, wi) in w.iter().enumerate() {
            if *wi > w[idx] {
                idx = i;
            }
        }
        w[idx] += residue;
    }
    w
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::CovarianceMatrix;

    fn stats_from(
        mu: Vec<Decimal>,
        sigma: Vec<Vec<Decimal>>,
    ) -> MarketStatistics {
        let symbols: Vec<String> = (0..mu.len()).map(|i| format!("S{}", i)).collect();
        MarketStatistics {
            daily_returns: vec![Vec::new(); mu.len()],
            covariance: CovarianceMatrix::new(symbols.clone(), sigma, dec!(252)).unwrap(),
            symbols,
            mean_returns: mu,
            observations: 0,
            truncated: false,
        }
    }

    fn two_asset() -> MarketStatistics {
        // A: 10% return, 20% vol; B: 6% return, 10% vol; correlation 0.3
        let (va, vb, corr) = (dec!(0.20), dec!(0.10), dec!(0.3));
        stats_from(
            vec![dec!(0.10), dec!(0.06)],
            vec![
                vec![va * va, corr * va * vb],
                vec![corr * va * vb, vb * vb],
            ],
        )
    }

    #[test]
    fn test_min_volatility_matches_closed_form() {
        // Unconstrained GMV weight of A: (vb^2 - cov) / (va^2 + vb^2 - 2cov)
        //   = (0.01 - 0.006) / (0.04 + 0.01 - 0.012) = 0.105263...
        let stats = two_asset();
        let config = EngineConfig::default();
        let snap = optimize_statistics(&stats, OptimizationMethod::MinVolatility, &config).unwrap();
        assert!((snap.weights[0] - dec!(0.1052631579)).abs() < dec!(0.00001));
        assert_eq!(snap.weights.iter().copied().sum::<Decimal>(), Decimal::ONE);
    }

    #[test]
    fn test_max_sharpe_beats_endpoints() {
        let stats = two_asset();
        let config = EngineConfig::default().with_risk_free_rate(dec!(0.02));
        let snap = optimize_statistics(&stats, OptimizationMethod::MaxSharpe, &config).unwrap();
        let all_a = evaluate(&stats, &[Decimal::ONE, Decimal::ZERO], &config);
        let all_b = evaluate(&stats, &[Decimal::ZERO, Decimal::ONE], &config);
        let eq = evaluate(&stats, &equal_weights(2), &config);
        assert!(snap.sharpe_ratio >= all_a.sharpe_ratio);
        assert!(snap.sharpe_ratio >= all_b.sharpe_ratio);
        assert!(snap.sharpe_ratio >= eq.sharpe_ratio);
    }

    #[test]
    fn test_max_sharpe_matches_unconstrained_tangency_when_interior() {
        // Tangency w ~ Sigma^-1 (mu - rf). Excess = (0.08, 0.04).
        // Sigma^-1 * excess ~ (0.08*0.01 - 0.006*0.04, 0.04*0.04 - 0.006*0.08) / det
        //                   = (0.00056, 0.00112) / det -> w_A = 1/3
        let stats = two_asset();
        let config = EngineConfig::default().with_risk_free_rate(dec!(0.02));
        let snap = optimize_statistics(&stats, OptimizationMethod::MaxSharpe, &config).unwrap();
        assert!(
            (snap.weights[0] - dec!(0.3333333)).abs() < dec!(0.0001),
            "got {}",
            snap.weights[0]
        );
    }

    #[test]
    fn test_zero_variance_asset_absorbs_min_volatility() {
        let stats = stats_from(
            vec![dec!(0.30), dec!(0)],
            vec![vec![dec!(0.60), dec!(0)], vec![dec!(0), dec!(0)]],
        );
        let config = EngineConfig::default();
        let snap = optimize_statistics(&stats, OptimizationMethod::MinVolatility, &config).unwrap();
        assert!(snap.weights[1] > dec!(0.9999));
        assert!(snap.annual_volatility < dec!(0.001));
    }

    #[test]
    fn test_max_sharpe_holds_riskless_asset_above_rf() {
        let stats = stats_from(
            vec![dec!(0.10), dec!(0.08)],
            vec![vec![dec!(0.09), dec!(0)], vec![dec!(0), dec!(0)]],
        );
        let config = EngineConfig::default();
        assert_eq!(riskless_asset(&stats, config.risk_free_rate), Some(1));
        let snap = optimize_statistics(&stats, OptimizationMethod::MaxSharpe, &config).unwrap();
        assert_eq!(snap.weights, vec![Decimal::ZERO, Decimal::ONE]);
        assert_eq!(snap.annual_volatility, Decimal::ZERO);
        assert_eq!(snap.sharpe_ratio, Decimal::ZERO);
    }

    #[test]
    fn test_riskless_asset_below_rf_is_ignored() {
        let stats = stats_from(
            vec![dec!(0.10), dec!(0.01)],
            vec![vec![dec!(0.09), dec!(0)], vec![dec!(0), dec!(0)]],
        );
        assert_eq!(riskless_asset(&stats, dec!(0.04)), None);
    }

    #[test]
    fn test_max_sharpe_near_zero_variance_does_not_blow_up() {
        // Second asset has 1e-7 annual volatility: above the zero threshold,
        // so the solver runs right next to the boundary.
        let stats = stats_from(
            vec![dec!(0.10), dec!(0.08)],
            vec![
                vec![dec!(0.09), dec!(0)],
                vec![dec!(0), dec!(0.00000000000001)],
            ],
        );
        let config = EngineConfig::default();
        assert_eq!(riskless_asset(&stats, config.risk_free_rate), None);
        match optimize_statistics(&stats, OptimizationMethod::MaxSharpe, &config) {
            Ok(snap) => {
                assert_eq!(snap.weights.iter().copied().sum::<Decimal>(), Decimal::ONE);
                assert!(snap.weights.iter().all(|w| *w >= Decimal::ZERO));
                assert!(snap.weights[1] > snap.weights[0]);
            }
            Err(e) => assert!(matches!(e, PortfolioEngineError::OptimizationDiverged { .. })),
        }
    }

    #[test]
    fn test_sharpe_gradient_is_finite_near_the_boundary() {
        let sigma = vec![
            vec![dec!(0.09), dec!(0)],
            vec![dec!(0), dec!(0)],
        ];
        let mu = vec![dec!(0.10), dec!(0.08)];
        let objective = NegativeSharpe {
            sigma: &sigma,
            mu: &mu,
            rf: dec!(0.04),
        };
        // Portfolio volatility 3e-10 and 3e-8: below and above the threshold.
        for a in [dec!(0.000000001), dec!(0.0000001)] {
            let g = objective.gradient(&[a, Decimal::ONE - a]);
            assert_eq!(g.len(), 2);
            assert!(g.iter().all(|gi| gi.abs() <= GRADIENT_LIMIT));
        }
    }

    #[test]
    fn test_diverged_when_budget_too_small() {
        let stats = two_asset();
        let config = EngineConfig::default().with_max_iterations(1);
        let err =
            optimize_statistics(&stats, OptimizationMethod::MinVolatility, &config).unwrap_err();
        assert!(matches!(
            err,
            PortfolioEngineError::OptimizationDiverged { iterations: 1, .. }
        ));
    }

    #[test]
    fn test_finalize_weights() {
        let w = finalize_weights(vec![dec!(0.6), dec!(0.4), dec!(-0.0000000000001)]);
        assert_eq!(w[2], Decimal::ZERO);
        assert_eq!(w.iter().copied().sum::<Decimal>(), Decimal::ONE);
    }
}
