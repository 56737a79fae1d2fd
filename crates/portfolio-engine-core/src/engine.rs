//! Request/response boundary: resolve symbols through a [`PriceSource`], run
//! the optimizer and risk model, and wrap everything in the standard
//! [`ComputationOutput`] envelope.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

use crate::allocation::{allocate, AllocationBreakdown};
use crate::config::EngineConfig;
use crate::error::PortfolioEngineError;
use crate::market_data::{fetch_histories, PriceSource};
use crate::metrics::{to_percent, PortfolioMetrics};
use crate::optimization::mean_variance::{
    equal_weight_snapshot, evaluate, optimize_statistics, riskless_asset,
};
use crate::recommendations::recommendations;
use crate::risk::{compute_risk_with_history, RiskLevel, RiskReport};
use crate::statistics::MarketStatistics;
use crate::types::{
    validate_portfolio_value, with_metadata, ComputationOutput, Money, OptimizationMethod, Percent,
    WeightVector,
};
use crate::PortfolioEngineResult;

#[cfg(feature = "frontier")]
use crate::optimization::frontier::{self, EfficientFrontier};

pub const DEFAULT_PORTFOLIO_VALUE: Money = dec!(100000);

fn default_portfolio_value() -> Money {
    DEFAULT_PORTFOLIO_VALUE
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub symbols: Vec<String>,
    #[serde(default)]
    pub optimization_method: OptimizationMethod,
    #[serde(default = "default_portfolio_value")]
    pub portfolio_value: Money,
}

/// Caller-supplied weights to assess. Symbols listed without a weight hold 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAnalysisRequest {
    pub symbols: Vec<String>,
    pub weights: BTreeMap<String, Decimal>,
    #[serde(default = "default_portfolio_value")]
    pub portfolio_value: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub weights: WeightVector,
    #[serde(default = "default_portfolio_value")]
    pub portfolio_value: Money,
}

#[cfg(feature = "frontier")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierRequest {
    pub symbols: Vec<String>,
    /// Number of frontier points; falls back to `EngineConfig::frontier_points`.
    #[serde(default)]
    pub points: Option<u32>,
}

/// Risk figures as reported: currency to cents, volatility in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub var_95: Money,
    pub var_99: Money,
    pub var_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical_var_95: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical_var_99: Option<Money>,
    pub daily_volatility: Percent,
    pub annual_volatility: Percent,
    pub risk_level: RiskLevel,
    pub risk_description: String,
    pub max_drawdown_estimate: Money,
}

impl From<&RiskReport> for RiskSummary {
    fn from(report: &RiskReport) -> Self {
        Self {
            var_95: report.var_95.round_dp(2),
            var_99: report.var_99.round_dp(2),
            var_description: report.var_description.clone(),
            historical_var_95: report.historical_var_95.map(|v| v.round_dp(2)),
            historical_var_99: report.historical_var_99.map(|v| v.round_dp(2)),
            daily_volatility: to_percent(report.daily_volatility),
            annual_volatility: to_percent(report.annual_volatility),
            risk_level: report.risk_level,
            risk_description: report.risk_level.description().to_string(),
            max_drawdown_estimate: report.max_drawdown_estimate.round_dp(2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeResponse {
    pub optimization_method: OptimizationMethod,
    pub portfolio_value: Money,
    pub allocation: AllocationBreakdown,
    pub metrics: PortfolioMetrics,
    pub risk: RiskSummary,
    pub recommendations: Vec<String>,
    /// True when the solver failed and equal weights were substituted.
    pub degraded: bool,
    pub iterations: u32,
    pub observations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAnalysisResponse {
    pub portfolio_value: Money,
    pub weights: WeightVector,
    pub allocation: AllocationBreakdown,
    pub metrics: PortfolioMetrics,
    pub risk: RiskSummary,
    pub recommendations: Vec<String>,
    pub observations: usize,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Optimise the requested symbols and report allocation, metrics and risk.
///
/// A solver that exhausts its budget does not fail the request: the
/// equal-weight portfolio is reported instead with `degraded = true`.
pub fn optimize_portfolio<S: PriceSource + ?Sized>(
    request: &OptimizeRequest,
    source: &S,
    config: &EngineConfig,
) -> PortfolioEngineResult<ComputationOutput<OptimizeResponse>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_portfolio_value(request.portfolio_value)?;
    config.validate()?;
    check_symbol_count(&request.symbols, config)?;

    let stats = load_statistics(&request.symbols, source, config, &mut warnings)?;

    if request.optimization_method == OptimizationMethod::MaxSharpe {
        if let Some(idx) = riskless_asset(&stats, config.risk_free_rate) {
            let symbol = &stats.symbols[idx];
            warn!(%symbol, "zero-variance asset beats the risk-free rate; Sharpe is unbounded");
            warnings.push(format!(
                "{} has zero variance and returns above the risk-free rate; \
                 the Sharpe ratio is unbounded, so {} is held outright and Sharpe is reported as 0",
                symbol, symbol
            ));
        }
    }

    let (snapshot, degraded) =
        match optimize_statistics(&stats, request.optimization_method, config) {
            Ok(snapshot) => (snapshot, false),
            Err(PortfolioEngineError::OptimizationDiverged {
                method,
                iterations,
                last_delta,
            }) => {
                warn!(
                    %method,
                    iterations,
                    %last_delta,
                    "optimizer diverged; falling back to equal weights"
                );
                warnings.push(format!(
                    "{} optimizer did not converge after {} iterations; equal weights used",
                    method, iterations
                ));
                (equal_weight_snapshot(&stats, config), true)
            }
            Err(e) => return Err(e),
        };

    let result = snapshot.to_result(&stats.symbols)?;
    let allocation = allocate(&result.weights, request.portfolio_value)?;
    let report = compute_risk_with_history(&result.weights, &stats, request.portfolio_value)?;
    let metrics = PortfolioMetrics::from_fractions(
        snapshot.annual_return,
        snapshot.annual_volatility,
        snapshot.sharpe_ratio,
        snapshot.diversification_score,
    );

    info!(
        method = %request.optimization_method,
        n_assets = stats.n_assets(),
        degraded,
        "portfolio optimised"
    );

    let output = OptimizeResponse {
        optimization_method: request.optimization_method,
        portfolio_value: request.portfolio_value,
        recommendations: recommendations(&metrics, degraded),
        allocation,
        metrics,
        risk: RiskSummary::from(&report),
        degraded,
        iterations: snapshot.iterations,
        observations: stats.observations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Mean-variance optimization (projected gradient on the long-only simplex) with parametric VaR",
        &assumptions(config),
        warnings,
        elapsed,
        output,
    ))
}

/// Metrics and risk of caller-chosen weights.
pub fn analyze_risk<S: PriceSource + ?Sized>(
    request: &RiskAnalysisRequest,
    source: &S,
    config: &EngineConfig,
) -> PortfolioEngineResult<ComputationOutput<RiskAnalysisResponse>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_portfolio_value(request.portfolio_value)?;
    config.validate()?;
    check_symbol_count(&request.symbols, config)?;
    for symbol in request.weights.keys() {
        if !request.symbols.contains(symbol) {
            return Err(PortfolioEngineError::InvalidInput {
                field: format!("weights.{}", symbol),
                reason: "Weight given for a symbol not in the request".into(),
            });
        }
    }

    let weights: WeightVector = request
        .symbols
        .iter()
        .map(|s| (s.clone(), request.weights.get(s).copied().unwrap_or(Decimal::ZERO)))
        .collect();
    weights.validate()?;

    let stats = load_statistics(&request.symbols, source, config, &mut warnings)?;
    let snapshot = evaluate(&stats, &weights.aligned_to(&stats.symbols), config);
    let report = compute_risk_with_history(&weights, &stats, request.portfolio_value)?;
    let metrics = PortfolioMetrics::from_fractions(
        snapshot.annual_return,
        snapshot.annual_volatility,
        snapshot.sharpe_ratio,
        snapshot.diversification_score,
    );

    let output = RiskAnalysisResponse {
        portfolio_value: request.portfolio_value,
        allocation: allocate(&weights, request.portfolio_value)?,
        recommendations: recommendations(&metrics, false),
        weights,
        metrics,
        risk: RiskSummary::from(&report),
        observations: stats.observations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Portfolio risk assessment with parametric and historical VaR",
        &assumptions(config),
        warnings,
        elapsed,
        output,
    ))
}

/// Split a portfolio value across fixed weights.
pub fn allocate_portfolio(
    request: &AllocationRequest,
) -> PortfolioEngineResult<ComputationOutput<AllocationBreakdown>> {
    let start = Instant::now();
    let output = allocate(&request.weights, request.portfolio_value)?;
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Cent-rounded allocation with remainder on the largest weight",
        request,
        Vec::new(),
        elapsed,
        output,
    ))
}

/// Sample the long-only efficient frontier for the requested symbols.
#[cfg(feature = "frontier")]
pub fn efficient_frontier<S: PriceSource + ?Sized>(
    request: &FrontierRequest,
    source: &S,
    config: &EngineConfig,
) -> PortfolioEngineResult<ComputationOutput<EfficientFrontier>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    config.validate()?;
    check_symbol_count(&request.symbols, config)?;
    let stats = load_statistics(&request.symbols, source, config, &mut warnings)?;

    let points = request.points.unwrap_or(config.frontier_points);
    let output = frontier::efficient_frontier(&stats, points, config)?;
    if output.skipped_points > 0 {
        warnings.push(format!(
            "{} of {} frontier points did not converge and were omitted",
            output.skipped_points, points
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Efficient frontier via risk-aversion bisection on the long-only simplex",
        &assumptions(config),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_symbol_count(symbols: &[String], config: &EngineConfig) -> PortfolioEngineResult<()> {
    if symbols.len() < config.min_assets {
        return Err(PortfolioEngineError::InsufficientAssets {
            required: config.min_assets,
            actual: symbols.len(),
        });
    }
    if symbols.len() > config.max_assets {
        return Err(PortfolioEngineError::TooManyAssets {
            max: config.max_assets,
            actual: symbols.len(),
        });
    }
    Ok(())
}

fn load_statistics<S: PriceSource + ?Sized>(
    symbols: &[String],
    source: &S,
    config: &EngineConfig,
    warnings: &mut Vec<String>,
) -> PortfolioEngineResult<MarketStatistics> {
    let histories = fetch_histories(source, symbols)?;
    let stats = MarketStatistics::from_histories(&histories, config)?;
    if stats.truncated {
        warnings.push(format!(
            "Price histories differ in length; using the most recent {} common observations",
            stats.observations + 1
        ));
    }
    Ok(stats)
}

#[derive(Serialize)]
struct Assumptions {
    risk_free_rate: Decimal,
    trading_days: u32,
    long_only: bool,
    fully_invested: bool,
    return_distribution: &'static str,
}

fn assumptions(config: &EngineConfig) -> Assumptions {
    Assumptions {
        risk_free_rate: config.risk_free_rate,
        trading_days: config.trading_days,
        long_only: true,
        fully_invested: true,
        return_distribution: "normal, zero daily mean (parametric VaR)",
    }
}
