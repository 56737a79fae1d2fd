use std::collections::BTreeMap;

use portfolio_engine_core::engine::{
    allocate_portfolio, analyze_risk, optimize_portfolio, AllocationRequest, OptimizeRequest,
    RiskAnalysisRequest,
};
use portfolio_engine_core::error::ErrorCategory;
use portfolio_engine_core::market_data::{InMemoryPriceSource, PriceHistory};
use portfolio_engine_core::optimization::mean_variance::{evaluate, optimize, optimize_statistics};
use portfolio_engine_core::recommendations::{DEGRADED_NOTE, REBALANCE_NOTE};
use portfolio_engine_core::risk::RiskLevel;
use portfolio_engine_core::statistics::MarketStatistics;
use portfolio_engine_core::{
    EngineConfig, OptimizationMethod, PortfolioEngineError, WeightVector,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Deterministic geometric random walk starting at 100.
fn walk(seed: u64, drift: Decimal, scale: Decimal, len: usize) -> Vec<Decimal> {
    let mut state = seed;
    let mut price = dec!(100);
    let mut out = Vec::with_capacity(len);
    out.push(price);
    for _ in 1..len {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let shock = Decimal::from(((state >> 33) % 2001) as i64 - 1000) / dec!(1000);
        price = (price * (Decimal::ONE + drift + scale * shock)).round_dp(4);
        out.push(price);
    }
    out
}

fn flat(len: usize) -> Vec<Decimal> {
    vec![dec!(100); len]
}

fn market() -> InMemoryPriceSource {
    InMemoryPriceSource::new()
        .with("AAPL", walk(1, dec!(0.0008), dec!(0.020), 90))
        .with("MSFT", walk(2, dec!(0.0006), dec!(0.015), 90))
        .with("XOM", walk(3, dec!(0.0002), dec!(0.012), 90))
        .with("TLT", walk(4, dec!(0.0001), dec!(0.006), 90))
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn request(list: &[&str], method: OptimizationMethod, value: Decimal) -> OptimizeRequest {
    OptimizeRequest {
        symbols: symbols(list),
        optimization_method: method,
        portfolio_value: value,
    }
}

fn histories(source: &[(&str, Vec<Decimal>)]) -> Vec<PriceHistory> {
    source
        .iter()
        .map(|(s, p)| PriceHistory::new(*s, p.clone()))
        .collect()
}

fn generous() -> EngineConfig {
    EngineConfig::default().with_max_iterations(10_000)
}

// ---------------------------------------------------------------------------
// Weight invariants
// ---------------------------------------------------------------------------

#[test]
fn test_weights_are_long_only_and_fully_invested() {
    let assets = histories(&[
        ("AAPL", walk(1, dec!(0.0008), dec!(0.020), 90)),
        ("MSFT", walk(2, dec!(0.0006), dec!(0.015), 90)),
        ("XOM", walk(3, dec!(0.0002), dec!(0.012), 90)),
        ("TLT", walk(4, dec!(0.0001), dec!(0.006), 90)),
    ]);
    for method in [OptimizationMethod::MaxSharpe, OptimizationMethod::MinVolatility] {
        let result = optimize(&assets, method, dec!(10000), &generous()).unwrap();
        assert!(result.converged);
        assert!((result.weights.total() - Decimal::ONE).abs() <= dec!(0.000001));
        for (symbol, w) in result.weights.iter() {
            assert!(*w >= Decimal::ZERO, "{} has negative weight {}", symbol, w);
            assert!(*w <= Decimal::ONE);
        }
        assert!(result.weights.validate().is_ok());
    }
}

#[test]
fn test_min_volatility_not_worse_than_equal_weight() {
    let assets = histories(&[
        ("AAPL", walk(11, dec!(0.0008), dec!(0.020), 120)),
        ("MSFT", walk(12, dec!(0.0006), dec!(0.015), 120)),
        ("XOM", walk(13, dec!(0.0002), dec!(0.012), 120)),
    ]);
    let config = generous();
    let stats = MarketStatistics::from_histories(&assets, &config).unwrap();
    let optimal = optimize_statistics(&stats, OptimizationMethod::MinVolatility, &config).unwrap();
    let equal = evaluate(&stats, &[dec!(1) / dec!(3); 3], &config);
    assert!(optimal.annual_volatility <= equal.annual_volatility + dec!(0.000000001));
}

#[test]
fn test_identical_assets_split_evenly_under_max_sharpe() {
    let prices = walk(21, dec!(0.0010), dec!(0.018), 60);
    let assets = histories(&[("A", prices.clone()), ("B", prices)]);
    let result = optimize(&assets, OptimizationMethod::MaxSharpe, dec!(10000), &generous()).unwrap();
    let a = result.weights.get("A").unwrap();
    let b = result.weights.get("B").unwrap();
    assert!((a - b).abs() < dec!(0.000001), "A = {}, B = {}", a, b);
    assert!((a - dec!(0.5)).abs() < dec!(0.000001));
}

#[test]
fn test_zero_variance_asset_dominates_min_volatility() {
    let volatile: Vec<Decimal> = (0..60)
        .map(|i| if i % 2 == 0 { dec!(100) } else { dec!(108) })
        .collect();
    let assets = histories(&[("VOL", volatile), ("CASH", flat(60))]);
    let result =
        optimize(&assets, OptimizationMethod::MinVolatility, dec!(10000), &generous()).unwrap();
    assert!(result.weights.get("CASH").unwrap() >= dec!(0.9999));
    assert!(result.annual_volatility < dec!(0.01));
}

#[test]
fn test_zero_variance_asset_above_rf_under_max_sharpe() {
    let volatile: Vec<Decimal> = (0..60)
        .map(|i| if i % 2 == 0 { dec!(100) } else { dec!(108) })
        .collect();
    // Constant 50% daily growth: zero variance, return far above the risk-free rate.
    let compounding: Vec<Decimal> = (0..60)
        .scan(dec!(1), |price, _| {
            let current = *price;
            *price *= dec!(1.5);
            Some(current)
        })
        .collect();
    let source = InMemoryPriceSource::new()
        .with("VOL", volatile)
        .with("SAFE", compounding);
    let out = optimize_portfolio(
        &request(&["VOL", "SAFE"], OptimizationMethod::MaxSharpe, dec!(10000)),
        &source,
        &EngineConfig::default(),
    )
    .unwrap();
    let r = &out.result;
    assert!(!r.degraded);
    assert_eq!(r.allocation.weights["SAFE"], dec!(100));
    assert_eq!(r.allocation.weights["VOL"], Decimal::ZERO);
    assert_eq!(r.allocation.total_dollars(), dec!(10000));
    assert_eq!(r.metrics.sharpe_ratio, Decimal::ZERO);
    assert_eq!(r.risk.var_95, Decimal::ZERO);
    assert!(out.warnings.iter().any(|w| w.contains("SAFE") && w.contains("unbounded")));
}

#[test]
fn test_near_zero_variance_asset_under_max_sharpe() {
    let volatile = walk(41, dec!(0.0004), dec!(0.02), 60);
    // Tiny wobble around steady growth keeps variance positive but negligible.
    let steady: Vec<Decimal> = (0..60)
        .scan(dec!(100), |price, i| {
            let current = *price;
            let bump = if i % 2 == 0 { dec!(0.0000001) } else { dec!(-0.0000001) };
            *price = (*price * (dec!(1.001) + bump)).round_dp(12);
            Some(current)
        })
        .collect();
    let source = InMemoryPriceSource::new()
        .with("VOL", volatile)
        .with("STEADY", steady);
    let out = optimize_portfolio(
        &request(&["VOL", "STEADY"], OptimizationMethod::MaxSharpe, dec!(10000)),
        &source,
        &generous(),
    )
    .unwrap();
    let r = &out.result;
    assert_eq!(r.allocation.total_dollars(), dec!(10000));
    assert_eq!(r.allocation.total_percent(), dec!(100));
    if !r.degraded {
        assert!(r.allocation.weights["STEADY"] >= r.allocation.weights["VOL"]);
    }
}

// ---------------------------------------------------------------------------
// Request boundary
// ---------------------------------------------------------------------------

#[test]
fn test_flat_pair_splits_evenly_with_zero_risk() {
    let source = InMemoryPriceSource::new()
        .with("AAPL", flat(60))
        .with("MSFT", flat(60));
    let out = optimize_portfolio(
        &request(&["AAPL", "MSFT"], OptimizationMethod::MaxSharpe, dec!(10000)),
        &source,
        &EngineConfig::default(),
    )
    .unwrap();
    let r = &out.result;
    assert!(!r.degraded);
    assert_eq!(r.allocation.weights["AAPL"], dec!(50));
    assert_eq!(r.allocation.weights["MSFT"], dec!(50));
    assert_eq!(r.allocation.dollars["AAPL"], dec!(5000));
    assert_eq!(r.metrics.sharpe_ratio, Decimal::ZERO);
    assert_eq!(r.metrics.annual_volatility, Decimal::ZERO);
    assert_eq!(r.risk.var_95, Decimal::ZERO);
    assert_eq!(r.risk.var_99, Decimal::ZERO);
    assert_eq!(r.risk.risk_level, RiskLevel::Low);
    assert_eq!(r.metrics.diversification_score, dec!(50));
}

#[test]
fn test_allocation_sums_to_portfolio_value() {
    let out = optimize_portfolio(
        &request(&["AAPL", "MSFT", "XOM"], OptimizationMethod::MinVolatility, dec!(12345.67)),
        &market(),
        &generous(),
    )
    .unwrap();
    assert_eq!(out.result.allocation.total_dollars(), dec!(12345.67));
    assert_eq!(out.result.allocation.total_percent(), dec!(100));
    assert_eq!(out.result.portfolio_value, dec!(12345.67));
}

#[test]
fn test_var_99_exceeds_var_95() {
    let out = optimize_portfolio(
        &request(&["AAPL", "MSFT", "XOM", "TLT"], OptimizationMethod::MaxSharpe, dec!(100000)),
        &market(),
        &generous(),
    )
    .unwrap();
    let risk = &out.result.risk;
    assert!(risk.var_95 > Decimal::ZERO);
    assert!(risk.var_99 > risk.var_95);
    assert!(risk.historical_var_95.is_some());
    assert!(risk.max_drawdown_estimate > Decimal::ZERO);
}

#[test]
fn test_response_carries_recommendations_and_envelope() {
    let out = optimize_portfolio(
        &request(&["AAPL", "MSFT"], OptimizationMethod::MaxSharpe, dec!(50000)),
        &market(),
        &generous(),
    )
    .unwrap();
    assert_eq!(
        out.result.recommendations.last().map(String::as_str),
        Some(REBALANCE_NOTE)
    );
    assert!(!out.methodology.is_empty());
    assert_eq!(out.assumptions["trading_days"], serde_json::json!(252));

    let json = serde_json::to_value(&out.result).unwrap();
    assert_eq!(json["optimization_method"], "max_sharpe");
    assert!(json["allocation"]["dollars"].is_object());
    assert!(json["metrics"]["sharpe_ratio"].is_number());
}

#[test]
fn test_diverged_solver_degrades_to_equal_weights() {
    let config = EngineConfig::default().with_max_iterations(1);
    let out = optimize_portfolio(
        &request(&["AAPL", "MSFT", "XOM"], OptimizationMethod::MinVolatility, dec!(9000)),
        &market(),
        &config,
    )
    .unwrap();
    let r = &out.result;
    assert!(r.degraded);
    assert_eq!(out.warnings.len(), 1);
    assert_eq!(r.recommendations[0], DEGRADED_NOTE);
    assert_eq!(r.allocation.dollars["AAPL"], dec!(3000));
    assert_eq!(r.allocation.dollars["MSFT"], dec!(3000));
    assert_eq!(r.allocation.dollars["XOM"], dec!(3000));
    assert_eq!(r.metrics.diversification_score, dec!(66.67));
}

#[test]
fn test_equal_weight_diversification_score() {
    let weights: BTreeMap<String, Decimal> = ["AAPL", "MSFT", "XOM", "TLT"]
        .iter()
        .map(|s| (s.to_string(), dec!(0.25)))
        .collect();
    let req = RiskAnalysisRequest {
        symbols: symbols(&["AAPL", "MSFT", "XOM", "TLT"]),
        weights,
        portfolio_value: dec!(20000),
    };
    let out = analyze_risk(&req, &market(), &EngineConfig::default()).unwrap();
    assert_eq!(out.result.metrics.diversification_score, dec!(75));
    assert_eq!(out.result.allocation.dollars["TLT"], dec!(5000));
    assert!(out.result.risk.var_99 > out.result.risk.var_95);
}

#[test]
fn test_allocate_portfolio_envelope() {
    let req = AllocationRequest {
        weights: WeightVector::equal(&symbols(&["A", "B", "C"])).unwrap(),
        portfolio_value: dec!(10000),
    };
    let out = allocate_portfolio(&req).unwrap();
    assert_eq!(out.result.total_dollars(), dec!(10000));
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn test_single_symbol_rejected() {
    let err = optimize_portfolio(
        &request(&["AAPL"], OptimizationMethod::MaxSharpe, dec!(10000)),
        &market(),
        &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PortfolioEngineError::InsufficientAssets {
            required: 2,
            actual: 1
        }
    ));
    assert_eq!(err.to_response().status, 400);
}

#[test]
fn test_negative_portfolio_value_rejected() {
    let err = optimize_portfolio(
        &request(&["AAPL", "MSFT"], OptimizationMethod::MaxSharpe, dec!(-100)),
        &market(),
        &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PortfolioEngineError::InvalidPortfolioValue(_)));
}

#[test]
fn test_oversized_portfolio_value_rejected() {
    let huge = dec!(50000000000000000000000000000);
    let err = optimize_portfolio(
        &request(&["AAPL", "MSFT"], OptimizationMethod::MinVolatility, huge),
        &market(),
        &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PortfolioEngineError::InvalidPortfolioValue(_)));
    assert_eq!(err.to_response().status, 400);

    let weights: BTreeMap<String, Decimal> =
        [("AAPL".to_string(), dec!(0.5)), ("MSFT".to_string(), dec!(0.5))].into();
    let err = analyze_risk(
        &RiskAnalysisRequest {
            symbols: symbols(&["AAPL", "MSFT"]),
            weights,
            portfolio_value: huge,
        },
        &market(),
        &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PortfolioEngineError::InvalidPortfolioValue(_)));
}

#[test]
fn test_unknown_symbol_is_data_unavailable() {
    let err = optimize_portfolio(
        &request(&["AAPL", "NOPE"], OptimizationMethod::MaxSharpe, dec!(10000)),
        &market(),
        &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PortfolioEngineError::DataUnavailable { ref symbol, .. } if symbol == "NOPE"));
    assert_eq!(err.category(), ErrorCategory::ServiceUnavailable);
}

#[test]
fn test_short_history_rejected() {
    let source = market().with("NEW", walk(9, dec!(0), dec!(0.01), 10));
    let err = optimize_portfolio(
        &request(&["AAPL", "NEW"], OptimizationMethod::MaxSharpe, dec!(10000)),
        &source,
        &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PortfolioEngineError::InsufficientHistory { actual: 10, .. }
    ));
}

#[test]
fn test_too_many_symbols_rejected() {
    let list: Vec<String> = (0..21).map(|i| format!("S{}", i)).collect();
    let req = OptimizeRequest {
        symbols: list,
        optimization_method: OptimizationMethod::MaxSharpe,
        portfolio_value: dec!(10000),
    };
    let err = optimize_portfolio(&req, &market(), &EngineConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        PortfolioEngineError::TooManyAssets { max: 20, actual: 21 }
    ));
}
