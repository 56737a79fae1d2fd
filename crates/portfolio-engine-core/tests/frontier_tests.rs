#![cfg(feature = "frontier")]

use portfolio_engine_core::engine::{efficient_frontier, FrontierRequest};
use portfolio_engine_core::market_data::InMemoryPriceSource;
use portfolio_engine_core::{EngineConfig, PortfolioEngineError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

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

fn market() -> InMemoryPriceSource {
    InMemoryPriceSource::new()
        .with("GROWTH", walk(31, dec!(0.0012), dec!(0.022), 120))
        .with("VALUE", walk(32, dec!(0.0005), dec!(0.012), 120))
        .with("BONDS", walk(33, dec!(0.0001), dec!(0.004), 120))
}

fn request(points: Option<u32>) -> FrontierRequest {
    FrontierRequest {
        symbols: vec!["GROWTH".into(), "VALUE".into(), "BONDS".into()],
        points,
    }
}

fn config() -> EngineConfig {
    EngineConfig::default().with_max_iterations(10_000)
}

#[test]
fn test_frontier_points_are_valid_portfolios() {
    let out = efficient_frontier(&request(Some(6)), &market(), &config()).unwrap();
    let frontier = &out.result;
    assert_eq!(frontier.points.len() + frontier.skipped_points, 6);
    for point in &frontier.points {
        assert!(point.weights.validate().is_ok());
        assert!(point.volatility >= frontier.min_variance.volatility - dec!(0.01));
    }
}

#[test]
fn test_best_sharpe_is_maximal() {
    let out = efficient_frontier(&request(Some(8)), &market(), &config()).unwrap();
    let best = &out.result.best_sharpe;
    for point in &out.result.points {
        assert!(point.sharpe_ratio <= best.sharpe_ratio);
    }
}

#[test]
fn test_default_point_count_from_config() {
    let cfg = EngineConfig {
        frontier_points: 4,
        ..config()
    };
    let out = efficient_frontier(&request(None), &market(), &cfg).unwrap();
    assert_eq!(out.result.points.len() + out.result.skipped_points, 4);
}

#[test]
fn test_zero_points_rejected() {
    let err = efficient_frontier(&request(Some(0)), &market(), &config()).unwrap_err();
    assert!(matches!(err, PortfolioEngineError::InvalidInput { .. }));
}
