use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;

use portfolio_engine_core::engine::{
    self, AllocationRequest, FrontierRequest, OptimizeRequest, RiskAnalysisRequest,
    DEFAULT_PORTFOLIO_VALUE,
};
use portfolio_engine_core::market_data::InMemoryPriceSource;
use portfolio_engine_core::{EngineConfig, OptimizationMethod, WeightVector};

use crate::input;

/// Arguments for portfolio optimization
#[derive(Args)]
pub struct OptimizeArgs {
    /// Path to a JSON request ({"symbols": [...], "optimization_method": ..., "portfolio_value": ...})
    #[arg(long)]
    pub input: Option<String>,

    /// Path to a JSON price file ({"SYMBOL": [close, close, ...]})
    #[arg(long)]
    pub prices: Option<String>,

    /// Comma-separated symbols (e.g. "AAPL,MSFT,GOOGL")
    #[arg(long, value_delimiter = ',')]
    pub symbols: Option<Vec<String>>,

    /// Optimization objective: max_sharpe (alias: sharpe) or min_volatility
    #[arg(long)]
    pub method: Option<OptimizationMethod>,

    /// Portfolio value to allocate
    #[arg(long)]
    pub portfolio_value: Option<Decimal>,

    /// Annual risk-free rate (overrides the config file)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,
}

/// Arguments for risk assessment of fixed weights
#[derive(Args)]
pub struct RiskArgs {
    /// Path to a JSON request ({"symbols": [...], "weights": {...}, "portfolio_value": ...})
    #[arg(long)]
    pub input: Option<String>,

    /// Path to a JSON price file ({"SYMBOL": [close, close, ...]})
    #[arg(long)]
    pub prices: Option<String>,

    /// Comma-separated symbols
    #[arg(long, value_delimiter = ',')]
    pub symbols: Option<Vec<String>>,

    /// Comma-separated weights as fractions, in the same order as --symbols
    #[arg(long, value_delimiter = ',')]
    pub weights: Option<Vec<Decimal>>,

    /// Portfolio value for monetary VaR
    #[arg(long)]
    pub portfolio_value: Option<Decimal>,

    /// Annual risk-free rate (overrides the config file)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,
}

/// Arguments for efficient frontier sampling
#[derive(Args)]
pub struct FrontierArgs {
    /// Path to a JSON request ({"symbols": [...], "points": 20})
    #[arg(long)]
    pub input: Option<String>,

    /// Path to a JSON price file ({"SYMBOL": [close, close, ...]})
    #[arg(long)]
    pub prices: Option<String>,

    /// Comma-separated symbols
    #[arg(long, value_delimiter = ',')]
    pub symbols: Option<Vec<String>>,

    /// Number of frontier points
    #[arg(long)]
    pub points: Option<u32>,

    /// Annual risk-free rate (overrides the config file)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,
}

/// Arguments for cent-exact allocation
#[derive(Args)]
pub struct AllocateArgs {
    /// Path to a JSON request ({"weights": {...}, "portfolio_value": ...})
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated symbols
    #[arg(long, value_delimiter = ',')]
    pub symbols: Option<Vec<String>>,

    /// Comma-separated weights as fractions, in the same order as --symbols
    #[arg(long, value_delimiter = ',')]
    pub weights: Option<Vec<Decimal>>,

    /// Portfolio value to split
    #[arg(long)]
    pub portfolio_value: Option<Decimal>,
}

pub fn run_optimize(
    args: OptimizeArgs,
    config_path: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let config = engine_config(config_path, args.risk_free_rate)?;
    let mut request: OptimizeRequest = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(symbols) = args.symbols.clone() {
        OptimizeRequest {
            symbols,
            optimization_method: OptimizationMethod::default(),
            portfolio_value: DEFAULT_PORTFOLIO_VALUE,
        }
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        return Err("--input <file.json>, --symbols or stdin required for optimization".into());
    };
    if let Some(method) = args.method {
        request.optimization_method = method;
    }
    if let Some(value) = args.portfolio_value {
        request.portfolio_value = value;
    }

    let source = price_source(args.prices.as_deref())?;
    let result = engine::optimize_portfolio(&request, &source, &config)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_risk(
    args: RiskArgs,
    config_path: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let config = engine_config(config_path, args.risk_free_rate)?;
    let mut request: RiskAnalysisRequest = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(symbols) = args.symbols.clone() {
        let weights = args
            .weights
            .clone()
            .ok_or("--weights is required together with --symbols")?;
        RiskAnalysisRequest {
            weights: pair_weights(&symbols, &weights)?,
            symbols,
            portfolio_value: DEFAULT_PORTFOLIO_VALUE,
        }
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        return Err("--input <file.json>, --symbols/--weights or stdin required for risk".into());
    };
    if let Some(value) = args.portfolio_value {
        request.portfolio_value = value;
    }

    let source = price_source(args.prices.as_deref())?;
    let result = engine::analyze_risk(&request, &source, &config)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_frontier(
    args: FrontierArgs,
    config_path: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let config = engine_config(config_path, args.risk_free_rate)?;
    let mut request: FrontierRequest = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(symbols) = args.symbols.clone() {
        FrontierRequest {
            symbols,
            points: None,
        }
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        return Err("--input <file.json>, --symbols or stdin required for frontier".into());
    };
    if args.points.is_some() {
        request.points = args.points;
    }

    let source = price_source(args.prices.as_deref())?;
    let result = engine::efficient_frontier(&request, &source, &config)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_allocate(args: AllocateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: AllocationRequest = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(symbols) = args.symbols.clone() {
        let weights = args
            .weights
            .clone()
            .ok_or("--weights is required together with --symbols")?;
        AllocationRequest {
            weights: WeightVector::from_parts(&symbols, &weights)?,
            portfolio_value: DEFAULT_PORTFOLIO_VALUE,
        }
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        return Err("--input <file.json>, --symbols/--weights or stdin required for allocation".into());
    };
    if let Some(value) = args.portfolio_value {
        request.portfolio_value = value;
    }

    let result = engine::allocate_portfolio(&request)?;
    Ok(serde_json::to_value(result)?)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn engine_config(
    path: Option<&str>,
    risk_free_rate: Option<Decimal>,
) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config: EngineConfig = match path {
        Some(p) => input::file::read_json(p)?,
        None => EngineConfig::default(),
    };
    if let Some(rate) = risk_free_rate {
        config = config.with_risk_free_rate(rate);
    }
    config.validate()?;
    Ok(config)
}

fn price_source(path: Option<&str>) -> Result<InMemoryPriceSource, Box<dyn std::error::Error>> {
    let path = path.ok_or("--prices <file.json> required (map of symbol to daily closes)")?;
    let prices = input::file::read_prices(path)?;
    tracing::debug!(symbols = prices.len(), path, "loaded price file");
    Ok(InMemoryPriceSource::from_map(prices))
}

fn pair_weights(
    symbols: &[String],
    weights: &[Decimal],
) -> Result<BTreeMap<String, Decimal>, Box<dyn std::error::Error>> {
    if symbols.len() != weights.len() {
        return Err(format!(
            "--symbols has {} entries but --weights has {}",
            symbols.len(),
            weights.len()
        )
        .into());
    }
    Ok(symbols.iter().cloned().zip(weights.iter().copied()).collect())
}
