use std::collections::HashMap;

use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;

use portfolio_engine_core::engine::{
    self, AllocationRequest, FrontierRequest, OptimizeRequest, RiskAnalysisRequest,
};
use portfolio_engine_core::market_data::InMemoryPriceSource;
use portfolio_engine_core::{EngineConfig, PortfolioEngineError};

/// Engine errors carry the serialized `ErrorResponse` so the dashboard can
/// read `error`, `message` and `status` back out of the reason string.
fn to_napi_error(e: PortfolioEngineError) -> napi::Error {
    let reason = serde_json::to_string(&e.to_response()).unwrap_or_else(|_| e.to_string());
    napi::Error::from_reason(reason)
}

fn parse<T: serde::de::DeserializeOwned>(json: &str) -> NapiResult<T> {
    serde_json::from_str(json).map_err(|e| to_napi_error(PortfolioEngineError::from(e)))
}

fn config(config_json: Option<String>) -> NapiResult<EngineConfig> {
    let config: EngineConfig = match config_json {
        Some(json) => parse(&json)?,
        None => EngineConfig::default(),
    };
    config.validate().map_err(to_napi_error)?;
    Ok(config)
}

fn price_source(prices_json: &str) -> NapiResult<InMemoryPriceSource> {
    let prices: HashMap<String, Vec<Decimal>> = parse(prices_json)?;
    Ok(InMemoryPriceSource::from_map(prices))
}

fn to_json<T: serde::Serialize>(value: &T) -> NapiResult<String> {
    serde_json::to_string(value).map_err(|e| to_napi_error(PortfolioEngineError::from(e)))
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

#[napi]
pub fn optimize_portfolio(
    input_json: String,
    prices_json: String,
    config_json: Option<String>,
) -> NapiResult<String> {
    let request: OptimizeRequest = parse(&input_json)?;
    let source = price_source(&prices_json)?;
    let output =
        engine::optimize_portfolio(&request, &source, &config(config_json)?).map_err(to_napi_error)?;
    to_json(&output)
}

#[napi]
pub fn analyze_portfolio_risk(
    input_json: String,
    prices_json: String,
    config_json: Option<String>,
) -> NapiResult<String> {
    let request: RiskAnalysisRequest = parse(&input_json)?;
    let source = price_source(&prices_json)?;
    let output =
        engine::analyze_risk(&request, &source, &config(config_json)?).map_err(to_napi_error)?;
    to_json(&output)
}

#[napi]
pub fn efficient_frontier(
    input_json: String,
    prices_json: String,
    config_json: Option<String>,
) -> NapiResult<String> {
    let request: FrontierRequest = parse(&input_json)?;
    let source = price_source(&prices_json)?;
    let output = engine::efficient_frontier(&request, &source, &config(config_json)?)
        .map_err(to_napi_error)?;
    to_json(&output)
}

#[napi]
pub fn allocate_portfolio(input_json: String) -> NapiResult<String> {
    let request: AllocationRequest = parse(&input_json)?;
    let output = engine::allocate_portfolio(&request).map_err(to_napi_error)?;
    to_json(&output)
}
