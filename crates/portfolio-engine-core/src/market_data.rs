use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::PortfolioEngineError;
use crate::types::Money;
use crate::PortfolioEngineResult;

/// Chronological daily closing prices for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub symbol: String,
    pub prices: Vec<Money>,
}

impl PriceHistory {
    pub fn new(symbol: impl Into<String>, prices: Vec<Money>) -> Self {
        Self {
            symbol: symbol.into(),
            prices,
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Market-data collaborator. Implementations resolve a symbol to its price
/// history or fail with [`PortfolioEngineError::DataUnavailable`].
pub trait PriceSource {
    fn price_history(&self, symbol: &str) -> PortfolioEngineResult<PriceHistory>;
}

/// Price source backed by a map loaded up front.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceSource {
    histories: HashMap<String, PriceHistory>,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, history: PriceHistory) {
        self.histories.insert(history.symbol.clone(), history);
    }

    pub fn with(mut self, symbol: impl Into<String>, prices: Vec<Decimal>) -> Self {
        self.insert(PriceHistory::new(symbol, prices));
        self
    }

    /// Build from `{ "SYMBOL": [prices...] }`.
    pub fn from_map(map: HashMap<String, Vec<Decimal>>) -> Self {
        let histories = map
            .into_iter()
            .map(|(symbol, prices)| (symbol.clone(), PriceHistory::new(symbol, prices)))
            .collect();
        Self { histories }
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}

impl PriceSource for InMemoryPriceSource {
    fn price_history(&self, symbol: &str) -> PortfolioEngineResult<PriceHistory> {
        self.histories
            .get(symbol)
            .cloned()
            .ok_or_else(|| PortfolioEngineError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "symbol not found in price source".into(),
            })
    }
}

/// Resolve every symbol, failing on the first one the source cannot provide.
pub fn fetch_histories<S: PriceSource + ?Sized>(
    source: &S,
    symbols: &[String],
) -> PortfolioEngineResult<Vec<PriceHistory>> {
    symbols
        .iter()
        .map(|s| {
            let history = source.price_history(s)?;
            if history.is_empty() {
                return Err(PortfolioEngineError::DataUnavailable {
                    symbol: s.clone(),
                    reason: "price source returned an empty series".into(),
                });
            }
            Ok(history)
        })
        .collect()
}
