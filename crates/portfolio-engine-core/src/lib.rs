pub mod allocation;
pub mod config;
pub mod error;
pub mod linalg;
pub mod market_data;
pub mod metrics;
pub mod recommendations;
pub mod statistics;
pub mod types;

#[cfg(feature = "optimization")]
pub mod optimization;

#[cfg(feature = "risk")]
pub mod risk;

#[cfg(all(feature = "optimization", feature = "risk"))]
pub mod engine;

pub use config::EngineConfig;
pub use error::PortfolioEngineError;
pub use types::*;

/// Standard result type for all portfolio-engine operations
pub type PortfolioEngineResult<T> = Result<T, PortfolioEngineError>;
