//! Long-only, fully-invested portfolio optimisation on the probability simplex.

#[cfg(feature = "frontier")]
pub mod frontier;
pub mod mean_variance;
pub mod solver;

pub use mean_variance::{optimize, OptimizationResult, PortfolioSnapshot};
