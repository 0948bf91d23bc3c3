//! Run metrics
//!
//! Everything here is derived from the evaluation result set and recomputed
//! on demand; nothing is accumulated incrementally.

mod aggregate;
pub mod cost;

#[cfg(test)]
mod tests;

pub use aggregate::{
    ConflictCounts, EvalMetrics, HIGH_VARIANCE_THRESHOLD, MetricsOptions, MultiSampleStats,
    RepetitionStats, VariationStats, compute_metrics,
};
pub use cost::{DEFAULT_PRICING, PricingTable};
