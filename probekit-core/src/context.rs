//! Immutable per-process run context

use std::sync::Arc;

use crate::config::EvalConfig;
use crate::error::Result;
use crate::metrics::PricingTable;

/// Configuration and pricing shared by every component of a run
///
/// Built once, then handed to constructors; nothing in it changes afterwards.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: Arc<EvalConfig>,
    pub pricing: Arc<PricingTable>,
}

impl RunContext {
    /// Validate `config` and derive the pricing table from its overrides
    pub fn new(config: EvalConfig) -> Result<Self> {
        config.validate()?;
        let pricing = PricingTable::with_overrides(&config.pricing);
        Ok(Self {
            config: Arc::new(config),
            pricing: Arc::new(pricing),
        })
    }

    /// Context from [`EvalConfig::load`]
    pub fn load() -> Result<Self> {
        Self::new(EvalConfig::load()?)
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }
}
