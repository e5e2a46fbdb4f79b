// Trading strategy module
pub mod momentum;
pub mod signals;

use crate::models::{IndicatorResult, Signal};

/// Base trait for all trading strategies
pub trait Strategy: Send + Sync {
    /// Generate a trading signal from one indicator snapshot
    fn generate_signal(&self, indicators: &IndicatorResult) -> Signal;

    /// Get strategy name
    fn name(&self) -> &str;
}
