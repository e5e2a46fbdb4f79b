// Technical indicators module
// RSI and simple moving averages over a candle series

pub mod moving_average;
pub mod rsi;

use rust_decimal::Decimal;

pub use moving_average::{calculate_mean, calculate_sma};
pub use rsi::calculate_rsi;

use crate::error::Error;
use crate::models::{CandleSeries, IndicatorResult};
use crate::Result;

/// Reject closes that cannot be prices
pub(crate) fn validate_closes(closes: &[Decimal]) -> Result<()> {
    if let Some((idx, close)) = closes
        .iter()
        .enumerate()
        .find(|(_, c)| c.is_sign_negative() && !c.is_zero())
    {
        return Err(Error::DataValidation(format!(
            "close at index {} is negative: {}",
            idx, close
        )));
    }
    Ok(())
}

/// Computes RSI plus a fast and a slow moving average from one series.
///
/// Each MA is the mean of the trailing `window` closes; pass a window equal
/// to the series length for a full-series mean. RSI uses the whole series
/// unless an RSI window is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorEngine {
    fast_window: usize,
    slow_window: usize,
    rsi_window: Option<usize>,
}

impl IndicatorEngine {
    pub fn new(fast_window: usize, slow_window: usize) -> Result<Self> {
        if fast_window == 0 || slow_window == 0 {
            return Err(Error::Configuration(
                "moving average windows must be at least 1".to_string(),
            ));
        }
        if fast_window > slow_window {
            return Err(Error::Configuration(format!(
                "fast window ({}) must not exceed slow window ({})",
                fast_window, slow_window
            )));
        }

        Ok(Self {
            fast_window,
            slow_window,
            rsi_window: None,
        })
    }

    /// Limit RSI to the trailing `window` candles (at least 2 are needed)
    pub fn with_rsi_window(mut self, window: Option<usize>) -> Self {
        self.rsi_window = window;
        self
    }

    /// Fewest candles that produce a result
    pub fn min_candles_required(&self) -> usize {
        self.slow_window.max(self.rsi_window.unwrap_or(2)).max(2)
    }

    pub fn compute_indicators(&self, series: &CandleSeries) -> Result<IndicatorResult> {
        let required = self.min_candles_required();
        if series.len() < required {
            return Err(Error::InsufficientData {
                required,
                actual: series.len(),
            });
        }

        let closes = series.closes();
        let rsi_closes = match self.rsi_window {
            Some(window) => &closes[closes.len() - window..],
            None => &closes[..],
        };

        let result = IndicatorResult {
            rsi: calculate_rsi(rsi_closes)?,
            fast_ma: calculate_sma(&closes, self.fast_window)?,
            slow_ma: calculate_sma(&closes, self.slow_window)?,
        };

        tracing::debug!(
            candles = series.len(),
            rsi = result.rsi,
            fast_ma = %result.fast_ma,
            slow_ma = %result.slow_ma,
            "Computed indicators"
        );

        Ok(result)
    }
}
