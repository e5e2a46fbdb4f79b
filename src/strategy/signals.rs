use crate::error::Error;
use crate::models::{IndicatorResult, Signal};
use crate::Result;

/// Configuration for signal generation
#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Only buy in an uptrend (fast MA >= slow MA) and only sell in a downtrend
    pub require_trend_confirmation: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            require_trend_confirmation: false,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(self.rsi_oversold) || !in_range(self.rsi_overbought) {
            return Err(Error::Configuration(
                "RSI thresholds must be within [0, 100]".to_string(),
            ));
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(Error::Configuration(format!(
                "rsi_oversold ({}) must be below rsi_overbought ({})",
                self.rsi_oversold, self.rsi_overbought
            )));
        }
        Ok(())
    }
}

/// Oversold RSI buys, overbought RSI sells, anything in between holds.
pub fn evaluate_signal(indicators: &IndicatorResult, config: &SignalConfig) -> Signal {
    let uptrend = indicators.fast_ma >= indicators.slow_ma;
    let downtrend = indicators.fast_ma <= indicators.slow_ma;

    if indicators.rsi <= config.rsi_oversold {
        if config.require_trend_confirmation && !uptrend {
            tracing::debug!(rsi = indicators.rsi, "Oversold but trend not confirmed");
            return Signal::Hold;
        }
        return Signal::Buy;
    }

    if indicators.rsi >= config.rsi_overbought {
        if config.require_trend_confirmation && !downtrend {
            tracing::debug!(rsi = indicators.rsi, "Overbought but trend not confirmed");
            return Signal::Hold;
        }
        return Signal::Sell;
    }

    Signal::Hold
}
