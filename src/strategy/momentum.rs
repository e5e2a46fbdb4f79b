use super::{
    signals::{evaluate_signal, SignalConfig},
    Strategy,
};
use crate::models::{IndicatorResult, Signal};

/// RSI momentum strategy
///
/// Buys when RSI drops into oversold territory and sells when it reaches
/// overbought, optionally gated on the fast/slow moving-average trend.
#[derive(Debug, Clone, Default)]
pub struct MomentumStrategy {
    config: SignalConfig,
}

impl MomentumStrategy {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }
}

impl Strategy for MomentumStrategy {
    fn generate_signal(&self, indicators: &IndicatorResult) -> Signal {
        let signal = evaluate_signal(indicators, &self.config);
        tracing::debug!(
            strategy = self.name(),
            rsi = indicators.rsi,
            ?signal,
            "Generated signal"
        );
        signal
    }

    fn name(&self) -> &str {
        "MomentumStrategy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_strategy_name() {
        let strategy = MomentumStrategy::default();
        assert_eq!(strategy.name(), "MomentumStrategy");
    }

    #[test]
    fn test_overbought_generates_sell() {
        let strategy = MomentumStrategy::default();
        let indicators = IndicatorResult {
            rsi: 88.89,
            fast_ma: dec!(103),
            slow_ma: dec!(103),
        };
        assert_eq!(strategy.generate_signal(&indicators), Signal::Sell);
    }

    #[test]
    fn test_custom_config() {
        let strategy = MomentumStrategy::new(SignalConfig {
            rsi_oversold: 40.0,
            rsi_overbought: 60.0,
            require_trend_confirmation: false,
        });
        let indicators = IndicatorResult {
            rsi: 38.0,
            fast_ma: dec!(10),
            slow_ma: dec!(11),
        };

        assert_eq!(strategy.generate_signal(&indicators), Signal::Buy);
        assert_eq!(strategy.config().rsi_overbought, 60.0);
    }
}
