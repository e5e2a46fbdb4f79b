//! Layered settings: built-in defaults, then an optional TOML file, then
//! `COINBOT__*` environment variables (`__` separates sections).

use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::api::{Granularity, RetryPolicy};
use crate::auth::Credentials;
use crate::error::Error;
use crate::indicators::IndicatorEngine;
use crate::models::TradingPair;
use crate::strategy::signals::SignalConfig;
use crate::Result;

pub const DEFAULT_CONFIG_FILE: &str = "coinbot.toml";
pub const DEFAULT_API_URL: &str = "https://api.exchange.coinbase.com";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub exchange: ExchangeSettings,
    pub credentials: CredentialSettings,
    pub trading: TradingSettings,
    pub indicators: IndicatorSettings,
    pub strategy: StrategySettings,
    pub retry: RetrySettings,
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub requests_per_second: u32,
    pub user_agent: String,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 30,
            // Public endpoints allow 10 req/s per IP
            requests_per_second: 10,
            user_agent: concat!("coinbot/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ExchangeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

impl std::fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSettings")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingSettings {
    pub pair: String,
    /// Candle width in seconds; `None` leaves it to the exchange
    pub granularity: Option<u32>,
    /// Fixed order size in base currency; `None` trades the whole balance
    pub order_size: Option<Decimal>,
    pub min_order_size: Option<Decimal>,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            pair: "BTC-USD".to_string(),
            granularity: None,
            order_size: None,
            min_order_size: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub fast_window: usize,
    pub slow_window: usize,
    /// Trailing candles for RSI; `None` uses the full series
    pub rsi_window: Option<usize>,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            fast_window: 12,
            slow_window: 26,
            rsi_window: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub require_trend_confirmation: bool,
}

impl Default for StrategySettings {
    fn default() -> Self {
        let defaults = SignalConfig::default();
        Self {
            rsi_oversold: defaults.rsi_oversold,
            rsi_overbought: defaults.rsi_overbought,
            require_trend_confirmation: defaults.require_trend_confirmation,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub interval_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

impl Settings {
    /// Load settings, reading `path` if given (it must exist) or
    /// `coinbot.toml` in the working directory if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix("COINBOT").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check everything that can be checked without credentials or network
    pub fn validate(&self) -> Result<()> {
        self.trading_pair()?;
        self.granularity()?;
        self.indicator_engine()?;
        self.signal_config()?;

        if self.exchange.base_url.trim().is_empty() {
            return Err(Error::Configuration("exchange.base_url is empty".into()));
        }
        if self.exchange.requests_per_second == 0 {
            return Err(Error::Configuration(
                "exchange.requests_per_second must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Configuration(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(Error::Configuration(
                "scheduler.interval_secs must be at least 1".into(),
            ));
        }
        if let Some(size) = self.trading.order_size {
            if size <= Decimal::ZERO {
                return Err(Error::Configuration(
                    "trading.order_size must be positive".into(),
                ));
            }
        }

        Ok(())
    }

    pub fn trading_pair(&self) -> Result<TradingPair> {
        self.trading
            .pair
            .parse()
            .map_err(|e| Error::Configuration(format!("trading.pair: {}", e)))
    }

    pub fn granularity(&self) -> Result<Option<Granularity>> {
        self.trading
            .granularity
            .map(Granularity::try_from)
            .transpose()
    }

    pub fn indicator_engine(&self) -> Result<IndicatorEngine> {
        if self.indicators.rsi_window.is_some_and(|w| w < 2) {
            return Err(Error::Configuration(
                "indicators.rsi_window must be at least 2".into(),
            ));
        }
        IndicatorEngine::new(self.indicators.fast_window, self.indicators.slow_window)
            .map(|engine| engine.with_rsi_window(self.indicators.rsi_window))
    }

    pub fn signal_config(&self) -> Result<SignalConfig> {
        let config = SignalConfig {
            rsi_oversold: self.strategy.rsi_oversold,
            rsi_overbought: self.strategy.rsi_overbought,
            require_trend_confirmation: self.strategy.require_trend_confirmation,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            jitter: self.retry.jitter,
        }
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_secs)
    }

    /// Credentials for signed endpoints. All three values are required.
    pub fn credentials(&self) -> Result<Credentials> {
        let c = &self.credentials;
        let missing: Vec<&str> = [
            ("api_key", &c.api_key),
            ("api_secret", &c.api_secret),
            ("passphrase", &c.passphrase),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if !missing.is_empty() {
            return Err(Error::Configuration(format!(
                "missing credentials: {} (set COINBOT__CREDENTIALS__<NAME>)",
                missing.join(", ")
            )));
        }

        Ok(Credentials::new(
            c.api_key.clone(),
            c.api_secret.clone(),
            c.passphrase.clone(),
        ))
    }
}
