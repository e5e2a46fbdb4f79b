use rust_decimal::Decimal;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use super::executor::OrderExecutor;
use crate::api::{AccountResolver, CandleFeed, ExchangeClient};
use crate::auth::Signer;
use crate::config::Settings;
use crate::indicators::IndicatorEngine;
use crate::models::{IndicatorResult, OrderResult, Signal, TradingPair};
use crate::strategy::momentum::MomentumStrategy;
use crate::strategy::Strategy;
use crate::Result;

/// Result of one decision cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    OrderPlaced(OrderResult),
    NoSignal {
        signal: Signal,
        indicators: IndicatorResult,
    },
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::OrderPlaced(order) => write!(
                f,
                "order {} placed ({} {}, status {})",
                order.id,
                order
                    .side
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                order
                    .size
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                order.status.as_deref().unwrap_or("unknown"),
            ),
            CycleOutcome::NoSignal { signal, indicators } => write!(
                f,
                "no order ({:?}): rsi {:.2}, fast ma {}, slow ma {}",
                signal, indicators.rsi, indicators.fast_ma, indicators.slow_ma
            ),
        }
    }
}

/// Indicators and signal for the latest candles, without trading
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub signal: Signal,
    pub indicators: IndicatorResult,
    pub candles: usize,
    pub last_close: Option<Decimal>,
}

/// Candles -> indicators -> signal -> order, for one trading pair.
pub struct Pipeline {
    pair: TradingPair,
    feed: CandleFeed,
    engine: IndicatorEngine,
    strategy: Box<dyn Strategy>,
    executor: OrderExecutor,
    order_size: Option<Decimal>,
    cycle_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        pair: TradingPair,
        feed: CandleFeed,
        engine: IndicatorEngine,
        strategy: Box<dyn Strategy>,
        executor: OrderExecutor,
    ) -> Self {
        Self {
            pair,
            feed,
            engine,
            strategy,
            executor,
            order_size: None,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Trade a fixed size instead of the whole base balance
    pub fn with_order_size(mut self, size: Option<Decimal>) -> Self {
        self.order_size = size;
        self
    }

    /// Wire every component from settings. Credentials are required.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let signer = Signer::new(settings.credentials()?)?;
        Self::build(settings, Some(signer))
    }

    /// Pipeline without credentials. `evaluate` works; anything that touches
    /// accounts or orders fails with a configuration error.
    pub fn read_only(settings: &Settings) -> Result<Self> {
        Self::build(settings, None)
    }

    fn build(settings: &Settings, signer: Option<Signer>) -> Result<Self> {
        let mut client = ExchangeClient::new(&settings.exchange, settings.retry_policy())?;
        if let Some(signer) = signer {
            client = client.with_signer(signer);
        }
        let client = Arc::new(client);

        let feed = CandleFeed::new(client.clone()).with_granularity(settings.granularity()?);
        let executor = OrderExecutor::new(client.clone(), AccountResolver::new(client))
            .with_min_order_size(settings.trading.min_order_size);
        let strategy = MomentumStrategy::new(settings.signal_config()?);

        Ok(Self::new(
            settings.trading_pair()?,
            feed,
            settings.indicator_engine()?,
            Box::new(strategy),
            executor,
        )
        .with_order_size(settings.trading.order_size))
    }

    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    pub fn executor(&self) -> &OrderExecutor {
        &self.executor
    }

    /// Fetch candles and run indicators and strategy
    pub async fn evaluate(&self) -> Result<Evaluation> {
        let series = self.feed.fetch_candles(&self.pair).await?;
        let indicators = self.engine.compute_indicators(&series)?;
        let signal = self.strategy.generate_signal(&indicators);

        tracing::info!(
            pair = %self.pair,
            strategy = self.strategy.name(),
            signal = ?signal,
            rsi = indicators.rsi,
            "Signal generated"
        );

        Ok(Evaluation {
            signal,
            indicators,
            candles: series.len(),
            last_close: series.last().map(|c| c.close),
        })
    }

    /// One full cycle. Nothing is submitted if any earlier step fails.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let _guard = self.cycle_lock.lock().await;

        let evaluation = self.evaluate().await?;
        let side = match evaluation.signal.side() {
            Some(side) => side,
            None => {
                return Ok(CycleOutcome::NoSignal {
                    signal: evaluation.signal,
                    indicators: evaluation.indicators,
                })
            }
        };

        let order = match self.order_size {
            Some(size) => {
                self.executor
                    .submit_market_order(&self.pair, side, size)
                    .await?
            }
            None => self.executor.trade_all(&self.pair, side).await?,
        };

        Ok(CycleOutcome::OrderPlaced(order))
    }

    /// Run cycles on a fixed interval until `max_cycles` have run, a fatal
    /// error (auth or configuration) occurs, or `shutdown` resolves.
    ///
    /// `shutdown` is only checked between cycles, so a cycle that has started
    /// always runs to completion. Other failures are logged.
    pub async fn watch<F>(
        &self,
        interval: Duration,
        max_cycles: Option<u64>,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            pair = %self.pair,
            interval_secs = interval.as_secs(),
            "🔄 Watching for signals"
        );

        let mut completed = 0u64;
        loop {
            if max_cycles.is_some_and(|max| completed >= max) {
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!(cycles = completed, "🛑 Shutdown requested, stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            match self.run_cycle().await {
                Ok(outcome) => tracing::info!(cycle = completed + 1, "{}", outcome),
                Err(e) if e.is_fatal() => {
                    tracing::error!(kind = %e.kind(), "Stopping: {}", e);
                    return Err(e);
                }
                Err(e) => tracing::warn!(kind = %e.kind(), "Cycle failed: {}", e),
            }
            completed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::test_client;
    use crate::error::Error;
    use crate::strategy::signals::SignalConfig;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    // Newest first, as the exchange returns them. Ascending closes are
    // 100, 102, 101, 105, 107 which gives RSI ~88.9.
    const RISING_CANDLES: &str = r#"[
        [1700000240, 106, 108, 105, 107, 10],
        [1700000180, 104, 106, 101, 105, 10],
        [1700000120, 100, 102, 102, 101, 10],
        [1700000060, 101, 103, 100, 102, 10],
        [1700000000, 99, 101, 99, 100, 10]
    ]"#;

    const FLAT_MIXED_CANDLES: &str = r#"[
        [1700000180, 99, 101, 100, 100, 10],
        [1700000120, 99, 101, 101, 101, 10],
        [1700000060, 99, 101, 100, 100, 10],
        [1700000000, 99, 101, 101, 101, 10]
    ]"#;

    const ORDER_RESPONSE: &str =
        r#"{"id": "ord-1", "product_id": "BTC-USD", "side": "sell", "size": "2", "status": "pending"}"#;

    fn pipeline(url: &str, max_attempts: u32) -> Pipeline {
        let client = Arc::new(test_client(url, max_attempts));
        Pipeline::new(
            "BTC-USD".parse().unwrap(),
            CandleFeed::new(client.clone()),
            IndicatorEngine::new(2, 4).unwrap(),
            Box::new(MomentumStrategy::new(SignalConfig::default())),
            OrderExecutor::new(client.clone(), AccountResolver::new(client)),
        )
    }

    #[tokio::test]
    async fn test_evaluate_normalizes_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/products/BTC-USD/candles")
            .with_status(200)
            .with_body(RISING_CANDLES)
            .create_async()
            .await;

        let evaluation = pipeline(&server.url(), 1).evaluate().await.unwrap();

        assert_eq!(evaluation.signal, Signal::Sell);
        assert_eq!(evaluation.candles, 5);
        assert_eq!(evaluation.last_close, Some(dec!(107)));
        assert_eq!(evaluation.indicators.fast_ma, dec!(106));
    }

    #[tokio::test]
    async fn test_cycle_with_fixed_size_skips_accounts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/products/BTC-USD/candles")
            .with_status(200)
            .with_body(RISING_CANDLES)
            .create_async()
            .await;
        let accounts = server
            .mock("GET", "/accounts")
            .expect(0)
            .create_async()
            .await;
        let order = server
            .mock("POST", "/orders")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "side": "sell",
                "size": "2"
            })))
            .with_status(200)
            .with_body(ORDER_RESPONSE)
            .expect(1)
            .create_async()
            .await;

        let outcome = pipeline(&server.url(), 1)
            .with_order_size(Some(dec!(2)))
            .run_cycle()
            .await
            .unwrap();

        assert!(matches!(outcome, CycleOutcome::OrderPlaced(ref o) if o.id == "ord-1"));
        accounts.assert_async().await;
        order.assert_async().await;
    }

    #[tokio::test]
    async fn test_hold_places_no_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/products/BTC-USD/candles")
            .with_status(200)
            .with_body(FLAT_MIXED_CANDLES)
            .create_async()
            .await;
        let order = server
            .mock("POST", "/orders")
            .expect(0)
            .create_async()
            .await;

        let outcome = pipeline(&server.url(), 1).run_cycle().await.unwrap();

        // closes 101, 100, 101, 100: gains 1, losses 2 -> RSI 33.3
        match outcome {
            CycleOutcome::NoSignal { signal, indicators } => {
                assert_eq!(signal, Signal::Hold);
                assert!((indicators.rsi - 33.33).abs() < 0.01);
            }
            other => panic!("expected no signal, got {:?}", other),
        }
        order.assert_async().await;
    }

    #[tokio::test]
    async fn test_insufficient_candles_halts_before_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/products/BTC-USD/candles")
            .with_status(200)
            .with_body(r#"[[1700000000, 99, 101, 99, 100, 10]]"#)
            .create_async()
            .await;
        let order = server
            .mock("POST", "/orders")
            .expect(0)
            .create_async()
            .await;

        let result = pipeline(&server.url(), 1).run_cycle().await;

        assert!(matches!(result, Err(Error::InsufficientData { .. })));
        order.assert_async().await;
    }

    #[tokio::test]
    async fn test_watch_continues_after_transient_failure() {
        let mut server = mockito::Server::new_async().await;
        let candles = server
            .mock("GET", "/products/BTC-USD/candles")
            .with_status(503)
            .with_body(r#"{"message":"service unavailable"}"#)
            .expect(2)
            .create_async()
            .await;

        let result = pipeline(&server.url(), 1)
            .watch(Duration::from_millis(1), Some(2), std::future::pending())
            .await;

        assert!(result.is_ok());
        candles.assert_async().await;
    }

    #[tokio::test]
    async fn test_watch_stops_on_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/products/BTC-USD/candles")
            .with_status(200)
            .with_body(RISING_CANDLES)
            .create_async()
            .await;
        let accounts = server
            .mock("GET", "/accounts")
            .with_status(401)
            .with_body(r#"{"message":"invalid api key"}"#)
            .expect(1)
            .create_async()
            .await;

        let result = pipeline(&server.url(), 1)
            .watch(Duration::from_millis(1), Some(5), std::future::pending())
            .await;

        assert!(matches!(result, Err(Error::Auth { status: 401, .. })));
        accounts.assert_async().await;
    }

    #[tokio::test]
    async fn test_concurrent_cycles_run_one_after_another() {
        use std::sync::Mutex as StdMutex;

        let log = Arc::new(StdMutex::new(Vec::new()));
        let mut server = mockito::Server::new_async().await;

        let candle_log = log.clone();
        server
            .mock("GET", "/products/BTC-USD/candles")
            .with_status(200)
            .with_body_from_request(move |_| {
                candle_log.lock().unwrap().push("candles");
                RISING_CANDLES.as_bytes().to_vec()
            })
            .expect(2)
            .create_async()
            .await;
        let order_log = log.clone();
        let orders = server
            .mock("POST", "/orders")
            .with_status(200)
            .with_body_from_request(move |_| {
                order_log.lock().unwrap().push("order");
                ORDER_RESPONSE.as_bytes().to_vec()
            })
            .expect(2)
            .create_async()
            .await;

        let pipeline = pipeline(&server.url(), 1).with_order_size(Some(dec!(2)));
        let (first, second) = tokio::join!(pipeline.run_cycle(), pipeline.run_cycle());

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["candles", "order", "candles", "order"]
        );
        orders.assert_async().await;
    }

    #[tokio::test]
    async fn test_watch_stops_before_first_cycle_on_shutdown() {
        let mut server = mockito::Server::new_async().await;
        let candles = server
            .mock("GET", "/products/BTC-USD/candles")
            .expect(0)
            .create_async()
            .await;

        let result = pipeline(&server.url(), 1)
            .watch(Duration::from_millis(1), None, async {})
            .await;

        assert!(result.is_ok());
        candles.assert_async().await;
    }

    #[tokio::test]
    async fn test_shutdown_lets_started_cycle_finish() {
        use std::sync::Mutex as StdMutex;
        use tokio::sync::oneshot;

        let (tx, rx) = oneshot::channel::<()>();
        let tx = StdMutex::new(Some(tx));

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/products/BTC-USD/candles")
            .with_status(200)
            .with_body_from_request(move |_| {
                // Request shutdown while the cycle is in flight
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(());
                }
                RISING_CANDLES.as_bytes().to_vec()
            })
            .expect(1)
            .create_async()
            .await;
        let order = server
            .mock("POST", "/orders")
            .with_status(200)
            .with_body(ORDER_RESPONSE)
            .expect(1)
            .create_async()
            .await;

        let result = pipeline(&server.url(), 1)
            .with_order_size(Some(dec!(2)))
            .watch(Duration::from_millis(1), None, async move {
                let _ = rx.await;
            })
            .await;

        assert!(result.is_ok());
        order.assert_async().await;
    }

    #[test]
    fn test_outcome_display() {
        let outcome = CycleOutcome::NoSignal {
            signal: Signal::Hold,
            indicators: IndicatorResult {
                rsi: 50.0,
                fast_ma: dec!(10),
                slow_ma: dec!(11),
            },
        };
        assert_eq!(
            outcome.to_string(),
            "no order (Hold): rsi 50.00, fast ma 10, slow ma 11"
        );
    }
}
