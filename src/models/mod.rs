use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Exchange product id in `BASE-QUOTE` form, e.g. `BTC-USD`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TradingPair {
    base: String,
    quote: String,
}

impl TradingPair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
        }
    }

    /// The first symbol of the pair (BTC in BTC-USD)
    pub fn base_currency(&self) -> &str {
        &self.base
    }

    pub fn quote_currency(&self) -> &str {
        &self.quote
    }
}

impl FromStr for TradingPair {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('-') {
            Some((base, quote))
                if !base.is_empty() && !quote.is_empty() && !quote.contains('-') =>
            {
                Ok(Self::new(base, quote))
            }
            _ => Err(Error::Validation(format!(
                "trading pair must look like BASE-QUOTE, got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

/// OHLCV candlestick data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Candles in ascending time order, one entry per timestamp
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series from candles in any order.
    ///
    /// Sorts ascending by time and drops repeated timestamps, keeping the
    /// first occurrence.
    pub fn from_unordered(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.time);
        candles.dedup_by_key(|c| c.time);
        Self { candles }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Closing prices, oldest first
    pub fn closes(&self) -> Vec<Decimal> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// The most recent `n` candles, or `None` if the series is shorter
    pub fn trailing(&self, n: usize) -> Option<&[Candle]> {
        self.candles
            .len()
            .checked_sub(n)
            .map(|start| &self.candles[start..])
    }
}

/// Indicator snapshot computed from one candle series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorResult {
    pub rsi: f64,
    pub fast_ma: Decimal,
    pub slow_ma: Decimal,
}

/// Trading signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// The order side this signal asks for, if any
    pub fn side(&self) -> Option<OrderSide> {
        match self {
            Signal::Buy => Some(OrderSide::Buy),
            Signal::Sell => Some(OrderSide::Sell),
            Signal::Hold => None,
        }
    }
}

/// Exchange account (one per currency)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub id: String,
    pub currency: String,
    pub balance: Decimal,
    #[serde(default)]
    pub available: Decimal,
    #[serde(default)]
    pub hold: Decimal,
    #[serde(default)]
    pub profile_id: Option<String>,
    #[serde(default)]
    pub trading_enabled: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl FromStr for OrderSide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(Error::Validation(format!(
                "order side must be 'buy' or 'sell', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("buy"),
            OrderSide::Sell => f.write_str("sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
}

/// Order body sent to `POST /orders`
///
/// `client_oid` is fixed per order so a retried submission is
/// de-duplicated by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub side: OrderSide,
    pub product_id: String,
    pub size: Decimal,
    pub client_oid: Uuid,
}

impl Order {
    pub fn market(pair: &TradingPair, side: OrderSide, size: Decimal) -> Self {
        Self {
            order_type: OrderType::Market,
            side,
            product_id: pair.to_string(),
            size: size.normalize(),
            client_oid: Uuid::new_v4(),
        }
    }
}

/// Order confirmation returned by the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub side: Option<OrderSide>,
    #[serde(default, rename = "type")]
    pub order_type: Option<String>,
    #[serde(default)]
    pub size: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub settled: Option<bool>,
    #[serde(default)]
    pub filled_size: Option<Decimal>,
    #[serde(default)]
    pub fill_fees: Option<Decimal>,
    #[serde(default)]
    pub executed_value: Option<Decimal>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
