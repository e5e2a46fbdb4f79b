use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

use super::ExchangeClient;
use crate::error::Error;
use crate::models::{Candle, CandleSeries, TradingPair};
use crate::Result;

/// Candle widths accepted by `/products/{pair}/candles`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    SixHours,
    OneDay,
}

impl Granularity {
    pub fn seconds(&self) -> u32 {
        match self {
            Granularity::OneMinute => 60,
            Granularity::FiveMinutes => 300,
            Granularity::FifteenMinutes => 900,
            Granularity::OneHour => 3_600,
            Granularity::SixHours => 21_600,
            Granularity::OneDay => 86_400,
        }
    }
}

impl TryFrom<u32> for Granularity {
    type Error = Error;

    fn try_from(seconds: u32) -> Result<Self> {
        match seconds {
            60 => Ok(Granularity::OneMinute),
            300 => Ok(Granularity::FiveMinutes),
            900 => Ok(Granularity::FifteenMinutes),
            3_600 => Ok(Granularity::OneHour),
            21_600 => Ok(Granularity::SixHours),
            86_400 => Ok(Granularity::OneDay),
            other => Err(Error::Configuration(format!(
                "unsupported granularity {}s (use 60, 300, 900, 3600, 21600 or 86400)",
                other
            ))),
        }
    }
}

/// Fetches candles from the public market-data endpoint.
///
/// Rows arrive newest first; the returned series is always oldest first.
#[derive(Clone)]
pub struct CandleFeed {
    client: Arc<ExchangeClient>,
    granularity: Option<Granularity>,
}

impl CandleFeed {
    pub fn new(client: Arc<ExchangeClient>) -> Self {
        Self {
            client,
            granularity: None,
        }
    }

    pub fn with_granularity(mut self, granularity: Option<Granularity>) -> Self {
        self.granularity = granularity;
        self
    }

    pub async fn fetch_candles(&self, pair: &TradingPair) -> Result<CandleSeries> {
        let path = match self.granularity {
            Some(g) => format!("/products/{}/candles?granularity={}", pair, g.seconds()),
            None => format!("/products/{}/candles", pair),
        };

        let rows: Vec<Value> = self.client.get_public(&path).await?;
        let raw_count = rows.len();

        let candles = rows.iter().map(parse_row).collect::<Result<Vec<_>>>()?;
        let series = CandleSeries::from_unordered(candles);

        if series.len() < raw_count {
            tracing::warn!(
                pair = %pair,
                dropped = raw_count - series.len(),
                "Dropped candles with duplicate timestamps"
            );
        }

        tracing::debug!(
            pair = %pair,
            candles = series.len(),
            first = ?series.first().map(|c| c.time),
            last = ?series.last().map(|c| c.time),
            "Fetched candles"
        );

        Ok(series)
    }
}

/// Convert one `[time, low, high, open, close, volume]` row.
///
/// A row of the wrong shape is a parse error; a cell that is not a number is
/// a data validation error.
pub fn parse_row(row: &Value) -> Result<Candle> {
    let cells = row
        .as_array()
        .ok_or_else(|| Error::Parse(format!("candle row is not an array: {}", row)))?;

    if cells.len() != 6 {
        return Err(Error::Parse(format!(
            "candle row has {} fields, expected 6: {}",
            cells.len(),
            row
        )));
    }

    let time = parse_time(&cells[0])?;

    Ok(Candle {
        time,
        low: parse_decimal(&cells[1], "low")?,
        high: parse_decimal(&cells[2], "high")?,
        open: parse_decimal(&cells[3], "open")?,
        close: parse_decimal(&cells[4], "close")?,
        volume: parse_decimal(&cells[5], "volume")?,
    })
}

fn parse_time(value: &Value) -> Result<DateTime<Utc>> {
    let secs = value
        .as_i64()
        .ok_or_else(|| Error::DataValidation(format!("candle time is not an integer: {}", value)))?;

    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| Error::DataValidation(format!("candle time out of range: {}", secs)))
}

fn parse_decimal(value: &Value, field: &str) -> Result<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => {
            return Err(Error::DataValidation(format!(
                "candle {} is not numeric: {}",
                field, other
            )))
        }
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| Error::DataValidation(format!("candle {} is not numeric: {}", field, text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::test_client;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn feed(url: &str) -> CandleFeed {
        CandleFeed::new(Arc::new(test_client(url, 1)))
    }

    #[test]
    fn test_parse_row_field_order() {
        let candle = parse_row(&json!([1700000000, 99.5, 105.25, 100, 104, 12.5])).unwrap();

        assert_eq!(candle.time.timestamp(), 1_700_000_000);
        assert_eq!(candle.low, dec!(99.5));
        assert_eq!(candle.high, dec!(105.25));
        assert_eq!(candle.open, dec!(100));
        assert_eq!(candle.close, dec!(104));
        assert_eq!(candle.volume, dec!(12.5));
    }

    #[test]
    fn test_parse_row_accepts_small_floats() {
        let candle = parse_row(&json!([1700000000, 1e-7, 2e-7, 1e-7, 2e-7, 1000])).unwrap();
        assert_eq!(candle.close, dec!(0.0000002));
    }

    #[test]
    fn test_parse_row_wrong_shape() {
        assert!(matches!(
            parse_row(&json!([1700000000, 1, 2, 3])),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_row(&json!({"time": 1700000000})),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_parse_row_non_numeric_cell() {
        assert!(matches!(
            parse_row(&json!([1700000000, 1, 2, 3, null, 5])),
            Err(Error::DataValidation(_))
        ));
        assert!(matches!(
            parse_row(&json!([1700000000, 1, 2, 3, "abc", 5])),
            Err(Error::DataValidation(_))
        ));
        assert!(matches!(
            parse_row(&json!(["yesterday", 1, 2, 3, 4, 5])),
            Err(Error::DataValidation(_))
        ));
    }

    #[test]
    fn test_granularity_conversion() {
        assert_eq!(Granularity::try_from(300).unwrap(), Granularity::FiveMinutes);
        assert_eq!(Granularity::OneDay.seconds(), 86_400);
        assert!(matches!(
            Granularity::try_from(120),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_normalizes_descending_rows() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/products/BTC-USD/candles")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    [1700000120, 101, 103, 102, 103, 1.5],
                    [1700000060, 100, 102, 101, 102, 2.0],
                    [1700000000, 99, 101, 100, 101, 3.25]
                ]"#,
            )
            .create_async()
            .await;

        let pair: TradingPair = "BTC-USD".parse().unwrap();
        let series = feed(&server.url()).fetch_candles(&pair).await.unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![dec!(101), dec!(102), dec!(103)]);
        assert_eq!(series.first().unwrap().time.timestamp(), 1_700_000_000);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_sends_granularity() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/products/ETH-USD/candles")
            .match_query(mockito::Matcher::UrlEncoded(
                "granularity".into(),
                "3600".into(),
            ))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let pair: TradingPair = "ETH-USD".parse().unwrap();
        let series = feed(&server.url())
            .with_granularity(Some(Granularity::OneHour))
            .fetch_candles(&pair)
            .await
            .unwrap();

        assert!(series.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_unknown_product_is_exchange_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/products/FOO-BAR/candles")
            .with_status(404)
            .with_body(r#"{"message":"NotFound"}"#)
            .create_async()
            .await;

        let pair: TradingPair = "FOO-BAR".parse().unwrap();
        let result = feed(&server.url()).fetch_candles(&pair).await;

        assert!(matches!(result, Err(Error::Exchange { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_fetch_object_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/products/BTC-USD/candles")
            .with_status(200)
            .with_body(r#"{"candles": []}"#)
            .create_async()
            .await;

        let pair: TradingPair = "BTC-USD".parse().unwrap();
        let result = feed(&server.url()).fetch_candles(&pair).await;

        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
