use rust_decimal::Decimal;

use super::validate_closes;
use crate::error::Error;
use crate::Result;

/// Arithmetic mean of every close supplied
pub fn calculate_mean(closes: &[Decimal]) -> Result<Decimal> {
    if closes.is_empty() {
        return Err(Error::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    validate_closes(closes)?;

    let sum = closes
        .iter()
        .try_fold(Decimal::ZERO, |acc, close| acc.checked_add(*close))
        .ok_or_else(|| Error::DataValidation("sum of closes overflows decimal range".into()))?;
    Ok(sum / Decimal::from(closes.len()))
}

/// Calculate Simple Moving Average (SMA) over the trailing `period` closes
pub fn calculate_sma(closes: &[Decimal], period: usize) -> Result<Decimal> {
    if period == 0 {
        return Err(Error::Configuration(
            "moving average period must be at least 1".to_string(),
        ));
    }
    if closes.len() < period {
        return Err(Error::InsufficientData {
            required: period,
            actual: closes.len(),
        });
    }

    calculate_mean(&closes[closes.len() - period..])
}
