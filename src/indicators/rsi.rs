use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::validate_closes;
use crate::error::Error;
use crate::Result;

/// Calculate Relative Strength Index (RSI) over every adjacent pair of closes
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// With no losses at all (including a flat series) the RSI is 100.
pub fn calculate_rsi(closes: &[Decimal]) -> Result<f64> {
    if closes.len() < 2 {
        return Err(Error::InsufficientData {
            required: 2,
            actual: closes.len(),
        });
    }
    validate_closes(closes)?;

    let mut total_gain = Decimal::ZERO;
    let mut total_loss = Decimal::ZERO;

    for pair in closes.windows(2) {
        let change = pair[1]
            .checked_sub(pair[0])
            .ok_or_else(|| overflow("price change"))?;
        if change > Decimal::ZERO {
            total_gain = total_gain
                .checked_add(change)
                .ok_or_else(|| overflow("total gain"))?;
        } else {
            total_loss = total_loss
                .checked_add(change.abs())
                .ok_or_else(|| overflow("total loss"))?;
        }
    }

    // avg_gain / avg_loss share the divisor (len - 1), so the totals give the
    // same ratio without rounding the averages first.
    if total_loss.is_zero() {
        return Ok(100.0);
    }

    let rs = total_gain
        .checked_div(total_loss)
        .ok_or_else(|| overflow("gain/loss ratio"))?;
    let rsi = Decimal::ONE
        .checked_add(rs)
        .and_then(|d| Decimal::ONE_HUNDRED.checked_div(d))
        .map(|d| Decimal::ONE_HUNDRED - d)
        .ok_or_else(|| overflow("RSI"))?;

    rsi.to_f64()
        .map(|v| v.clamp(0.0, 100.0))
        .ok_or_else(|| Error::DataValidation(format!("RSI not representable: {}", rsi)))
}

fn overflow(what: &str) -> Error {
    Error::DataValidation(format!("{} overflows decimal range", what))
}
