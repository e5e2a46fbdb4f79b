use rust_decimal::Decimal;
use std::sync::Arc;

use crate::api::{AccountResolver, ExchangeClient};
use crate::error::Error;
use crate::models::{Order, OrderResult, OrderSide, TradingPair};
use crate::Result;

const ORDERS_PATH: &str = "/orders";

/// Submits market orders through the authenticated `/orders` endpoint.
pub struct OrderExecutor {
    client: Arc<ExchangeClient>,
    accounts: AccountResolver,
    min_order_size: Option<Decimal>,
}

impl OrderExecutor {
    pub fn new(client: Arc<ExchangeClient>, accounts: AccountResolver) -> Self {
        Self {
            client,
            accounts,
            min_order_size: None,
        }
    }

    /// Refuse orders smaller than `size` before they reach the exchange
    pub fn with_min_order_size(mut self, size: Option<Decimal>) -> Self {
        self.min_order_size = size;
        self
    }

    pub fn accounts(&self) -> &AccountResolver {
        &self.accounts
    }

    /// Place one market order of `size` base currency.
    ///
    /// Sizes of zero or below (and below the configured minimum) are rejected
    /// without a network call.
    pub async fn submit_market_order(
        &self,
        pair: &TradingPair,
        side: OrderSide,
        size: Decimal,
    ) -> Result<OrderResult> {
        self.validate_size(size)?;

        let order = Order::market(pair, side, size);
        let body = serde_json::to_string(&order)
            .map_err(|e| Error::Validation(format!("failed to serialize order: {}", e)))?;

        tracing::info!(
            pair = %pair,
            side = %side,
            size = %order.size,
            client_oid = %order.client_oid,
            "Submitting market order"
        );

        let result: OrderResult = self.client.post_signed(ORDERS_PATH, body).await?;

        tracing::info!(
            order_id = %result.id,
            status = result.status.as_deref().unwrap_or("unknown"),
            "Order accepted"
        );

        Ok(result)
    }

    /// Sell or buy the entire base-currency balance.
    ///
    /// The balance is read inside this call, right before submitting.
    pub async fn trade_all(&self, pair: &TradingPair, side: OrderSide) -> Result<OrderResult> {
        let account = self.accounts.resolve_account(pair.base_currency()).await?;
        self.submit_market_order(pair, side, account.balance).await
    }

    fn validate_size(&self, size: Decimal) -> Result<()> {
        if size <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "order size must be positive, got {}",
                size
            )));
        }
        if let Some(min) = self.min_order_size {
            if size < min {
                return Err(Error::Validation(format!(
                    "order size {} is below the minimum {}",
                    size, min
                )));
            }
        }
        Ok(())
    }
}
