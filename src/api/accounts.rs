use std::sync::Arc;

use super::ExchangeClient;
use crate::error::Error;
use crate::models::Account;
use crate::Result;

const ACCOUNTS_PATH: &str = "/accounts";

/// Looks up balances through the authenticated `/accounts` endpoint.
///
/// Nothing is cached: every call reads the current balances.
#[derive(Clone)]
pub struct AccountResolver {
    client: Arc<ExchangeClient>,
}

impl AccountResolver {
    pub fn new(client: Arc<ExchangeClient>) -> Self {
        Self { client }
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let accounts: Vec<Account> = self.client.get_signed(ACCOUNTS_PATH).await?;
        tracing::debug!(accounts = accounts.len(), "Fetched accounts");
        Ok(accounts)
    }

    /// The account holding `base_currency` (e.g. "BTC" for BTC-USD)
    pub async fn resolve_account(&self, base_currency: &str) -> Result<Account> {
        let accounts = self.list_accounts().await?;
        let account = find_account(accounts, base_currency)?;

        tracing::info!(
            currency = %account.currency,
            balance = %account.balance,
            available = %account.available,
            "Resolved account"
        );

        Ok(account)
    }
}

/// Exact, case-sensitive currency match
pub fn find_account(accounts: Vec<Account>, currency: &str) -> Result<Account> {
    accounts
        .into_iter()
        .find(|a| a.currency == currency)
        .ok_or_else(|| Error::AccountNotFound(currency.to_string()))
}
