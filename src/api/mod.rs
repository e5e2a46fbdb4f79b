// Exchange REST API: transport, market data and accounts
pub mod accounts;
pub mod candles;
pub mod client;
pub mod retry;

pub use accounts::{find_account, AccountResolver};
pub use candles::{CandleFeed, Granularity};
pub use client::{classify_failure, ExchangeClient};
pub use retry::{ExponentialBackoff, RetryPolicy};
