use std::fmt;
use thiserror::Error;

/// Classified failure of any pipeline stage.
///
/// Every component returns one of these instead of a raw transport error, so
/// the orchestrator can decide once whether to retry, skip the cycle, or halt.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection failure or timeout. Retryable.
    #[error("network error: {0}")]
    Network(String),

    /// Exchange throttling (HTTP 429). Retryable with a longer backoff.
    #[error("rate limited by exchange: {0}")]
    RateLimited(String),

    /// Bad signature, stale timestamp or rejected credentials (401/403).
    #[error("authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    /// Malformed request, e.g. an order size below the exchange minimum.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Order refused for a business reason such as insufficient funds.
    #[error("order rejected by exchange: {0}")]
    ExchangeRejection(String),

    /// Any other non-2xx response.
    #[error("exchange error ({status}): {message}")]
    Exchange { status: u16, message: String },

    /// Response body did not have the expected shape.
    #[error("failed to parse exchange response: {0}")]
    Parse(String),

    /// Candle data present but unusable (non-numeric or negative values).
    #[error("invalid market data: {0}")]
    DataValidation(String),

    #[error("insufficient data: need at least {required} candles, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("no account found for currency {0}")]
    AccountNotFound(String),

    /// Bad credentials format or settings. Raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Taxonomy name of an [`Error`], used by the CLI report surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    RateLimit,
    Auth,
    Validation,
    ExchangeRejection,
    Exchange,
    Parse,
    DataValidation,
    InsufficientData,
    AccountNotFound,
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "NetworkError",
            ErrorKind::RateLimit => "RateLimitError",
            ErrorKind::Auth => "AuthError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::ExchangeRejection => "ExchangeRejection",
            ErrorKind::Exchange => "ExchangeError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::DataValidation => "DataValidationError",
            ErrorKind::InsufficientData => "InsufficientDataError",
            ErrorKind::AccountNotFound => "AccountNotFoundError",
            ErrorKind::Configuration => "ConfigurationError",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network(_) => ErrorKind::Network,
            Error::RateLimited(_) => ErrorKind::RateLimit,
            Error::Auth { .. } => ErrorKind::Auth,
            Error::Validation(_) => ErrorKind::Validation,
            Error::ExchangeRejection(_) => ErrorKind::ExchangeRejection,
            Error::Exchange { .. } => ErrorKind::Exchange,
            Error::Parse(_) => ErrorKind::Parse,
            Error::DataValidation(_) => ErrorKind::DataValidation,
            Error::InsufficientData { .. } => ErrorKind::InsufficientData,
            Error::AccountNotFound(_) => ErrorKind::AccountNotFound,
            Error::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Whether the failed request may be sent again (re-signed).
    ///
    /// Server-side 5xx responses count as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::RateLimited(_) => true,
            Error::Exchange { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the error invalidates every future cycle of this run, not just
    /// the current one.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Auth { .. } | Error::Configuration(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::Parse(err.to_string())
        } else {
            Error::Network(err.to_string())
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}
