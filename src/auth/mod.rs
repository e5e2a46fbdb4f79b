//! Credentials and request signing for the exchange's authenticated endpoints.
//!
//! Every signed call builds a fresh [`SignedRequest`]: the exchange only
//! accepts timestamps inside a short skew window, so a signature is never
//! reused across retries.

mod credentials;
mod signer;

pub use credentials::Credentials;
pub use signer::{sign, SignedRequest, Signer};
