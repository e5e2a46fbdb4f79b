use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// API credentials for the exchange.
///
/// Built once from configuration and handed to the [`Signer`](super::Signer).
/// The secret and passphrase never show up in `Debug` output.
pub struct Credentials {
    api_key: String,
    api_secret: SecretString,
    passphrase: SecretString,
}

impl Credentials {
    /// `api_secret` is the base64 string issued by the exchange.
    pub fn new(api_key: String, api_secret: String, passphrase: String) -> Self {
        Self {
            api_key,
            api_secret: SecretString::from(api_secret),
            passphrase: SecretString::from(passphrase),
        }
    }

    /// Public key, safe to log
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn api_secret(&self) -> &str {
        self.api_secret.expose_secret()
    }

    pub(crate) fn passphrase(&self) -> &str {
        self.passphrase.expose_secret()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}
