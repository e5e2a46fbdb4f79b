//! HMAC-SHA256 request signing for the exchange REST API.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretSlice};
use sha2::Sha256;
use std::fmt;

use super::Credentials;
use crate::error::Error;
use crate::Result;

type HmacSha256 = Hmac<Sha256>;

/// Sign one request.
///
/// The message is `timestamp + method + path + body`, keyed with the
/// base64-decoded secret; the digest is returned base64-encoded.
pub fn sign(
    secret_key: &str,
    method: &str,
    path: &str,
    body: &str,
    timestamp: i64,
) -> Result<String> {
    let key = decode_secret(secret_key)?;
    compute_signature(&key, method, path, body, timestamp)
}

fn decode_secret(secret_key: &str) -> Result<Vec<u8>> {
    let key = STANDARD
        .decode(secret_key.trim())
        .map_err(|e| Error::Configuration(format!("API secret is not valid base64: {}", e)))?;

    if key.is_empty() {
        return Err(Error::Configuration("API secret is empty".to_string()));
    }

    Ok(key)
}

fn compute_signature(
    key: &[u8],
    method: &str,
    path: &str,
    body: &str,
    timestamp: i64,
) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::Configuration(format!("unusable signing key: {}", e)))?;

    mac.update(timestamp.to_string().as_bytes());
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Signs requests with one set of credentials.
///
/// The secret is decoded on construction, so a malformed key is reported
/// before the first network call.
pub struct Signer {
    credentials: Credentials,
    key: SecretSlice<u8>,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let key = decode_secret(credentials.api_secret())?;
        Ok(Self {
            credentials,
            key: SecretSlice::from(key),
        })
    }

    /// Build the authentication material for exactly this request.
    pub fn sign_request(
        &self,
        method: &str,
        path: &str,
        body: &str,
        timestamp: i64,
    ) -> Result<SignedRequest> {
        let signature =
            compute_signature(self.key.expose_secret(), method, path, body, timestamp)?;

        Ok(SignedRequest {
            method: method.to_string(),
            path: path.to_string(),
            body: body.to_string(),
            timestamp,
            signature,
            api_key: self.credentials.api_key().to_string(),
            passphrase: self.credentials.passphrase().to_string(),
        })
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Single-use authentication for one HTTP call.
///
/// There are no setters: a different method, path, body or timestamp needs a
/// new call to [`Signer::sign_request`].
pub struct SignedRequest {
    method: String,
    path: String,
    body: String,
    timestamp: i64,
    signature: String,
    api_key: String,
    passphrase: String,
}

impl SignedRequest {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The `CB-ACCESS-*` headers for this request
    pub fn headers(&self) -> [(&'static str, String); 4] {
        [
            ("CB-ACCESS-KEY", self.api_key.clone()),
            ("CB-ACCESS-SIGN", self.signature.clone()),
            ("CB-ACCESS-TIMESTAMP", self.timestamp.to_string()),
            ("CB-ACCESS-PASSPHRASE", self.passphrase.clone()),
        ]
    }
}

impl fmt::Debug for SignedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("timestamp", &self.timestamp)
            .field("api_key", &self.api_key)
            .field("passphrase", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
