use crate::error::{Error, Result};
use crate::types::Credentials;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer for SIGNED futures REST endpoints. Built per request from
/// the caller's credentials.
#[derive(Clone)]
pub struct Signer {
    api_secret: SecretString,
}

impl Signer {
    pub fn new(api_secret: SecretString) -> Self {
        Self { api_secret }
    }

    pub fn from_credentials(creds: &Credentials) -> Self {
        Self::new(creds.api_secret.clone())
    }

    /// Signature is the hex HMAC of the exact query string sent on the wire.
    pub fn sign_query(&self, query: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.expose_secret().as_bytes())
            .map_err(|e| Error::Signing(format!("hmac init: {}", e)))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Encodes params (sorted by key) and appends the signature.
    pub fn signed_query(&self, params: &BTreeMap<String, String>) -> Result<String> {
        let query = encode_params(params);
        let sig = self.sign_query(&query)?;
        Ok(format!("{}&signature={}", query, sig))
    }
}

pub fn encode_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
