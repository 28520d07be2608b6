//! Request signing for the quote API

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::MarketDataConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub app_key: String,
    pub app_secret: String,
    pub access_token: String,
}

impl Credentials {
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            access_token: access_token.into(),
        }
    }

    /// All three values must be present
    pub fn from_config(config: &MarketDataConfig) -> Option<Self> {
        Some(Self::new(
            config.app_key.clone()?,
            config.app_secret.clone()?,
            config.access_token.clone()?,
        ))
    }
}

/// Sign an API request: hex HMAC-SHA256 of `METHOD|PATH|QUERY|TIMESTAMP`
pub fn sign_request(method: &str, path: &str, query: &str, timestamp: i64, app_secret: &str) -> String {
    let message = format!("{}|{}|{}|{}", method, path, query, timestamp);
    let mut mac =
        HmacSha256::new_from_slice(app_secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
