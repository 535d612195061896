use std::fmt;

use serde::{Deserialize, Serialize};

/// Market segment a ticker is read from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Spot,
    Future,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Spot => "spot",
            MarketType::Future => "future",
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API credentials owned by a single exchange client
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: Option<String>,
    pub is_test: bool,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: None,
            is_test: false,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn testnet(mut self, is_test: bool) -> Self {
        self.is_test = is_test;
        self
    }
}

// Secrets never reach the log output.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .field("is_test", &self.is_test)
            .finish()
    }
}

/// Exchange layer error types
#[derive(thiserror::Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Missing field in response: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Unsupported market for this session: {0}")]
    UnsupportedMarket(MarketType),
}

/// Result type alias
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Parse a decimal string field the way exchanges return prices and rates
pub fn parse_decimal_field(field: &'static str, value: &str) -> ExchangeResult<f64> {
    let parsed: f64 = value.trim().parse().map_err(|_| ExchangeError::InvalidValue {
        field,
        value: value.to_string(),
    })?;

    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(ExchangeError::InvalidValue { field, value: value.to_string() })
    }
}

/// Split a unified `BASE/QUOTE` pair
pub fn split_pair(pair: &str) -> Option<(&str, &str)> {
    let (base, quote) = pair.split_once('/')?;
    let base = base.trim();
    let quote = quote.trim();
    if base.is_empty() || quote.is_empty() {
        return None;
    }
    Some((base, quote))
}
