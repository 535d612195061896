use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::ExchangeConfig;
use crate::exchange::binance::BinanceClient;
use crate::exchange::binance_api::BinanceApiOptions;
use crate::exchange::okx::OkxClient;
use crate::mocks::MockExchangeClient;
use crate::types::MarketType;

/// Exchange client trait for a unified market-data interface.
///
/// None of these methods return errors. Price and rate failures are logged by
/// the implementation and surface as `None`; a failed balance read is `0.0`.
#[async_trait]
pub trait ExchangeClient: Send + Sync + fmt::Debug {
    /// Get exchange name
    fn name(&self) -> &str;

    /// Last traded price of `symbol` on the given market segment
    async fn get_ticker(&self, symbol: &str, market: MarketType) -> Option<f64>;

    /// Current funding rate of the perpetual, as a decimal fraction
    async fn get_funding_rate(&self, symbol: &str) -> Option<f64>;

    /// Free balance of the settlement asset
    async fn get_balance(&self) -> f64;
}

/// Supported exchange identities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Binance,
    Okx,
    Mock,
}

impl ExchangeKind {
    pub fn requires_passphrase(&self) -> bool {
        matches!(self, ExchangeKind::Okx)
    }

    pub fn requires_credentials(&self) -> bool {
        !matches!(self, ExchangeKind::Mock)
    }
}

impl FromStr for ExchangeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(ExchangeKind::Binance),
            "okx" | "okex" => Ok(ExchangeKind::Okx),
            "mock" => Ok(ExchangeKind::Mock),
            other => Err(anyhow!("Unsupported exchange: {}", other)),
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeKind::Binance => "binance",
            ExchangeKind::Okx => "okx",
            ExchangeKind::Mock => "mock",
        };
        f.write_str(name)
    }
}

/// Exchange client factory
pub struct ExchangeClientFactory;

impl ExchangeClientFactory {
    /// Pick the client variant from the configured exchange identity
    pub fn create(config: &ExchangeConfig) -> Result<Arc<dyn ExchangeClient>> {
        let kind: ExchangeKind = config.name.parse()?;
        info!("Creating {} client (testnet: {})", kind, config.is_test);

        match kind {
            ExchangeKind::Binance => {
                let options = BinanceApiOptions {
                    requests_per_second: config.rate_limit_per_second,
                    ..BinanceApiOptions::default()
                };
                Self::create_binance_client(config, options)
            }
            ExchangeKind::Okx => Self::create_okx_client(config),
            ExchangeKind::Mock => Ok(Arc::new(MockExchangeClient::demo())),
        }
    }

    pub fn create_binance_client(
        config: &ExchangeConfig,
        options: BinanceApiOptions,
    ) -> Result<Arc<dyn ExchangeClient>> {
        let client = BinanceClient::new(
            config.credentials(),
            options,
            config.base_url.as_deref(),
            config.futures_base_url.as_deref(),
        )
        .context("Failed to create Binance client")?;
        Ok(Arc::new(client))
    }

    pub fn create_okx_client(config: &ExchangeConfig) -> Result<Arc<dyn ExchangeClient>> {
        let credentials = config.credentials();
        if credentials.passphrase.as_deref().map_or(true, str::is_empty) {
            return Err(anyhow!("OKX requires an API passphrase"));
        }

        let client = OkxClient::new(
            credentials,
            config.base_url.as_deref(),
            config.rate_limit_per_second,
        )
        .context("Failed to create OKX client")?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange_config(name: &str) -> ExchangeConfig {
        ExchangeConfig {
            name: name.to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            passphrase: None,
            is_test: true,
            rate_limit_per_second: 10,
            base_url: None,
            futures_base_url: None,
        }
    }

    #[test]
    fn test_exchange_kind_parsing() {
        assert_eq!("binance".parse::<ExchangeKind>().unwrap(), ExchangeKind::Binance);
        assert_eq!("OKX".parse::<ExchangeKind>().unwrap(), ExchangeKind::Okx);
        assert_eq!(" okex ".parse::<ExchangeKind>().unwrap(), ExchangeKind::Okx);
        assert_eq!("mock".parse::<ExchangeKind>().unwrap(), ExchangeKind::Mock);
        assert!("kraken".parse::<ExchangeKind>().is_err());

        assert!(ExchangeKind::Okx.requires_passphrase());
        assert!(!ExchangeKind::Binance.requires_passphrase());
        assert!(!ExchangeKind::Mock.requires_credentials());
    }

    #[tokio::test]
    async fn test_factory_selects_variant_by_name() {
        let binance = ExchangeClientFactory::create(&exchange_config("binance")).unwrap();
        assert_eq!(binance.name(), "Binance");

        let mock = ExchangeClientFactory::create(&exchange_config("mock")).unwrap();
        assert_eq!(mock.name(), "Mock");

        let mut okx = exchange_config("okx");
        okx.passphrase = Some("pass".to_string());
        let okx = ExchangeClientFactory::create(&okx).unwrap();
        assert_eq!(okx.name(), "OKX");
    }

    #[tokio::test]
    async fn test_factory_rejects_okx_without_passphrase() {
        assert!(ExchangeClientFactory::create(&exchange_config("okx")).is_err());

        let mut blank = exchange_config("okx");
        blank.passphrase = Some(String::new());
        assert!(ExchangeClientFactory::create(&blank).is_err());
    }

    #[test]
    fn test_factory_rejects_unknown_exchange() {
        assert!(ExchangeClientFactory::create(&exchange_config("kraken")).is_err());
    }
}
