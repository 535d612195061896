use async_trait::async_trait;
use tracing::{error, info};

use crate::exchange::binance_api::{BinanceApi, BinanceApiOptions};
use crate::exchange::client::ExchangeClient;
use crate::types::{Credentials, ExchangeResult, MarketType};

/// Binance client backed by two API sessions
#[derive(Debug)]
pub struct BinanceClient {
    futures: BinanceApi,
    spot: BinanceApi,
    settlement_asset: String,
}

impl BinanceClient {
    /// Sandbox mode comes from `credentials.is_test` and applies to both sessions
    pub fn new(
        credentials: Credentials,
        options: BinanceApiOptions,
        spot_base_url: Option<&str>,
        futures_base_url: Option<&str>,
    ) -> ExchangeResult<Self> {
        let futures = BinanceApi::new(&credentials, MarketType::Future, futures_base_url, options.clone())?;
        let spot = BinanceApi::new(&credentials, MarketType::Spot, spot_base_url, options)?;

        if credentials.is_test {
            info!("Binance client running against testnet");
        }

        Ok(Self {
            futures,
            spot,
            settlement_asset: "USDT".to_string(),
        })
    }

    fn session(&self, market: MarketType) -> &BinanceApi {
        match market {
            MarketType::Spot => &self.spot,
            MarketType::Future => &self.futures,
        }
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn name(&self) -> &str {
        "Binance"
    }

    async fn get_ticker(&self, symbol: &str, market: MarketType) -> Option<f64> {
        match self.session(market).ticker_price(symbol).await {
            Ok(price) => Some(price),
            Err(e) => {
                error!("Failed to fetch price {} ({}): {}", symbol, market, e);
                None
            }
        }
    }

    async fn get_funding_rate(&self, symbol: &str) -> Option<f64> {
        match self.futures.funding_rate(symbol).await {
            Ok(rate) => Some(rate),
            Err(e) => {
                error!("Failed to fetch funding rate {}: {}", symbol, e);
                None
            }
        }
    }

    async fn get_balance(&self) -> f64 {
        match self.futures.free_balance(&self.settlement_asset).await {
            Ok(balance) => balance,
            Err(e) => {
                error!("Failed to fetch {} balance: {}", self.settlement_asset, e);
                0.0
            }
        }
    }
}
