use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::error;

use crate::exchange::client::ExchangeClient;
use crate::exchange::signing::{SignedHeaderNames, SignedRestTransport};
use crate::types::{
    parse_decimal_field, split_pair, Credentials, ExchangeError, ExchangeResult, MarketType,
};

pub const OKX_BASE_URL: &str = "https://www.okx.com";

const OKX_HEADERS: SignedHeaderNames = SignedHeaderNames {
    access_key: "ok-access-key",
    signature: "ok-access-sign",
    timestamp: "ok-access-timestamp",
    passphrase: "ok-access-passphrase",
};

/// OKX v5 response envelope
#[derive(Debug, Deserialize)]
struct OkxEnvelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

impl<T> OkxEnvelope<T> {
    fn into_first(self, field: &'static str) -> ExchangeResult<T> {
        if self.code != "0" {
            return Err(ExchangeError::Api { code: self.code, message: self.msg });
        }
        self.data.into_iter().next().ok_or(ExchangeError::MissingField(field))
    }
}

#[derive(Debug, Deserialize)]
struct TickerData {
    last: String,
}

#[derive(Debug, Deserialize)]
struct FundingRateData {
    #[serde(rename = "fundingRate")]
    funding_rate: String,
}

#[derive(Debug, Deserialize)]
struct BalanceData {
    #[serde(default)]
    details: Vec<BalanceDetail>,
}

#[derive(Debug, Deserialize)]
struct BalanceDetail {
    ccy: String,
    #[serde(rename = "availBal")]
    avail_bal: String,
}

/// OKX client built directly on the signed REST transport
#[derive(Debug)]
pub struct OkxClient {
    transport: SignedRestTransport,
    settlement_asset: String,
}

impl OkxClient {
    pub fn new(
        credentials: Credentials,
        base_url: Option<&str>,
        requests_per_second: u32,
    ) -> ExchangeResult<Self> {
        let sandbox = credentials.is_test;
        let mut transport = SignedRestTransport::new(
            base_url.unwrap_or(OKX_BASE_URL),
            credentials,
            OKX_HEADERS,
            requests_per_second,
        )?;

        // Demo trading shares the live host and is selected by header
        if sandbox {
            transport = transport.with_header("x-simulated-trading", "1");
        }

        Ok(Self {
            transport,
            settlement_asset: "USDT".to_string(),
        })
    }

    /// `BTC/USDT` -> `BTC-USDT` (spot) or `BTC-USDT-SWAP` (perpetual)
    pub fn instrument_id(symbol: &str, market: MarketType) -> String {
        let spot_id = match split_pair(symbol) {
            Some((base, quote)) => format!("{}-{}", base, quote).to_uppercase(),
            None => symbol.trim().trim_end_matches("-SWAP").to_uppercase(),
        };

        match market {
            MarketType::Spot => spot_id,
            MarketType::Future => format!("{}-SWAP", spot_id),
        }
    }

    async fn fetch_ticker(&self, symbol: &str, market: MarketType) -> ExchangeResult<f64> {
        let path = format!("/api/v5/market/ticker?instId={}", Self::instrument_id(symbol, market));
        let envelope: OkxEnvelope<TickerData> = self.transport.get_public(&path).await?;
        let ticker = envelope.into_first("last")?;
        parse_decimal_field("last", &ticker.last)
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> ExchangeResult<f64> {
        let path = format!(
            "/api/v5/public/funding-rate?instId={}",
            Self::instrument_id(symbol, MarketType::Future)
        );
        let envelope: OkxEnvelope<FundingRateData> = self.transport.get_public(&path).await?;
        let data = envelope.into_first("fundingRate")?;
        parse_decimal_field("fundingRate", &data.funding_rate)
    }

    async fn fetch_balance(&self) -> ExchangeResult<f64> {
        let path = format!("/api/v5/account/balance?ccy={}", self.settlement_asset);
        let envelope: OkxEnvelope<BalanceData> =
            self.transport.request_private(Method::GET, &path, None).await?;
        let account = envelope.into_first("details")?;
        let detail = account
            .details
            .into_iter()
            .find(|d| d.ccy.eq_ignore_ascii_case(&self.settlement_asset))
            .ok_or(ExchangeError::MissingField("availBal"))?;
        parse_decimal_field("availBal", &detail.avail_bal)
    }
}

#[async_trait]
impl ExchangeClient for OkxClient {
    fn name(&self) -> &str {
        "OKX"
    }

    async fn get_ticker(&self, symbol: &str, market: MarketType) -> Option<f64> {
        match self.fetch_ticker(symbol, market).await {
            Ok(price) => Some(price),
            Err(e) => {
                error!("Failed to fetch price {} ({}): {}", symbol, market, e);
                None
            }
        }
    }

    async fn get_funding_rate(&self, symbol: &str) -> Option<f64> {
        match self.fetch_funding_rate(symbol).await {
            Ok(rate) => Some(rate),
            Err(e) => {
                error!("Failed to fetch funding rate {}: {}", symbol, e);
                None
            }
        }
    }

    async fn get_balance(&self) -> f64 {
        match self.fetch_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                error!("Failed to fetch {} balance: {}", self.settlement_asset, e);
                0.0
            }
        }
    }
}
