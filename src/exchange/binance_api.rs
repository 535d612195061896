//! Binance REST session.
//!
//! `BinanceApi` plays the part a third-party Binance SDK would: it owns
//! authentication, throttling, endpoint selection and clock-skew sync.
//! `BinanceClient` only composes a spot and a futures session.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::types::{
    parse_decimal_field, Credentials, ExchangeError, ExchangeResult, MarketType,
};

pub const SPOT_LIVE_URL: &str = "https://api.binance.com";
pub const SPOT_TESTNET_URL: &str = "https://testnet.binance.vision";
pub const FUTURES_LIVE_URL: &str = "https://fapi.binance.com";
pub const FUTURES_TESTNET_URL: &str = "https://testnet.binancefuture.com";

/// Session options shared by the spot and futures handles
#[derive(Debug, Clone)]
pub struct BinanceApiOptions {
    pub requests_per_second: u32,
    /// Sync against server time before the first signed call
    pub adjust_for_time_difference: bool,
    pub recv_window_ms: u64,
    pub timeout: Duration,
}

impl Default for BinanceApiOptions {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            adjust_for_time_difference: true,
            recv_window_ms: 5000,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Binance REST session bound to one market type.
///
/// The session owns authentication, request throttling, endpoint selection
/// and clock-skew adjustment; callers only ask for prices, funding and
/// balances. The market is fixed at construction, so trading both spot and
/// perpetuals takes two sessions.
pub struct BinanceApi {
    client: Client,
    market: MarketType,
    base_url: String,
    api_key: String,
    secret_key: String,
    options: BinanceApiOptions,
    limiter: Arc<DefaultDirectRateLimiter>,
    time_offset_ms: RwLock<Option<i64>>,
}

impl std::fmt::Debug for BinanceApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceApi")
            .field("market", &self.market)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ServerTime {
    #[serde(rename = "serverTime")]
    server_time: i64,
}

#[derive(Deserialize)]
struct PriceResponse {
    price: String,
}

#[derive(Deserialize)]
struct PremiumIndexResponse {
    #[serde(rename = "lastFundingRate")]
    last_funding_rate: Option<String>,
}

#[derive(Deserialize)]
struct SpotAccountResponse {
    balances: Vec<SpotBalance>,
}

#[derive(Deserialize)]
struct SpotBalance {
    asset: String,
    free: String,
}

#[derive(Deserialize)]
struct FuturesBalance {
    asset: String,
    #[serde(rename = "availableBalance")]
    available_balance: String,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    code: i64,
    msg: String,
}

impl BinanceApi {
    pub fn new(
        credentials: &Credentials,
        market: MarketType,
        base_url: Option<&str>,
        options: BinanceApiOptions,
    ) -> ExchangeResult<Self> {
        let client = Client::builder().timeout(options.timeout).build()?;

        let base_url = base_url
            .map(str::to_string)
            .unwrap_or_else(|| Self::default_base_url(market, credentials.is_test).to_string());

        let rate = NonZeroU32::new(options.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            market,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key.clone(),
            secret_key: credentials.api_secret.clone(),
            options,
            limiter: Arc::new(DefaultDirectRateLimiter::direct(Quota::per_second(rate))),
            time_offset_ms: RwLock::new(None),
        })
    }

    pub fn default_base_url(market: MarketType, sandbox: bool) -> &'static str {
        match (market, sandbox) {
            (MarketType::Spot, false) => SPOT_LIVE_URL,
            (MarketType::Spot, true) => SPOT_TESTNET_URL,
            (MarketType::Future, false) => FUTURES_LIVE_URL,
            (MarketType::Future, true) => FUTURES_TESTNET_URL,
        }
    }

    pub fn market(&self) -> MarketType {
        self.market
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `BTC/USDT` -> `BTCUSDT`
    pub fn market_symbol(symbol: &str) -> String {
        symbol
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_uppercase()
    }

    /// Create HMAC signature for Binance API
    pub fn create_signature(&self, query_string: &str) -> String {
        type HmacSha256 = Hmac<sha2::Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(query_string.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn path(&self, spot: &'static str, futures: &'static str) -> &'static str {
        match self.market {
            MarketType::Spot => spot,
            MarketType::Future => futures,
        }
    }

    /// Server clock in milliseconds
    pub async fn server_time(&self) -> ExchangeResult<i64> {
        let path = self.path("/api/v3/time", "/fapi/v1/time");
        let response: ServerTime = self.public_get(path, &[]).await?;
        Ok(response.server_time)
    }

    /// Latest traded price
    pub async fn ticker_price(&self, symbol: &str) -> ExchangeResult<f64> {
        let path = self.path("/api/v3/ticker/price", "/fapi/v1/ticker/price");
        let response: PriceResponse = self
            .public_get(path, &[("symbol", Self::market_symbol(symbol))])
            .await?;
        parse_decimal_field("price", &response.price)
    }

    /// Most recent funding rate of a perpetual
    pub async fn funding_rate(&self, symbol: &str) -> ExchangeResult<f64> {
        if self.market != MarketType::Future {
            return Err(ExchangeError::UnsupportedMarket(self.market));
        }

        let response: PremiumIndexResponse = self
            .public_get("/fapi/v1/premiumIndex", &[("symbol", Self::market_symbol(symbol))])
            .await?;
        let rate = response
            .last_funding_rate
            .ok_or(ExchangeError::MissingField("lastFundingRate"))?;
        parse_decimal_field("lastFundingRate", &rate)
    }

    /// Free balance of `asset` in this session's account
    pub async fn free_balance(&self, asset: &str) -> ExchangeResult<f64> {
        match self.market {
            MarketType::Spot => {
                let account: SpotAccountResponse = self.signed_get("/api/v3/account", &[]).await?;
                let balance = account
                    .balances
                    .into_iter()
                    .find(|b| b.asset.eq_ignore_ascii_case(asset))
                    .ok_or(ExchangeError::MissingField("balances.free"))?;
                parse_decimal_field("free", &balance.free)
            }
            MarketType::Future => {
                let balances: Vec<FuturesBalance> = self.signed_get("/fapi/v2/balance", &[]).await?;
                let balance = balances
                    .into_iter()
                    .find(|b| b.asset.eq_ignore_ascii_case(asset))
                    .ok_or(ExchangeError::MissingField("availableBalance"))?;
                parse_decimal_field("availableBalance", &balance.available_balance)
            }
        }
    }

    /// Local clock corrected by the server offset
    async fn timestamp_ms(&self) -> ExchangeResult<i64> {
        let local = chrono::Utc::now().timestamp_millis();
        if !self.options.adjust_for_time_difference {
            return Ok(local);
        }

        if let Some(offset) = self.time_offset_ms().await {
            return Ok(local + offset);
        }

        let offset = self.sync_time().await?;
        Ok(chrono::Utc::now().timestamp_millis() + offset)
    }

    /// Measure and store the server clock offset
    pub async fn sync_time(&self) -> ExchangeResult<i64> {
        let before = chrono::Utc::now().timestamp_millis();
        let server = self.server_time().await?;
        let after = chrono::Utc::now().timestamp_millis();

        let offset = server - (before + after) / 2;
        *self.time_offset_ms.write().await = Some(offset);
        info!("Binance {} clock offset: {}ms", self.market, offset);
        Ok(offset)
    }

    /// Last measured server offset, `None` before the first sync
    pub async fn time_offset_ms(&self) -> Option<i64> {
        *self.time_offset_ms.read().await
    }

    fn query_string(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let query = Self::query_string(params);
        self.send(path, query, HeaderMap::new()).await
    }

    async fn signed_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let mut query_params = params.to_vec();
        query_params.push(("recvWindow", self.options.recv_window_ms.to_string()));
        query_params.push(("timestamp", self.timestamp_ms().await?.to_string()));

        let query_string = Self::query_string(&query_params);
        let signature = self.create_signature(&query_string);
        let signed_query = format!("{}&signature={}", query_string, signature);

        let mut headers = HeaderMap::new();
        headers.insert("x-mbx-apikey", HeaderValue::from_str(&self.api_key)?);

        self.send(path, signed_query, headers).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        query: String,
        headers: HeaderMap,
    ) -> ExchangeResult<T> {
        self.limiter.until_ready().await;

        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };
        debug!("GET {}{}", self.base_url, path);

        let response = self.client.get(&url).headers(headers).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(error) => ExchangeError::Api { code: error.code.to_string(), message: error.msg },
                Err(_) => ExchangeError::Status { status: status.as_u16(), body: text },
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}
