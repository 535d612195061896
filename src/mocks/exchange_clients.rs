use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use tracing::{debug, error};

use crate::exchange::client::ExchangeClient;
use crate::mocks::get_mock_config;
use crate::types::{split_pair, MarketType};

/// 페어별 Mock 시세
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockMarket {
    pub spot_price: Option<f64>,
    pub swap_price: Option<f64>,
    pub funding_rate: Option<f64>,
}

impl MockMarket {
    pub fn new(spot_price: f64, swap_price: f64, funding_rate: f64) -> Self {
        Self {
            spot_price: Some(spot_price),
            swap_price: Some(swap_price),
            funding_rate: Some(funding_rate),
        }
    }
}

/// Mock 거래소 클라이언트
///
/// 실제 API 대신 미리 정해진 시세를 돌려줍니다.
/// 등록되지 않은 페어나 실패로 지정된 페어는 조회 실패(`None`)로 처리됩니다.
#[derive(Debug, Default)]
pub struct MockExchangeClient {
    markets: HashMap<String, MockMarket>,
    failing_pairs: HashSet<String>,
    balance: Option<f64>,
    latency_ms: u64,

    // 호출 통계
    ticker_calls: AtomicUsize,
    funding_calls: AtomicUsize,
    balance_calls: AtomicUsize,
}

impl MockExchangeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 자산 가격표 기반의 데모 클라이언트 (`API_MODE=mock` / `name = "mock"`)
    pub fn demo() -> Self {
        let mock_config = get_mock_config();
        let mut client = Self::new()
            .with_balance(mock_config.balance)
            .with_latency_ms(mock_config.exchange_latency_ms);

        for (pair, spot) in [
            ("BTC/USDT", 50_000.0),
            ("ETH/USDT", 2_000.0),
            ("SOL/USDT", 100.0),
            ("BNB/USDT", 300.0),
        ] {
            let swap = spot * (1.0 + mock_config.basis_premium);
            client = client.with_market(pair, MockMarket::new(spot, swap, mock_config.funding_rate));
        }

        client
    }

    pub fn with_market(mut self, pair: &str, market: MockMarket) -> Self {
        self.markets.insert(Self::key(pair), market);
        self
    }

    /// 해당 페어의 모든 조회를 실패시킴
    pub fn with_failing_pair(mut self, pair: &str) -> Self {
        self.failing_pairs.insert(Self::key(pair));
        self
    }

    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = Some(balance);
        self
    }

    /// 잔고 조회 실패 시뮬레이션
    pub fn with_failing_balance(mut self) -> Self {
        self.balance = None;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn ticker_calls(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }

    pub fn funding_calls(&self) -> usize {
        self.funding_calls.load(Ordering::SeqCst)
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    fn key(pair: &str) -> String {
        match split_pair(pair) {
            Some((base, quote)) => format!("{}/{}", base, quote).to_uppercase(),
            None => pair.trim().to_uppercase(),
        }
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            sleep(Duration::from_millis(self.latency_ms)).await;
        }
    }

    fn market(&self, pair: &str) -> Option<&MockMarket> {
        let key = Self::key(pair);
        if self.failing_pairs.contains(&key) {
            return None;
        }
        self.markets.get(&key)
    }
}

#[async_trait]
impl ExchangeClient for MockExchangeClient {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn get_ticker(&self, symbol: &str, market: MarketType) -> Option<f64> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let price = self.market(symbol).and_then(|m| match market {
            MarketType::Spot => m.spot_price,
            MarketType::Future => m.swap_price,
        });

        match price {
            Some(price) => debug!("🎭 Mock 시세: {} ({}) = {}", symbol, market, price),
            None => error!("🎭 Mock 시세 조회 실패: {} ({})", symbol, market),
        }
        price
    }

    async fn get_funding_rate(&self, symbol: &str) -> Option<f64> {
        self.funding_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let rate = self.market(symbol).and_then(|m| m.funding_rate);
        if rate.is_none() {
            error!("🎭 Mock 펀딩비 조회 실패: {}", symbol);
        }
        rate
    }

    async fn get_balance(&self) -> f64 {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        match self.balance {
            Some(balance) => balance,
            None => {
                error!("🎭 Mock 잔고 조회 실패");
                0.0
            }
        }
    }
}
