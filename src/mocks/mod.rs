pub mod exchange_clients;

pub use exchange_clients::{MockExchangeClient, MockMarket};

use std::env;

/// Check if mock mode is enabled
pub fn is_mock_mode() -> bool {
    env::var("API_MODE").unwrap_or_default() == "mock"
}

/// Get mock configuration values
pub fn get_mock_config() -> MockConfig {
    MockConfig {
        basis_premium: env::var("MOCK_BASIS_PREMIUM")
            .unwrap_or_else(|_| "0.005".to_string())
            .parse()
            .unwrap_or(0.005),
        funding_rate: env::var("MOCK_FUNDING_RATE")
            .unwrap_or_else(|_| "0.0002".to_string())
            .parse()
            .unwrap_or(0.0002),
        balance: env::var("MOCK_BALANCE")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .unwrap_or(10_000.0),
        exchange_latency_ms: env::var("MOCK_EXCHANGE_LATENCY_MS")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .unwrap_or(0),
    }
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// 무기한 계약 가격의 현물 대비 프리미엄 (0.005 = 0.5%)
    pub basis_premium: f64,
    pub funding_rate: f64,
    pub balance: f64,
    pub exchange_latency_ms: u64,
}
