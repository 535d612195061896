// Funding-rate arbitrage monitor library

pub mod config;
pub mod types;
pub mod exchange;
pub mod strategies;
pub mod mocks;

// Re-exports for convenience
pub use config::Config;
pub use exchange::{ExchangeClient, ExchangeClientFactory, ExchangeKind};
pub use strategies::funding_arbitrage::{
    ArbitrageDetector, ArbitrageOpportunity, FundingArbitrageManager, MarketSnapshot,
    PollingScheduler,
};
pub use types::{Credentials, ExchangeError, ExchangeResult, MarketType};
