pub mod funding_arbitrage;

pub use funding_arbitrage::FundingArbitrageManager;
