pub mod client;
pub mod signing;
pub mod binance_api;
pub mod binance;
pub mod okx;

pub use client::{ExchangeClient, ExchangeClientFactory, ExchangeKind};
pub use signing::{RequestSigner, SignedHeaderNames, SignedRestTransport};
pub use binance_api::{BinanceApi, BinanceApiOptions};
pub use binance::BinanceClient;
pub use okx::OkxClient;
