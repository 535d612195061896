//! 펀딩비 아비트리지 통합 관리자
//!
//! 설정에서 거래소 클라이언트, 실행 엔진, 스케줄러를 조립합니다.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::exchange::{ExchangeClient, ExchangeClientFactory};
use super::execution_engine::{ExecutionEngine, LoggingExecutionStub};
use super::position_sizer::BalanceCappedSizer;
use super::scheduler::PollingScheduler;
use super::types::{CycleReport, SchedulerStats};

/// 펀딩비 아비트리지 통합 관리자
#[derive(Debug)]
pub struct FundingArbitrageManager {
    client: Arc<dyn ExchangeClient>,
    scheduler: PollingScheduler,
}

impl FundingArbitrageManager {
    /// 설정의 거래소 이름으로 클라이언트 생성 후 조립
    pub fn new(config: &Config) -> Result<Self> {
        info!("🎼 펀딩비 아비트리지 관리자 초기화 중...");

        let client = ExchangeClientFactory::create(&config.exchange)?;
        let manager = Self::with_client(client, config);

        info!("✅ 펀딩비 아비트리지 관리자 초기화 완료 - 거래소: {}", manager.client.name());
        Ok(manager)
    }

    pub fn with_client(client: Arc<dyn ExchangeClient>, config: &Config) -> Self {
        let engine = ExecutionEngine::new(
            Arc::new(BalanceCappedSizer::default()),
            Arc::new(LoggingExecutionStub),
            config.strategy.max_position_size,
        );
        let scheduler = PollingScheduler::new(Arc::clone(&client), &config.strategy, engine);

        Self { client, scheduler }
    }

    pub fn client(&self) -> &Arc<dyn ExchangeClient> {
        &self.client
    }

    pub async fn run_once(&self) -> CycleReport {
        self.scheduler.sweep().await
    }

    pub async fn run(&self) -> Result<()> {
        self.scheduler.run().await
    }

    pub async fn stats(&self) -> SchedulerStats {
        self.scheduler.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manager_from_mock_config() {
        let mut config = Config::load_test_config();
        config.strategy.trading_pairs = vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()];

        let manager = FundingArbitrageManager::new(&config).unwrap();
        assert_eq!(manager.client().name(), "Mock");

        let report = manager.run_once().await;
        assert_eq!(report.pairs_checked(), 2);
        assert_eq!(manager.stats().await.cycles_completed, 1);
    }

    #[test]
    fn test_manager_rejects_unknown_exchange() {
        let mut config = Config::load_test_config();
        config.exchange.name = "kraken".to_string();
        assert!(FundingArbitrageManager::new(&config).is_err());
    }
}
