//! 폴링 스케줄러
//!
//! `Running`(스윕) → `CoolingDown`(대기) 두 상태를 끝없이 반복합니다.
//! 페어 하나의 오류나 패닉은 해당 페어에서 잡혀 기록되고,
//! 스윕은 다음 페어로 계속 진행됩니다.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::ArbitrageConfig;
use crate::exchange::ExchangeClient;
use super::execution_engine::ExecutionEngine;
use super::opportunity_detector::ArbitrageDetector;
use super::price_monitor::MarketSnapshotReader;
use super::types::{CycleReport, PairOutcome, SchedulerStats};

/// 루프 상태 (종료 상태 없음)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    CoolingDown,
}

/// 펀딩비 아비트리지 폴링 스케줄러
pub struct PollingScheduler {
    reader: MarketSnapshotReader,
    detector: ArbitrageDetector,
    engine: ExecutionEngine,
    trading_pairs: Vec<String>,
    check_interval: Duration,
    max_concurrent_pairs: usize,

    state: RwLock<LoopState>,
    stats: RwLock<SchedulerStats>,
}

impl PollingScheduler {
    pub fn new(
        client: Arc<dyn ExchangeClient>,
        config: &ArbitrageConfig,
        engine: ExecutionEngine,
    ) -> Self {
        Self {
            reader: MarketSnapshotReader::new(client),
            detector: ArbitrageDetector::from_config(config),
            engine,
            trading_pairs: config.trading_pairs.clone(),
            check_interval: config.check_interval(),
            max_concurrent_pairs: config.max_concurrent_pairs.max(1),
            state: RwLock::new(LoopState::Running),
            stats: RwLock::new(SchedulerStats::default()),
        }
    }

    pub async fn state(&self) -> LoopState {
        *self.state.read().await
    }

    pub async fn stats(&self) -> SchedulerStats {
        self.stats.read().await.clone()
    }

    /// 모든 페어를 한 번씩 검사
    pub async fn sweep(&self) -> CycleReport {
        *self.state.write().await = LoopState::Running;
        let cycle = self.stats.read().await.cycles_completed + 1;

        let outcomes: Vec<(String, PairOutcome)> = stream::iter(self.trading_pairs.iter().cloned())
            .map(|pair| self.guarded_check(pair))
            .buffered(self.max_concurrent_pairs)
            .collect()
            .await;

        let report = CycleReport { cycle, outcomes };
        self.record(&report).await;

        info!(
            "🔁 사이클 #{} 완료: {}개 페어 검사, {}개 기회, {}개 실패",
            report.cycle,
            report.pairs_checked(),
            report.opportunities().len(),
            report.failures()
        );

        report
    }

    /// 대기 상태로 전환 후 `check_interval`만큼 대기
    pub async fn cool_down(&self) {
        *self.state.write().await = LoopState::CoolingDown;
        sleep(self.check_interval).await;
    }

    /// 정해진 횟수만큼 스윕 + 대기 반복
    pub async fn run_cycles(&self, cycles: u64) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        for _ in 0..cycles {
            reports.push(self.sweep().await);
            self.cool_down().await;
        }
        reports
    }

    /// 무한 루프 (프로세스 종료로만 멈춤)
    pub async fn run(&self) -> Result<()> {
        info!(
            "🚀 펀딩비 모니터링 시작 - {}개 페어, {}초 간격",
            self.trading_pairs.len(),
            self.check_interval.as_secs()
        );

        loop {
            self.sweep().await;
            self.cool_down().await;
        }
    }

    /// 페어별 오류 경계: `Err`와 패닉 모두 여기서 멈춤
    async fn guarded_check(&self, pair: String) -> (String, PairOutcome) {
        let outcome = match AssertUnwindSafe(self.check_pair(&pair)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!("❌ {} 처리 실패: {:#}", pair, e);
                PairOutcome::Failed { reason: e.to_string() }
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!("💥 {} 처리 중 패닉: {}", pair, reason);
                PairOutcome::Failed { reason }
            }
        };
        (pair, outcome)
    }

    async fn check_pair(&self, pair: &str) -> Result<PairOutcome> {
        let snapshot = self.reader.read(pair).await;

        let opportunity = match self.detector.evaluate(&snapshot) {
            Some(opportunity) => opportunity,
            None => return Ok(PairOutcome::NoOpportunity),
        };

        let executed = match self.engine.execute(self.reader.client().as_ref(), &opportunity).await {
            Ok(result) => {
                info!("✅ {} 실행 결과: {:?}", pair, result);
                true
            }
            Err(e) => {
                warn!("⚠️ {} 실행 실패: {:#}", pair, e);
                false
            }
        };

        Ok(PairOutcome::Opportunity { opportunity, executed })
    }

    async fn record(&self, report: &CycleReport) {
        let mut stats = self.stats.write().await;
        stats.cycles_completed += 1;
        stats.pairs_checked += report.pairs_checked() as u64;
        stats.pair_failures += report.failures() as u64;

        for (_, outcome) in &report.outcomes {
            if let PairOutcome::Opportunity { executed, .. } = outcome {
                stats.opportunities_found += 1;
                stats.executions_attempted += 1;
                if !executed {
                    stats.execution_failures += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for PollingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingScheduler")
            .field("exchange", &self.reader.client().name())
            .field("trading_pairs", &self.trading_pairs)
            .field("check_interval", &self.check_interval)
            .field("max_concurrent_pairs", &self.max_concurrent_pairs)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::mocks::{MockExchangeClient, MockMarket};
    use crate::strategies::funding_arbitrage::execution_engine::{ExecutionPort, LoggingExecutionStub};
    use crate::strategies::funding_arbitrage::position_sizer::BalanceCappedSizer;
    use crate::strategies::funding_arbitrage::types::OrderResult;
    use crate::types::MarketType;

    fn strategy_config(pairs: &[&str]) -> ArbitrageConfig {
        ArbitrageConfig {
            funding_threshold: 0.0001,
            spread_threshold: 0.003,
            check_interval: 0,
            trading_pairs: pairs.iter().map(|p| p.to_string()).collect(),
            max_position_size: 1000.0,
            max_concurrent_pairs: 1,
        }
    }

    fn logging_engine(max_position_size: f64) -> ExecutionEngine {
        ExecutionEngine::new(
            Arc::new(BalanceCappedSizer::default()),
            Arc::new(LoggingExecutionStub),
            max_position_size,
        )
    }

    /// 특정 페어의 현물 시세 조회에서 패닉을 일으키는 클라이언트
    #[derive(Debug)]
    struct PanickingClient {
        inner: MockExchangeClient,
        panic_pair: &'static str,
    }

    #[async_trait]
    impl ExchangeClient for PanickingClient {
        fn name(&self) -> &str {
            "Panicking"
        }

        async fn get_ticker(&self, symbol: &str, market: MarketType) -> Option<f64> {
            if symbol == self.panic_pair {
                panic!("ticker decoder exploded for {}", symbol);
            }
            self.inner.get_ticker(symbol, market).await
        }

        async fn get_funding_rate(&self, symbol: &str) -> Option<f64> {
            self.inner.get_funding_rate(symbol).await
        }

        async fn get_balance(&self) -> f64 {
            self.inner.get_balance().await
        }
    }

    struct FailingPort;

    #[async_trait]
    impl ExecutionPort for FailingPort {
        async fn place_hedge(&self, _pair: &str, _size: f64) -> Result<OrderResult> {
            Err(anyhow::anyhow!("venue rejected order"))
        }
    }

    #[tokio::test]
    async fn test_sweep_finds_opportunity_and_executes() {
        let client = Arc::new(
            MockExchangeClient::new()
                .with_market("BTC/USDT", MockMarket::new(100.0, 100.5, 0.0002))
                .with_balance(10_000.0),
        );
        let scheduler = PollingScheduler::new(client.clone(), &strategy_config(&["BTC/USDT"]), logging_engine(1000.0));

        let report = scheduler.sweep().await;
        assert_eq!(report.cycle, 1);
        assert_eq!(report.opportunities().len(), 1);
        assert!(matches!(
            &report.outcomes[0].1,
            PairOutcome::Opportunity { executed: true, .. }
        ));
        // sizer read the balance once
        assert_eq!(client.balance_calls(), 1);
    }

    #[tokio::test]
    async fn test_funding_threshold_suppresses_opportunity() {
        let client = Arc::new(
            MockExchangeClient::new().with_market("BTC/USDT", MockMarket::new(100.0, 100.5, 0.0002)),
        );
        let mut config = strategy_config(&["BTC/USDT"]);
        config.funding_threshold = 0.0003;
        let scheduler = PollingScheduler::new(client.clone(), &config, logging_engine(1000.0));

        let report = scheduler.sweep().await;
        assert_eq!(report.outcomes[0].1, PairOutcome::NoOpportunity);
        assert_eq!(client.balance_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_spot_price_suppresses_opportunity() {
        let market = MockMarket {
            spot_price: None,
            swap_price: Some(100.5),
            funding_rate: Some(0.0002),
        };
        let client = Arc::new(MockExchangeClient::new().with_market("BTC/USDT", market));
        let scheduler = PollingScheduler::new(client, &strategy_config(&["BTC/USDT"]), logging_engine(1000.0));

        let report = scheduler.sweep().await;
        assert_eq!(report.outcomes[0].1, PairOutcome::NoOpportunity);
        assert_eq!(report.failures(), 0);
    }

    #[tokio::test]
    async fn test_panic_in_one_pair_does_not_stop_the_loop() {
        let inner = MockExchangeClient::new()
            .with_market("BTC/USDT", MockMarket::new(100.0, 100.5, 0.0002))
            .with_market("ETH/USDT", MockMarket::new(2000.0, 2012.0, 0.0005))
            .with_balance(10_000.0);
        let client = Arc::new(PanickingClient {
            inner,
            panic_pair: "BTC/USDT",
        });
        let scheduler = PollingScheduler::new(
            client,
            &strategy_config(&["BTC/USDT", "ETH/USDT"]),
            logging_engine(1000.0),
        );

        let reports = scheduler.run_cycles(3).await;
        assert_eq!(reports.len(), 3);

        for report in &reports {
            assert_eq!(report.outcomes[0].0, "BTC/USDT");
            match &report.outcomes[0].1 {
                PairOutcome::Failed { reason } => assert!(reason.contains("exploded")),
                other => panic!("unexpected outcome: {:?}", other),
            }
            assert_eq!(report.outcomes[1].0, "ETH/USDT");
            assert!(matches!(report.outcomes[1].1, PairOutcome::Opportunity { .. }));
        }

        let stats = scheduler.stats().await;
        assert_eq!(stats.cycles_completed, 3);
        assert_eq!(stats.pairs_checked, 6);
        assert_eq!(stats.pair_failures, 3);
        assert_eq!(stats.opportunities_found, 3);
        assert_eq!(scheduler.state().await, LoopState::CoolingDown);
    }

    #[tokio::test]
    async fn test_execution_failure_is_logged_and_loop_continues() {
        let client = Arc::new(
            MockExchangeClient::new()
                .with_market("BTC/USDT", MockMarket::new(100.0, 100.5, 0.0002))
                .with_balance(10_000.0),
        );
        let engine = ExecutionEngine::new(Arc::new(BalanceCappedSizer::default()), Arc::new(FailingPort), 1000.0);
        let scheduler = PollingScheduler::new(client, &strategy_config(&["BTC/USDT"]), engine);

        let reports = scheduler.run_cycles(2).await;
        for report in &reports {
            assert!(matches!(
                report.outcomes[0].1,
                PairOutcome::Opportunity { executed: false, .. }
            ));
        }

        let stats = scheduler.stats().await;
        assert_eq!(stats.executions_attempted, 2);
        assert_eq!(stats.execution_failures, 2);
        assert_eq!(stats.pair_failures, 0);
    }

    #[tokio::test]
    async fn test_concurrent_sweep_evaluates_every_pair_in_order() {
        let client = Arc::new(
            MockExchangeClient::new()
                .with_market("BTC/USDT", MockMarket::new(100.0, 100.5, 0.0002))
                .with_market("ETH/USDT", MockMarket::new(2000.0, 2001.0, 0.0002))
                .with_market("SOL/USDT", MockMarket::new(100.0, 101.0, 0.00005))
                .with_failing_pair("BNB/USDT")
                .with_balance(10_000.0)
                .with_latency_ms(5),
        );
        let mut config = strategy_config(&["BTC/USDT", "ETH/USDT", "SOL/USDT", "BNB/USDT"]);
        config.max_concurrent_pairs = 4;
        let scheduler = PollingScheduler::new(client.clone(), &config, logging_engine(1000.0));

        let report = scheduler.sweep().await;
        let pairs: Vec<&str> = report.outcomes.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(pairs, vec!["BTC/USDT", "ETH/USDT", "SOL/USDT", "BNB/USDT"]);
        assert_eq!(report.opportunities().len(), 1);
        assert_eq!(report.opportunities()[0].pair, "BTC/USDT");
        assert_eq!(client.ticker_calls(), 8);
        assert_eq!(client.funding_calls(), 4);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let client = Arc::new(MockExchangeClient::new());
        let scheduler = PollingScheduler::new(client, &strategy_config(&["BTC/USDT"]), logging_engine(1000.0));

        assert_eq!(scheduler.state().await, LoopState::Running);
        scheduler.cool_down().await;
        assert_eq!(scheduler.state().await, LoopState::CoolingDown);
        scheduler.sweep().await;
        assert_eq!(scheduler.state().await, LoopState::Running);
    }

    #[tokio::test]
    async fn test_run_cycles() {
        let client = Arc::new(MockExchangeClient::new());
        let scheduler = PollingScheduler::new(client, &strategy_config(&["BTC/USDT"]), logging_engine(1000.0));

        assert!(scheduler.run_cycles(0).await.is_empty());
        assert_eq!(scheduler.state().await, LoopState::Running);

        let reports = scheduler.run_cycles(2).await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].cycle, reports[0].cycle + 1);
        assert_eq!(scheduler.state().await, LoopState::CoolingDown);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
