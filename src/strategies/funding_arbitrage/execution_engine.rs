//! 헤지 실행 엔진
//!
//! 기회가 발견되면 포지션 크기를 계산하고 실행 포트로 전달합니다.
//! 기본 포트는 주문을 내지 않고 로그만 남깁니다.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::exchange::ExchangeClient;
use super::position_sizer::PositionSizer;
use super::types::{ArbitrageOpportunity, OrderResult};

/// 헤지 주문 실행 포트 (숏 무기한 + 롱 현물)
#[async_trait]
pub trait ExecutionPort: Send + Sync {
    async fn place_hedge(&self, pair: &str, size: f64) -> Result<OrderResult>;
}

/// 로그만 남기는 실행 포트
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingExecutionStub;

#[async_trait]
impl ExecutionPort for LoggingExecutionStub {
    async fn place_hedge(&self, pair: &str, size: f64) -> Result<OrderResult> {
        info!("📝 [시뮬레이션] {} 헤지 주문 생략 - 숏 무기한 / 롱 현물, 크기 {}", pair, size);
        Ok(OrderResult::Simulated {
            pair: pair.to_string(),
            size,
        })
    }
}

/// 실행 엔진
pub struct ExecutionEngine {
    sizer: Arc<dyn PositionSizer>,
    port: Arc<dyn ExecutionPort>,
    max_position_size: f64,
}

impl ExecutionEngine {
    pub fn new(
        sizer: Arc<dyn PositionSizer>,
        port: Arc<dyn ExecutionPort>,
        max_position_size: f64,
    ) -> Self {
        Self {
            sizer,
            port,
            max_position_size,
        }
    }

    /// 포지션 크기 계산 → 권장 크기 로그 → 실행 포트 호출
    pub async fn execute(
        &self,
        client: &dyn ExchangeClient,
        opportunity: &ArbitrageOpportunity,
    ) -> Result<OrderResult> {
        let size = self
            .sizer
            .calculate_position_size(client, &opportunity.pair, self.max_position_size)
            .await?;

        info!(
            "⚡ {} 권장 포지션 크기: {} (펀딩비 {:.4}%, 스프레드 {:.4}%)",
            opportunity.pair,
            size,
            opportunity.funding_rate * 100.0,
            opportunity.price_diff_percent * 100.0
        );

        self.port.place_hedge(&opportunity.pair, size).await
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("max_position_size", &self.max_position_size)
            .finish_non_exhaustive()
    }
}
