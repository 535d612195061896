use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::exchange::ExchangeClient;

/// 포지션 크기 계산기
#[async_trait]
pub trait PositionSizer: Send + Sync {
    async fn calculate_position_size(
        &self,
        client: &dyn ExchangeClient,
        pair: &str,
        max_position_size: f64,
    ) -> Result<f64>;
}

/// 가용 잔고의 일정 비율과 최대 포지션 크기 중 작은 값
#[derive(Debug, Clone, Copy)]
pub struct BalanceCappedSizer {
    balance_fraction: f64,
}

impl BalanceCappedSizer {
    /// 헤지는 현물과 무기한 양쪽에 증거금이 필요하므로 기본값은 잔고의 절반
    pub const DEFAULT_BALANCE_FRACTION: f64 = 0.5;

    pub fn new(balance_fraction: f64) -> Result<Self> {
        if !(balance_fraction > 0.0 && balance_fraction <= 1.0) {
            return Err(anyhow!("Balance fraction must be in (0, 1], got {}", balance_fraction));
        }
        Ok(Self { balance_fraction })
    }
}

impl Default for BalanceCappedSizer {
    fn default() -> Self {
        Self {
            balance_fraction: Self::DEFAULT_BALANCE_FRACTION,
        }
    }
}

#[async_trait]
impl PositionSizer for BalanceCappedSizer {
    async fn calculate_position_size(
        &self,
        client: &dyn ExchangeClient,
        pair: &str,
        max_position_size: f64,
    ) -> Result<f64> {
        let balance = client.get_balance().await;
        let size = (balance * self.balance_fraction).min(max_position_size).max(0.0);

        debug!(
            "💰 {} 포지션 크기: {} (잔고 {}, 최대 {})",
            pair, size, balance, max_position_size
        );

        Ok(size)
    }
}
