//! 시장 스냅샷 조회
//!
//! 한 페어에 대해 현물 시세, 무기한 시세, 펀딩비를 순서대로 조회합니다.
//! 하나가 실패해도 나머지 조회는 계속 진행됩니다.

use std::sync::Arc;

use tracing::debug;

use crate::exchange::ExchangeClient;
use crate::types::MarketType;
use super::types::MarketSnapshot;

/// 시장 스냅샷 리더
#[derive(Debug, Clone)]
pub struct MarketSnapshotReader {
    client: Arc<dyn ExchangeClient>,
}

impl MarketSnapshotReader {
    pub fn new(client: Arc<dyn ExchangeClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<dyn ExchangeClient> {
        &self.client
    }

    /// 세 값을 모두 모은 뒤 반환 (조기 종료 없음)
    pub async fn read(&self, pair: &str) -> MarketSnapshot {
        let spot_price = self.client.get_ticker(pair, MarketType::Spot).await;
        let swap_price = self.client.get_ticker(pair, MarketType::Future).await;
        let funding_rate = self.client.get_funding_rate(pair).await;

        debug!(
            "📊 {} {} 스냅샷: spot={:?} swap={:?} funding={:?}",
            self.client.name(),
            pair,
            spot_price,
            swap_price,
            funding_rate
        );

        MarketSnapshot::new(pair, spot_price, swap_price, funding_rate)
    }
}
