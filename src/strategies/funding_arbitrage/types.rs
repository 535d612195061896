use std::fmt;

use serde::{Deserialize, Serialize};

/// 한 페어의 시장 스냅샷
///
/// 각 필드는 조회 실패 시 `None`이며 0으로 대체되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub pair: String,
    pub spot_price: Option<f64>,
    pub swap_price: Option<f64>,
    pub funding_rate: Option<f64>,
}

impl MarketSnapshot {
    pub fn new(
        pair: impl Into<String>,
        spot_price: Option<f64>,
        swap_price: Option<f64>,
        funding_rate: Option<f64>,
    ) -> Self {
        Self {
            pair: pair.into(),
            spot_price,
            swap_price,
            funding_rate,
        }
    }

    /// 누락된 필드 이름 목록 (로그용)
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.spot_price.is_none() {
            missing.push("spot_price");
        }
        if self.swap_price.is_none() {
            missing.push("swap_price");
        }
        if self.funding_rate.is_none() {
            missing.push("funding_rate");
        }
        missing
    }
}

/// 펀딩비 아비트리지 기회 (숏 무기한 / 롱 현물)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub pair: String,
    pub funding_rate: f64,
    /// (swap - spot) / spot, 소수 표기 (0.005 = 0.5%)
    pub price_diff_percent: f64,
}

impl fmt::Display for ArbitrageOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} funding {:.4}% spread {:.4}%",
            self.pair,
            self.funding_rate * 100.0,
            self.price_diff_percent * 100.0
        )
    }
}

/// 탐지 결과
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionVerdict {
    /// 필요한 값 중 하나 이상이 없음
    Incomplete { missing: Vec<&'static str> },
    FundingBelowThreshold { funding_rate: f64 },
    SpreadBelowThreshold { funding_rate: f64, price_diff_percent: f64 },
    Opportunity(ArbitrageOpportunity),
}

impl DetectionVerdict {
    pub fn into_opportunity(self) -> Option<ArbitrageOpportunity> {
        match self {
            DetectionVerdict::Opportunity(opportunity) => Some(opportunity),
            _ => None,
        }
    }
}

/// 실행 포트 결과
#[derive(Debug, Clone, PartialEq)]
pub enum OrderResult {
    /// 주문 없이 기록만 남긴 결과
    Simulated { pair: String, size: f64 },
}

/// 스윕 한 번의 페어별 결과
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    NoOpportunity,
    Opportunity { opportunity: ArbitrageOpportunity, executed: bool },
    Failed { reason: String },
}

/// 스윕 한 번의 결과 요약
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub outcomes: Vec<(String, PairOutcome)>,
}

impl CycleReport {
    pub fn pairs_checked(&self) -> usize {
        self.outcomes.len()
    }

    pub fn opportunities(&self) -> Vec<&ArbitrageOpportunity> {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| match outcome {
                PairOutcome::Opportunity { opportunity, .. } => Some(opportunity),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, PairOutcome::Failed { .. }))
            .count()
    }
}

/// 누적 스케줄러 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerStats {
    pub cycles_completed: u64,
    pub pairs_checked: u64,
    pub opportunities_found: u64,
    pub executions_attempted: u64,
    pub execution_failures: u64,
    pub pair_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_missing_fields() {
        let snapshot = MarketSnapshot::new("BTC/USDT", None, Some(100.5), Some(0.0002));
        assert_eq!(snapshot.missing_fields(), vec!["spot_price"]);

        let snapshot = MarketSnapshot::new("BTC/USDT", Some(100.0), Some(100.5), Some(0.0002));
        assert!(snapshot.missing_fields().is_empty());
    }

    #[test]
    fn test_cycle_report_counts() {
        let opportunity = ArbitrageOpportunity {
            pair: "BTC/USDT".to_string(),
            funding_rate: 0.0002,
            price_diff_percent: 0.005,
        };
        let report = CycleReport {
            cycle: 1,
            outcomes: vec![
                ("BTC/USDT".to_string(), PairOutcome::Opportunity { opportunity, executed: true }),
                ("ETH/USDT".to_string(), PairOutcome::NoOpportunity),
                ("SOL/USDT".to_string(), PairOutcome::Failed { reason: "boom".to_string() }),
            ],
        };

        assert_eq!(report.pairs_checked(), 3);
        assert_eq!(report.opportunities().len(), 1);
        assert_eq!(report.failures(), 1);
    }

    #[test]
    fn test_opportunity_display() {
        let opportunity = ArbitrageOpportunity {
            pair: "ETH/USDT".to_string(),
            funding_rate: 0.0002,
            price_diff_percent: 0.005,
        };
        assert_eq!(opportunity.to_string(), "ETH/USDT funding 0.0200% spread 0.5000%");
    }
}
