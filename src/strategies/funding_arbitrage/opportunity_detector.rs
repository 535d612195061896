//! 펀딩비 아비트리지 기회 탐지
//!
//! 펀딩비가 임계값을 넘고 무기한 계약이 현물 대비 충분한 프리미엄에
//! 거래될 때만 기회로 판단합니다. 양(+)의 펀딩비 방향만 다룹니다.

use tracing::{info, warn};

use crate::config::ArbitrageConfig;
use super::types::{ArbitrageOpportunity, DetectionVerdict, MarketSnapshot};

/// 스냅샷 분류 (순수 함수, 패닉 없음)
pub fn classify(
    snapshot: &MarketSnapshot,
    funding_threshold: f64,
    spread_threshold: f64,
) -> DetectionVerdict {
    // 현물가 0, 비유한 값은 누락으로 취급
    let usable = MarketSnapshot::new(
        snapshot.pair.as_str(),
        snapshot.spot_price.filter(|p| p.is_finite() && *p != 0.0),
        snapshot.swap_price.filter(|p| p.is_finite()),
        snapshot.funding_rate.filter(|r| r.is_finite()),
    );

    let (spot, swap, funding_rate) = match (usable.spot_price, usable.swap_price, usable.funding_rate) {
        (Some(spot), Some(swap), Some(funding_rate)) => (spot, swap, funding_rate),
        _ => {
            return DetectionVerdict::Incomplete {
                missing: usable.missing_fields(),
            }
        }
    };

    if funding_rate <= funding_threshold {
        return DetectionVerdict::FundingBelowThreshold { funding_rate };
    }

    let price_diff = swap - spot;
    let price_diff_percent = price_diff / spot;

    if price_diff_percent > spread_threshold {
        DetectionVerdict::Opportunity(ArbitrageOpportunity {
            pair: snapshot.pair.clone(),
            funding_rate,
            price_diff_percent,
        })
    } else {
        DetectionVerdict::SpreadBelowThreshold {
            funding_rate,
            price_diff_percent,
        }
    }
}

pub fn detect(
    snapshot: &MarketSnapshot,
    funding_threshold: f64,
    spread_threshold: f64,
) -> Option<ArbitrageOpportunity> {
    classify(snapshot, funding_threshold, spread_threshold).into_opportunity()
}

/// 임계값을 보유한 탐지기
#[derive(Debug, Clone, Copy)]
pub struct ArbitrageDetector {
    funding_threshold: f64,
    spread_threshold: f64,
}

impl ArbitrageDetector {
    pub fn new(funding_threshold: f64, spread_threshold: f64) -> Self {
        Self {
            funding_threshold,
            spread_threshold,
        }
    }

    pub fn from_config(config: &ArbitrageConfig) -> Self {
        Self::new(config.funding_threshold, config.spread_threshold)
    }

    pub fn funding_threshold(&self) -> f64 {
        self.funding_threshold
    }

    pub fn spread_threshold(&self) -> f64 {
        self.spread_threshold
    }

    pub fn classify(&self, snapshot: &MarketSnapshot) -> DetectionVerdict {
        classify(snapshot, self.funding_threshold, self.spread_threshold)
    }

    /// 분류 후 상태 로그를 남기고 기회만 반환
    pub fn evaluate(&self, snapshot: &MarketSnapshot) -> Option<ArbitrageOpportunity> {
        let verdict = self.classify(snapshot);

        match &verdict {
            DetectionVerdict::Incomplete { missing } => {
                warn!("⚠️ {} 데이터 불완전 - 누락: {}", snapshot.pair, missing.join(", "));
            }
            DetectionVerdict::FundingBelowThreshold { funding_rate } => {
                info!(
                    "📈 {} spot={} swap={} 펀딩비 {:.4}% (임계값 {:.4}%) - 기회 없음",
                    snapshot.pair,
                    format_price(snapshot.spot_price),
                    format_price(snapshot.swap_price),
                    funding_rate * 100.0,
                    self.funding_threshold * 100.0
                );
            }
            DetectionVerdict::SpreadBelowThreshold { funding_rate, price_diff_percent } => {
                info!(
                    "📈 {} spot={} swap={} 펀딩비 {:.4}% 스프레드 {:.4}% (임계값 {:.4}%) - 기회 없음",
                    snapshot.pair,
                    format_price(snapshot.spot_price),
                    format_price(snapshot.swap_price),
                    funding_rate * 100.0,
                    price_diff_percent * 100.0,
                    self.spread_threshold * 100.0
                );
            }
            DetectionVerdict::Opportunity(opportunity) => {
                info!(
                    "🎯 {} 아비트리지 기회 발견! 펀딩비 {:.4}% 스프레드 {:.4}% (임계값 {:.4}%)",
                    opportunity.pair,
                    opportunity.funding_rate * 100.0,
                    opportunity.price_diff_percent * 100.0,
                    self.spread_threshold * 100.0
                );
            }
        }

        verdict.into_opportunity()
    }
}

fn format_price(price: Option<f64>) -> String {
    price.map_or_else(|| "-".to_string(), |p| p.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(spot: Option<f64>, swap: Option<f64>, funding: Option<f64>) -> MarketSnapshot {
        MarketSnapshot::new("BTC/USDT", spot, swap, funding)
    }

    #[test]
    fn test_opportunity_fires_above_both_thresholds() {
        let opportunity = detect(&snapshot(Some(100.0), Some(100.5), Some(0.0002)), 0.0001, 0.003)
            .expect("opportunity");
        assert_eq!(opportunity.pair, "BTC/USDT");
        assert_eq!(opportunity.funding_rate, 0.0002);
        assert!((opportunity.price_diff_percent - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_funding_gate_blocks_wide_spread() {
        let verdict = classify(&snapshot(Some(100.0), Some(100.5), Some(0.0002)), 0.0003, 0.003);
        assert_eq!(verdict, DetectionVerdict::FundingBelowThreshold { funding_rate: 0.0002 });
    }

    #[test]
    fn test_funding_equal_to_threshold_is_not_enough() {
        assert!(detect(&snapshot(Some(100.0), Some(105.0), Some(0.0001)), 0.0001, 0.003).is_none());
    }

    #[test]
    fn test_missing_spot_yields_nothing() {
        let verdict = classify(&snapshot(None, Some(100.5), Some(0.0002)), 0.0001, 0.003);
        assert_eq!(verdict, DetectionVerdict::Incomplete { missing: vec!["spot_price"] });
    }

    #[test]
    fn test_any_absent_field_yields_nothing() {
        assert!(detect(&snapshot(Some(100.0), None, Some(0.0002)), 0.0001, 0.003).is_none());
        assert!(detect(&snapshot(Some(100.0), Some(100.5), None), 0.0001, 0.003).is_none());
        assert!(detect(&snapshot(None, None, None), 0.0001, 0.003).is_none());
    }

    #[test]
    fn test_degenerate_prices_are_treated_as_absent() {
        assert_eq!(
            classify(&snapshot(Some(0.0), Some(100.5), Some(0.0002)), 0.0001, 0.003),
            DetectionVerdict::Incomplete { missing: vec!["spot_price"] }
        );
        assert_eq!(
            classify(&snapshot(Some(100.0), Some(f64::NAN), Some(0.0002)), 0.0001, 0.003),
            DetectionVerdict::Incomplete { missing: vec!["swap_price"] }
        );
        assert_eq!(
            classify(&snapshot(Some(f64::NAN), Some(100.5), Some(f64::INFINITY)), 0.0001, 0.003),
            DetectionVerdict::Incomplete { missing: vec!["spot_price", "funding_rate"] }
        );
    }

    #[test]
    fn test_negative_prices_follow_the_relative_basis() {
        let opportunity = detect(&snapshot(Some(-100.0), Some(-101.0), Some(0.0002)), 0.0001, 0.003)
            .expect("opportunity");
        assert!((opportunity.price_diff_percent - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_spread_equal_to_threshold_is_not_enough() {
        // 0.5 / 100 is exactly 0.005 in f64
        let verdict = classify(&snapshot(Some(100.0), Some(100.5), Some(0.0002)), 0.0001, 0.005);
        assert_eq!(
            verdict,
            DetectionVerdict::SpreadBelowThreshold {
                funding_rate: 0.0002,
                price_diff_percent: 0.005
            }
        );
    }

    #[test]
    fn test_spread_gate() {
        // 0.2% premium under a 0.3% threshold
        let verdict = classify(&snapshot(Some(100.0), Some(100.2), Some(0.0005)), 0.0001, 0.003);
        match verdict {
            DetectionVerdict::SpreadBelowThreshold { price_diff_percent, .. } => {
                assert!((price_diff_percent - 0.002).abs() < 1e-12);
            }
            other => panic!("unexpected verdict: {:?}", other),
        }

        // perpetual below spot is never an opportunity
        assert!(detect(&snapshot(Some(100.0), Some(99.0), Some(0.0005)), 0.0001, 0.003).is_none());
    }

    #[test]
    fn test_spread_equals_relative_basis() {
        let cases = [(2000.0, 2012.0), (50_000.0, 50_400.0), (1.25, 1.3)];
        for (spot, swap) in cases {
            let opportunity = detect(&snapshot(Some(spot), Some(swap), Some(0.001)), 0.0001, 0.003)
                .expect("opportunity");
            assert!((opportunity.price_diff_percent - (swap - spot) / spot).abs() < 1e-12);
        }
    }

    #[test]
    fn test_detector_uses_config_thresholds() {
        let mut config = crate::config::Config::default().strategy;
        config.funding_threshold = 0.0003;
        let detector = ArbitrageDetector::from_config(&config);
        assert_eq!(detector.funding_threshold(), 0.0003);
        assert_eq!(detector.spread_threshold(), 0.003);
        assert!(detector.evaluate(&snapshot(Some(100.0), Some(100.5), Some(0.0002))).is_none());
        assert!(detector.evaluate(&snapshot(Some(100.0), Some(100.5), Some(0.0004))).is_some());
    }
}
