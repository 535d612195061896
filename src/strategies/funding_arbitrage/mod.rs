//! 펀딩비 아비트리지 전략 모듈
//!
//! 단일 거래소의 현물과 무기한 계약을 비교하여
//! 펀딩비/베이시스 아비트리지 기회를 탐지하는 전략을 포함합니다.

pub mod types;
pub mod price_monitor;
pub mod opportunity_detector;
pub mod position_sizer;
pub mod execution_engine;
pub mod scheduler;
pub mod manager;

// Re-export main types and structs
pub use types::*;
pub use price_monitor::MarketSnapshotReader;
pub use opportunity_detector::{classify, detect, ArbitrageDetector};
pub use position_sizer::{BalanceCappedSizer, PositionSizer};
pub use execution_engine::{ExecutionEngine, ExecutionPort, LoggingExecutionStub};
pub use scheduler::{LoopState, PollingScheduler};
pub use manager::FundingArbitrageManager;
