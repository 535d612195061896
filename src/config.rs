use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::exchange::client::ExchangeKind;
use crate::types::Credentials;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub exchange: ExchangeConfig,
    pub strategy: ArbitrageConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub name: String, // binance | okx | mock
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>, // okx 전용
    #[serde(default)]
    pub is_test: bool, // 테스트넷/데모 트레이딩 사용 여부
    #[serde(default = "default_rate_limit_per_second")]
    pub rate_limit_per_second: u32, // 초당 최대 요청 수
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>, // 현물(또는 단일) 엔드포인트 재정의
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub futures_base_url: Option<String>, // 선물 엔드포인트 재정의 (binance)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageConfig {
    pub funding_threshold: f64, // 최소 펀딩비 (0.0001 = 0.01%)
    pub spread_threshold: f64, // 최소 베이시스 (0.003 = 0.3%)
    pub check_interval: u64, // 스윕 간 대기 시간 (초)
    pub trading_pairs: Vec<String>, // 모니터링할 페어 (순서 유지)
    pub max_position_size: f64, // 최대 포지션 크기 (결제 자산 기준)
    #[serde(default = "default_max_concurrent_pairs")]
    pub max_concurrent_pairs: usize, // 동시에 조회할 페어 수
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
}

fn default_rate_limit_per_second() -> u32 {
    10
}

fn default_max_concurrent_pairs() -> usize {
    1
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl ExchangeConfig {
    /// 클라이언트가 소유할 자격 증명 생성
    pub fn credentials(&self) -> Credentials {
        let credentials = Credentials::new(self.api_key.clone(), self.api_secret.clone())
            .testnet(self.is_test);
        match &self.passphrase {
            Some(passphrase) => credentials.with_passphrase(passphrase.clone()),
            None => credentials,
        }
    }

    pub fn kind(&self) -> Result<ExchangeKind> {
        self.name.parse()
    }
}

impl std::fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("name", &self.name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .field("is_test", &self.is_test)
            .field("rate_limit_per_second", &self.rate_limit_per_second)
            .field("base_url", &self.base_url)
            .field("futures_base_url", &self.futures_base_url)
            .finish()
    }
}

impl ArbitrageConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        Self::load_with_overrides(path, |name| env::var(name).ok()).await
    }

    /// 자격 증명 덮어쓰기 값을 `lookup` 에서 읽음 (`load` 는 환경 변수 사용)
    pub async fn load_with_overrides<F>(path: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_overrides(lookup);
        Ok(config)
    }

    pub fn default() -> Self {
        Self {
            exchange: ExchangeConfig {
                name: "binance".to_string(),
                api_key: String::new(),
                api_secret: String::new(),
                passphrase: None,
                is_test: false,
                rate_limit_per_second: default_rate_limit_per_second(),
                base_url: None,
                futures_base_url: None,
            },
            strategy: ArbitrageConfig {
                funding_threshold: 0.0001,
                spread_threshold: 0.003,
                check_interval: 60,
                trading_pairs: vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()],
                max_position_size: 1000.0,
                max_concurrent_pairs: default_max_concurrent_pairs(),
            },
            monitoring: MonitoringConfig::default(),
        }
    }

    pub async fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// 비어 있지 않은 값만 적용 (빈 값은 TOML 설정을 유지, `.env` 포함)
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(api_key) = value("EXCHANGE_API_KEY") {
            debug!("EXCHANGE_API_KEY 환경 변수 적용");
            self.exchange.api_key = api_key;
        }
        if let Some(api_secret) = value("EXCHANGE_API_SECRET") {
            debug!("EXCHANGE_API_SECRET 환경 변수 적용");
            self.exchange.api_secret = api_secret;
        }
        if let Some(passphrase) = value("EXCHANGE_PASSPHRASE") {
            debug!("EXCHANGE_PASSPHRASE 환경 변수 적용");
            self.exchange.passphrase = Some(passphrase);
        }
    }

    pub fn validate(&self) -> Result<()> {
        // Validate exchange configuration
        let kind = self.exchange.kind()?;

        if kind.requires_credentials()
            && (self.exchange.api_key.is_empty() || self.exchange.api_secret.is_empty())
        {
            return Err(anyhow!("API key and secret must be configured for {}", kind));
        }

        if kind.requires_passphrase()
            && self.exchange.passphrase.as_deref().map_or(true, str::is_empty)
        {
            return Err(anyhow!("{} requires an API passphrase", kind));
        }

        if self.exchange.rate_limit_per_second == 0 {
            return Err(anyhow!("Rate limit must be greater than 0"));
        }

        // Validate strategy configuration
        if self.strategy.trading_pairs.is_empty() {
            return Err(anyhow!("At least one trading pair must be configured"));
        }

        if self.strategy.max_position_size <= 0.0 {
            return Err(anyhow!("Max position size must be positive"));
        }

        if self.strategy.max_concurrent_pairs == 0 {
            return Err(anyhow!("Max concurrent pairs must be greater than 0"));
        }

        if !self.strategy.funding_threshold.is_finite() || !self.strategy.spread_threshold.is_finite() {
            return Err(anyhow!("Thresholds must be finite numbers"));
        }

        if self.strategy.check_interval == 0 {
            warn!("check_interval is 0, sweeps will run back to back");
        }

        Ok(())
    }

    #[cfg(test)]
    pub fn load_test_config() -> Self {
        let mut config = Self::default();

        // Test-friendly settings
        config.exchange.name = "mock".to_string();
        config.exchange.is_test = true;
        config.strategy.check_interval = 0;
        config.strategy.trading_pairs = vec!["BTC/USDT".to_string()];

        config
    }
}

/// `.env` 파일 로드. 파일이 없으면 `Ok(None)`
///
/// 로거 초기화 전에 호출되므로 결과 로그는 호출자가 남깁니다.
pub fn load_environment_variables() -> Result<Option<PathBuf>> {
    env_file_outcome(dotenvy::dotenv())
}

fn env_file_outcome(result: dotenvy::Result<PathBuf>) -> Result<Option<PathBuf>> {
    match result {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(anyhow!(".env 파일 로드 실패: {}", e)),
    }
}
