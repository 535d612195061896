use anyhow::{Context, Result};
use clap::{Arg, Command};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use funding_arb_monitor::config::{load_environment_variables, Config, DEFAULT_CONFIG_PATH};
use funding_arb_monitor::mocks::is_mock_mode;
use funding_arb_monitor::FundingArbitrageManager;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("funding-monitor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("📈 펀딩비/베이시스 아비트리지 모니터")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("설정 파일 경로")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("로그 레벨 (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("testnet")
                .long("testnet")
                .help("테스트넷/데모 트레이딩 사용")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("한 번만 스윕하고 종료")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("exchange")
                .short('e')
                .long("exchange")
                .value_name("NAME")
                .help("거래소 재정의 (binance, okx, mock)"),
        )
        .get_matches();

    // 환경 변수에서 민감한 정보 로드 (로그는 초기화 후에 남김)
    let env_file = load_environment_variables();

    // 설정 파일 로드
    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);
    let mut config = Config::load(config_path)
        .await
        .with_context(|| format!("설정 파일 로드 실패: {}", config_path))?;

    // 로그 레벨 설정
    let log_filter = match matches.get_one::<String>("log-level") {
        Some(level) => level.clone(),
        None => config.monitoring.log_level.clone(),
    };

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 환영 메시지
    print_banner();
    match env_file {
        Ok(Some(path)) => info!("🔑 .env 파일 로드: {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("⚠️ {}", e),
    }
    info!("📋 설정 파일 로드 완료: {}", config_path);

    // 명령줄 옵션 적용
    if let Some(exchange) = matches.get_one::<String>("exchange") {
        info!("🏦 거래소 재정의: {}", exchange);
        config.exchange.name = exchange.clone();
    }

    if is_mock_mode() {
        warn!("🎭 API_MODE=mock - Mock 거래소 사용");
        config.exchange.name = "mock".to_string();
    }

    if matches.get_flag("testnet") {
        warn!("🧪 테스트넷 모드 활성화");
        config.exchange.is_test = true;
    }

    // 설정 검증
    if let Err(e) = config.validate() {
        error!("❌ 설정 검증 실패: {}", e);
        std::process::exit(1);
    }

    info!("✅ 설정 로드 완료");
    info!(
        "  🏦 거래소: {} (testnet: {})",
        config.exchange.name, config.exchange.is_test
    );
    info!("  🪙 페어: {}", config.strategy.trading_pairs.join(", "));
    info!(
        "  🎚️ 임계값: 펀딩비 {:.4}%, 스프레드 {:.4}%",
        config.strategy.funding_threshold * 100.0,
        config.strategy.spread_threshold * 100.0
    );

    let manager = FundingArbitrageManager::new(&config).context("관리자 초기화 실패")?;

    if matches.get_flag("once") {
        let report = manager.run_once().await;
        info!(
            "🏁 단일 스윕 완료: {}개 기회, {}개 실패",
            report.opportunities().len(),
            report.failures()
        );
        return Ok(());
    }

    tokio::select! {
        result = manager.run() => {
            if let Err(e) = result {
                error!("❌ 모니터링 루프 종료: {}", e);
                return Err(e);
            }
        }
        signal = signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    warn!("🛑 종료 신호 수신됨, 종료 중...");
                    let stats = manager.stats().await;
                    info!(
                        "📊 사이클 {}회, 검사 {}건, 기회 {}건, 실패 {}건",
                        stats.cycles_completed,
                        stats.pairs_checked,
                        stats.opportunities_found,
                        stats.pair_failures
                    );
                }
                Err(err) => {
                    error!("❌ 신호 처리 오류: {}", err);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn print_banner() {
    println!(r#"
    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║  📈 Funding-Rate Arbitrage Monitor                           ║
    ║                                                              ║
    ║  현물 vs 무기한 계약 베이시스 + 펀딩비 모니터링               ║
    ║     • Binance (spot + USDⓈ-M futures)                        ║
    ║     • OKX (spot + SWAP)                                      ║
    ║                                                              ║
    ║  🛡️ 주문은 실행하지 않습니다 (시뮬레이션 전용)               ║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝
    "#);
}
