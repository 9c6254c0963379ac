//! Candle collector CLI.

use clap::Parser;
use harvest_core::{init_logging, normalize_level, parse_start_date, InstrumentRegistry, LogConfig, LogFormat};
use harvest_collector::{CandleFetcher, CandleStore, CollectorConfig, CollectorError, ImportDriver};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "harvest-collector")]
#[command(about = "Historical 1-minute candle collector", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite DB 파일 경로
    db_file: PathBuf,

    /// 로그 레벨 (DEBUG|INFO|WARNING|ERROR|CRITICAL)
    #[arg(short = 'l', long = "loglevel", default_value = "INFO")]
    loglevel: String,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long, env = "LOG_FORMAT", default_value = "compact")]
    log_format: LogFormat,

    /// 이 날짜부터 수집 (YYYY-MM-DD)
    #[arg(short = 's', long = "start-date")]
    start_date: Option<String>,

    /// 수집할 상품 (예: "BTC-USD")
    #[arg(short = 'p', long = "product")]
    product: Option<String>,

    /// 중단된 상품이 있으면 실패 코드로 종료
    #[arg(long)]
    strict: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화 (실행 범위)
    let level = normalize_level(&cli.loglevel)?;
    let _log = init_logging(LogConfig::new(level).with_format(cli.log_format))?;

    // 네트워크 요청 전에 입력 검증
    let registry = InstrumentRegistry::builtin();
    let instruments = registry.select(cli.product.as_deref())?;
    let start_override = cli.start_date.as_deref().map(parse_start_date).transpose()?;

    let config = CollectorConfig::from_env();
    tracing::debug!(api_url = %config.api_url, "설정 로드 완료");

    let path = absolute_path(&cli.db_file)?;
    tracing::debug!(database = %path.display(), "Database");
    let store = CandleStore::open(&path).await?;

    let fetcher = CandleFetcher::from_config(&config)?;
    let driver = ImportDriver::new(&store, &fetcher, &config);

    let result = driver.run_import(&instruments, start_override).await;
    store.close().await;

    let stats = result?;
    stats.log_summary("캔들 수집");

    if cli.strict && !stats.all_succeeded() {
        return Err(CollectorError::PartialFailure {
            aborted: stats.aborted,
            total: stats.total,
        }
        .into());
    }

    Ok(())
}

fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
