//! 환경변수 기반 설정 모듈.

use chrono::Duration as TimeSpan;
use std::time::Duration;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// API 기본 URL
    pub api_url: String,
    /// 캔들 조회 설정
    pub candles: CandleQueryConfig,
    /// HTTP 재시도/타임아웃 설정
    pub http: HttpConfig,
    /// 구간 요청 간 딜레이 (밀리초)
    pub request_delay_ms: u64,
}

/// 캔들 조회 설정
#[derive(Debug, Clone)]
pub struct CandleQueryConfig {
    /// 캔들 간격 (초)
    pub granularity_secs: i64,
    /// 응답당 최대 캔들 수
    pub page_size: i64,
}

/// HTTP 설정
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// 요청당 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 재시도 간 대기 (밀리초)
    pub retry_delay_ms: u64,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 읽기 타임아웃 (초)
    pub read_timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.exchange.coinbase.com".to_string(),
            candles: CandleQueryConfig::default(),
            http: HttpConfig::default(),
            request_delay_ms: 500,
        }
    }
}

impl Default for CandleQueryConfig {
    fn default() -> Self {
        Self {
            granularity_secs: 60,
            page_size: 300,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        // API 한도는 초당 3회, 안전하게 초당 1회로 재시도
        Self {
            max_attempts: 3,
            retry_delay_ms: 1000,
            connect_timeout_secs: 10,
            read_timeout_secs: 10,
        }
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드 (`.env` 포함)
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            api_url: std::env::var("CANDLE_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            candles: CandleQueryConfig {
                granularity_secs: env_var_parse(
                    "CANDLE_GRANULARITY_SECS",
                    defaults.candles.granularity_secs,
                ),
                page_size: env_var_parse("CANDLE_PAGE_SIZE", defaults.candles.page_size),
            },
            http: HttpConfig {
                max_attempts: env_var_parse("CANDLE_MAX_ATTEMPTS", defaults.http.max_attempts),
                retry_delay_ms: env_var_parse(
                    "CANDLE_RETRY_DELAY_MS",
                    defaults.http.retry_delay_ms,
                ),
                connect_timeout_secs: env_var_parse(
                    "CANDLE_CONNECT_TIMEOUT_SECS",
                    defaults.http.connect_timeout_secs,
                ),
                read_timeout_secs: env_var_parse(
                    "CANDLE_READ_TIMEOUT_SECS",
                    defaults.http.read_timeout_secs,
                ),
            },
            request_delay_ms: env_var_parse("CANDLE_REQUEST_DELAY_MS", defaults.request_delay_ms),
        }
    }

    /// 구간 요청 간 딜레이를 Duration으로 반환
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl CandleQueryConfig {
    /// 한 페이지가 덮는 시간 폭 (구간 폭이자 최신 데이터 제외 구간).
    pub fn page_span(&self) -> TimeSpan {
        TimeSpan::seconds(self.granularity_secs * self.page_size)
    }
}

impl HttpConfig {
    /// 재시도 간 대기를 Duration으로 반환
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
