//! 캔들 API 클라이언트.
//!
//! 구간당 한 번의 요청을 보내고, 일시적 실패(429, 500)만 고정 간격으로 재시도합니다.
//! 그 외 HTTP 에러 상태는 재시도해도 결과가 같으므로 즉시 반환합니다.
//! 타임아웃/연결 에러는 재시도하지 않고 그대로 전파합니다.

use crate::config::{CollectorConfig, HttpConfig};
use crate::error::{CollectorError, FetchError};
use chrono::SecondsFormat;
use harvest_core::{RawCandle, TimeWindow};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 재시도 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 첫 시도를 포함한 최대 시도 횟수 (최소 1)
    pub max_attempts: u32,
    /// 시도 간 대기
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl From<&HttpConfig> for RetryPolicy {
    fn from(config: &HttpConfig) -> Self {
        Self::new(config.max_attempts, config.retry_delay())
    }
}

/// 캔들 조회 클라이언트.
#[derive(Debug, Clone)]
pub struct CandleFetcher {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
    granularity_secs: i64,
}

impl CandleFetcher {
    /// 새 클라이언트 생성.
    pub fn new(
        base_url: impl Into<String>,
        http: &HttpConfig,
        granularity_secs: i64,
    ) -> Result<Self, CollectorError> {
        let client = reqwest::Client::builder()
            .connect_timeout(http.connect_timeout())
            .read_timeout(http.read_timeout())
            .user_agent(concat!("harvest-collector/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CollectorError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            policy: RetryPolicy::from(http),
            granularity_secs,
        })
    }

    /// 전체 설정에서 클라이언트 생성.
    pub fn from_config(config: &CollectorConfig) -> Result<Self, CollectorError> {
        Self::new(
            config.api_url.clone(),
            &config.http,
            config.candles.granularity_secs,
        )
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// 상품 캔들 엔드포인트 URL.
    pub fn candles_url(&self, product: &str) -> String {
        format!("{}/products/{}/candles", self.base_url, product)
    }

    /// 한 구간의 캔들 조회.
    ///
    /// 응답 순서는 보장되지 않습니다 (보통 최신순).
    pub async fn fetch_candles(
        &self,
        product: &str,
        window: &TimeWindow,
    ) -> Result<Vec<RawCandle>, FetchError> {
        let params = [
            (
                "start",
                window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("end", window.end.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("granularity", self.granularity_secs.to_string()),
        ];

        self.get_json(&self.candles_url(product), &params).await
    }

    /// GET 요청 후 JSON 응답을 파싱합니다 (재시도 포함).
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let response = self.client.get(url).query(params).send().await?;
            let status = response.status();

            if status.is_success() {
                let body = response.bytes().await?;
                debug!(url = url, bytes = body.len(), attempt, "응답 수신");
                return serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()));
            }

            // 400 Bad Request, 403 Forbidden 등은 몇 번을 시도해도 실패
            if !FetchError::is_retryable_status(status) {
                return Err(FetchError::Permanent { status });
            }

            if attempt >= self.policy.max_attempts {
                return Err(FetchError::Transient {
                    status,
                    attempts: attempt,
                });
            }

            warn!(url = url, status = %status, attempt, "일시적 HTTP 에러");
            info!(delay_ms = self.policy.delay.as_millis() as u64, "재시도");
            tokio::time::sleep(self.policy.delay).await;
        }
    }
}
