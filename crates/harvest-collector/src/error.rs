//! 에러 타입 정의.

use harvest_core::CoreError;
use reqwest::StatusCode;
use thiserror::Error;

/// 캔들 조회 에러.
///
/// 어떤 변형이든 해당 구간 요청의 최종 실패이며, 재시도는 fetcher 내부에서 끝납니다.
#[derive(Debug, Error)]
pub enum FetchError {
    /// 재시도 가능한 상태(429, 500)가 시도 한도까지 반복됨
    #[error("HTTP {status} after {attempts} attempts")]
    Transient { status: StatusCode, attempts: u32 },

    /// 재시도해도 결과가 바뀌지 않는 상태 (400, 403 등)
    #[error("HTTP {status}")]
    Permanent { status: StatusCode },

    /// 타임아웃/연결 에러 (재시도하지 않음)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// 응답 본문이 캔들 배열이 아님
    #[error("Decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// 재시도 가능한 HTTP 상태인지 확인.
    ///
    /// 429(요청 한도)와 500만 재시도합니다.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::INTERNAL_SERVER_ERROR
    }

    /// 응답 상태 코드 (HTTP 에러인 경우).
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Transient { status, .. } | Self::Permanent { status } => Some(*status),
            Self::Network(e) => e.status(),
            Self::Decode(_) => None,
        }
    }
}

/// 저장소 에러.
#[derive(Debug, Error)]
pub enum StorageError {
    /// 데이터베이스 에러
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 저장된 값이 정수 타임스탬프가 아님
    #[error("Invalid stored timestamp: {0}")]
    InvalidTimestamp(i64),
}

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),

    /// 저장소 에러
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// 캔들 조회 에러
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// HTTP 클라이언트 생성 실패
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// 일부 상품 수집 중단 (--strict)
    #[error("{aborted} of {total} instruments aborted")]
    PartialFailure { aborted: usize, total: usize },
}

impl From<sqlx::Error> for CollectorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(StorageError::Database(err))
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(FetchError::is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(FetchError::is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!FetchError::is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!FetchError::is_retryable_status(StatusCode::FORBIDDEN));
        assert!(!FetchError::is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!FetchError::is_retryable_status(StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn test_error_display() {
        let err = FetchError::Transient {
            status: StatusCode::TOO_MANY_REQUESTS,
            attempts: 3,
        };
        assert_eq!(err.to_string(), "HTTP 429 Too Many Requests after 3 attempts");
        assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));

        let err = CollectorError::PartialFailure { aborted: 2, total: 12 };
        assert_eq!(err.to_string(), "2 of 12 instruments aborted");
    }
}
