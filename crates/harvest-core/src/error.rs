//! 핵심 도메인 에러 타입.

use thiserror::Error;

/// 설정/도메인 검증 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 레지스트리에 없는 상품
    #[error("알 수 없는 상품: {0}")]
    UnknownInstrument(String),

    /// 날짜 형식 오류 (YYYY-MM-DD)
    #[error("잘못된 날짜 형식: {0}")]
    InvalidDate(String),

    /// 로그 레벨/형식 오류
    #[error("로깅 설정 에러: {0}")]
    Logging(String),
}

/// Result 타입 별칭
pub type CoreResult<T> = std::result::Result<T, CoreError>;
