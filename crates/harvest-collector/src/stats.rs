//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 수집 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 처리한 상품 수
    pub total: usize,
    /// 끝까지 수집한 상품 수
    pub success: usize,
    /// 조회 실패로 중단된 상품 수
    pub aborted: usize,
    /// 새로 수집할 구간이 없던 상품 수
    pub empty: usize,
    /// 저장한 배치 수
    pub batches: usize,
    /// 새로 저장된 캔들 수 (중복 제외)
    pub total_candles: usize,
    /// 형태 오류로 버린 캔들 수
    pub skipped_malformed: usize,
    /// 중단된 상품 목록
    pub aborted_instruments: Vec<String>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 모든 상품을 중단 없이 처리했는지 여부
    pub fn all_succeeded(&self) -> bool {
        self.aborted == 0
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            aborted = self.aborted,
            empty = self.empty,
            batches = self.batches,
            total_candles = self.total_candles,
            skipped_malformed = self.skipped_malformed,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );

        if !self.aborted_instruments.is_empty() {
            tracing::warn!(
                instruments = ?self.aborted_instruments,
                "다음 실행에서 이어서 수집할 상품"
            );
        }
    }
}
