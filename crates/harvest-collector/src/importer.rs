//! 상품별 캔들 시계열 수집기.
//!
//! `[start, now - margin)` 범위를 페이지 크기 단위 구간으로 나누어 순서대로 조회합니다.
//! 가장 최근 구간(margin)은 업스트림에서 값이 아직 바뀔 수 있으므로 조회하지 않고
//! 다음 실행으로 넘깁니다. 조회가 최종 실패하면 나머지 구간은 이번 실행에서 포기하며,
//! 이미 저장된 진행분은 그대로 두어 다음 실행이 워터마크부터 재개합니다.
//!
//! # 사용 예
//!
//! ```rust,ignore
//! let mut importer = SeriesImporter::new(&fetcher, "BTC-USD", start, Utc::now(), margin);
//! while let Some(batch) = importer.next_batch().await? {
//!     store.insert_batch("BTC-USD", &batch.candles).await?;
//! }
//! ```

use crate::error::FetchError;
use crate::fetcher::CandleFetcher;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use harvest_core::{RawCandle, TimeWindow, TimeWindows};
use tracing::{debug, info, Instrument, Span};

/// 한 구간의 조회 결과.
#[derive(Debug, Clone)]
pub struct CandleBatch {
    /// 생성된 구간
    pub window: TimeWindow,
    /// 구간 응답 레코드 (형태 검증 전)
    pub candles: Vec<RawCandle>,
    /// 최신 구간에 속해 버린 레코드 수
    pub dropped_fresh: usize,
}

impl CandleBatch {
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }
}

/// 구간 단위로 당겨 쓰는(pull) 캔들 수집기.
///
/// `next_batch`를 호출할 때마다 한 구간을 요청합니다. 중간에 drop해도
/// 남은 구간은 요청하지 않습니다.
pub struct SeriesImporter<'a> {
    fetcher: &'a CandleFetcher,
    market: String,
    windows: TimeWindows,
    safe_end: DateTime<Utc>,
    last_day: NaiveDate,
    span: Span,
    finished: bool,
}

impl<'a> SeriesImporter<'a> {
    /// 새 수집기 생성.
    ///
    /// # Arguments
    /// * `start` - 수집 시작 시각
    /// * `end` - 기준 시각 (보통 현재)
    /// * `margin` - 제외할 최신 구간 폭이자 구간 폭 (페이지 크기 × 캔들 간격)
    pub fn new(
        fetcher: &'a CandleFetcher,
        market: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        margin: Duration,
    ) -> Self {
        let market = market.into();
        let safe_end = end - margin;
        let finished = safe_end < start;

        if finished {
            debug!(
                market = %market,
                start = %start,
                safe_end = %safe_end,
                "시작 시각이 수집 가능 종료 시각보다 이후"
            );
        }

        Self {
            fetcher,
            market,
            windows: TimeWindows::new(start, safe_end, margin),
            safe_end,
            last_day: start.date_naive(),
            span: Span::none(),
            finished,
        }
    }

    /// 현재 시각 기준 수집기 생성.
    pub fn until_now(
        fetcher: &'a CandleFetcher,
        market: impl Into<String>,
        start: DateTime<Utc>,
        margin: Duration,
    ) -> Self {
        Self::new(fetcher, market, start, Utc::now(), margin)
    }

    /// 로그 span 지정 (모든 이벤트가 이 span 안에서 기록됨).
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    /// 조회 상한 (기준 시각 - margin).
    pub fn safe_end(&self) -> DateTime<Utc> {
        self.safe_end
    }

    /// 더 요청할 구간이 없는지 여부.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 다음 구간을 조회합니다.
    ///
    /// # Returns
    /// * `Ok(Some(batch))` - 한 구간의 응답
    /// * `Ok(None)` - 모든 구간 완료 (또는 앞서 실패로 중단됨)
    /// * `Err(e)` - 재시도 후 최종 실패; 이후 호출은 `Ok(None)`
    pub async fn next_batch(&mut self) -> Result<Option<CandleBatch>, FetchError> {
        if self.finished {
            return Ok(None);
        }

        let Some(window) = self.windows.next() else {
            self.finished = true;
            return Ok(None);
        };

        let span = self.span.clone();
        let result = self.fetch_window(window).instrument(span).await;

        if result.is_err() {
            self.finished = true;
        }
        result.map(Some)
    }

    async fn fetch_window(&mut self, window: TimeWindow) -> Result<CandleBatch, FetchError> {
        debug!(
            window_start = %window.start,
            window_end = %window.end,
            safe_end = %self.safe_end,
            "구간 조회"
        );

        // 일 단위 진행 상황만 info로 기록
        let day = window.start.date_naive();
        if day != self.last_day {
            info!(date = %day, "importing {}", day);
        }

        // 마지막 구간이 상한을 넘더라도 요청은 상한까지만
        let request = TimeWindow {
            start: window.start,
            end: window.end.min(self.safe_end),
        };
        let mut candles = self.fetcher.fetch_candles(&self.market, &request).await?;
        self.last_day = day;

        // 업스트림은 범위를 힌트로만 취급하므로 최신 구간 레코드를 한 번 더 걸러냄
        let safe_end_ts = self.safe_end.timestamp();
        let before = candles.len();
        candles.retain(|c| c.time().map_or(true, |t| t < safe_end_ts));
        let dropped_fresh = before - candles.len();

        if dropped_fresh > 0 {
            debug!(dropped = dropped_fresh, "최신 구간 레코드 제외");
        }

        Ok(CandleBatch {
            window,
            candles,
            dropped_fresh,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use chrono::TimeZone;

    fn fetcher() -> CandleFetcher {
        CandleFetcher::new("http://127.0.0.1:9", &HttpConfig::default(), 60).unwrap()
    }

    #[tokio::test]
    async fn test_start_after_safe_end_is_empty() {
        let fetcher = fetcher();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let start = now - Duration::minutes(100);

        let mut importer =
            SeriesImporter::new(&fetcher, "BTC-USD", start, now, Duration::minutes(300));

        assert!(importer.is_finished());
        assert_eq!(importer.safe_end(), now - Duration::minutes(300));
        // 요청 없이 바로 종료 (연결 불가 주소라도 에러 없음)
        assert!(importer.next_batch().await.unwrap().is_none());
    }

    #[test]
    fn test_window_plan() {
        let fetcher = fetcher();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start + Duration::minutes(300 * 4 + 10);

        let importer = SeriesImporter::new(&fetcher, "BTC-USD", start, end, Duration::minutes(300));

        let windows: Vec<_> = importer.windows.clone().collect();
        // safe_end = start + 910분 → 4개 구간 (마지막은 safe_end를 넘음)
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[3].start, start + Duration::minutes(900));
        assert!(windows[3].end > importer.safe_end());
    }
}
