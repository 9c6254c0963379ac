//! 전체 수집 루프.
//!
//! 상품을 설정된 순서대로 하나씩 처리합니다:
//! 1. 시작 시각 결정 (명시적 지정 > 저장된 워터마크 > 레지스트리 시작일)
//! 2. 구간별 배치를 받아 저장하고, 요청 사이에 딜레이를 둠
//! 3. 모든 구간을 마치거나 조회가 최종 실패하면 다음 상품으로 이동
//!
//! 조회 실패는 상품 단위에서 잡아 해당 상품만 이번 실행에서 포기합니다.
//! 저장소 에러는 그대로 상위로 전파합니다.

use crate::config::CollectorConfig;
use crate::error::{FetchError, Result, StorageError};
use crate::fetcher::CandleFetcher;
use crate::importer::SeriesImporter;
use crate::stats::CollectionStats;
use crate::storage::CandleStore;
use chrono::{DateTime, Duration, Utc};
use harvest_core::{instrument_span, Instrument};
use std::time::Instant;
use tracing::{debug, error, info, Instrument as _, Span};

/// 시작 시각 결정 근거.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartSource {
    /// 설정으로 지정됨
    Override,
    /// 저장된 마지막 캔들 시각
    Watermark,
    /// 레지스트리 거래 시작일 (저장된 데이터 없음)
    Registry,
}

/// 상품 하나의 저장 진행량.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportProgress {
    /// 저장한 배치 수
    pub batches: usize,
    /// 새로 저장된 캔들 수
    pub inserted: usize,
    /// 형태 오류로 버린 레코드 수
    pub skipped: usize,
}

/// 상품 하나의 수집 결과.
#[derive(Debug)]
pub enum InstrumentOutcome {
    /// 모든 구간 완료
    Completed(ImportProgress),
    /// 수집할 구간 없음
    NothingToImport,
    /// 조회 실패로 중단 (저장된 진행분은 유지)
    Aborted {
        progress: ImportProgress,
        error: FetchError,
    },
}

/// 상품의 수집 시작 시각을 결정합니다.
pub async fn resolve_start(
    store: &CandleStore,
    instrument: &Instrument,
    start_override: Option<DateTime<Utc>>,
) -> std::result::Result<(DateTime<Utc>, StartSource), StorageError> {
    if let Some(start) = start_override {
        return Ok((start, StartSource::Override));
    }

    match store.latest_timestamp(&instrument.id).await? {
        Some(latest) => {
            info!(market = %instrument.id, resume_from = %latest, "이전 데이터에서 재개");
            Ok((latest, StartSource::Watermark))
        }
        None => {
            info!(market = %instrument.id, "이전 데이터 없음, 전체 이력 수집");
            Ok((instrument.history_start(), StartSource::Registry))
        }
    }
}

/// 수집 드라이버.
pub struct ImportDriver<'a> {
    store: &'a CandleStore,
    fetcher: &'a CandleFetcher,
    margin: Duration,
    request_delay: std::time::Duration,
}

impl<'a> ImportDriver<'a> {
    pub fn new(store: &'a CandleStore, fetcher: &'a CandleFetcher, config: &CollectorConfig) -> Self {
        Self {
            store,
            fetcher,
            margin: config.candles.page_span(),
            request_delay: config.request_delay(),
        }
    }

    /// 구간 요청 간 딜레이 변경.
    pub fn with_request_delay(mut self, delay: std::time::Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// 선택된 상품을 순서대로 수집합니다.
    ///
    /// 상품별 조회 실패는 통계에 기록하고 다음 상품으로 넘어갑니다.
    pub async fn run_import(
        &self,
        instruments: &[Instrument],
        start_override: Option<DateTime<Utc>>,
    ) -> Result<CollectionStats> {
        let started = Instant::now();
        let mut stats = CollectionStats::new();

        // 상품 처리 전에 한 번만 생성
        self.store.ensure_schema().await?;

        let ids: Vec<&str> = instruments.iter().map(|i| i.id.as_str()).collect();
        info!(instruments = ?ids, "Updating");

        let total = instruments.len();
        for (idx, instrument) in instruments.iter().enumerate() {
            stats.total += 1;
            let span = instrument_span!(instrument.id, idx + 1, total);

            let outcome = self
                .import_instrument(instrument, start_override, span.clone())
                .instrument(span)
                .await?;

            let progress = match outcome {
                InstrumentOutcome::Completed(progress) => {
                    stats.success += 1;
                    progress
                }
                InstrumentOutcome::NothingToImport => {
                    stats.success += 1;
                    stats.empty += 1;
                    ImportProgress::default()
                }
                InstrumentOutcome::Aborted { progress, .. } => {
                    stats.aborted += 1;
                    stats.aborted_instruments.push(instrument.id.clone());
                    progress
                }
            };
            stats.batches += progress.batches;
            stats.total_candles += progress.inserted;
            stats.skipped_malformed += progress.skipped;
        }

        stats.elapsed = started.elapsed();
        Ok(stats)
    }

    /// 상품 하나를 수집합니다.
    pub async fn import_instrument(
        &self,
        instrument: &Instrument,
        start_override: Option<DateTime<Utc>>,
        span: Span,
    ) -> Result<InstrumentOutcome> {
        let (start, source) = resolve_start(self.store, instrument, start_override).await?;
        info!(start = %start, source = ?source, "수집 시작");

        let mut importer =
            SeriesImporter::until_now(self.fetcher, instrument.id.clone(), start, self.margin)
                .with_span(span);

        if importer.is_finished() {
            return Ok(InstrumentOutcome::NothingToImport);
        }

        let mut progress = ImportProgress::default();

        loop {
            let batch = match importer.next_batch().await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) => {
                    // 다음 실행에서 워터마크부터 재개
                    error!(error = %e, "캔들 조회 실패 (재시도 한도 초과), 다음 상품으로 이동");
                    return Ok(InstrumentOutcome::Aborted { progress, error: e });
                }
            };

            debug!(
                count = batch.len(),
                dropped_fresh = batch.dropped_fresh,
                window = %batch.window,
                "캔들 수신"
            );

            if !batch.is_empty() {
                let outcome = self.store.insert_batch(&instrument.id, &batch.candles).await?;
                progress.batches += 1;
                progress.inserted += outcome.inserted;
                progress.skipped += outcome.skipped;
            }

            // API 한도 (초당 3회)
            tokio::time::sleep(self.request_delay).await;
        }

        info!(
            batches = progress.batches,
            inserted = progress.inserted,
            skipped = progress.skipped,
            "수집 완료"
        );
        Ok(InstrumentOutcome::Completed(progress))
    }
}
