//! SQLite 캔들 저장소.
//!
//! `(market, time)`을 기본 키로 중복 없이 저장합니다. 같은 키가 이미 있으면
//! 새 행은 조용히 무시되며 기존 행을 덮어쓰지 않으므로, 겹치는 범위를
//! 다시 수집해도 안전합니다. 가격/거래량은 응답의 10진 텍스트를
//! 그대로 저장합니다.

use crate::error::StorageError;
use chrono::{DateTime, Utc};
use harvest_core::{Candle, RawCandle};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, StorageError>;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS candles (
        market TEXT NOT NULL,
        time TEXT NOT NULL,
        open TEXT NOT NULL,
        high TEXT NOT NULL,
        low TEXT NOT NULL,
        close TEXT NOT NULL,
        volume TEXT NOT NULL,
        PRIMARY KEY (market, time)
    )
"#;

/// 배치 저장 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    /// 새로 저장된 행 수
    pub inserted: usize,
    /// 이미 존재해서 무시된 행 수
    pub duplicates: usize,
    /// 형태 오류로 버린 레코드 수
    pub skipped: usize,
}

/// 캔들 저장소.
///
/// 연결은 하나만 유지합니다 (쓰기/읽기 모두 수집 루프 한 곳에서만 수행).
#[derive(Clone)]
pub struct CandleStore {
    pool: SqlitePool,
}

impl CandleStore {
    /// 파일 DB를 열거나 생성합니다.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// 메모리 DB (테스트용).
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // 연결이 닫히면 메모리 DB도 사라지므로 연결 수명을 제한하지 않음
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// `candles` 테이블이 없으면 생성합니다.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// 상품의 마지막 저장 시각 (워터마크).
    ///
    /// # Returns
    /// * `Some(ts)` - 저장된 가장 최근 캔들 시각
    /// * `None` - 저장된 데이터 없음 (레지스트리 시작일부터 수집)
    pub async fn latest_timestamp(&self, market: &str) -> Result<Option<DateTime<Utc>>> {
        // time은 TEXT 컬럼이므로 숫자로 비교
        let latest: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(CAST(time AS INTEGER)) FROM candles WHERE market = ?",
        )
        .bind(market)
        .fetch_one(&self.pool)
        .await?;

        latest
            .map(|ts| DateTime::from_timestamp(ts, 0).ok_or(StorageError::InvalidTimestamp(ts)))
            .transpose()
    }

    /// 배치를 하나의 트랜잭션으로 저장합니다.
    ///
    /// 필드 수가 맞지 않는 레코드는 경고 후 건너뜁니다. 저장 중 에러가 나면
    /// 트랜잭션이 커밋되지 않으므로 배치의 어떤 행도 남지 않습니다.
    pub async fn insert_batch(&self, market: &str, records: &[RawCandle]) -> Result<InsertOutcome> {
        debug!(market = market, count = records.len(), "배치 저장");

        let mut outcome = InsertOutcome::default();
        let mut tx = self.pool.begin().await?;

        for raw in records {
            // 드물게 API가 필드 수가 다른 행을 반환함
            let candle = match Candle::from_raw(raw) {
                Ok(candle) => candle,
                Err(e) => {
                    warn!(
                        market = market,
                        record = %serde_json::Value::Array(raw.0.clone()),
                        error = %e,
                        "잘못된 캔들 응답"
                    );
                    outcome.skipped += 1;
                    continue;
                }
            };

            if !candle.has_consistent_range() {
                // 값은 그대로 저장
                warn!(
                    market = market,
                    time = candle.time,
                    low = %candle.low,
                    high = %candle.high,
                    "가격 범위 이상"
                );
            }

            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO candles (market, time, open, high, low, close, volume)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(market)
            .bind(candle.time.to_string())
            .bind(candle.open.as_str())
            .bind(candle.high.as_str())
            .bind(candle.low.as_str())
            .bind(candle.close.as_str())
            .bind(candle.volume.as_str())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                outcome.inserted += 1;
            } else {
                outcome.duplicates += 1;
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    /// 상품의 저장된 행 수.
    pub async fn count(&self, market: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM candles WHERE market = ?")
            .bind(market)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 연결 종료.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
