//! Resumable historical candle collector.
//!
//! 페이지 단위로 제한된 REST API에서 1분 캔들을 구간별로 수집하여
//! SQLite에 중복 없이 저장합니다:
//! - 시간 구간 분할 및 구간별 조회 (`importer`)
//! - 429/500 재시도 정책 (`fetcher`)
//! - 워터마크 기반 재개 (`driver`)
//! - 멱등 저장 (`storage`)

pub mod config;
pub mod driver;
pub mod error;
pub mod fetcher;
pub mod importer;
pub mod stats;
pub mod storage;

pub use config::CollectorConfig;
pub use driver::{resolve_start, ImportDriver, ImportProgress, InstrumentOutcome, StartSource};
pub use error::{CollectorError, FetchError, Result, StorageError};
pub use fetcher::{CandleFetcher, RetryPolicy};
pub use importer::{CandleBatch, SeriesImporter};
pub use stats::CollectionStats;
pub use storage::{CandleStore, InsertOutcome};
