//! 조회 → 저장 파이프라인 통합 테스트.

mod common;

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use harvest_collector::config::HttpConfig;
use harvest_collector::{CandleFetcher, CandleStore, CollectorConfig, ImportDriver, SeriesImporter};
use harvest_core::{Instrument, RawCandle};
use mockito::Matcher;
use std::sync::atomic::Ordering;

fn fast_config() -> CollectorConfig {
    CollectorConfig {
        http: HttpConfig {
            retry_delay_ms: 1,
            ..HttpConfig::default()
        },
        request_delay_ms: 0,
        ..CollectorConfig::default()
    }
}

fn config(server: &mockito::ServerGuard) -> CollectorConfig {
    CollectorConfig {
        api_url: server.url(),
        ..fast_config()
    }
}

fn instrument(id: &str) -> Instrument {
    Instrument::new(id, NaiveDate::from_ymd_opt(2015, 1, 8).unwrap())
}

fn candle_json(time: i64) -> String {
    format!("[{time}, 100.5, 101.25, 100.75, 101.0, 3.5]")
}

fn body(rows: &[String]) -> String {
    format!("[{}]", rows.join(","))
}

/// 분 단위로 내림한 현재 시각.
fn minute_now() -> DateTime<Utc> {
    let now = Utc::now().timestamp();
    DateTime::from_timestamp(now - now % 60, 0).unwrap()
}

async fn store() -> CandleStore {
    let store = CandleStore::in_memory().await.unwrap();
    store.ensure_schema().await.unwrap();
    store
}

#[tokio::test]
async fn test_empty_range_makes_no_requests() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let config = config(&server);
    let fetcher = CandleFetcher::from_config(&config).unwrap();
    let start = Utc::now() - Duration::minutes(10);

    let mut importer =
        SeriesImporter::until_now(&fetcher, "BTC-USD", start, config.candles.page_span());

    assert!(importer.next_batch().await.unwrap().is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_importer_stops_after_terminal_failure() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/products/BTC-USD/candles")
        .match_query(Matcher::Any)
        .with_status(403)
        .expect(1)
        .create_async()
        .await;

    let config = config(&server);
    let fetcher = CandleFetcher::from_config(&config).unwrap();
    // 여러 구간이 남아 있어도 첫 실패 후 중단
    let start = Utc::now() - Duration::days(3);

    let mut importer =
        SeriesImporter::until_now(&fetcher, "BTC-USD", start, config.candles.page_span());

    assert!(importer.next_batch().await.is_err());
    assert!(importer.is_finished());
    assert!(importer.next_batch().await.unwrap().is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_run_persists_batches_and_excludes_fresh_records() {
    let mut server = mockito::Server::new_async().await;
    let now = minute_now();
    let start = now - Duration::minutes(330);
    let safe_end = now - Duration::minutes(300);

    let rows = vec![
        candle_json((start + Duration::minutes(1)).timestamp()),
        candle_json((start + Duration::minutes(2)).timestamp()),
        // 최신 구간 레코드 (저장되면 안 됨)
        candle_json((now - Duration::minutes(1)).timestamp()),
        // 필드가 5개인 잘못된 행
        format!("[{}, 1, 2, 3, 4]", (start + Duration::minutes(3)).timestamp()),
    ];

    let mock = server
        .mock("GET", "/products/BTC-USD/candles")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(body(&rows))
        .expect(1)
        .create_async()
        .await;

    let config = config(&server);
    let fetcher = CandleFetcher::from_config(&config).unwrap();
    let store = store().await;
    let driver = ImportDriver::new(&store, &fetcher, &config);

    let stats = driver.run_import(&[instrument("BTC-USD")], Some(start)).await.unwrap();

    assert_eq!(stats.total, 1);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.aborted, 0);
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.total_candles, 2);
    assert_eq!(stats.skipped_malformed, 1);
    assert_eq!(store.count("BTC-USD").await.unwrap(), 2);

    let latest = store.latest_timestamp("BTC-USD").await.unwrap().unwrap();
    assert!(latest < safe_end);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rerun_over_same_range_is_idempotent() {
    let mut server = mockito::Server::new_async().await;
    let now = minute_now();
    let start = now - Duration::minutes(330);
    let rows: Vec<String> = (1..=5)
        .map(|m| candle_json((start + Duration::minutes(m)).timestamp()))
        .collect();

    let mock = server
        .mock("GET", "/products/BTC-USD/candles")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(body(&rows))
        .expect(2)
        .create_async()
        .await;

    let config = config(&server);
    let fetcher = CandleFetcher::from_config(&config).unwrap();
    let store = store().await;
    let driver = ImportDriver::new(&store, &fetcher, &config);

    let first = driver.run_import(&[instrument("BTC-USD")], Some(start)).await.unwrap();
    let second = driver.run_import(&[instrument("BTC-USD")], Some(start)).await.unwrap();

    assert_eq!(first.total_candles, 5);
    assert_eq!(second.total_candles, 0);
    assert_eq!(store.count("BTC-USD").await.unwrap(), 5);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_resume_requests_from_watermark() {
    let mut server = mockito::Server::new_async().await;
    let watermark = minute_now() - Duration::minutes(400);

    let store = store().await;
    let seed: Vec<RawCandle> = vec![
        serde_json::from_str(&candle_json((watermark - Duration::minutes(1)).timestamp())).unwrap(),
        serde_json::from_str(&candle_json(watermark.timestamp())).unwrap(),
    ];
    store.insert_batch("BTC-USD", &seed).await.unwrap();

    let mock = server
        .mock("GET", "/products/BTC-USD/candles")
        .match_query(Matcher::UrlEncoded(
            "start".into(),
            watermark.to_rfc3339_opts(SecondsFormat::Secs, true),
        ))
        .with_status(200)
        .with_body(body(&[
            candle_json(watermark.timestamp()),
            candle_json((watermark + Duration::minutes(1)).timestamp()),
        ]))
        .expect(1)
        .create_async()
        .await;

    let config = config(&server);
    let fetcher = CandleFetcher::from_config(&config).unwrap();
    let driver = ImportDriver::new(&store, &fetcher, &config);

    let stats = driver.run_import(&[instrument("BTC-USD")], None).await.unwrap();

    assert_eq!(stats.success, 1);
    // 워터마크 행은 중복이므로 하나만 추가
    assert_eq!(stats.total_candles, 1);
    assert_eq!(store.count("BTC-USD").await.unwrap(), 3);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_aborted_instrument_does_not_stop_run() {
    let mut server = mockito::Server::new_async().await;
    let now = minute_now();
    let start = now - Duration::minutes(330);

    let forbidden = server
        .mock("GET", "/products/AAA-USD/candles")
        .match_query(Matcher::Any)
        .with_status(403)
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("GET", "/products/BBB-USD/candles")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(body(&[candle_json((start + Duration::minutes(1)).timestamp())]))
        .expect(1)
        .create_async()
        .await;

    let config = config(&server);
    let fetcher = CandleFetcher::from_config(&config).unwrap();
    let store = store().await;
    let driver = ImportDriver::new(&store, &fetcher, &config);

    let stats = driver
        .run_import(&[instrument("AAA-USD"), instrument("BBB-USD")], Some(start))
        .await
        .unwrap();

    assert_eq!(stats.total, 2);
    assert_eq!(stats.aborted, 1);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.aborted_instruments, vec!["AAA-USD".to_string()]);
    assert!(!stats.all_succeeded());
    assert_eq!(store.count("AAA-USD").await.unwrap(), 0);
    assert_eq!(store.count("BBB-USD").await.unwrap(), 1);
    forbidden.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_network_failure_aborts_only_that_instrument() {
    let now = minute_now();
    let start = now - Duration::minutes(330);
    let (url, dropped) = common::spawn_dropping_server(
        "AAA-USD",
        body(&[candle_json((start + Duration::minutes(1)).timestamp())]),
    )
    .await;

    let config = CollectorConfig {
        api_url: url,
        ..fast_config()
    };
    let fetcher = CandleFetcher::from_config(&config).unwrap();
    let store = store().await;
    let driver = ImportDriver::new(&store, &fetcher, &config);

    let stats = driver
        .run_import(&[instrument("AAA-USD"), instrument("BBB-USD")], Some(start))
        .await
        .unwrap();

    assert_eq!(stats.total, 2);
    assert_eq!(stats.aborted, 1);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.aborted_instruments, vec!["AAA-USD".to_string()]);
    // 네트워크 에러는 재시도하지 않음
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
    assert_eq!(store.count("AAA-USD").await.unwrap(), 0);
    assert_eq!(store.count("BBB-USD").await.unwrap(), 1);
}

#[tokio::test]
async fn test_nothing_to_import_is_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let config = config(&server);
    let fetcher = CandleFetcher::from_config(&config).unwrap();
    let store = store().await;
    let driver = ImportDriver::new(&store, &fetcher, &config);

    let stats = driver
        .run_import(&[instrument("BTC-USD")], Some(Utc::now() - Duration::minutes(5)))
        .await
        .unwrap();

    assert_eq!(stats.success, 1);
    assert_eq!(stats.empty, 1);
    assert_eq!(stats.batches, 0);
    mock.assert_async().await;
}
