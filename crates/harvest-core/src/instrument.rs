//! 상품 레지스트리.
//!
//! API는 상품별 거래 시작일을 제공하지 않으므로 수동으로 수집한 값을 사용합니다.
//! 저장된 데이터가 없는 상품은 여기의 시작일부터 전체 이력을 수집합니다.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

/// 기본 상품 목록: (상품 ID, 거래 시작일).
const DEFAULT_PRODUCTS: &[(&str, &str)] = &[
    ("BCH-BTC", "2018-01-17"),
    ("BCH-USD", "2017-12-20"),
    ("BCH-EUR", "2018-01-24"),
    ("BTC-EUR", "2015-04-23"),
    ("BTC-USD", "2015-01-08"),
    ("BTC-GBP", "2015-04-21"),
    ("ETH-BTC", "2016-05-18"),
    ("ETH-EUR", "2017-05-23"),
    ("ETH-USD", "2016-05-18"),
    ("LTC-BTC", "2016-08-17"),
    ("LTC-USD", "2016-08-17"),
    ("LTC-EUR", "2017-05-22"),
];

/// 거래 가능한 상품 (통화쌍).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    /// 상품 ID (예: "BTC-USD")
    pub id: String,
    /// 첫 거래일
    pub listed_on: NaiveDate,
}

impl Instrument {
    pub fn new(id: impl Into<String>, listed_on: NaiveDate) -> Self {
        Self {
            id: id.into(),
            listed_on,
        }
    }

    /// 첫 거래일 자정(UTC).
    pub fn history_start(&self) -> DateTime<Utc> {
        self.listed_on.and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// 순서가 보존되는 상품 레지스트리.
#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    instruments: Vec<Instrument>,
}

impl InstrumentRegistry {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }

    /// 기본 상품 목록으로 레지스트리 생성.
    pub fn builtin() -> Self {
        let instruments = DEFAULT_PRODUCTS
            .iter()
            .filter_map(|(id, date)| {
                parse_date(date)
                    .ok()
                    .map(|listed_on| Instrument::new(*id, listed_on))
            })
            .collect();
        Self { instruments }
    }

    pub fn get(&self, id: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.iter()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// 수집 대상 선택.
    ///
    /// `product`가 주어지면 해당 상품만, 아니면 등록 순서대로 전체를 반환합니다.
    /// 등록되지 않은 상품은 네트워크 요청 전에 에러로 처리합니다.
    pub fn select(&self, product: Option<&str>) -> CoreResult<Vec<Instrument>> {
        match product {
            Some(id) => self
                .get(id)
                .cloned()
                .map(|i| vec![i])
                .ok_or_else(|| CoreError::UnknownInstrument(id.to_string())),
            None => Ok(self.instruments.clone()),
        }
    }
}

/// `YYYY-MM-DD` 형식 날짜 파싱.
pub fn parse_date(s: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| CoreError::InvalidDate(format!("{s}: {e}")))
}

/// `YYYY-MM-DD` 날짜를 해당일 자정(UTC)으로 변환.
pub fn parse_start_date(s: &str) -> CoreResult<DateTime<Utc>> {
    Ok(parse_date(s)?.and_time(chrono::NaiveTime::MIN).and_utc())
}
