//! 캔들 레코드 타입.
//!
//! 업스트림 API는 캔들을 `[time, low, high, open, close, volume]` 형태의
//! 6개 필드 배열로 반환합니다. 가격/거래량은 응답의 숫자 텍스트를 그대로
//! 보관하며, 부동소수점이나 고정 자릿수 타입으로 다시 쓰지 않습니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 캔들 배열의 필드 수.
pub const CANDLE_FIELD_COUNT: usize = 6;

/// 업스트림에서 받은 가공 전 캔들 배열.
///
/// 형태 검증은 저장 단계에서 수행합니다. 드물게 필드 수가 다른 행이 섞여 옵니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCandle(pub Vec<Value>);

impl RawCandle {
    /// 첫 필드(Unix epoch 초)를 읽습니다.
    pub fn time(&self) -> Option<i64> {
        self.0.first().and_then(Value::as_i64)
    }
}

/// 형태가 잘못된 캔들.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedCandle {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid time field: {0}")]
    Time(String),

    #[error("non-numeric value in field '{field}': {value}")]
    NotNumeric { field: &'static str, value: String },
}

/// 응답 원문 그대로의 10진수 텍스트.
///
/// JSON 숫자 또는 숫자 문자열만 허용합니다. 자릿수 제한이 없어
/// `Decimal` 범위(유효숫자 28자리)를 넘는 값도 손실 없이 보관됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecimalText(String);

impl DecimalText {
    fn from_value(field: &'static str, value: &Value) -> Result<Self, MalformedCandle> {
        let not_numeric = || MalformedCandle::NotNumeric {
            field,
            value: value.to_string(),
        };

        match value {
            // arbitrary_precision: 원본 텍스트가 그대로 유지됨
            Value::Number(n) => Ok(Self(n.to_string())),
            Value::String(s) => serde_json::from_str::<Number>(s)
                .map(|_| Self(s.clone()))
                .map_err(|_| not_numeric()),
            _ => Err(not_numeric()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Decimal`로 표현 가능하면 변환합니다. 범위를 넘으면 `None`.
    pub fn to_decimal(&self) -> Option<Decimal> {
        Decimal::from_str(&self.0)
            .or_else(|_| Decimal::from_scientific(&self.0))
            .ok()
    }
}

impl fmt::Display for DecimalText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 검증된 1분 캔들.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// 구간 시작 시각 (Unix epoch 초)
    pub time: i64,
    pub low: DecimalText,
    pub high: DecimalText,
    pub open: DecimalText,
    pub close: DecimalText,
    pub volume: DecimalText,
}

impl Candle {
    /// 업스트림 배열을 검증하고 변환합니다.
    pub fn from_raw(raw: &RawCandle) -> Result<Self, MalformedCandle> {
        let fields = &raw.0;
        if fields.len() != CANDLE_FIELD_COUNT {
            return Err(MalformedCandle::FieldCount {
                expected: CANDLE_FIELD_COUNT,
                found: fields.len(),
            });
        }

        let time = fields[0]
            .as_i64()
            .ok_or_else(|| MalformedCandle::Time(fields[0].to_string()))?;

        Ok(Self {
            time,
            low: DecimalText::from_value("low", &fields[1])?,
            high: DecimalText::from_value("high", &fields[2])?,
            open: DecimalText::from_value("open", &fields[3])?,
            close: DecimalText::from_value("close", &fields[4])?,
            volume: DecimalText::from_value("volume", &fields[5])?,
        })
    }

    /// 고가/저가 범위가 시가/종가를 포함하는지 검사합니다.
    ///
    /// `Decimal` 범위를 넘는 값이 있으면 판단하지 않고 `true`를 반환합니다.
    pub fn has_consistent_range(&self) -> bool {
        let prices = [&self.low, &self.high, &self.open, &self.close]
            .map(DecimalText::to_decimal);

        match prices {
            [Some(low), Some(high), Some(open), Some(close)] => {
                low <= high && (low..=high).contains(&open) && (low..=high).contains(&close)
            }
            _ => true,
        }
    }
}
