//! # Harvest Core
//!
//! 캔들 수집 파이프라인의 핵심 도메인 타입을 제공합니다.
//!
//! - 시간 구간 분할 (`TimeWindows`)
//! - 원본/정규화 캔들 레코드
//! - 상품 레지스트리 (상품별 거래 시작일)
//! - 로깅 인프라

pub mod error;
pub mod instrument;
pub mod logging;
pub mod types;

pub use error::*;
pub use instrument::*;
pub use logging::*;
pub use types::*;
