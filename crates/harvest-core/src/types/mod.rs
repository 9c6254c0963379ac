//! 수집 파이프라인 전반에서 사용되는 공통 타입.

mod candle;
mod window;

pub use candle::*;
pub use window::*;
