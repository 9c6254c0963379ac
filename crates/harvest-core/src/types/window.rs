//! 시간 구간 분할.
//!
//! `[start, end)` 범위를 고정 폭의 연속된 반열림 구간으로 나눕니다.
//! 마지막 구간의 끝은 `end`를 넘어갈 수 있습니다 (업스트림 범위는 힌트로 취급).

use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// 반열림 시간 구간 `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// 구간 폭.
    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.start, self.end)
    }
}

/// 구간 생성기.
///
/// 지연 평가되는 유한 이터레이터이며, `Clone`으로 처음부터 다시 순회할 수 있습니다.
/// `step`이 0 이하이면 빈 시퀀스를 생성합니다.
#[derive(Debug, Clone)]
pub struct TimeWindows {
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
}

impl TimeWindows {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Self {
        Self {
            cursor: start,
            end,
            step,
        }
    }
}

impl Iterator for TimeWindows {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.step <= Duration::zero() || self.cursor >= self.end {
            return None;
        }

        let start = self.cursor;
        let end = start + self.step;
        self.cursor = end;
        Some(TimeWindow { start, end })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.step <= Duration::zero() || self.cursor >= self.end {
            return (0, Some(0));
        }
        let span = (self.end - self.cursor).num_milliseconds();
        let step = self.step.num_milliseconds().max(1);
        let n = ((span + step - 1) / step) as usize;
        (n, Some(n))
    }
}
