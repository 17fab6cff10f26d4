//! 움직임 판정 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 프레임 쌍 비교 결과 (저장하지 않음)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionVerdict {
    /// 판정 대상 프레임의 캡처 시각
    pub timestamp: DateTime<Utc>,
    /// 이진화 후 변경된 픽셀 수
    pub score: u64,
    /// `score > threshold`
    pub is_motion: bool,
}

impl MotionVerdict {
    /// 임계값과 비교해 판정 생성 (엄격한 초과 비교)
    pub fn from_score(timestamp: DateTime<Utc>, score: u64, threshold: u64) -> Self {
        Self {
            timestamp,
            score,
            is_motion: score > threshold,
        }
    }

    /// 비교 대상이 없는 첫 프레임 판정
    pub fn baseline(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            score: 0,
            is_motion: false,
        }
    }
}
