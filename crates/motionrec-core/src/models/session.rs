//! 녹화 세션 모델.
//!
//! 하나의 출력 파일에 대한 열기~닫기 구간의 요약 정보.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 세션 종료 사유
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    /// 무활동 타임아웃 경과
    Inactivity,
    /// 파이프라인 종료 (시그널, 데드라인, 스트림 종료)
    Shutdown,
    /// 고정 길이 녹화 완료
    DurationElapsed,
    /// 인코더 쓰기 실패로 강제 종료
    EncoderFault,
}

/// 닫힌 녹화 세션 기록
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// 세션 고유 ID
    pub id: String,
    /// 출력 파일 경로
    pub output_path: PathBuf,
    /// 세션 시작 시각
    pub opened_at: DateTime<Utc>,
    /// 마지막 움직임 감지 시각
    pub last_motion_at: DateTime<Utc>,
    /// 세션 종료 시각
    pub closed_at: DateTime<Utc>,
    /// 인코더에 기록된 프레임 수
    pub frames_written: u64,
    /// 인코더 지연으로 버려진 프레임 수
    pub frames_dropped: u64,
    /// 종료 사유
    pub close_reason: CloseReason,
}

impl SessionRecord {
    /// 세션 길이
    pub fn duration(&self) -> chrono::Duration {
        self.closed_at - self.opened_at
    }

    /// 두 세션의 `[opened_at, closed_at)` 구간이 겹치는지
    pub fn overlaps(&self, other: &SessionRecord) -> bool {
        self.opened_at < other.closed_at && other.opened_at < self.closed_at
    }
}
