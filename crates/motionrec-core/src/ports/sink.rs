//! 비디오 싱크 포트.
//!
//! 구현: `motionrec-storage` crate (ffmpeg 파이프 인코더),
//! `motionrec-recorder` crate (워커 스레드 큐 데코레이터)

use std::path::Path;

use crate::error::CoreError;
use crate::models::codec::VideoCodec;
use crate::models::frame::{Frame, Resolution};

/// 싱크 열기 파라미터
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinkSpec {
    /// 출력 해상도 (입력 프레임과 동일해야 함)
    pub resolution: Resolution,
    /// 초당 프레임 수
    pub fps: f64,
    /// 비디오 코덱
    pub codec: VideoCodec,
}

/// 하나의 출력 파일에 바인딩된 인코더
///
/// 세션 수명 동안 열려 있으며, `close`는 모든 종료 경로에서 정확히 한 번
/// 효과를 가진다. 두 번째 `close`는 아무 일도 하지 않는다.
pub trait VideoSink: Send {
    /// 프레임 기록. 닫힌 뒤 호출하면 `CoreError::SinkClosed`.
    fn write(&mut self, frame: &Frame) -> Result<(), CoreError>;

    /// 플러시 후 핸들 해제 (멱등)
    fn close(&mut self) -> Result<(), CoreError>;

    /// 지금까지 인코더에 기록된 프레임 수
    fn frames_written(&self) -> u64;

    /// 인코더 지연으로 버려진 프레임 수
    fn frames_dropped(&self) -> u64 {
        0
    }

    /// 닫힘 여부
    fn is_closed(&self) -> bool;
}

/// 싱크 생성기: 세션 열기 시점에만 사용
pub trait VideoSinkFactory: Send + Sync {
    /// `path`(이미 예약된 파일)에 새 싱크 열기
    fn open(&self, path: &Path, spec: &SinkSpec) -> Result<Box<dyn VideoSink>, CoreError>;
}
