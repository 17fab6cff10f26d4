//! 녹화 파이프라인 에러.
//!
//! 장치 장애/스트림 종료는 치명적, 저장소/인코더/프레임 에러는
//! 해당 에피소드만 포기하고 계속 진행한다.

use std::time::Duration;

use motionrec_core::error::CoreError;
use thiserror::Error;

/// 녹화 파이프라인 에러
#[derive(Debug, Error)]
pub enum RecorderError {
    /// 캡처 장치 장애 (치명적)
    #[error("캡처 장치 장애: {0}")]
    Device(String),

    /// 프레임 스트림 종료 (치명적)
    #[error("프레임 스트림 종료")]
    EndOfStream,

    /// 제한 시간 내 프레임 없음 (치명적)
    #[error("프레임 대기 시간 초과: {0:?}")]
    FrameTimeout(Duration),

    /// 세션 열기 실패 (비치명적)
    #[error("저장소 장애: {0}")]
    Storage(String),

    /// 인코더 쓰기/종료 실패 (비치명적)
    #[error("인코더 장애: {0}")]
    Encoder(String),

    /// 잘못된 프레임 (비치명적, 프레임만 건너뜀)
    #[error("잘못된 프레임: {0}")]
    MalformedFrame(String),

    /// 코어 에러
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RecorderError {
    /// 파이프라인을 중단해야 하는 에러인지
    pub fn is_fatal(&self) -> bool {
        match self {
            RecorderError::Device(_)
            | RecorderError::EndOfStream
            | RecorderError::FrameTimeout(_) => true,
            RecorderError::Storage(_)
            | RecorderError::Encoder(_)
            | RecorderError::MalformedFrame(_) => false,
            RecorderError::Core(e) => matches!(e, CoreError::Device(_)),
        }
    }

    /// 캡처 소스 에러 분류
    pub fn from_capture(err: CoreError) -> Self {
        match err {
            CoreError::Device(msg) => RecorderError::Device(msg),
            e @ CoreError::MalformedFrame { .. } => RecorderError::MalformedFrame(e.to_string()),
            e @ CoreError::Validation { .. } => RecorderError::MalformedFrame(e.to_string()),
            other => RecorderError::Device(other.to_string()),
        }
    }

    /// 세션 열기 에러 분류 (경로 예약/싱크 생성 실패 모두 저장소 장애)
    pub fn from_open(err: CoreError) -> Self {
        RecorderError::Storage(err.to_string())
    }

    /// 싱크 쓰기/종료 에러 분류
    pub fn from_sink(err: CoreError) -> Self {
        match err {
            e @ CoreError::MalformedFrame { .. } => RecorderError::MalformedFrame(e.to_string()),
            other => RecorderError::Encoder(other.to_string()),
        }
    }
}
