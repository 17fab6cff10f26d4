//! motionrec 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 자체 에러 타입에서 `#[from] CoreError`로 래핑한다.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::frame::Resolution;

/// 코어 레이어 에러.
/// 설정, 캡처 장치, 저장소, 인코더 등 도메인 공통 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패: {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 캡처 장치 에러 (열기 실패, 연결 끊김)
    #[error("캡처 장치 에러: {0}")]
    Device(String),

    /// 저장소 에러 (디렉토리/파일 생성 실패)
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// 동일 경로에 이미 녹화 파일이 존재함
    #[error("녹화 경로 충돌: {}", .0.display())]
    PathCollision(PathBuf),

    /// 인코더 에러 (열린 이후 쓰기/종료 실패)
    #[error("인코더 에러: {0}")]
    Encoder(String),

    /// 이미 닫힌 싱크에 쓰기 시도
    #[error("이미 닫힌 비디오 싱크")]
    SinkClosed,

    /// 예상과 다른 해상도/크기의 프레임
    #[error("잘못된 프레임: 예상 {expected}, 실제 {actual}")]
    MalformedFrame {
        /// 기대한 해상도
        expected: Resolution,
        /// 실제 프레임 해상도
        actual: Resolution,
    },

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}
