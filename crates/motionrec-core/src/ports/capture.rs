//! 프레임 캡처 포트.
//!
//! 구현: `motionrec-vision` crate (ffmpeg 카메라, xcap 스크린, 리플레이)

use crate::error::CoreError;
use crate::models::frame::{Frame, Resolution};

/// 캡처 장치: 요청 시 프레임 생성
///
/// 호출은 장치가 프레임을 전달할 때까지 블로킹될 수 있다.
/// 재시도/재연결은 하지 않는다.
pub trait FrameSource: Send {
    /// 다음 프레임.
    ///
    /// - `Ok(Some(frame))`: 새 프레임
    /// - `Ok(None)`: 스트림 종료 (장치 분리 포함)
    /// - `Err(CoreError::Device)`: 장치 읽기 실패
    fn next_frame(&mut self) -> Result<Option<Frame>, CoreError>;

    /// 이 소스가 생성하는 프레임 해상도
    fn resolution(&self) -> Resolution;

    /// 로그용 소스 이름
    fn describe(&self) -> String {
        format!("frame-source {}", self.resolution())
    }
}

impl FrameSource for Box<dyn FrameSource> {
    fn next_frame(&mut self) -> Result<Option<Frame>, CoreError> {
        (**self).next_frame()
    }

    fn resolution(&self) -> Resolution {
        (**self).resolution()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
