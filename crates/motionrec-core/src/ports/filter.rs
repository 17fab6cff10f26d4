//! 스틸 이미지 필터 포트.
//!
//! 프레임 하나를 받아 프레임 하나를 반환하는 외부 변환.
//! 구현: `motionrec-vision::filter`

use crate::error::CoreError;
use crate::models::frame::Frame;

/// 단일 프레임 변환
pub trait FrameFilter: Send + Sync {
    /// 필터 이름 (설정/로그용)
    fn name(&self) -> &str;

    /// 변환 적용. 해상도는 유지되어야 한다.
    fn apply(&self, frame: &Frame) -> Result<Frame, CoreError>;
}
