//! # motionrec-vision
//!
//! 프레임 처리 크레이트.
//! 프레임 차분 움직임 감지, 카메라(ffmpeg)/스크린(xcap) 캡처,
//! 필터 체인, 스틸 이미지 인코딩을 담당한다.

pub mod camera;
pub mod capture;
pub mod detector;
pub mod filter;
pub mod preprocess;
pub mod resize;
pub mod still;
