//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! 캡처 장치와 인코더는 외부 네이티브 의존성이므로 최소 기능 trait 뒤에 둔다.
//! 상태 머신과 감지기는 실제 카메라/코덱 없이 합성 프레임으로 테스트된다.

pub mod capture;
pub mod filter;
pub mod sink;
