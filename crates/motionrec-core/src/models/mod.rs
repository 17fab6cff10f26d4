//! motionrec 도메인 모델.
//!
//! 캡처 → 감지 → 녹화 파이프라인이 주고받는 핵심 데이터 구조체를 정의한다.

pub mod codec;
pub mod frame;
pub mod motion;
pub mod session;
