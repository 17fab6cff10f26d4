//! # motionrec-recorder
//!
//! 녹화 파이프라인.
//! 캡처 스레드에서 프레임을 받아 움직임을 판정하고,
//! 녹화 상태 머신이 세션 파일을 열고 닫는다.
//! 인코딩은 세션마다 전용 워커 스레드에서 drop-oldest 큐로 처리한다.

pub mod controller;
pub mod error;
pub mod events;
pub mod feed;
pub mod pipeline;
pub mod queue;
pub mod queued_sink;
pub mod snapshot;
pub mod timed;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
