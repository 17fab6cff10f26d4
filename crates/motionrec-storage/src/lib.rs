//! # motionrec-storage
//!
//! 녹화 저장소 어댑터.
//! `outputRoot/YYYYMMDD/HHMMSS.<ext>` 레이아웃의 충돌 안전 경로 예약,
//! ffmpeg 파이프 기반 비디오 싱크, 녹화 목록 조회와 보존 정책을 담당한다.
//!
//! ## 모듈
//! - `layout`: 세션/스틸 이미지 경로 생성 및 예약
//! - `ffmpeg_sink`: 비디오 싱크 (VideoSink 구현)
//! - `index`: 녹화 목록, 날짜 폴더 보존 정책

pub mod ffmpeg_sink;
pub mod index;
pub mod layout;
