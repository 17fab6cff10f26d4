//! Cross-crate 에러 경로 테스트.
//!
//! 저장소/인코더/장치 장애가 파이프라인 경계에서 어떻게 분류되는지 검증한다.

use assert_matches::assert_matches;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use motionrec_core::config::TimeZonePolicy;
use motionrec_core::models::codec::{Container, VideoCodec};
use motionrec_core::models::frame::{Frame, Resolution};
use motionrec_core::models::session::CloseReason;
use motionrec_core::ports::sink::{SinkSpec, VideoSinkFactory};
use motionrec_recorder::controller::{ControllerSettings, RecorderState, RecordingController};
use motionrec_recorder::error::RecorderError;
use motionrec_recorder::events::{EventBus, RecorderEvent};
use motionrec_recorder::pipeline::{Pipeline, PipelineSettings};
use motionrec_recorder::testing::MemorySinkFactory;
use motionrec_storage::layout::StorageLayout;
use motionrec_vision::capture::ReplaySource;
use motionrec_vision::detector::{DetectorSettings, MotionDetector};
use tempfile::TempDir;
use tokio::sync::watch;

const RES: Resolution = Resolution::new(16, 16);

/// 매 프레임 흑백 교대 (첫 프레임 이후 전부 움직임)
fn flicker(n: u64) -> Vec<Frame> {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let v = if i % 2 == 0 { 0 } else { 255 };
            Frame::filled(RES, t0 + Duration::seconds(i as i64), i, [v, v, v])
        })
        .collect()
}

fn pipeline(root: &std::path::Path, factory: Arc<dyn VideoSinkFactory>, bus: EventBus) -> Pipeline {
    let detector = MotionDetector::new(
        DetectorSettings {
            threshold: 10,
            pixel_threshold: 25,
            blur_kernel: 3,
        },
        Some(RES),
    );
    let controller = RecordingController::new(
        ControllerSettings {
            inactivity_timeout: Duration::seconds(60),
            sink_spec: SinkSpec {
                resolution: RES,
                fps: 1.0,
                codec: VideoCodec::Xvid,
            },
        },
        StorageLayout::new(root, Container::Avi, TimeZonePolicy::Utc),
        factory,
    );
    Pipeline::new(detector, controller, PipelineSettings::default(), bus)
}

#[tokio::test]
async fn unwritable_root_is_non_fatal() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let memory = MemorySinkFactory::new();
    let bus = EventBus::new(256);
    let mut events = bus.subscribe();
    let mut p = pipeline(&blocker.join("recordings"), Arc::new(memory.clone()), bus);
    let (_tx, rx) = watch::channel(false);

    let result = p.run(ReplaySource::new(RES, flicker(6)), rx).await;

    // 스트림 끝까지 진행 (저장소 장애로 중단되지 않음)
    assert_matches!(result, Err(RecorderError::EndOfStream));
    assert_eq!(p.stats().frames_seen, 6);
    // 움직임 프레임마다 열기 시도 → 매번 비치명적 장애
    assert_eq!(p.stats().faults, 5);
    assert!(p.sessions().is_empty());
    assert_eq!(memory.opened(), 0);

    let mut faults = 0;
    while let Ok(event) = events.try_recv() {
        if let RecorderEvent::Fault { message } = event {
            assert!(message.contains("저장소"));
            faults += 1;
        }
    }
    assert_eq!(faults, 5);
}

#[tokio::test]
async fn encoder_fault_drops_to_idle_and_recovers() {
    let tmp = TempDir::new().unwrap();
    let memory = MemorySinkFactory::new().failing_after(2);
    let mut p = pipeline(tmp.path(), Arc::new(memory.clone()), EventBus::default());
    let (_tx, rx) = watch::channel(false);

    let _ = p.run(ReplaySource::new(RES, flicker(8)), rx).await;

    let sessions = p.sessions();
    assert!(sessions.len() >= 2);
    assert_eq!(sessions[0].close_reason, CloseReason::EncoderFault);
    assert_eq!(sessions[0].frames_written, 2);
    assert!(memory.logs().iter().all(|log| log.closed));
    assert_eq!(p.controller().state(), RecorderState::Idle);
}

#[tokio::test]
async fn device_fault_is_fatal_but_closes_session() {
    let tmp = TempDir::new().unwrap();
    let memory = MemorySinkFactory::new();
    let mut p = pipeline(tmp.path(), Arc::new(memory.clone()), EventBus::default());
    let (_tx, rx) = watch::channel(false);

    let source = ReplaySource::new(RES, flicker(4)).ending_with_fault("usb reset");
    let err = p.run(source, rx).await.unwrap_err();

    assert!(err.is_fatal());
    assert_matches!(err, RecorderError::Device(ref m) if m.contains("usb reset"));
    assert_eq!(p.sessions().len(), 1);
    assert_eq!(p.sessions()[0].close_reason, CloseReason::Shutdown);
    assert!(memory.log(0).unwrap().closed);
}

#[tokio::test]
async fn resolution_change_mid_stream_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let memory = MemorySinkFactory::new();
    let mut p = pipeline(tmp.path(), Arc::new(memory.clone()), EventBus::default());
    let (_tx, rx) = watch::channel(false);

    let mut frames = flicker(4);
    let t = frames[3].timestamp();
    frames.push(Frame::filled(Resolution::new(8, 8), t, 50, [255, 255, 255]));
    frames.extend(flicker(8).into_iter().skip(4));

    let _ = p.run(ReplaySource::new(RES, frames), rx).await;

    assert_eq!(p.stats().frames_skipped, 1);
    let log = memory.log(0).unwrap();
    assert!(!log.sequences.contains(&50));
    assert_eq!(p.sessions().len(), 1);
}

#[test]
fn sink_open_failure_leaves_no_reserved_file() {
    let tmp = TempDir::new().unwrap();
    let memory = MemorySinkFactory::new().failing_open();
    let mut c = RecordingController::new(
        ControllerSettings {
            inactivity_timeout: Duration::seconds(60),
            sink_spec: SinkSpec {
                resolution: RES,
                fps: 1.0,
                codec: VideoCodec::Xvid,
            },
        },
        StorageLayout::new(tmp.path(), Container::Avi, TimeZonePolicy::Utc),
        Arc::new(memory),
    );

    let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    assert_matches!(c.begin_session(now), Err(RecorderError::Storage(_)));
    let day = tmp.path().join("20240501");
    let leftovers = std::fs::read_dir(&day).map(|r| r.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}
