//! ffmpeg 싱크 흐름 테스트 (unix 전용).
//!
//! 실제 ffmpeg 대신 마지막 인자(출력 경로)에 stdin을 그대로 쓰는 스크립트를 사용한다.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use motionrec_core::config::TimeZonePolicy;
use motionrec_core::models::codec::{Container, VideoCodec};
use motionrec_core::models::frame::{Frame, Resolution};
use motionrec_core::models::motion::MotionVerdict;
use motionrec_core::models::session::CloseReason;
use motionrec_core::ports::sink::SinkSpec;
use motionrec_recorder::controller::{ControllerSettings, RecorderState, RecordingController};
use motionrec_recorder::queued_sink::QueuedSinkFactory;
use motionrec_storage::ffmpeg_sink::FfmpegSinkFactory;
use motionrec_storage::layout::StorageLayout;
use tempfile::TempDir;

const RES: Resolution = Resolution::new(8, 6);

fn fake_ffmpeg(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("fake-ffmpeg");
    std::fs::write(
        &path,
        "#!/bin/sh\nfor out in \"$@\"; do :; done\ncat > \"$out\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn session_bytes_reach_output_file() {
    let tmp = TempDir::new().unwrap();
    let ffmpeg = fake_ffmpeg(tmp.path());
    let root = tmp.path().join("recordings");

    let factory = QueuedSinkFactory::new(Arc::new(FfmpegSinkFactory::new(ffmpeg)), 2);
    let mut c = RecordingController::new(
        ControllerSettings {
            inactivity_timeout: Duration::seconds(3),
            sink_spec: SinkSpec {
                resolution: RES,
                fps: 1.0,
                codec: VideoCodec::Mjpeg,
            },
        },
        StorageLayout::new(&root, Container::Mkv, TimeZonePolicy::Utc),
        Arc::new(factory),
    );

    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let mut closed = None;
    for i in 0..10u64 {
        let ts = t0 + Duration::seconds(i as i64);
        let score = if i < 2 { 1000 } else { 0 };
        let frame = Frame::filled(RES, ts, i, [i as u8, 0, 0]);
        let report = c.on_frame(&frame, &MotionVerdict::from_score(ts, score, 500));
        if let Some(record) = report.closed {
            closed = Some(record);
            break;
        }
    }

    let record = closed.expect("무활동 타임아웃으로 닫혀야 함");
    assert_eq!(record.close_reason, CloseReason::Inactivity);
    assert_eq!(c.state(), RecorderState::Idle);
    assert_eq!(record.output_path, root.join("20240501").join("100000.mkv"));
    // 5초 프레임까지 기록한 뒤 닫힘
    assert_eq!(record.frames_written + record.frames_dropped, 6);

    let size = std::fs::metadata(&record.output_path).unwrap().len();
    assert_eq!(size, record.frames_written * RES.frame_len() as u64);
}
