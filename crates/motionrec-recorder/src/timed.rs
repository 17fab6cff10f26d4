//! 고정 시간 녹화.
//!
//! 움직임과 관계없이 첫 프레임에서 세션을 열고 지정 시간이 지나면 닫는다.
//! 세션 경로, 싱크, 필터는 움직임 녹화와 같은 컨트롤러를 쓴다.

use chrono::{DateTime, Duration, Utc};
use motionrec_core::models::session::{CloseReason, SessionRecord};
use motionrec_core::ports::capture::FrameSource;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::controller::RecordingController;
use crate::error::RecorderError;
use crate::feed::{run_blocking, FeedItem, FrameFeed};
use crate::pipeline::PipelineSettings;

/// 고정 시간 녹화기
pub struct TimedRecorder {
    controller: RecordingController,
    duration: Duration,
    settings: PipelineSettings,
}

impl TimedRecorder {
    pub fn new(
        controller: RecordingController,
        duration: Duration,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            controller,
            duration,
            settings,
        }
    }

    /// 녹화 실행 → 닫힌 세션 기록
    ///
    /// 지정 시간 경과는 `DurationElapsed`, 종료 신호는 `Shutdown`으로 닫힌다.
    /// 첫 프레임 전에 종료 신호가 오면 `Ok(None)`.
    /// 세션을 열지 못하거나 인코더가 실패하면 `Err`.
    pub async fn run<S>(
        &mut self,
        source: S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<Option<SessionRecord>, RecorderError>
    where
        S: FrameSource + 'static,
    {
        info!("고정 시간 녹화 시작: {}초", self.duration.num_seconds());
        let mut feed = FrameFeed::spawn(
            source,
            self.settings.channel_capacity,
            self.settings.frame_timeout,
        );
        let mut last: Option<DateTime<Utc>> = None;

        let outcome = loop {
            let frame = match feed.next(&mut shutdown).await {
                Ok(FeedItem::Frame(frame)) => frame,
                Ok(FeedItem::Skipped(err)) => {
                    warn!("프레임 건너뜀: {err}");
                    continue;
                }
                Ok(FeedItem::Shutdown) => break self.close(last, CloseReason::Shutdown),
                Err(e) => {
                    if let Err(close_err) = self.close(last, CloseReason::Shutdown) {
                        warn!("세션 종료 실패: {close_err}");
                    }
                    break Err(e);
                }
            };
            let now = frame.timestamp();

            let opened_at = match self.controller.session() {
                Some(session) => session.opened_at,
                None => {
                    let controller = &mut self.controller;
                    if let Err(e) = run_blocking(|| controller.begin_session(now)) {
                        break Err(e);
                    }
                    now
                }
            };

            if now - opened_at >= self.duration {
                break self.close(Some(now), CloseReason::DurationElapsed);
            }

            last = Some(now);
            let controller = &mut self.controller;
            let report = run_blocking(|| controller.record_frame(&frame));
            if report.closed.is_some() {
                break Err(report
                    .fault
                    .unwrap_or_else(|| RecorderError::Encoder("세션이 비정상 종료됨".to_string())));
            }
        };

        feed.close(std::time::Duration::from_secs(2)).await;
        outcome
    }

    fn close(
        &mut self,
        at: Option<DateTime<Utc>>,
        reason: CloseReason,
    ) -> Result<Option<SessionRecord>, RecorderError> {
        let at = at.unwrap_or_else(Utc::now);
        let controller = &mut self.controller;
        let report = run_blocking(|| controller.end_session(at, reason));
        match (report.closed, report.fault) {
            (_, Some(fault)) => Err(fault),
            (Some(record), None) => {
                info!(
                    "고정 시간 녹화 완료: {} ({}프레임)",
                    record.output_path.display(),
                    record.frames_written
                );
                Ok(Some(record))
            }
            (None, None) => Ok(None),
        }
    }

    pub fn controller(&self) -> &RecordingController {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerSettings;
    use crate::testing::MemorySinkFactory;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use motionrec_core::config::TimeZonePolicy;
    use motionrec_core::models::codec::{Container, VideoCodec};
    use motionrec_core::models::frame::{Frame, Resolution};
    use motionrec_core::ports::sink::SinkSpec;
    use motionrec_storage::layout::StorageLayout;
    use motionrec_vision::capture::ReplaySource;
    use std::sync::Arc;
    use tempfile::TempDir;

    const RES: Resolution = Resolution::new(4, 4);

    fn still_frames(n: u64) -> Vec<Frame> {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        (0..n)
            .map(|i| Frame::filled(RES, t0 + Duration::seconds(i as i64), i, [7, 7, 7]))
            .collect()
    }

    fn recorder(root: &std::path::Path, memory: &MemorySinkFactory, secs: i64) -> TimedRecorder {
        let controller = RecordingController::new(
            ControllerSettings {
                inactivity_timeout: Duration::seconds(1),
                sink_spec: SinkSpec {
                    resolution: RES,
                    fps: 1.0,
                    codec: VideoCodec::Mjpeg,
                },
            },
            StorageLayout::new(root, Container::Avi, TimeZonePolicy::Utc),
            Arc::new(memory.clone()),
        );
        TimedRecorder::new(controller, Duration::seconds(secs), PipelineSettings::default())
    }

    #[tokio::test]
    async fn records_without_motion_until_duration() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        let mut timed = recorder(tmp.path(), &memory, 10);
        let (_tx, rx) = watch::channel(false);

        let record = timed
            .run(ReplaySource::new(RES, still_frames(30)), rx)
            .await
            .unwrap()
            .unwrap();

        // 무움직임 타임아웃(1초)과 무관하게 0..10초 프레임 기록
        assert_eq!(record.close_reason, CloseReason::DurationElapsed);
        assert_eq!(record.frames_written, 10);
        assert_eq!(memory.opened(), 1);
        assert!(memory.log(0).unwrap().closed);
    }

    #[tokio::test]
    async fn end_of_stream_before_duration_still_closes() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        let mut timed = recorder(tmp.path(), &memory, 60);
        let (_tx, rx) = watch::channel(false);

        let result = timed.run(ReplaySource::new(RES, still_frames(5)), rx).await;
        assert_matches!(result, Err(RecorderError::EndOfStream));
        assert_eq!(timed.controller().history().len(), 1);
        assert_eq!(timed.controller().history()[0].frames_written, 5);
        assert!(memory.log(0).unwrap().closed);
    }

    #[tokio::test]
    async fn shutdown_before_first_frame_records_nothing() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        let mut timed = recorder(tmp.path(), &memory, 10);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let result = timed.run(ReplaySource::new(RES, still_frames(3)), rx).await;
        assert_matches!(result, Ok(None));
        assert_eq!(memory.opened(), 0);
    }

    #[tokio::test]
    async fn open_failure_reported() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new().failing_open();
        let mut timed = recorder(tmp.path(), &memory, 10);
        let (_tx, rx) = watch::channel(false);

        let result = timed.run(ReplaySource::new(RES, still_frames(3)), rx).await;
        assert_matches!(result, Err(RecorderError::Storage(_)));
    }

    #[tokio::test]
    async fn encoder_fault_reported() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new().failing_after(3);
        let mut timed = recorder(tmp.path(), &memory, 10);
        let (_tx, rx) = watch::channel(false);

        let result = timed.run(ReplaySource::new(RES, still_frames(20)), rx).await;
        assert_matches!(result, Err(RecorderError::Encoder(_)));
        assert_eq!(
            timed.controller().history()[0].close_reason,
            CloseReason::EncoderFault
        );
    }
}
