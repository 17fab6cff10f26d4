//! 녹화 파이프라인.
//!
//! FrameSource → MotionDetector → RecordingController → VideoSink.
//! 어떤 경로로 끝나든 반환 전에 열린 세션을 닫는다.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use motionrec_core::config::AppConfig;
use motionrec_core::models::session::SessionRecord;
use motionrec_core::ports::capture::FrameSource;
use motionrec_vision::detector::MotionDetector;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::controller::{RecorderState, RecordingController, TickReport};
use crate::error::RecorderError;
use crate::events::{EventBus, RecorderEvent};
use crate::feed::{run_blocking, FeedItem, FrameFeed};

/// 캡처 스레드 정지 대기 시간
const CAPTURE_STOP_GRACE: Duration = Duration::from_secs(2);

/// 파이프라인 파라미터
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// 프레임 대기 제한
    pub frame_timeout: Duration,
    /// 캡처 → 감지 채널 용량
    pub channel_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            frame_timeout: Duration::from_secs(5),
            channel_capacity: 2,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            frame_timeout: config.frame_timeout(),
            ..Self::default()
        }
    }
}

/// 실행 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_seen: u64,
    pub motion_frames: u64,
    pub frames_skipped: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub faults: u64,
}

/// 녹화 파이프라인
pub struct Pipeline {
    detector: MotionDetector,
    controller: RecordingController,
    settings: PipelineSettings,
    events: EventBus,
    stats: PipelineStats,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Pipeline {
    pub fn new(
        detector: MotionDetector,
        controller: RecordingController,
        settings: PipelineSettings,
        events: EventBus,
    ) -> Self {
        Self {
            detector,
            controller: controller.with_events(events.clone()),
            settings,
            events,
            stats: PipelineStats::default(),
            last_timestamp: None,
        }
    }

    /// 종료 신호 또는 치명적 에러까지 실행
    ///
    /// 종료 신호로 끝나면 `Ok(stats)`, 장치 장애/스트림 종료/대기 초과는 `Err`.
    /// 두 경우 모두 열린 세션은 닫힌 뒤 반환된다.
    pub async fn run<S>(
        &mut self,
        source: S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<PipelineStats, RecorderError>
    where
        S: FrameSource + 'static,
    {
        info!(
            "파이프라인 시작: {} (임계값 {}, 대기 제한 {:?})",
            source.describe(),
            self.detector.settings().threshold,
            self.settings.frame_timeout
        );

        let mut feed = FrameFeed::spawn(
            source,
            self.settings.channel_capacity,
            self.settings.frame_timeout,
        );

        let outcome = loop {
            match feed.next(&mut shutdown).await {
                Ok(FeedItem::Frame(frame)) => {
                    self.stats.frames_seen += 1;
                    self.last_timestamp = Some(frame.timestamp());

                    let verdict = match self.detector.observe(&frame) {
                        Ok(v) => v,
                        Err(e) => {
                            self.skip(RecorderError::from_capture(e));
                            continue;
                        }
                    };
                    if verdict.is_motion {
                        self.stats.motion_frames += 1;
                        debug!(seq = frame.sequence(), score = verdict.score, "움직임 감지");
                    }

                    // 세션 열기/닫기는 파일 예약과 인코더 종료 대기를 포함한다
                    let controller = &mut self.controller;
                    let report = run_blocking(|| controller.on_frame(&frame, &verdict));
                    self.absorb(report);
                }
                Ok(FeedItem::Skipped(err)) => self.skip(err),
                Ok(FeedItem::Shutdown) => {
                    info!("종료 신호 수신");
                    break Ok(());
                }
                Err(e) => {
                    error!("파이프라인 중단: {e}");
                    break Err(e);
                }
            }
        };

        self.finish();
        feed.close(CAPTURE_STOP_GRACE).await;

        let reason = match &outcome {
            Ok(()) => "shutdown".to_string(),
            Err(e) => e.to_string(),
        };
        self.events.publish(RecorderEvent::Stopped {
            reason: reason.clone(),
        });
        info!(
            "파이프라인 종료 ({reason}): 프레임 {}, 세션 {}",
            self.stats.frames_seen, self.stats.sessions_closed
        );

        outcome.map(|()| self.stats.clone())
    }

    /// 열린 세션 닫기 (마지막 프레임 시각 기준)
    fn finish(&mut self) {
        if self.controller.state() == RecorderState::Recording {
            let now = self.last_timestamp.unwrap_or_else(Utc::now);
            let controller = &mut self.controller;
            let report = run_blocking(|| controller.shutdown(now));
            self.absorb(report);
        }
    }

    fn absorb(&mut self, report: TickReport) {
        if report.opened.is_some() {
            self.stats.sessions_opened += 1;
        }
        if report.closed.is_some() {
            self.stats.sessions_closed += 1;
        }
        if report.fault.is_some() {
            self.stats.faults += 1;
        }
    }

    fn skip(&mut self, err: RecorderError) {
        warn!("프레임 건너뜀: {err}");
        self.stats.frames_skipped += 1;
        self.events.publish(RecorderEvent::Fault {
            message: err.to_string(),
        });
    }

    /// 최근 닫힌 세션 기록
    pub fn sessions(&self) -> &VecDeque<SessionRecord> {
        self.controller.history()
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn controller(&self) -> &RecordingController {
        &self.controller
    }
}
