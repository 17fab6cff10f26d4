//! 녹화 상태 머신.
//!
//! `Idle` ↔ `Recording` 두 상태. 프레임마다 고정 순서로 처리한다.
//!
//! 1. 움직임: Idle이면 세션 열기, Recording이면 `last_motion_at` 갱신
//! 2. 전달: Recording이면 (필터 적용 후) 프레임을 싱크에 기록
//! 3. 타임아웃: `now - last_motion_at > inactivity_timeout`이면 세션 닫기
//!
//! `now`는 프레임 캡처 시각이다. 열린 세션은 항상 하나 이하이며
//! 컨트롤러만 세션을 변경한다.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use motionrec_core::config::AppConfig;
use motionrec_core::models::frame::Frame;
use motionrec_core::models::motion::MotionVerdict;
use motionrec_core::models::session::{CloseReason, SessionRecord};
use motionrec_core::ports::sink::{SinkSpec, VideoSink, VideoSinkFactory};
use motionrec_storage::layout::StorageLayout;
use motionrec_vision::filter::FilterChain;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RecorderError;
use crate::events::{EventBus, RecorderEvent};

/// 기본 세션 기록 보관 수
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// 컨트롤러 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

/// 열린 녹화 세션 (컨트롤러 단독 소유)
pub struct RecordingSession {
    pub id: String,
    pub output_path: PathBuf,
    pub opened_at: DateTime<Utc>,
    pub last_motion_at: DateTime<Utc>,
    sink: Box<dyn VideoSink>,
}

impl RecordingSession {
    /// 현재까지 기록된 프레임 수
    pub fn frames_written(&self) -> u64 {
        self.sink.frames_written()
    }
}

/// 프레임 처리 결과
#[derive(Debug, Default)]
pub struct TickReport {
    /// 이번 프레임에서 열린 세션 경로
    pub opened: Option<PathBuf>,
    /// 이번 프레임에서 닫힌 세션
    pub closed: Option<SessionRecord>,
    /// 비치명적 장애
    pub fault: Option<RecorderError>,
}

/// 컨트롤러 파라미터
#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    /// 무활동 타임아웃
    pub inactivity_timeout: Duration,
    /// 세션 싱크 파라미터
    pub sink_spec: SinkSpec,
}

impl ControllerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            inactivity_timeout: Duration::seconds(config.recording.inactivity_timeout_secs as i64),
            sink_spec: SinkSpec {
                resolution: config.capture.resolution,
                fps: config.capture.fps,
                codec: config.recording.codec,
            },
        }
    }
}

/// 움직임 기반 녹화 컨트롤러
pub struct RecordingController {
    settings: ControllerSettings,
    layout: StorageLayout,
    factory: Arc<dyn VideoSinkFactory>,
    filters: FilterChain,
    session: Option<RecordingSession>,
    history: VecDeque<SessionRecord>,
    history_limit: usize,
    events: Option<EventBus>,
}

impl RecordingController {
    pub fn new(
        settings: ControllerSettings,
        layout: StorageLayout,
        factory: Arc<dyn VideoSinkFactory>,
    ) -> Self {
        Self {
            settings,
            layout,
            factory,
            filters: FilterChain::new(),
            session: None,
            history: VecDeque::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            events: None,
        }
    }

    /// 싱크 기록 전에 적용할 필터 체인
    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    /// 보관할 최근 세션 기록 수. 넘치면 가장 오래된 기록부터 버린다.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// 이벤트 버스 연결
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> RecorderState {
        if self.session.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    /// 열린 세션
    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    /// 최근 닫힌 세션 기록 (닫힌 순서, 최대 `history_limit`개)
    pub fn history(&self) -> &VecDeque<SessionRecord> {
        &self.history
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// 프레임 하나 처리 (움직임 → 전달 → 타임아웃)
    pub fn on_frame(&mut self, frame: &Frame, verdict: &MotionVerdict) -> TickReport {
        let now = frame.timestamp();
        let mut report = TickReport::default();

        // 1. 움직임
        if verdict.is_motion {
            match self.session.as_mut() {
                Some(session) => session.last_motion_at = now,
                None => match self.begin_session(now) {
                    Ok(path) => report.opened = Some(path),
                    Err(e) => {
                        // 세션을 열지 못하면 이번 움직임은 버리고 Idle 유지
                        self.report_fault(&e);
                        report.fault = Some(e);
                        return report;
                    }
                },
            }
        }

        // 2. 전달
        if self.session.is_some() {
            let forwarded = self.record_frame(frame);
            report.fault = forwarded.fault;
            if forwarded.closed.is_some() {
                report.closed = forwarded.closed;
                return report;
            }
        }

        // 3. 타임아웃
        let expired = self
            .session
            .as_ref()
            .is_some_and(|s| now - s.last_motion_at > self.settings.inactivity_timeout);
        if expired {
            let closed = self.end_session(now, CloseReason::Inactivity);
            report.closed = closed.closed;
            if report.fault.is_none() {
                report.fault = closed.fault;
            }
        }

        report
    }

    /// 새 세션 열기 (이미 열려 있으면 기존 경로 반환)
    ///
    /// 경로 예약이나 싱크 생성이 실패하면 `Storage` 에러이며 상태는 Idle로 남는다.
    pub fn begin_session(&mut self, now: DateTime<Utc>) -> Result<PathBuf, RecorderError> {
        if let Some(session) = &self.session {
            return Ok(session.output_path.clone());
        }

        let path = self
            .layout
            .session_path(now)
            .map_err(RecorderError::from_open)?;

        let sink = match self.factory.open(&path, &self.settings.sink_spec) {
            Ok(sink) => sink,
            Err(e) => {
                self.layout.discard(&path);
                return Err(RecorderError::from_open(e));
            }
        };

        let id = Uuid::new_v4().to_string();
        info!(session_id = %id, path = %path.display(), "녹화 세션 시작");
        self.publish(RecorderEvent::SessionOpened {
            id: id.clone(),
            path: path.clone(),
            at: now,
        });

        self.session = Some(RecordingSession {
            id,
            output_path: path.clone(),
            opened_at: now,
            last_motion_at: now,
            sink,
        });
        Ok(path)
    }

    /// 열린 세션에 프레임 기록 (움직임/타임아웃 판단 없음)
    ///
    /// 인코더 장애면 세션을 닫고 Idle로 돌아간다.
    /// 필터나 싱크가 프레임을 거부하면 그 프레임만 건너뛴다.
    pub fn record_frame(&mut self, frame: &Frame) -> TickReport {
        let mut report = TickReport::default();
        let Some(session) = self.session.as_mut() else {
            return report;
        };

        let filtered = match self.filters.apply(frame) {
            Ok(f) => f,
            Err(e) => {
                let err = RecorderError::MalformedFrame(e.to_string());
                self.report_fault(&err);
                report.fault = Some(err);
                return report;
            }
        };

        if let Err(e) = session.sink.write(&filtered) {
            let err = RecorderError::from_sink(e);
            self.report_fault(&err);
            if matches!(err, RecorderError::Encoder(_)) {
                let closed = self.end_session(frame.timestamp(), CloseReason::EncoderFault);
                report.closed = closed.closed;
            }
            report.fault = Some(err);
        } else {
            debug!(seq = frame.sequence(), "프레임 기록");
        }
        report
    }

    /// 열린 세션 닫기 → 세션 기록
    ///
    /// 싱크 종료 실패는 `fault`로 보고되지만 세션은 어쨌든 닫힌 것으로 기록된다.
    pub fn end_session(&mut self, now: DateTime<Utc>, reason: CloseReason) -> TickReport {
        let mut report = TickReport::default();
        let Some(mut session) = self.session.take() else {
            return report;
        };

        if let Err(e) = session.sink.close() {
            let err = RecorderError::from_sink(e);
            self.report_fault(&err);
            report.fault = Some(err);
        }

        let record = SessionRecord {
            id: session.id,
            output_path: session.output_path,
            opened_at: session.opened_at,
            last_motion_at: session.last_motion_at,
            closed_at: now.max(session.opened_at),
            frames_written: session.sink.frames_written(),
            frames_dropped: session.sink.frames_dropped(),
            close_reason: reason,
        };

        info!(
            session_id = %record.id,
            path = %record.output_path.display(),
            frames = record.frames_written,
            dropped = record.frames_dropped,
            reason = ?reason,
            "녹화 세션 종료"
        );
        if record.frames_dropped > 0 {
            warn!(
                "세션 {}: 인코더 지연으로 {}프레임 버림",
                record.id, record.frames_dropped
            );
        }

        self.publish(RecorderEvent::SessionClosed(record.clone()));
        self.history.push_back(record.clone());
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
        report.closed = Some(record);
        report
    }

    /// 열린 세션을 닫고 Idle로. Idle이면 아무 일도 하지 않는다.
    pub fn shutdown(&mut self, now: DateTime<Utc>) -> TickReport {
        if self.session.is_none() {
            return TickReport::default();
        }
        info!("컨트롤러 종료: 열린 세션 닫는 중");
        self.end_session(now, CloseReason::Shutdown)
    }

    /// 열린 세션 출력 경로
    pub fn current_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.output_path.as_path())
    }

    fn report_fault(&self, err: &RecorderError) {
        warn!("녹화 장애 (계속 진행): {err}");
        self.publish(RecorderEvent::Fault {
            message: err.to_string(),
        });
    }

    fn publish(&self, event: RecorderEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            let now = Utc::now().max(session.last_motion_at);
            self.shutdown(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySinkFactory;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use motionrec_core::config::TimeZonePolicy;
    use motionrec_core::models::codec::{Container, VideoCodec};
    use motionrec_core::models::frame::Resolution;
    use motionrec_core::ports::filter::FrameFilter;
    use motionrec_vision::filter::Mirror;
    use tempfile::TempDir;

    const RES: Resolution = Resolution::new(4, 4);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn settings(timeout_secs: i64) -> ControllerSettings {
        ControllerSettings {
            inactivity_timeout: Duration::seconds(timeout_secs),
            sink_spec: SinkSpec {
                resolution: RES,
                fps: 1.0,
                codec: VideoCodec::Xvid,
            },
        }
    }

    fn controller(root: &Path, factory: &MemorySinkFactory, timeout: i64) -> RecordingController {
        RecordingController::new(
            settings(timeout),
            StorageLayout::new(root, Container::Avi, TimeZonePolicy::Utc),
            Arc::new(factory.clone()),
        )
    }

    /// `secs`초 시점 프레임과 점수
    fn tick(c: &mut RecordingController, secs: i64, score: u64) -> TickReport {
        let ts = t0() + Duration::seconds(secs);
        let frame = Frame::filled(RES, ts, secs as u64, [0, 0, 0]);
        let verdict = MotionVerdict::from_score(ts, score, 500);
        c.on_frame(&frame, &verdict)
    }

    #[test]
    fn reference_scenario_opens_once_and_closes_after_timeout() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        let mut c = controller(tmp.path(), &memory, 60);

        let mut opened = Vec::new();
        let mut closed = Vec::new();

        // 5프레임 움직임 (1초 간격), 이후 70초 정지
        for secs in 0..75 {
            let score = if secs < 5 { 800 } else { 0 };
            let report = tick(&mut c, secs, score);
            if let Some(p) = report.opened {
                opened.push((secs, p));
            }
            if let Some(r) = report.closed {
                closed.push((secs, r));
            }
            assert!(report.fault.is_none());
        }

        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].0, 0);
        assert_eq!(closed.len(), 1);

        // last_motion_at = 4초 → 4 + 60 초과인 첫 프레임은 65초
        let (close_secs, record) = &closed[0];
        assert_eq!(*close_secs, 65);
        assert_eq!(record.opened_at, t0());
        assert_eq!(record.last_motion_at, t0() + Duration::seconds(4));
        assert_eq!(record.closed_at, t0() + Duration::seconds(65));
        assert_eq!(record.close_reason, CloseReason::Inactivity);
        // 0..=65초 프레임 전부 기록 (타임아웃을 넘긴 프레임 포함)
        assert_eq!(record.frames_written, 66);
        assert_eq!(c.state(), RecorderState::Idle);

        let log = memory.log(0).unwrap();
        assert!(log.closed);
        assert_eq!(log.path, tmp.path().join("20240501").join("100000.avi"));
    }

    #[test]
    fn motion_at_timeout_instant_keeps_session_open() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        let mut c = controller(tmp.path(), &memory, 10);

        tick(&mut c, 0, 900);
        // 정확히 타임아웃 시점 (10 - 0 = 10, 초과 아님)
        assert!(tick(&mut c, 10, 0).closed.is_none());
        // 11초에 움직임 → 먼저 갱신되므로 닫히지 않음
        assert!(tick(&mut c, 11, 900).closed.is_none());
        assert_eq!(c.state(), RecorderState::Recording);
        assert!(tick(&mut c, 22, 0).closed.is_some());
    }

    #[test]
    fn no_motion_never_opens() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        let mut c = controller(tmp.path(), &memory, 60);
        for secs in 0..10 {
            let report = tick(&mut c, secs, 500);
            assert!(report.opened.is_none());
        }
        assert_eq!(memory.opened(), 0);
        assert_eq!(c.state(), RecorderState::Idle);
    }

    #[test]
    fn sessions_never_overlap() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        let mut c = controller(tmp.path(), &memory, 3);

        // 움직임 버스트 세 번, 각각 타임아웃 이후 재개
        for start in [0i64, 20, 40] {
            for secs in start..start + 2 {
                tick(&mut c, secs, 1000);
            }
            for secs in start + 2..start + 10 {
                tick(&mut c, secs, 0);
            }
        }

        let history = c.history();
        assert_eq!(history.len(), 3);
        for (i, a) in history.iter().enumerate() {
            for b in history.iter().skip(i + 1) {
                assert!(!a.overlaps(b));
            }
        }
        assert_eq!(memory.opened(), 3);
    }

    #[test]
    fn history_keeps_only_most_recent_sessions() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        let mut c = controller(tmp.path(), &memory, 3).with_history_limit(2);

        let mut closed_ids = Vec::new();
        for start in [0i64, 20, 40, 60, 80] {
            tick(&mut c, start, 1000);
            for secs in start + 1..start + 10 {
                if let Some(record) = tick(&mut c, secs, 0).closed {
                    closed_ids.push(record.id);
                }
            }
        }

        assert_eq!(closed_ids.len(), 5);
        assert_eq!(memory.opened(), 5);
        let kept: Vec<&str> = c.history().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(kept, vec![closed_ids[3].as_str(), closed_ids[4].as_str()]);
    }

    #[test]
    fn unwritable_root_stays_idle_with_one_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let memory = MemorySinkFactory::new();
        let mut c = controller(&blocker.join("rec"), &memory, 60);

        let report = tick(&mut c, 0, 900);
        assert!(report.opened.is_none());
        assert_matches!(report.fault, Some(RecorderError::Storage(_)));
        assert_eq!(c.state(), RecorderState::Idle);
        assert_eq!(memory.opened(), 0);

        // 움직임 없는 프레임은 에러 없음
        assert!(tick(&mut c, 1, 0).fault.is_none());
    }

    #[test]
    fn sink_open_failure_discards_reservation() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new().failing_open();
        let mut c = controller(tmp.path(), &memory, 60);

        let report = tick(&mut c, 0, 900);
        assert_matches!(report.fault, Some(RecorderError::Storage(_)));
        assert_eq!(c.state(), RecorderState::Idle);
        assert!(!tmp.path().join("20240501").join("100000.avi").exists());
    }

    #[test]
    fn same_second_reopen_is_storage_fault() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        let mut c = controller(tmp.path(), &memory, 60);

        c.begin_session(t0()).unwrap();
        c.end_session(t0(), CloseReason::Shutdown);
        assert_matches!(c.begin_session(t0()), Err(RecorderError::Storage(_)));
        assert_eq!(c.state(), RecorderState::Idle);
    }

    #[test]
    fn encoder_fault_closes_and_returns_idle() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new().failing_after(2);
        let mut c = controller(tmp.path(), &memory, 60);

        assert!(tick(&mut c, 0, 900).fault.is_none());
        assert!(tick(&mut c, 1, 900).fault.is_none());
        let report = tick(&mut c, 2, 900);
        assert_matches!(report.fault, Some(RecorderError::Encoder(_)));
        let record = report.closed.unwrap();
        assert_eq!(record.close_reason, CloseReason::EncoderFault);
        assert_eq!(record.frames_written, 2);
        assert_eq!(c.state(), RecorderState::Idle);
        assert!(memory.log(0).unwrap().closed);

        // 다음 움직임은 새 세션
        assert!(tick(&mut c, 3, 900).opened.is_some());
    }

    #[test]
    fn shutdown_closes_open_session_and_is_noop_when_idle() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        let mut c = controller(tmp.path(), &memory, 60);

        assert!(c.shutdown(t0()).closed.is_none());

        tick(&mut c, 0, 900);
        let report = c.shutdown(t0() + Duration::seconds(1));
        let record = report.closed.unwrap();
        assert_eq!(record.close_reason, CloseReason::Shutdown);
        assert_eq!(c.state(), RecorderState::Idle);

        assert!(c.shutdown(t0() + Duration::seconds(2)).closed.is_none());
        assert_eq!(memory.log(0).unwrap().close_calls, 1);
    }

    #[test]
    fn zero_frame_session_releases_cleanly() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        let mut c = controller(tmp.path(), &memory, 60);

        c.begin_session(t0()).unwrap();
        let report = c.end_session(t0(), CloseReason::Shutdown);
        assert!(report.fault.is_none());
        assert_eq!(report.closed.unwrap().frames_written, 0);
        assert!(memory.log(0).unwrap().closed);
    }

    #[test]
    fn filters_apply_before_sink() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        let mirror: Arc<dyn FrameFilter> = Arc::new(Mirror);
        let mut c = controller(tmp.path(), &memory, 60)
            .with_filters(FilterChain::new().with(mirror));

        tick(&mut c, 0, 900);
        assert_eq!(memory.log(0).unwrap().sequences, vec![0]);
    }

    #[test]
    fn events_published_for_open_and_close() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let mut c = controller(tmp.path(), &memory, 1).with_events(bus);

        tick(&mut c, 0, 900);
        tick(&mut c, 5, 0);

        assert_matches!(rx.try_recv(), Ok(RecorderEvent::SessionOpened { .. }));
        assert_matches!(
            rx.try_recv(),
            Ok(RecorderEvent::SessionClosed(r)) if r.close_reason == CloseReason::Inactivity
        );
    }

    #[test]
    fn drop_closes_open_session() {
        let tmp = TempDir::new().unwrap();
        let memory = MemorySinkFactory::new();
        {
            let mut c = controller(tmp.path(), &memory, 60);
            tick(&mut c, 0, 900);
        }
        assert!(memory.log(0).unwrap().closed);
    }
}
