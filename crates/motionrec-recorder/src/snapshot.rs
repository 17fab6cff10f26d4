//! 스틸 이미지 촬영.
//!
//! - 주기적 스냅샷: `interval`마다 `screenshot_HHMMSS.jpg`를 `duration` 동안 저장
//! - 저조도 사진: N프레임 평균을 `lowlight_HHMMSS.jpg` 하나로 저장

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use motionrec_core::config::AppConfig;
use motionrec_core::models::frame::Frame;
use motionrec_core::ports::capture::FrameSource;
use motionrec_storage::layout::StorageLayout;
use motionrec_vision::filter::FilterChain;
use motionrec_vision::still::{average_frames, save_jpeg};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::RecorderError;
use crate::events::{EventBus, RecorderEvent};
use crate::feed::{run_blocking, FeedItem, FrameFeed};
use crate::pipeline::PipelineSettings;

const SCREENSHOT_PREFIX: &str = "screenshot";
const LOW_LIGHT_PREFIX: &str = "lowlight";
const JPEG_EXT: &str = "jpg";

/// 스틸 촬영 공통 설정
#[derive(Debug, Clone)]
pub struct StillSettings {
    pub interval: Duration,
    pub duration: Duration,
    pub jpeg_quality: u8,
    pub low_light_frames: usize,
}

impl StillSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: Duration::seconds(config.snapshot.interval_secs as i64),
            duration: Duration::seconds(config.snapshot.duration_secs as i64),
            jpeg_quality: config.snapshot.jpeg_quality,
            low_light_frames: config.snapshot.low_light_frames,
        }
    }
}

/// 스틸 이미지 촬영기
pub struct StillCamera {
    layout: StorageLayout,
    filters: FilterChain,
    settings: StillSettings,
    pipeline: PipelineSettings,
    events: Option<EventBus>,
    saved: Vec<PathBuf>,
}

impl StillCamera {
    pub fn new(layout: StorageLayout, settings: StillSettings, pipeline: PipelineSettings) -> Self {
        Self {
            layout,
            filters: FilterChain::new(),
            settings,
            pipeline,
            events: None,
            saved: Vec::new(),
        }
    }

    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// 저장된 이미지 경로 (저장 순서)
    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }

    /// 주기적 스냅샷
    ///
    /// 첫 프레임을 바로 저장하고 이후 `interval`마다 저장한다.
    /// 첫 프레임에서 `duration`이 지나면 끝난다. 개별 저장 실패는 건너뛴다.
    pub async fn periodic<S>(
        &mut self,
        source: S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<usize, RecorderError>
    where
        S: FrameSource + 'static,
    {
        info!(
            "스냅샷 시작: {}초 간격, {}초 동안",
            self.settings.interval.num_seconds(),
            self.settings.duration.num_seconds()
        );
        let mut feed = FrameFeed::spawn(
            source,
            self.pipeline.channel_capacity,
            self.pipeline.frame_timeout,
        );
        let mut started: Option<DateTime<Utc>> = None;
        let mut last_shot: Option<DateTime<Utc>> = None;
        let before = self.saved.len();

        let outcome = loop {
            let frame = match feed.next(&mut shutdown).await {
                Ok(FeedItem::Frame(frame)) => frame,
                Ok(FeedItem::Skipped(err)) => {
                    warn!("프레임 건너뜀: {err}");
                    continue;
                }
                Ok(FeedItem::Shutdown) => break Ok(()),
                Err(e) => break Err(e),
            };
            let now = frame.timestamp();
            let start = *started.get_or_insert(now);
            if now - start >= self.settings.duration {
                break Ok(());
            }

            let due = last_shot.map_or(true, |t| now - t >= self.settings.interval);
            if due {
                last_shot = Some(now);
                if let Err(e) = run_blocking(|| self.save(&frame, SCREENSHOT_PREFIX)) {
                    warn!("스냅샷 저장 실패 (계속 진행): {e}");
                    self.publish(RecorderEvent::Fault {
                        message: e.to_string(),
                    });
                }
            }
        };

        feed.close(std::time::Duration::from_secs(2)).await;
        let count = self.saved.len() - before;
        info!("스냅샷 종료: {count}장 저장");
        outcome.map(|()| count)
    }

    /// 저조도 사진: `low_light_frames`장 평균 → JPEG 한 장
    pub async fn low_light<S>(
        &mut self,
        source: S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<PathBuf, RecorderError>
    where
        S: FrameSource + 'static,
    {
        let wanted = self.settings.low_light_frames.max(1);
        let mut feed = FrameFeed::spawn(
            source,
            self.pipeline.channel_capacity,
            self.pipeline.frame_timeout,
        );
        let mut frames: Vec<Frame> = Vec::with_capacity(wanted);

        let outcome = loop {
            if frames.len() == wanted {
                break Ok(());
            }
            match feed.next(&mut shutdown).await {
                Ok(FeedItem::Frame(frame)) => frames.push(frame),
                Ok(FeedItem::Skipped(err)) => warn!("프레임 건너뜀: {err}"),
                Ok(FeedItem::Shutdown) => break Ok(()),
                // 몇 장이라도 모였으면 그것으로 평균
                Err(RecorderError::EndOfStream) if !frames.is_empty() => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        feed.close(std::time::Duration::from_secs(2)).await;
        outcome?;

        // 첫 프레임 전에 종료 신호가 오면 평균 낼 프레임이 없다
        if frames.is_empty() {
            return Err(RecorderError::EndOfStream);
        }
        if frames.len() < wanted {
            warn!("저조도 사진: {}/{}프레임만 수집", frames.len(), wanted);
        }
        let averaged = average_frames(&frames)
            .map_err(|e| RecorderError::MalformedFrame(e.to_string()))?;
        run_blocking(|| self.save(&averaged, LOW_LIGHT_PREFIX))
    }

    fn save(&mut self, frame: &Frame, prefix: &str) -> Result<PathBuf, RecorderError> {
        let filtered = self
            .filters
            .apply(frame)
            .map_err(|e| RecorderError::MalformedFrame(e.to_string()))?;
        let path = self
            .layout
            .snapshot_path(frame.timestamp(), prefix, JPEG_EXT)
            .map_err(RecorderError::from_open)?;
        if let Err(e) = save_jpeg(&filtered, &path, self.settings.jpeg_quality) {
            self.layout.discard(&path);
            return Err(RecorderError::from_open(e));
        }
        info!(path = %path.display(), "스틸 이미지 저장");
        self.publish(RecorderEvent::StillSaved { path: path.clone() });
        self.saved.push(path.clone());
        Ok(path)
    }

    fn publish(&self, event: RecorderEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}
