//! 어댑터 와이어링.
//!
//! `AppConfig`에서 캡처 소스, 인코더 싱크, 컨트롤러, 실행기를 조립한다.

use std::sync::Arc;

use anyhow::{Context, Result};
use motionrec_core::config::{AppConfig, CaptureSourceKind};
use motionrec_core::ports::capture::FrameSource;
use motionrec_core::ports::sink::VideoSinkFactory;
use motionrec_recorder::controller::{ControllerSettings, RecordingController};
use motionrec_recorder::events::EventBus;
use motionrec_recorder::pipeline::{Pipeline, PipelineSettings};
use motionrec_recorder::queued_sink::QueuedSinkFactory;
use motionrec_recorder::snapshot::{StillCamera, StillSettings};
use motionrec_recorder::timed::TimedRecorder;
use motionrec_storage::ffmpeg_sink::FfmpegSinkFactory;
use motionrec_storage::layout::StorageLayout;
use motionrec_vision::camera::{CameraSettings, FfmpegCamera};
use motionrec_vision::capture::ScreenCapture;
use motionrec_vision::detector::MotionDetector;
use motionrec_vision::filter::FilterChain;
use tracing::info;

/// 설정된 캡처 소스 열기
pub fn build_source(config: &AppConfig) -> Result<Box<dyn FrameSource>> {
    let capture = &config.capture;
    let source: Box<dyn FrameSource> = match capture.source {
        CaptureSourceKind::Camera => {
            let settings = CameraSettings::from_config(config);
            Box::new(FfmpegCamera::open(&settings).context("카메라 열기 실패")?)
        }
        CaptureSourceKind::Screen => {
            let monitor = ScreenCapture::parse_monitor(capture.device.as_deref())?;
            Box::new(ScreenCapture::new(monitor, capture.resolution, capture.fps))
        }
    };
    info!("캡처 소스: {}", source.describe());
    Ok(source)
}

/// ffmpeg 싱크 + 인코더 워커 큐
pub fn build_sink_factory(config: &AppConfig) -> Arc<dyn VideoSinkFactory> {
    let ffmpeg: Arc<dyn VideoSinkFactory> =
        Arc::new(FfmpegSinkFactory::new(config.capture.ffmpeg_path.clone()));
    Arc::new(QueuedSinkFactory::new(ffmpeg, config.recording.queue_depth))
}

pub fn build_filters(config: &AppConfig) -> Result<FilterChain> {
    let chain = FilterChain::from_names(&config.recording.filters)
        .context("필터 구성 실패")?;
    if !chain.is_empty() {
        info!("필터 체인: {:?}", chain.names());
    }
    Ok(chain)
}

pub fn build_controller(
    config: &AppConfig,
    factory: Arc<dyn VideoSinkFactory>,
) -> Result<RecordingController> {
    Ok(RecordingController::new(
        ControllerSettings::from_config(config),
        StorageLayout::from_config(config),
        factory,
    )
    .with_filters(build_filters(config)?)
    .with_history_limit(config.recording.history_limit))
}

/// 움직임 녹화 파이프라인
pub fn build_pipeline(
    config: &AppConfig,
    factory: Arc<dyn VideoSinkFactory>,
    events: EventBus,
) -> Result<Pipeline> {
    let detector = MotionDetector::from_config(config);
    let controller = build_controller(config, factory)?;
    Ok(Pipeline::new(
        detector,
        controller,
        PipelineSettings::from_config(config),
        events,
    ))
}

pub fn build_timed(
    config: &AppConfig,
    factory: Arc<dyn VideoSinkFactory>,
    duration_secs: u64,
) -> Result<TimedRecorder> {
    Ok(TimedRecorder::new(
        build_controller(config, factory)?,
        chrono::Duration::seconds(duration_secs as i64),
        PipelineSettings::from_config(config),
    ))
}

pub fn build_still_camera(config: &AppConfig, events: EventBus) -> Result<StillCamera> {
    Ok(StillCamera::new(
        StorageLayout::from_config(config),
        StillSettings::from_config(config),
        PipelineSettings::from_config(config),
    )
    .with_filters(build_filters(config)?)
    .with_events(events))
}
