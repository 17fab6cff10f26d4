//! # motionrec-app
//!
//! motionrec 바이너리 진입점.
//! 설정 로드, CLI 오버라이드, 어댑터 와이어링, 라이프사이클 관리.

mod lifecycle;
mod wiring;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use motionrec_core::config::{AppConfig, CaptureSourceKind, TimeZonePolicy};
use motionrec_core::config_manager::ConfigManager;
use motionrec_core::error::CoreError;
use motionrec_core::models::codec::{Container, VideoCodec};
use motionrec_core::models::frame::Resolution;
use motionrec_recorder::events::{EventBus, RecorderEvent};
use motionrec_storage::index::{list_recordings, prune_before, retention_cutoff, EntryKind};
use motionrec_storage::layout::StorageLayout;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::lifecycle::LifecycleManager;

/// 런타임 종료 시 블로킹 캡처 스레드 대기 한도
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// 움직임 감지 녹화기
#[derive(Parser, Debug)]
#[command(name = "motionrec")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info", global = true)]
    log_level: String,

    /// 최대 실행 시간 (초). 지나면 열린 세션을 닫고 종료
    #[arg(long, global = true)]
    max_runtime: Option<u64>,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// 움직임 감지 녹화 (기본)
    Watch,
    /// 고정 시간 연속 녹화
    Record {
        /// 녹화 시간 (초)
        #[arg(long, default_value = "60")]
        duration: u64,
    },
    /// 주기적 스냅샷
    Snapshot {
        /// 촬영 간격 (초)
        #[arg(long)]
        interval: Option<u64>,
        /// 총 촬영 시간 (초)
        #[arg(long)]
        duration: Option<u64>,
    },
    /// 저조도 사진 (여러 프레임 평균)
    Photo {
        /// 평균할 프레임 수
        #[arg(long)]
        frames: Option<usize>,
    },
    /// 날짜별 녹화 목록
    List,
    /// 보존 기간 지난 날짜 디렉토리 삭제
    Prune {
        /// 보존 일수 (기본: storage.retention_days)
        #[arg(long)]
        days: Option<u32>,
    },
}

/// 설정 파일보다 우선하는 CLI 값
#[derive(clap::Args, Debug, Default, Clone)]
struct Overrides {
    /// 캡처 해상도 (예: 640x480)
    #[arg(long, global = true, value_parser = Resolution::parse)]
    resolution: Option<Resolution>,

    /// 캡처 소스 (camera, screen)
    #[arg(long, global = true, value_parser = parse_source)]
    source: Option<CaptureSourceKind>,

    /// 캡처 장치 (카메라 장치 이름 또는 모니터 인덱스)
    #[arg(long, global = true)]
    device: Option<String>,

    /// 초당 프레임 수
    #[arg(long, global = true)]
    fps: Option<f64>,

    /// 비디오 코덱 (xvid, mp4v, mjpeg, h264)
    #[arg(long, global = true, value_parser = VideoCodec::parse)]
    codec: Option<VideoCodec>,

    /// 컨테이너 (avi, mp4, mkv)
    #[arg(long, global = true, value_parser = Container::parse)]
    container: Option<Container>,

    /// 움직임 판정 변경 픽셀 수
    #[arg(long, global = true)]
    threshold: Option<u64>,

    /// 무움직임 타임아웃 (초)
    #[arg(long, global = true)]
    inactivity_timeout: Option<u64>,

    /// 녹화 루트 디렉토리
    #[arg(long, short = 'o', global = true)]
    output: Option<PathBuf>,

    /// 경로 날짜/시각을 UTC로
    #[arg(long, global = true)]
    utc: bool,

    /// ffmpeg 실행 파일
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// 필터 목록 (쉼표 구분, 예: grayscale,mirror)
    #[arg(long, global = true, value_delimiter = ',')]
    filter: Vec<String>,
}

fn parse_source(s: &str) -> Result<CaptureSourceKind, CoreError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "camera" | "cam" => Ok(CaptureSourceKind::Camera),
        "screen" => Ok(CaptureSourceKind::Screen),
        other => Err(CoreError::Config(format!("알 수 없는 캡처 소스: {other}"))),
    }
}

impl Overrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(res) = self.resolution {
            config.capture.resolution = res;
        }
        if let Some(source) = self.source {
            config.capture.source = source;
        }
        if let Some(ref device) = self.device {
            config.capture.device = Some(device.clone());
        }
        if let Some(fps) = self.fps {
            config.capture.fps = fps;
        }
        if let Some(codec) = self.codec {
            config.recording.codec = codec;
        }
        if let Some(container) = self.container {
            config.recording.container = container;
        }
        if let Some(threshold) = self.threshold {
            config.motion.threshold = threshold;
        }
        if let Some(secs) = self.inactivity_timeout {
            config.recording.inactivity_timeout_secs = secs;
        }
        if let Some(ref output) = self.output {
            config.storage.output_root = output.clone();
        }
        if self.utc {
            config.storage.time_zone = TimeZonePolicy::Utc;
        }
        if let Some(ref ffmpeg) = self.ffmpeg {
            config.capture.ffmpeg_path = ffmpeg.clone();
        }
        if !self.filter.is_empty() {
            config.recording.filters = self.filter.clone();
        }
    }
}

/// 설정 로드 (경로 지정 시 실패는 에러, 기본 경로 실패는 기본값)
fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let manager = match path {
        Some(p) => ConfigManager::with_path(p.to_path_buf()),
        None => ConfigManager::new(),
    };
    match manager {
        Ok(manager) => {
            info!("설정 파일: {}", manager.config_path().display());
            Ok(manager.get())
        }
        Err(e) if path.is_none() => {
            warn!("설정 관리자 초기화 실패, 기본 설정 사용: {e}");
            Ok(AppConfig::default_config())
        }
        Err(e) => Err(e).context("설정 파일 로드 실패"),
    }
}

fn init_tracing(level: &str) {
    let log_filter = [
        "motionrec",
        "motionrec_app",
        "motionrec_core",
        "motionrec_vision",
        "motionrec_storage",
        "motionrec_recorder",
    ]
    .iter()
    .map(|target| format!("{target}={level}"))
    .collect::<Vec<_>>()
    .join(",");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut config = load_config(args.config.as_deref())?;
    args.overrides.apply(&mut config);
    config.validate().context("설정 검증 실패")?;

    let command = args.command.clone().unwrap_or(Command::Watch);
    match command {
        Command::List => list(&config),
        Command::Prune { days } => prune(&config, days.unwrap_or(config.storage.retention_days)),
        other => {
            // 캡처 스레드는 블로킹 read에 묶여 있을 수 있으므로 종료 대기에 한도를 둔다
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .thread_name("motionrec")
                .build()
                .context("tokio 런타임 생성 실패")?;
            let max_runtime = args.max_runtime.map(Duration::from_secs);
            let result = runtime.block_on(run(other, config, max_runtime));
            runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
            result
        }
    }
}

async fn run(command: Command, config: AppConfig, max_runtime: Option<Duration>) -> Result<()> {
    info!("motionrec 시작: {:?}", command);

    let lifecycle = Arc::new(LifecycleManager::new());
    {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move {
            lifecycle.wait(max_runtime).await;
        });
    }

    let events = EventBus::default();
    spawn_event_printer(&events);

    let source = wiring::build_source(&config)?;

    match command {
        Command::Watch => {
            if config.storage.retention_days > 0 {
                if let Err(e) = prune(&config, config.storage.retention_days) {
                    warn!("보존 기간 정리 실패: {e:#}");
                }
            }
            let mut pipeline =
                wiring::build_pipeline(&config, wiring::build_sink_factory(&config), events)?;
            info!("움직임 감지 녹화 실행 중 (Ctrl+C로 종료)");
            let result = pipeline.run(source, lifecycle.subscribe()).await;
            println!("녹화 세션 {}개", pipeline.sessions().len());
            let stats = result?;
            info!(
                "프레임 {}, 움직임 {}, 건너뜀 {}, 장애 {}",
                stats.frames_seen, stats.motion_frames, stats.frames_skipped, stats.faults
            );
        }
        Command::Record { duration } => {
            let mut timed =
                wiring::build_timed(&config, wiring::build_sink_factory(&config), duration)?;
            match timed.run(source, lifecycle.subscribe()).await? {
                Some(record) => println!(
                    "{} ({}프레임, {}초)",
                    record.output_path.display(),
                    record.frames_written,
                    record.duration().num_seconds()
                ),
                None => println!("녹화된 프레임 없음"),
            }
        }
        Command::Snapshot { interval, duration } => {
            let mut config = config;
            if let Some(secs) = interval {
                config.snapshot.interval_secs = secs.max(1);
            }
            if let Some(secs) = duration {
                config.snapshot.duration_secs = secs;
            }
            let mut camera = wiring::build_still_camera(&config, events)?;
            let count = camera.periodic(source, lifecycle.subscribe()).await?;
            println!("스냅샷 {count}장 저장");
        }
        Command::Photo { frames } => {
            let mut config = config;
            if let Some(n) = frames {
                config.snapshot.low_light_frames = n.max(1);
            }
            let mut camera = wiring::build_still_camera(&config, events)?;
            let path = camera.low_light(source, lifecycle.subscribe()).await?;
            println!("{}", path.display());
        }
        Command::List | Command::Prune { .. } => {}
    }

    lifecycle.shutdown();
    info!("motionrec 종료");
    Ok(())
}

/// 녹화 이벤트를 터미널에 출력
fn spawn_event_printer(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(RecorderEvent::SessionOpened { path, .. }) => {
                    println!("● 녹화 시작: {}", path.display());
                }
                Ok(RecorderEvent::SessionClosed(record)) => {
                    println!(
                        "■ 녹화 종료: {} ({}프레임, 버림 {}, {:?})",
                        record.output_path.display(),
                        record.frames_written,
                        record.frames_dropped,
                        record.close_reason
                    );
                }
                Ok(RecorderEvent::StillSaved { path }) => println!("□ {}", path.display()),
                Ok(RecorderEvent::Fault { message }) => debug!("장애 이벤트: {message}"),
                Ok(RecorderEvent::Stopped { reason }) => {
                    debug!("파이프라인 정지: {reason}");
                }
                Err(RecvError::Lagged(n)) => warn!("이벤트 {n}개 누락"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn list(config: &AppConfig) -> Result<()> {
    let root = &config.storage.output_root;
    let days = list_recordings(root).context("녹화 목록 조회 실패")?;
    if days.is_empty() {
        println!("녹화 없음: {}", root.display());
        return Ok(());
    }
    for day in &days {
        println!(
            "{} ({}개, {:.1} MB)",
            day.date,
            day.entries.len(),
            day.total_bytes() as f64 / (1024.0 * 1024.0)
        );
        for entry in &day.entries {
            let kind = match entry.kind {
                EntryKind::Video => "video",
                EntryKind::Still => "still",
                EntryKind::Other => "other",
            };
            let name = entry
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!("  {kind:<5} {name:<24} {:>10} B", entry.size_bytes);
        }
    }
    Ok(())
}

fn prune(config: &AppConfig, days: u32) -> Result<()> {
    let layout = StorageLayout::from_config(config);
    let today = layout.local_date(Utc::now());
    let Some(cutoff) = retention_cutoff(today, days) else {
        println!("보존 기간 무제한: 삭제 없음");
        return Ok(());
    };
    let report = prune_before(layout.root(), cutoff).context("보존 기간 정리 실패")?;
    println!(
        "{cutoff} 이전 삭제: 디렉토리 {}개, 파일 {}개",
        report.dirs_removed, report.files_removed
    );
    Ok(())
}
