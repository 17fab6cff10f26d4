//! 애플리케이션 설정 구조체.
//!
//! 캡처 해상도, 움직임 임계값, 무활동 타임아웃, 코덱/컨테이너, 출력 경로 등
//! 런타임 설정을 정의한다. `ConfigManager`를 통해 JSON 파일에서 로드.
//! 하나의 파이프라인 실행 동안에는 변경되지 않는다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;
use crate::models::codec::{Container, VideoCodec};
use crate::models::frame::Resolution;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 캡처 장치 설정
    pub capture: CaptureConfig,
    /// 움직임 감지 설정
    pub motion: MotionConfig,
    /// 녹화 설정
    pub recording: RecordingConfig,
    /// 출력 저장소 설정
    pub storage: StorageConfig,
    /// 주기적 스냅샷 설정
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

// ============================================================
// 캡처 설정
// ============================================================

/// 캡처 소스 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSourceKind {
    /// 카메라 장치 (ffmpeg 경유)
    #[default]
    Camera,
    /// 스크린 (xcap)
    Screen,
}

/// 캡처 장치 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// 캡처 소스
    #[serde(default)]
    pub source: CaptureSourceKind,
    /// 장치 식별자 (None이면 플랫폼 기본 장치, 스크린은 모니터 인덱스)
    #[serde(default)]
    pub device: Option<String>,
    /// 요청 캡처 해상도
    #[serde(default = "default_resolution")]
    pub resolution: Resolution,
    /// 초당 프레임 수 (캡처 요청 + 인코딩)
    #[serde(default = "default_fps")]
    pub fps: f64,
    /// 프레임 대기 제한 (밀리초). 초과 시 장치 장애로 간주
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,
    /// ffmpeg 실행 파일 경로
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
}

// ============================================================
// 움직임 감지 설정
// ============================================================

/// 움직임 감지 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// 움직임으로 판정할 최소 변경 픽셀 수 (엄격한 초과)
    #[serde(default = "default_motion_threshold")]
    pub threshold: u64,
    /// 픽셀 이진화 임계값 (0-255)
    #[serde(default = "default_pixel_threshold")]
    pub pixel_threshold: u8,
    /// 블러 커널 크기 (홀수)
    #[serde(default = "default_blur_kernel")]
    pub blur_kernel: u32,
}

// ============================================================
// 녹화 설정
// ============================================================

/// 녹화 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// 세션 종료까지의 무움직임 시간 (초)
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
    /// 비디오 코덱
    #[serde(default = "default_codec")]
    pub codec: VideoCodec,
    /// 컨테이너 포맷 (파일 확장자)
    #[serde(default = "default_container")]
    pub container: Container,
    /// 캡처→인코더 큐 깊이 (1-2)
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// 싱크 기록 전에 적용할 필터 이름 목록
    #[serde(default)]
    pub filters: Vec<String>,
    /// 메모리에 보관할 최근 세션 기록 수
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

// ============================================================
// 저장소 설정
// ============================================================

/// 경로 날짜/시각 렌더링 기준 시간대
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeZonePolicy {
    /// 로컬 시간
    #[default]
    Local,
    /// UTC
    Utc,
}

/// 출력 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 녹화 루트 디렉토리
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// 경로 시간대
    #[serde(default)]
    pub time_zone: TimeZonePolicy,
    /// 보존 기간 (일, 0이면 무제한)
    #[serde(default)]
    pub retention_days: u32,
}

// ============================================================
// 스냅샷 설정
// ============================================================

/// 주기적 스냅샷 / 저조도 사진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// 스냅샷 간격 (초)
    #[serde(default = "default_snapshot_interval_secs")]
    pub interval_secs: u64,
    /// 스냅샷 총 시간 (초)
    #[serde(default = "default_snapshot_duration_secs")]
    pub duration_secs: u64,
    /// JPEG 품질 (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// 저조도 사진 평균 프레임 수
    #[serde(default = "default_low_light_frames")]
    pub low_light_frames: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_snapshot_interval_secs(),
            duration_secs: default_snapshot_duration_secs(),
            jpeg_quality: default_jpeg_quality(),
            low_light_frames: default_low_light_frames(),
        }
    }
}

// ============================================================
// AppConfig impl
// ============================================================

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            capture: CaptureConfig {
                source: CaptureSourceKind::Camera,
                device: None,
                resolution: default_resolution(),
                fps: default_fps(),
                frame_timeout_ms: default_frame_timeout_ms(),
                ffmpeg_path: default_ffmpeg_path(),
            },
            motion: MotionConfig {
                threshold: default_motion_threshold(),
                pixel_threshold: default_pixel_threshold(),
                blur_kernel: default_blur_kernel(),
            },
            recording: RecordingConfig {
                inactivity_timeout_secs: default_inactivity_timeout_secs(),
                codec: default_codec(),
                container: default_container(),
                queue_depth: default_queue_depth(),
                history_limit: default_history_limit(),
                filters: Vec::new(),
            },
            storage: StorageConfig {
                output_root: default_output_root(),
                time_zone: TimeZonePolicy::Local,
                retention_days: 0,
            },
            snapshot: SnapshotConfig::default(),
        }
    }

    /// 설정값 유효성 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        let res = self.capture.resolution;
        if res.width == 0 || res.height == 0 {
            return Err(invalid("capture.resolution", format!("0 크기 해상도: {res}")));
        }
        if !(self.capture.fps.is_finite() && self.capture.fps > 0.0) {
            return Err(invalid(
                "capture.fps",
                format!("양수여야 함: {}", self.capture.fps),
            ));
        }
        if self.capture.frame_timeout_ms == 0 {
            return Err(invalid("capture.frame_timeout_ms", "0일 수 없음".to_string()));
        }
        let kernel = self.motion.blur_kernel;
        if kernel == 0 || kernel % 2 == 0 {
            return Err(invalid(
                "motion.blur_kernel",
                format!("양의 홀수여야 함: {kernel}"),
            ));
        }
        if self.recording.inactivity_timeout_secs == 0 {
            return Err(invalid(
                "recording.inactivity_timeout_secs",
                "0일 수 없음".to_string(),
            ));
        }
        if !(1..=2).contains(&self.recording.queue_depth) {
            return Err(invalid(
                "recording.queue_depth",
                format!("1 또는 2여야 함: {}", self.recording.queue_depth),
            ));
        }
        if !self.recording.codec.supports(self.recording.container) {
            return Err(invalid(
                "recording.container",
                format!(
                    "{} 코덱은 .{} 컨테이너를 지원하지 않음",
                    self.recording.codec,
                    self.recording.container.extension()
                ),
            ));
        }
        if self.storage.output_root.as_os_str().is_empty() {
            return Err(invalid("storage.output_root", "비어 있음".to_string()));
        }
        if !(1..=100).contains(&self.snapshot.jpeg_quality) {
            return Err(invalid(
                "snapshot.jpeg_quality",
                format!("1-100 범위여야 함: {}", self.snapshot.jpeg_quality),
            ));
        }
        if self.snapshot.interval_secs == 0 {
            return Err(invalid("snapshot.interval_secs", "0일 수 없음".to_string()));
        }
        if self.snapshot.low_light_frames == 0 {
            return Err(invalid(
                "snapshot.low_light_frames",
                "1 이상이어야 함".to_string(),
            ));
        }
        Ok(())
    }

    /// 무활동 타임아웃을 Duration으로 반환
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.recording.inactivity_timeout_secs)
    }

    /// 프레임 대기 제한을 Duration으로 반환
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.capture.frame_timeout_ms)
    }

    /// 프레임 간격을 Duration으로 반환
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.capture.fps)
    }
}

fn invalid(field: &str, message: String) -> CoreError {
    CoreError::Validation {
        field: field.to_string(),
        message,
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_resolution() -> Resolution {
    Resolution::new(640, 480)
}
fn default_fps() -> f64 {
    20.0
}
fn default_frame_timeout_ms() -> u64 {
    5_000
}
fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}
fn default_motion_threshold() -> u64 {
    500
}
fn default_pixel_threshold() -> u8 {
    25
}
fn default_blur_kernel() -> u32 {
    21
}
fn default_inactivity_timeout_secs() -> u64 {
    60
}
fn default_codec() -> VideoCodec {
    VideoCodec::Xvid
}
fn default_container() -> Container {
    Container::Avi
}
fn default_queue_depth() -> usize {
    2
}
fn default_history_limit() -> usize {
    100
}
fn default_output_root() -> PathBuf {
    PathBuf::from("recordings")
}
fn default_snapshot_interval_secs() -> u64 {
    5
}
fn default_snapshot_duration_secs() -> u64 {
    60
}
fn default_jpeg_quality() -> u8 {
    90
}
fn default_low_light_frames() -> usize {
    30
}
